//! File logger for evaluation runs.
//!
//! Sessions can run for a long time with many games in flight; the
//! timestamped log file keeps the full `tracing` trail without fighting the
//! caller's terminal output.

use std::fs::File;

use time::{format_description, OffsetDateTime};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Install a global subscriber writing up to `max_level` into a fresh
/// timestamped log file in the working directory.
///
/// Will panic on error, including when a global subscriber is already set.
/// Skip this and install your own subscriber in that case.
pub fn init_logger(max_level: Level) {
    let file = File::create(log_file_name()).expect("could not create log file");
    let local_offset =
        time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]").unwrap(),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(BoxMakeWriter::new(file))
        .finish();

    set_global_default(subscriber).expect(
        "Could not set global default tracing subscriber. \
         Consider skipping init_logger if you are already setting a subscriber.",
    );
}

fn log_file_name() -> String {
    let format =
        format_description::parse("[year]-[month]-[day]_[hour][minute][second]_gauntlet.log")
            .unwrap();
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format).unwrap()
}
