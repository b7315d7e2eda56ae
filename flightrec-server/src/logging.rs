//! Log setup: env_logger on the console, teed into the flight recorder.
//!
//! Every record that passes the console filter is also offered to the
//! [`EventSink`], which keeps it only while the recorder is running.

use clap_verbosity_flag::{InfoLevel, Verbosity};
use env_logger::{Builder, Env, Logger};
use log::{Log, Metadata, Record, SetLoggerError};

use crate::ring::EventSink;

pub struct TeeLogger {
    inner: Logger,
    sink: EventSink,
}

impl TeeLogger {
    pub fn new(inner: Logger, sink: EventSink) -> Self {
        Self { inner, sink }
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.inner.matches(record) {
            return;
        }
        self.inner.log(record);
        self.sink.record(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the global logger.
///
/// `RUST_LOG` overrides the level chosen with `-v`/`-q`.
pub fn init_logging(verbose: &Verbosity<InfoLevel>, sink: EventSink) -> Result<(), SetLoggerError> {
    let inner = Builder::new()
        .filter_level(verbose.log_level_filter())
        .parse_env(Env::default())
        .build();
    let max_level = inner.filter();

    log::set_boxed_logger(Box::new(TeeLogger::new(inner, sink)))?;
    log::set_max_level(max_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingRecorder;
    use flightrec_core::Recorder;
    use log::{Level, LevelFilter};

    fn logger_for(recorder: &RingRecorder, level: LevelFilter) -> TeeLogger {
        let inner = Builder::new().filter_level(level).is_test(true).build();
        TeeLogger::new(inner, recorder.sink())
    }

    fn emit(logger: &TeeLogger, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .args(format_args!("{}", message))
                .level(level)
                .target("logging-test")
                .build(),
        );
    }

    fn captured_messages(recorder: &RingRecorder) -> Vec<String> {
        let mut buf = Vec::new();
        recorder.write_snapshot(&mut buf).unwrap();
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .skip(1)
            .map(|line| {
                let event: serde_json::Value = serde_json::from_str(line).unwrap();
                event["message"].as_str().unwrap().to_string()
            })
            .collect()
    }

    #[test]
    fn test_tee_respects_filter() {
        let mut recorder = RingRecorder::new();
        recorder.start().unwrap();
        let logger = logger_for(&recorder, LevelFilter::Info);

        emit(&logger, Level::Info, "kept");
        emit(&logger, Level::Debug, "filtered");
        emit(&logger, Level::Warn, "also kept");

        assert_eq!(captured_messages(&recorder), ["kept", "also kept"]);
    }

    #[test]
    fn test_tee_skips_ring_while_stopped() {
        let mut recorder = RingRecorder::new();
        let logger = logger_for(&recorder, LevelFilter::Trace);

        emit(&logger, Level::Info, "before");
        recorder.start().unwrap();
        emit(&logger, Level::Trace, "during");

        assert_eq!(captured_messages(&recorder), ["during"]);
    }

    #[test]
    fn test_enabled_follows_inner_filter() {
        let recorder = RingRecorder::new();
        let logger = logger_for(&recorder, LevelFilter::Warn);

        let warn = Metadata::builder().level(Level::Warn).target("x").build();
        let info = Metadata::builder().level(Level::Info).target("x").build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&info));
    }
}
