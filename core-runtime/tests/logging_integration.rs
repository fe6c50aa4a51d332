//! Integration tests for the global logging setup.
//!
//! A global subscriber can only be installed once per process, so the whole
//! flow lives in a single test.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for RecordingSink {
    async fn log(&self, entry: LogEntry) -> BridgeResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

#[test]
fn test_global_logging_mirrors_workspace_events_to_sink() {
    let sink = Arc::new(RecordingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config).expect("first initialization succeeds");

    tracing::debug!(target: "core_playback::rotator", loop_count = 2, "Loop #2");
    tracing::info!(target: "some_dependency", "filtered below warn");
    tracing::trace!(target: "core_playback::rotator", "below configured level");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Loop #2");
        assert_eq!(entries[0].level, LogLevel::Debug);
        assert_eq!(
            entries[0].fields.get("loop_count").map(String::as_str),
            Some("2")
        );
    }

    let err = init_logging(LoggingConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
