//! Line-oriented log of what the provider handled
//!
//! Tests inspect the recorded lines instead of captured stdout. Every line is
//! also emitted through `tracing` at debug level.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Recorder of provider log lines
///
/// Cloning yields a handle to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct ProviderLogger {
    enabled: bool,
    lines: Arc<Mutex<Vec<String>>>,
}

impl ProviderLogger {
    /// Creates a logger; a disabled one records nothing
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            lines: Arc::default(),
        }
    }

    /// Whether lines are being recorded
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Appends a line
    pub fn log_line(&self, line: impl Into<String>) {
        let line = line.into();
        debug!(target: "evm_trace_harness::provider", "{line}");
        if self.enabled {
            self.lines.lock().push(line);
        }
    }

    /// Overwrites the most recent line, or appends when empty
    pub fn replace_last_line(&self, line: impl Into<String>) {
        let line = line.into();
        debug!(target: "evm_trace_harness::provider", "{line}");
        if !self.enabled {
            return;
        }
        let mut lines = self.lines.lock();
        match lines.last_mut() {
            Some(last) => *last = line,
            None => lines.push(line),
        }
    }

    /// Snapshot of the recorded lines
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Forgets every recorded line
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_logger_records_lines() {
        let logger = ProviderLogger::new(true);
        let handle = logger.clone();
        logger.log_line("eth_chainId");
        logger.log_line("eth_sendTransaction");
        logger.replace_last_line("eth_sendTransaction (queued)");

        assert_eq!(handle.lines(), vec!["eth_chainId", "eth_sendTransaction (queued)"]);
        handle.clear();
        assert!(logger.lines().is_empty());
    }

    #[test]
    fn test_disabled_logger_records_nothing() {
        let logger = ProviderLogger::new(false);
        logger.log_line("eth_chainId");
        logger.replace_last_line("evm_mine");
        assert!(logger.lines().is_empty());
    }
}
