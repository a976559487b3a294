//! Log sinks for seed runs.
//!
//! Every line a unit or the orchestrator emits goes through [`SeedContext::log`],
//! which forwards it to the context's [`LogSink`].
//!
//! [`SeedContext::log`]: crate::context::SeedContext::log

use std::sync::{Mutex, PoisonError};

use tracing::info;

/// Append-only destination for run messages.
pub trait LogSink: Send + Sync {
    fn log(&self, scope: &str, message: &str);
}

/// Forwards messages to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, scope: &str, message: &str) {
        info!(scope, "{message}");
    }
}

/// Keeps every message in order; also forwards to `tracing`.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all messages logged so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if any logged message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|line| line.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, scope: &str, message: &str) {
        TracingSink.log(scope, message);
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
