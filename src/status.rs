//! Status reporting for pipeline progress, warnings and errors

use std::sync::Mutex;
use tracing::{error, info, warn};

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Receives progress and diagnostics from the pipeline.
///
/// Implementations must not block and must not fail; the pipeline never
/// inspects the outcome of a report.
pub trait StatusReporter: Send + Sync {
    fn report(&self, message: &str, severity: Severity);

    fn info(&self, message: &str) {
        self.report(message, Severity::Info);
    }

    fn success(&self, message: &str) {
        self.report(message, Severity::Success);
    }

    fn warning(&self, message: &str) {
        self.report(message, Severity::Warning);
    }

    fn error(&self, message: &str) {
        self.report(message, Severity::Error);
    }
}

fn emit(message: &str, severity: Severity) {
    match severity {
        Severity::Info => info!("{}", message),
        Severity::Success => info!("✓ {}", message),
        Severity::Warning => warn!("{}", message),
        Severity::Error => error!("{}", message),
    }
}

/// Forwards every report to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn report(&self, message: &str, severity: Severity) {
        emit(message, severity);
    }
}

/// Status message with its severity
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: Severity,
}

/// Records every report in order and forwards it to `tracing`
#[derive(Debug, Default)]
pub struct StatusLog {
    messages: Mutex<Vec<StatusMessage>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<StatusMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|m| m.severity == severity)
            .count()
    }

    /// True if a message of the given severity contains `needle`
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|m| m.severity == severity && m.message.contains(needle))
    }
}

impl StatusReporter for StatusLog {
    fn report(&self, message: &str, severity: Severity) {
        emit(message, severity);
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(StatusMessage {
                message: message.to_string(),
                severity,
            });
    }
}
