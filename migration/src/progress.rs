//! # Progress
//!
//! Module dedicated to progress reporting. The main structure of this
//! module is [`ProgressReporter`], which turns engine milestones into
//! [`StatusEvent`]s and hands them to a caller-provided async
//! [`StatusEventHandler`].

use std::{fmt, future::Future, pin::Pin, sync::Arc};

use tracing::{debug, error, info, trace, warn};

use crate::AnyResult;

/// The severity of a status event.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The status event.
///
/// Carries the overall percentage of the run at the time of the
/// emission, a human-readable message and its severity.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct StatusEvent {
    pub percentage: u8,
    pub message: String,
    pub severity: Severity,
}

impl StatusEvent {
    pub async fn emit(&self, handler: &Option<Arc<StatusEventHandler>>) {
        match self.severity {
            Severity::Info => info!(percentage = self.percentage, "{}", self.message),
            Severity::Warning => warn!(percentage = self.percentage, "{}", self.message),
            Severity::Error => error!(percentage = self.percentage, "{}", self.message),
        }

        if let Some(handler) = handler.as_ref() {
            if let Err(err) = handler(self.clone()).await {
                debug!("error while emitting status event: {err}");
                trace!("{err:?}");
            } else {
                trace!("emitted status event {self:?}");
            }
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}%] {}: {}", self.percentage, self.severity, self.message)
    }
}

/// The status async event handler.
pub type StatusEventHandler =
    dyn Fn(StatusEvent) -> Pin<Box<dyn Future<Output = AnyResult<()>> + Send>> + Send + Sync;

/// The progress reporter.
///
/// Tracks the number of completed items against the expected total
/// and rate-limits progress emissions: a progress report is emitted
/// only when the percentage changes or when the completed count is a
/// multiple of 10. Other reports are always emitted.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    handler: Option<Arc<StatusEventHandler>>,
    completed: usize,
    total: usize,
    percentage: u8,
}

impl ProgressReporter {
    pub fn new(handler: Option<Arc<StatusEventHandler>>) -> Self {
        Self {
            handler,
            ..Default::default()
        }
    }

    /// Forget the counters, keep the handler.
    pub fn reset(&mut self) {
        self.completed = 0;
        self.total = 0;
        self.percentage = 0;
    }

    pub fn set_total(&mut self, total: usize) {
        self.total = total;
    }

    pub fn add_to_total(&mut self, count: usize) {
        self.total += count;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Increment the completed counter and return its new value.
    pub fn advance(&mut self) -> usize {
        self.completed += 1;
        self.completed
    }

    /// Return the last emitted percentage.
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    fn compute_percentage(&self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }

        let percentage = (self.completed.saturating_mul(100) / self.total).min(100);
        // never go backwards within a run
        Some((percentage as u8).max(self.percentage))
    }

    /// Report a status message.
    ///
    /// Returns `true` when an event was emitted.
    pub async fn report(
        &mut self,
        message: impl ToString,
        is_progress_update: bool,
        severity: Severity,
    ) -> bool {
        let changed = match self.compute_percentage() {
            Some(percentage) if percentage != self.percentage => {
                self.percentage = percentage;
                true
            }
            Some(_) => false,
            None => true,
        };

        let emit = !is_progress_update || changed || self.completed % 10 == 0;

        if emit {
            let event = StatusEvent {
                percentage: self.percentage,
                message: message.to_string(),
                severity,
            };
            event.emit(&self.handler).await;
        }

        emit
    }

    pub async fn info(&mut self, message: impl ToString) {
        self.report(message, false, Severity::Info).await;
    }

    pub async fn warn(&mut self, message: impl ToString) {
        self.report(message, false, Severity::Warning).await;
    }

    pub async fn error(&mut self, message: impl ToString) {
        self.report(message, false, Severity::Error).await;
    }

    /// Report a progress update, returning `true` if it was emitted.
    pub async fn progress(&mut self, message: impl ToString) -> bool {
        self.report(message, true, Severity::Info).await
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("completed", &self.completed)
            .field("total", &self.total)
            .field("percentage", &self.percentage)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{ProgressReporter, Severity, StatusEvent, StatusEventHandler};

    fn recorder() -> (Arc<Mutex<Vec<StatusEvent>>>, Arc<StatusEventHandler>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let handler: Arc<StatusEventHandler> = Arc::new(move |evt| {
            let events = events_clone.clone();
            Box::pin(async move {
                events.lock().unwrap().push(evt);
                Ok(())
            })
        });
        (events, handler)
    }

    #[test_log::test(tokio::test)]
    async fn progress_emission_policy() {
        let (events, handler) = recorder();
        let mut reporter = ProgressReporter::new(Some(handler));
        reporter.set_total(1000);

        let mut emitted = 0;
        for _ in 0..1000 {
            reporter.advance();
            if reporter.progress("migrated").await {
                emitted += 1;
            }
        }

        // one per percent plus the multiples of 10 in between
        assert_eq!(emitted, 100);
        assert_eq!(events.lock().unwrap().len(), 100);

        let events = events.lock().unwrap();
        let percentages: Vec<u8> = events.iter().map(|e| e.percentage).collect();
        assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(percentages.last(), Some(&100));
    }

    #[test_log::test(tokio::test)]
    async fn progress_with_small_total() {
        let (events, handler) = recorder();
        let mut reporter = ProgressReporter::new(Some(handler));
        reporter.set_total(3);

        reporter.advance();
        assert!(reporter.progress("1").await);
        reporter.advance();
        assert!(reporter.progress("2").await);
        reporter.advance();
        assert!(reporter.progress("3").await);

        let percentages: Vec<u8> = events.lock().unwrap().iter().map(|e| e.percentage).collect();
        assert_eq!(percentages, vec![33, 66, 100]);
    }

    #[test_log::test(tokio::test)]
    async fn progress_without_total_always_emits() {
        let (events, handler) = recorder();
        let mut reporter = ProgressReporter::new(Some(handler));

        for _ in 0..7 {
            reporter.advance();
            assert!(reporter.progress("migrated").await);
        }

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 7);
        assert!(events.iter().all(|e| e.percentage == 0));
    }

    #[test_log::test(tokio::test)]
    async fn progress_overflow_is_clamped() {
        let (events, handler) = recorder();
        let mut reporter = ProgressReporter::new(Some(handler));
        reporter.set_total(2);

        for _ in 0..4 {
            reporter.advance();
            reporter.progress("migrated").await;
        }
        reporter.report("done", false, Severity::Warning).await;

        let events = events.lock().unwrap();
        assert!(events.iter().all(|e| e.percentage <= 100));
        let last = events.last().unwrap();
        assert_eq!(last.percentage, 100);
        assert_eq!(last.severity, Severity::Warning);
    }

    #[test_log::test(tokio::test)]
    async fn handler_error_does_not_abort() {
        let handler: Arc<StatusEventHandler> = Arc::new(|_| {
            Box::pin(async { Err(crate::flag::Error::ParseFlagError("x".into()).into()) })
        });
        let mut reporter = ProgressReporter::new(Some(handler));
        assert!(reporter.report("status", false, Severity::Info).await);
    }
}
