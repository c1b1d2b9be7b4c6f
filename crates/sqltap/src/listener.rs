//! Listener contract and built-in listeners.
//!
//! A [`CallListener`] is a one-way data sink: it receives a [`CallRecord`]
//! exactly once per intercepted call, strictly after the underlying call
//! completed and strictly before the wrapper returns to its caller. By the
//! time a listener sees a record, the real work already happened.
//!
//! Listener failures never reach the original caller: the dispatcher reports
//! them on a side channel and continues with the remaining listeners.

use crate::error::TapResult;
use crate::record::CallRecord;
use std::sync::Arc;

/// Observer of intercepted calls.
///
/// Implementations must not assume success: records arrive on failure paths
/// too, with [`CallOutcome::Failure`](crate::CallOutcome::Failure) carrying
/// the delegate's error. Records for lifecycle and metadata calls have an
/// empty `queries` slice; listeners that only care about executed SQL can
/// skip those.
pub trait CallListener: Send + Sync {
    /// Called once per intercepted call, after the delegate completed.
    ///
    /// Returning an error marks this listener as failed for this record; the
    /// failure is reported and isolated, and neither other listeners nor the
    /// caller-visible outcome are affected.
    fn after_call(&self, record: &CallRecord<'_>) -> TapResult<()>;
}

/// A listener that logs calls to stderr.
#[derive(Debug, Clone)]
pub struct LoggingListener {
    /// Prefix for log lines.
    pub prefix: String,
    /// Maximum SQL length to display. `None` means no truncation.
    pub max_sql_length: Option<usize>,
    /// Whether to log calls that executed no queries (lifecycle, metadata).
    pub log_lifecycle: bool,
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self {
            prefix: "[sqltap]".to_string(),
            max_sql_length: Some(200),
            log_lifecycle: false,
        }
    }
}

impl LoggingListener {
    /// Create a new logging listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prefix for log lines.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Also log calls that executed no queries.
    pub fn log_lifecycle(mut self) -> Self {
        self.log_lifecycle = true;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl CallListener for LoggingListener {
    fn after_call(&self, record: &CallRecord<'_>) -> TapResult<()> {
        if record.queries.is_empty() && !self.log_lifecycle {
            return Ok(());
        }

        let queries = record
            .queries
            .iter()
            .map(|q| {
                if q.params.is_empty() {
                    self.truncate_sql(&q.query)
                } else {
                    let params = q
                        .params
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{} [{params}]", self.truncate_sql(&q.query))
                }
            })
            .collect::<Vec<_>>()
            .join("; ");

        eprintln!(
            "{} [{}] {}.{} {} {:?} | {}",
            self.prefix,
            record.data_source,
            record.kind.as_str(),
            record.method,
            record.outcome,
            record.elapsed,
            if queries.is_empty() { "-" } else { queries.as_str() },
        );
        Ok(())
    }
}

/// A composite listener that delegates to multiple listeners.
///
/// Each inner listener is notified in registration order; a failing inner
/// listener is reported and skipped, exactly like a failing listener
/// registered directly on a wrapper.
pub struct CompositeListener {
    listeners: Vec<Arc<dyn CallListener>>,
}

impl CompositeListener {
    /// Create an empty composite listener.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Add a listener.
    #[allow(clippy::should_implement_trait)]
    pub fn add<L: CallListener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Add an Arc-wrapped listener.
    pub fn add_arc(mut self, listener: Arc<dyn CallListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

impl Default for CompositeListener {
    fn default() -> Self {
        Self::new()
    }
}

impl CallListener for CompositeListener {
    fn after_call(&self, record: &CallRecord<'_>) -> TapResult<()> {
        for listener in &self.listeners {
            if let Err(err) = listener.after_call(record) {
                report_listener_failure(record.method, &err);
            }
        }
        Ok(())
    }
}

/// Side reporting channel for listener failures. Never re-raised to the
/// caller of the instrumented resource.
pub(crate) fn report_listener_failure(method: &str, err: &crate::error::TapError) {
    #[cfg(feature = "tracing")]
    tracing::warn!(target: "sqltap", method, error = %err, "call listener failed");
    #[cfg(not(feature = "tracing"))]
    eprintln!("[sqltap] call listener failed on {method}: {err}");
}

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
