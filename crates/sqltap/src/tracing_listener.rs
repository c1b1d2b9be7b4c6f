use crate::error::TapResult;
use crate::listener::{CallListener, truncate_sql_bytes};
use crate::record::CallRecord;
use tracing::Level;

/// A `tracing`-based listener that emits one structured event per
/// intercepted call.
///
/// Enable via the crate feature: `sqltap = { features = ["tracing"] }`.
#[derive(Debug, Clone)]
pub struct TracingListener {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    /// Whether to emit events for calls that executed no queries.
    pub log_lifecycle: bool,
}

impl Default for TracingListener {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
            log_lifecycle: false,
        }
    }
}

impl TracingListener {
    /// Create a new listener with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    /// Also emit events for calls that executed no queries.
    pub fn log_lifecycle(mut self) -> Self {
        self.log_lifecycle = true;
        self
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl CallListener for TracingListener {
    fn after_call(&self, record: &CallRecord<'_>) -> TapResult<()> {
        if record.queries.is_empty() && !self.log_lifecycle {
            return Ok(());
        }

        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = record
            .queries
            .iter()
            .map(|q| self.truncate_sql(&q.query))
            .collect::<Vec<_>>()
            .join("; ");
        let param_count: usize = record.queries.iter().map(|q| q.params.len()).sum();

        emit_at_level!(
            self.level,
            target: "sqltap",
            data_source = record.data_source,
            kind = record.kind.as_str(),
            method = record.method,
            success = record.is_success(),
            elapsed_us = record.elapsed.as_micros() as u64,
            param_count,
            sql = %sql,
        );
        Ok(())
    }
}
