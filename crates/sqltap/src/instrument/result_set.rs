use super::Instrumentation;
use crate::error::TapResult;
use crate::record::ResourceKind;
use crate::resource::ResultSet;
use crate::value::ParamValue;
use std::sync::Arc;

/// An instrumented result set wrapping a real forward-only cursor.
///
/// Cursor calls execute no queries, so their records carry an empty query
/// list; listeners interested only in SQL can skip them.
pub struct InstrumentedResultSet<R: ResultSet> {
    inner: R,
    core: Arc<Instrumentation>,
}

impl<R: ResultSet> InstrumentedResultSet<R> {
    pub(crate) fn from_parts(inner: R, core: Arc<Instrumentation>) -> Self {
        Self { inner, core }
    }

    /// The logical data-source name assigned to this wrapper chain.
    pub fn data_source(&self) -> &str {
        self.core.data_source()
    }

    /// The wrapped result set. Bypasses recording.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Unwrap to the real result set, consuming the wrapper.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: ResultSet> ResultSet for InstrumentedResultSet<R> {
    async fn advance(&mut self) -> TapResult<bool> {
        let core = self.core.clone();
        core.dispatch(
            ResourceKind::ResultSet,
            "advance",
            Vec::new(),
            Vec::new(),
            self.inner.advance(),
        )
        .await
    }

    fn column(&self, index: usize) -> TapResult<ParamValue> {
        self.core.dispatch_sync(
            ResourceKind::ResultSet,
            "column",
            vec![ParamValue::from(index)],
            Vec::new(),
            || self.inner.column(index),
        )
    }

    async fn close(&mut self) -> TapResult<()> {
        let core = self.core.clone();
        core.dispatch(
            ResourceKind::ResultSet,
            "close",
            Vec::new(),
            Vec::new(),
            self.inner.close(),
        )
        .await
    }
}
