use super::{BatchState, InstrumentedResultSet, Instrumentation};
use crate::error::TapResult;
use crate::record::{QueryRecord, ResourceKind};
use crate::resource::PreparedStatement;
use crate::value::ParamValue;
use std::sync::{Arc, Mutex};

/// An instrumented prepared statement wrapping a real
/// prepared-statement-like resource.
///
/// Tracks the currently bound parameter set so execution records carry the
/// values that were actually submitted. Bindings survive `add_batch` (the
/// batch snapshots them) and are dropped by `clear_bindings`, mirroring the
/// wrapped resource's own state.
pub struct InstrumentedPrepared<P: PreparedStatement> {
    inner: P,
    core: Arc<Instrumentation>,
    bindings: Mutex<Vec<ParamValue>>,
    batch: BatchState,
}

impl<P: PreparedStatement> InstrumentedPrepared<P> {
    pub(crate) fn from_parts(inner: P, core: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            core,
            bindings: Mutex::new(Vec::new()),
            batch: BatchState::new(),
        }
    }

    /// The logical data-source name assigned to this wrapper chain.
    pub fn data_source(&self) -> &str {
        self.core.data_source()
    }

    /// Copy of the currently bound parameter values, in placeholder order.
    pub fn current_bindings(&self) -> Vec<ParamValue> {
        self.bindings.lock().unwrap().clone()
    }

    /// Parameter sets accumulated for the next `execute_batch`.
    pub fn pending_batch(&self) -> Vec<QueryRecord> {
        self.batch.snapshot()
    }

    /// The wrapped prepared statement. Bypasses recording.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Unwrap to the real prepared statement, consuming the wrapper.
    pub fn into_inner(self) -> P {
        self.inner
    }

    fn current_query(&self) -> QueryRecord {
        QueryRecord::with_params(self.inner.sql().to_string(), self.current_bindings())
    }
}

impl<P: PreparedStatement> PreparedStatement for InstrumentedPrepared<P> {
    type Rows = InstrumentedResultSet<P::Rows>;

    fn sql(&self) -> &str {
        // Identity/delegation operation: forwarded without a record.
        self.inner.sql()
    }

    fn bind(&self, index: usize, value: ParamValue) -> TapResult<()> {
        let result = self.core.dispatch_sync(
            ResourceKind::PreparedStatement,
            "bind",
            vec![ParamValue::from(index), value.clone()],
            Vec::new(),
            || self.inner.bind(index, value.clone()),
        );
        if result.is_ok() && index >= 1 {
            let mut bindings = self.bindings.lock().unwrap();
            if bindings.len() < index {
                bindings.resize(index, ParamValue::Null);
            }
            bindings[index - 1] = value;
        }
        result
    }

    fn clear_bindings(&self) -> TapResult<()> {
        let result = self.core.dispatch_sync(
            ResourceKind::PreparedStatement,
            "clear_bindings",
            Vec::new(),
            Vec::new(),
            || self.inner.clear_bindings(),
        );
        if result.is_ok() {
            self.bindings.lock().unwrap().clear();
        }
        result
    }

    async fn execute_query(&self) -> TapResult<Self::Rows> {
        let rows = self
            .core
            .dispatch(
                ResourceKind::PreparedStatement,
                "execute_query",
                Vec::new(),
                vec![self.current_query()],
                self.inner.execute_query(),
            )
            .await?;
        Ok(InstrumentedResultSet::from_parts(rows, self.core.clone()))
    }

    async fn execute_update(&self) -> TapResult<u64> {
        self.core
            .dispatch(
                ResourceKind::PreparedStatement,
                "execute_update",
                Vec::new(),
                vec![self.current_query()],
                self.inner.execute_update(),
            )
            .await
    }

    async fn add_batch(&self) -> TapResult<()> {
        let result = self
            .core
            .dispatch(
                ResourceKind::PreparedStatement,
                "add_batch",
                Vec::new(),
                Vec::new(),
                self.inner.add_batch(),
            )
            .await;
        // A failed add must not record a phantom parameter set.
        if result.is_ok() {
            self.batch.append(self.current_query());
        }
        result
    }

    async fn clear_batch(&self) -> TapResult<()> {
        let result = self
            .core
            .dispatch(
                ResourceKind::PreparedStatement,
                "clear_batch",
                Vec::new(),
                Vec::new(),
                self.inner.clear_batch(),
            )
            .await;
        self.batch.clear();
        result
    }

    async fn execute_batch(&self) -> TapResult<Vec<u64>> {
        let queries = self.batch.take();
        self.core
            .dispatch(
                ResourceKind::PreparedStatement,
                "execute_batch",
                Vec::new(),
                queries,
                self.inner.execute_batch(),
            )
            .await
    }

    async fn close(&self) -> TapResult<()> {
        self.core
            .dispatch(
                ResourceKind::PreparedStatement,
                "close",
                Vec::new(),
                Vec::new(),
                self.inner.close(),
            )
            .await
    }
}
