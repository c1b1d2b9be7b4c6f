use super::{BatchState, InstrumentedConnection, InstrumentedResultSet, Instrumentation};
use crate::error::TapResult;
use crate::record::{QueryRecord, ResourceKind};
use crate::resource::Statement;
use crate::value::ParamValue;
use std::sync::Arc;

/// An instrumented statement wrapping a real statement-like resource.
///
/// Owns the batch accumulator for this statement: queries added with
/// [`Statement::add_batch`] are tracked here and reported as the
/// `execute_batch` record's query list.
pub struct InstrumentedStatement<S: Statement> {
    inner: S,
    core: Arc<Instrumentation>,
    batch: BatchState,
}

impl<S: Statement> InstrumentedStatement<S> {
    pub(crate) fn from_parts(inner: S, core: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            core,
            batch: BatchState::new(),
        }
    }

    /// The logical data-source name assigned to this wrapper chain.
    pub fn data_source(&self) -> &str {
        self.core.data_source()
    }

    /// Queries accumulated for the next `execute_batch`, in insertion order.
    pub fn pending_batch(&self) -> Vec<QueryRecord> {
        self.batch.snapshot()
    }

    /// The wrapped statement. Bypasses recording.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwrap to the real statement, consuming the wrapper.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Statement> Statement for InstrumentedStatement<S> {
    type Rows = InstrumentedResultSet<S::Rows>;
    type Conn = InstrumentedConnection<S::Conn>;

    async fn execute_query(&self, sql: &str) -> TapResult<Self::Rows> {
        let rows = self
            .core
            .dispatch(
                ResourceKind::Statement,
                "execute_query",
                vec![ParamValue::from(sql)],
                vec![QueryRecord::new(sql)],
                self.inner.execute_query(sql),
            )
            .await?;
        Ok(InstrumentedResultSet::from_parts(rows, self.core.clone()))
    }

    async fn execute_update(&self, sql: &str) -> TapResult<u64> {
        self.core
            .dispatch(
                ResourceKind::Statement,
                "execute_update",
                vec![ParamValue::from(sql)],
                vec![QueryRecord::new(sql)],
                self.inner.execute_update(sql),
            )
            .await
    }

    async fn execute(&self, sql: &str) -> TapResult<bool> {
        self.core
            .dispatch(
                ResourceKind::Statement,
                "execute",
                vec![ParamValue::from(sql)],
                vec![QueryRecord::new(sql)],
                self.inner.execute(sql),
            )
            .await
    }

    async fn add_batch(&self, sql: &str) -> TapResult<()> {
        let result = self
            .core
            .dispatch(
                ResourceKind::Statement,
                "add_batch",
                vec![ParamValue::from(sql)],
                Vec::new(),
                self.inner.add_batch(sql),
            )
            .await;
        // A failed add must not record a phantom query.
        if result.is_ok() {
            self.batch.append(QueryRecord::new(sql));
        }
        result
    }

    async fn clear_batch(&self) -> TapResult<()> {
        let result = self
            .core
            .dispatch(
                ResourceKind::Statement,
                "clear_batch",
                Vec::new(),
                Vec::new(),
                self.inner.clear_batch(),
            )
            .await;
        // Clearing is unconditional and idempotent.
        self.batch.clear();
        result
    }

    async fn execute_batch(&self) -> TapResult<Vec<u64>> {
        // Snapshot-and-empty before the call: the record reflects exactly
        // what was submitted, and the next accumulation starts clean whether
        // the call succeeds or fails.
        let queries = self.batch.take();
        self.core
            .dispatch(
                ResourceKind::Statement,
                "execute_batch",
                Vec::new(),
                queries,
                self.inner.execute_batch(),
            )
            .await
    }

    fn connection(&self) -> TapResult<Self::Conn> {
        let conn = self.core.dispatch_sync(
            ResourceKind::Statement,
            "connection",
            Vec::new(),
            Vec::new(),
            || self.inner.connection(),
        )?;
        Ok(InstrumentedConnection::from_parts(conn, self.core.clone()))
    }

    async fn close(&self) -> TapResult<()> {
        self.core
            .dispatch(
                ResourceKind::Statement,
                "close",
                Vec::new(),
                Vec::new(),
                self.inner.close(),
            )
            .await
    }
}
