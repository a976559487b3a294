//! Per-run state shared by every seed unit.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{error, info};

use crate::error::SeedError;
use crate::log::{LogSink, TracingSink};
use crate::registry::Registry;
use crate::store::{Entity, Store, Table};

/// Name of the handle passed to [`SeedContext::new`].
pub const PRIMARY_HANDLE: &str = "primary";

/// Boxed future borrowing the context, as returned by [`SeedContext::scoped`] bodies.
pub type ScopedFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, SeedError>> + Send + 'c>>;

/// Data handles, run scope, reference registry and log sink for one run.
///
/// Create one per process invocation and release it with [`SeedContext::destroy`],
/// or run the whole body through [`SeedContext::scoped`] so the handles are closed
/// on every exit path.
pub struct SeedContext {
    scope: String,
    handles: Vec<(String, Arc<dyn Store>)>,
    registry: Registry,
    sink: Arc<dyn LogSink>,
}

impl SeedContext {
    /// Creates a context whose primary handle is `store`.
    pub fn new(scope: impl Into<String>, store: Arc<dyn Store>) -> Self {
        Self {
            scope: scope.into(),
            handles: vec![(PRIMARY_HANDLE.to_string(), store)],
            registry: Registry::new(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Adds a handle for a logically separate database.
    pub fn with_handle(mut self, name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        self.handles.push((name.into(), store));
        self
    }

    /// Replaces the default tracing sink.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run label used to namespace natural keys.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The primary data handle.
    pub fn store(&self) -> &dyn Store {
        self.handles[0].1.as_ref()
    }

    /// Looks up a data handle by name.
    pub fn handle(&self, name: &str) -> Result<&dyn Store, SeedError> {
        self.handles
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, store)| store.as_ref())
            .ok_or_else(|| SeedError::MissingHandle(name.to_string()))
    }

    pub fn handle_names(&self) -> Vec<&str> {
        self.handles.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Typed access to an entity's table on the primary handle.
    pub fn table<E: Entity>(&self) -> Table<'_, E> {
        Table::new(self.store())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn log(&self, message: impl AsRef<str>) {
        self.sink.log(&self.scope, message.as_ref());
    }

    /// Closes every data handle.
    pub async fn destroy(self) {
        for (name, store) in &self.handles {
            store.close().await;
            info!("Closed data handle {name}");
        }
    }

    /// Runs `body` with this context, then destroys it whether `body` succeeded or not.
    ///
    /// ```rust,ignore
    /// let snapshot = ctx
    ///     .scoped(|ctx| Box::pin(async move {
    ///         orchestrator.run(ctx, false).await?;
    ///         Ok(ctx.registry().snapshot())
    ///     }))
    ///     .await?;
    /// ```
    pub async fn scoped<T, F>(self, body: F) -> Result<T, SeedError>
    where
        F: for<'c> FnOnce(&'c SeedContext) -> ScopedFuture<'c, T>,
    {
        let outcome = body(&self).await;
        if let Err(e) = &outcome {
            error!("Seed run failed: {e}");
        }
        self.destroy().await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemorySink;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_named_handles() {
        let primary = Arc::new(MemoryStore::new());
        let dashboard = Arc::new(MemoryStore::new());
        let ctx = SeedContext::new("ci", primary).with_handle("dashboard", dashboard);

        assert_eq!(ctx.scope(), "ci");
        assert_eq!(ctx.handle_names(), vec![PRIMARY_HANDLE, "dashboard"]);
        assert!(ctx.handle("dashboard").is_ok());
        assert!(matches!(
            ctx.handle("reports"),
            Err(SeedError::MissingHandle(name)) if name == "reports"
        ));
    }

    #[tokio::test]
    async fn test_destroy_closes_all_handles() {
        let primary = Arc::new(MemoryStore::new());
        let dashboard = Arc::new(MemoryStore::new());
        let ctx = SeedContext::new("", primary.clone()).with_handle("dashboard", dashboard.clone());

        ctx.destroy().await;

        assert!(primary.is_closed());
        assert!(dashboard.is_closed());
    }

    #[tokio::test]
    async fn test_scoped_closes_after_failure() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::new());
        let ctx = SeedContext::new("", store.clone()).with_sink(sink.clone());

        let result: Result<(), SeedError> = ctx
            .scoped(|ctx| {
                Box::pin(async move {
                    ctx.log("starting");
                    Err(SeedError::Precondition("no step_type rows".to_string()))
                })
            })
            .await;

        assert!(matches!(result, Err(SeedError::Precondition(_))));
        assert!(store.is_closed());
        assert_eq!(sink.lines(), vec!["starting"]);
    }

    #[tokio::test]
    async fn test_scoped_returns_body_value() {
        let store = Arc::new(MemoryStore::new());
        let ctx = SeedContext::new("", store.clone());

        let scope = ctx
            .scoped(|ctx| Box::pin(async move { Ok(ctx.scope().len()) }))
            .await
            .unwrap();

        assert_eq!(scope, 0);
        assert!(store.is_closed());
    }
}
