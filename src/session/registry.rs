use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::info;

use super::FheSession;
use crate::types::SdkResult;

// Process-wide registry for callers that cannot thread a session through
lazy_static::lazy_static! {
    static ref GLOBAL_REGISTRY: SessionRegistry = SessionRegistry::new();
}

/// Process-wide session registry
pub fn global_registry() -> &'static SessionRegistry {
    &GLOBAL_REGISTRY
}

/// Holds at most one initialized session.
///
/// Concurrent `get_or_init` calls share a single initialization. A failed
/// initialization leaves the registry empty so the next call retries.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    cell: Mutex<Arc<OnceCell<Arc<FheSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the registered session, building and initializing one with
    /// `make` if there is none yet
    pub async fn get_or_init<F>(&self, make: F) -> SdkResult<Arc<FheSession>>
    where
        F: FnOnce() -> SdkResult<FheSession>,
    {
        self.get_or_init_with(|| async move {
            let session = make()?;
            session.initialize().await?;
            Ok(Arc::new(session))
        })
        .await
    }

    /// Like `get_or_init`, for callers that build the session asynchronously
    pub async fn get_or_init_with<F, Fut>(&self, init: F) -> SdkResult<Arc<FheSession>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SdkResult<Arc<FheSession>>>,
    {
        // Clone the cell out so the lock is not held across the await
        let cell = self.cell.lock().clone();
        let session = cell.get_or_try_init(init).await?;
        Ok(session.clone())
    }

    pub fn get(&self) -> Option<Arc<FheSession>> {
        self.cell.lock().get().cloned()
    }

    /// Drop the registered session; initializations already in flight
    /// complete against the old cell
    pub fn reset(&self) {
        *self.cell.lock() = Arc::new(OnceCell::new());
        info!("FHE session registry reset");
    }
}
