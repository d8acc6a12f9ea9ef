use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::operation::{DecryptOperation, EncryptOperation};
use crate::session::FheSession;
use crate::types::{KeyMaterial, SdkError, SdkResult};

/// Session lifecycle as seen by UI code, separate from operation state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderStatus {
    pub initializing: bool,
    pub initialized: bool,
    pub error: Option<SdkError>,
}

/// Shares one session with every component below it
#[derive(Debug)]
pub struct FheProvider {
    session: Arc<FheSession>,
    auto_initialize: bool,
    mounted: AtomicBool,
    status: watch::Sender<ProviderStatus>,
}

impl FheProvider {
    pub fn new(session: Arc<FheSession>, auto_initialize: bool) -> Self {
        let (status, _) = watch::channel(ProviderStatus {
            initialized: session.is_ready(),
            ..Default::default()
        });
        Self {
            session,
            auto_initialize,
            mounted: AtomicBool::new(false),
            status,
        }
    }

    pub fn session(&self) -> Arc<FheSession> {
        self.session.clone()
    }

    pub fn status(&self) -> ProviderStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProviderStatus> {
        self.status.subscribe()
    }

    /// Auto-initialize on first mount.
    ///
    /// Returns true if this call started an initialization. Later mounts,
    /// or a session that is already ready or initializing, start nothing.
    pub async fn mount(&self) -> bool {
        if !self.auto_initialize || self.mounted.swap(true, Ordering::SeqCst) {
            return false;
        }
        if self.session.is_ready() || self.status.borrow().initializing {
            return false;
        }
        // Failure is recorded in the status
        let _ = self.initialize().await;
        true
    }

    /// Initialize the session and track the outcome
    pub async fn initialize(&self) -> SdkResult<KeyMaterial> {
        self.status.send_modify(|s| {
            s.initializing = true;
            s.error = None;
        });

        let result = self.session.initialize().await;
        match &result {
            Ok(_) => {
                info!("FHE provider initialized");
                self.status.send_modify(|s| {
                    s.initializing = false;
                    s.initialized = true;
                });
            }
            Err(e) => {
                warn!("FHE provider initialization failed: {}", e);
                let e = e.clone();
                self.status.send_modify(|s| {
                    s.initializing = false;
                    s.initialized = false;
                    s.error = Some(e);
                });
            }
        }
        result
    }

    pub fn encrypt_operation(&self) -> EncryptOperation {
        EncryptOperation::new(self.session.clone())
    }

    pub fn decrypt_operation(&self) -> DecryptOperation {
        DecryptOperation::new(self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockChain;
    use crate::config::SessionConfig;
    use crate::fhe::{FheInstance, FheLibrary, InstanceParams, MockFheLibrary};
    use crate::types::Address;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    /// Holds instance creation until the test releases the gate
    struct GatedLibrary {
        inner: MockFheLibrary,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl FheLibrary for GatedLibrary {
        fn name(&self) -> &str {
            "gated"
        }

        async fn create_instance(&self, params: InstanceParams) -> anyhow::Result<Box<dyn FheInstance>> {
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.inner.create_instance(params).await
        }
    }

    fn provider(library: &MockFheLibrary, auto_initialize: bool) -> FheProvider {
        let session = FheSession::new(
            SessionConfig::new(Arc::new(MockChain::new(1)), Address::from_bytes([0x44; 20])),
            Arc::new(library.clone()),
        )
        .unwrap();
        FheProvider::new(Arc::new(session), auto_initialize)
    }

    #[tokio::test]
    async fn test_mount_initializes_once() {
        let library = MockFheLibrary::new();
        let provider = provider(&library, true);

        assert!(provider.mount().await);
        assert!(!provider.mount().await);
        assert_eq!(library.state().create_calls(), 1);

        let status = provider.status();
        assert!(status.initialized);
        assert!(!status.initializing);
        assert!(status.error.is_none());
        assert!(provider.session().is_ready());
    }

    #[tokio::test]
    async fn test_mount_without_auto_initialize() {
        let library = MockFheLibrary::new();
        let provider = provider(&library, false);

        assert!(!provider.mount().await);
        assert_eq!(library.state().create_calls(), 0);
        assert_eq!(provider.status(), ProviderStatus::default());
    }

    #[tokio::test]
    async fn test_initialization_error_in_status() {
        let library = MockFheLibrary::new();
        library.fail_create(Some("bad network"));
        let provider = provider(&library, true);

        assert!(provider.mount().await);
        let status = provider.status();
        assert!(!status.initialized);
        assert!(!status.initializing);
        assert!(matches!(status.error, Some(SdkError::Initialization(_))));

        // manual retry clears the error
        library.fail_create(None);
        provider.initialize().await.unwrap();
        assert!(provider.status().initialized);
        assert!(provider.status().error.is_none());
    }

    #[tokio::test]
    async fn test_operations_share_the_session() {
        let library = MockFheLibrary::new();
        let provider = provider(&library, true);
        let encrypt = provider.encrypt_operation();

        assert!(encrypt.encrypt_bool(true).await.is_none());
        provider.mount().await;
        assert!(encrypt.encrypt_bool(true).await.is_some());
    }

    #[tokio::test]
    async fn test_initializing_visible_and_mount_skips() {
        let (release, gate) = oneshot::channel();
        let library = MockFheLibrary::new();
        let gated = GatedLibrary {
            inner: library.clone(),
            gate: Mutex::new(Some(gate)),
        };
        let session = FheSession::new(
            SessionConfig::new(Arc::new(MockChain::new(1)), Address::from_bytes([0x44; 20])),
            Arc::new(gated),
        )
        .unwrap();
        let provider = Arc::new(FheProvider::new(Arc::new(session), true));
        let mut rx = provider.subscribe();

        let task = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.initialize().await })
        };

        rx.wait_for(|s| s.initializing).await.unwrap();
        assert!(!provider.status().initialized);

        // first mount while an initialization is in flight starts nothing
        assert!(!provider.mount().await);

        release.send(()).unwrap();
        task.await.unwrap().unwrap();

        let status = provider.status();
        assert!(!status.initializing);
        assert!(status.initialized);
        assert_eq!(library.state().create_calls(), 1);
    }
}
