use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::session::FheSession;
use crate::types::{
    Address, DecryptionRequest, DecryptionResult, EncryptedValue, FheType, SdkError, SdkResult,
};
use crate::validation::RawValue;

/// Observable state of one async operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationState<T> {
    pub pending: bool,
    pub result: Option<T>,
    pub error: Option<SdkError>,
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self {
            pending: false,
            result: None,
            error: None,
        }
    }
}

/// Runs session calls and turns their outcome into [`OperationState`].
///
/// Errors never escape `run`; they land in `error`.
#[derive(Debug)]
pub struct OperationTracker<T> {
    state: watch::Sender<OperationState<T>>,
}

impl<T: Clone> Default for OperationTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> OperationTracker<T> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(OperationState::default());
        Self { state }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> OperationState<T> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.state.subscribe()
    }

    /// Clears result and error; `pending` is left as is
    pub fn reset(&self) {
        self.state.send_modify(|s| {
            s.result = None;
            s.error = None;
        });
    }

    pub async fn run<F, Fut>(&self, session: &FheSession, op: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SdkResult<T>>,
    {
        if !session.is_ready() {
            self.state.send_modify(|s| {
                s.result = None;
                s.error = Some(SdkError::not_ready());
            });
            return None;
        }

        self.state.send_modify(|s| {
            s.pending = true;
            s.error = None;
        });

        match op().await {
            Ok(value) => {
                self.state.send_modify(|s| {
                    s.pending = false;
                    s.result = Some(value.clone());
                });
                Some(value)
            }
            Err(e) => {
                debug!("Tracked operation failed: {}", e);
                self.state.send_modify(|s| {
                    s.pending = false;
                    s.result = None;
                    s.error = Some(e);
                });
                None
            }
        }
    }
}

/// Encryption with observable state
#[derive(Debug)]
pub struct EncryptOperation {
    session: Arc<FheSession>,
    tracker: OperationTracker<EncryptedValue>,
}

impl EncryptOperation {
    pub fn new(session: Arc<FheSession>) -> Self {
        Self {
            session,
            tracker: OperationTracker::new(),
        }
    }

    pub fn state(&self) -> OperationState<EncryptedValue> {
        self.tracker.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState<EncryptedValue>> {
        self.tracker.subscribe()
    }

    pub fn reset(&self) {
        self.tracker.reset()
    }

    pub async fn encrypt(&self, ty: FheType, value: impl Into<RawValue>) -> Option<EncryptedValue> {
        let value = value.into();
        let session = &self.session;
        self.tracker
            .run(session, || async move { session.encrypt(ty, value) })
            .await
    }

    pub async fn encrypt_bool(&self, value: bool) -> Option<EncryptedValue> {
        self.encrypt(FheType::Bool, value).await
    }

    pub async fn encrypt_uint8(&self, value: impl Into<RawValue>) -> Option<EncryptedValue> {
        self.encrypt(FheType::Uint8, value).await
    }

    pub async fn encrypt_uint16(&self, value: impl Into<RawValue>) -> Option<EncryptedValue> {
        self.encrypt(FheType::Uint16, value).await
    }

    pub async fn encrypt_uint32(&self, value: impl Into<RawValue>) -> Option<EncryptedValue> {
        self.encrypt(FheType::Uint32, value).await
    }

    pub async fn encrypt_uint64(&self, value: impl Into<RawValue>) -> Option<EncryptedValue> {
        self.encrypt(FheType::Uint64, value).await
    }

    pub async fn encrypt_address(&self, value: &str) -> Option<EncryptedValue> {
        self.encrypt(FheType::Address, value).await
    }
}

/// User and public decryption with observable state
#[derive(Debug)]
pub struct DecryptOperation {
    session: Arc<FheSession>,
    tracker: OperationTracker<DecryptionResult>,
}

impl DecryptOperation {
    pub fn new(session: Arc<FheSession>) -> Self {
        Self {
            session,
            tracker: OperationTracker::new(),
        }
    }

    pub fn state(&self) -> OperationState<DecryptionResult> {
        self.tracker.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationState<DecryptionResult>> {
        self.tracker.subscribe()
    }

    pub fn reset(&self) {
        self.tracker.reset()
    }

    pub async fn user_decrypt(&self, request: DecryptionRequest) -> Option<DecryptionResult> {
        let session = &self.session;
        self.tracker
            .run(session, || session.user_decrypt(request))
            .await
    }

    pub async fn public_decrypt(
        &self,
        contract_address: Address,
        ciphertext: &[u8],
    ) -> Option<DecryptionResult> {
        let session = &self.session;
        self.tracker
            .run(session, || session.public_decrypt(contract_address, ciphertext))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockChain;
    use crate::config::SessionConfig;
    use crate::fhe::MockFheLibrary;
    use crate::gateway::{
        DecryptionGateway, GatewayRequest, GatewayResponse, MockGateway, PublicDecryptRequest,
    };
    use crate::types::DecryptedValue;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    /// Holds public decryption until the test releases the gate
    struct GatedGateway {
        inner: MockGateway,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl DecryptionGateway for GatedGateway {
        async fn user_decrypt(&self, request: GatewayRequest) -> anyhow::Result<GatewayResponse> {
            self.inner.user_decrypt(request).await
        }

        async fn public_decrypt(&self, request: PublicDecryptRequest) -> anyhow::Result<GatewayResponse> {
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.inner.public_decrypt(request).await
        }
    }

    fn session(library: &MockFheLibrary, chain: Arc<MockChain>) -> Arc<FheSession> {
        Arc::new(
            FheSession::new(
                SessionConfig::new(chain.clone(), Address::from_bytes([0x33; 20])),
                Arc::new(library.clone()),
            )
            .unwrap()
            .with_signer(chain)
            .with_gateway(Arc::new(MockGateway::new())),
        )
    }

    #[tokio::test]
    async fn test_not_ready_never_enters_pending() {
        let library = MockFheLibrary::new();
        let op = EncryptOperation::new(session(&library, Arc::new(MockChain::new(1))));
        let mut rx = op.subscribe();

        assert_eq!(op.encrypt_uint8(1).await, None);
        let state = op.state();
        assert!(!state.pending);
        assert!(state.result.is_none());
        assert!(matches!(state.error, Some(SdkError::Precondition(_))));

        // exactly one change: the error
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().pending);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(library.state().encrypt_calls(), 0);
    }

    #[tokio::test]
    async fn test_success_then_failure_clears_result() {
        let library = MockFheLibrary::new();
        let session = session(&library, Arc::new(MockChain::new(1)));
        session.initialize().await.unwrap();
        let op = EncryptOperation::new(session);

        let ct = op.encrypt_uint32(42).await.unwrap();
        let state = op.state();
        assert!(!state.pending);
        assert_eq!(state.result, Some(ct));
        assert!(state.error.is_none());

        assert_eq!(op.encrypt_uint8(300).await, None);
        let state = op.state();
        assert!(!state.pending);
        assert!(state.result.is_none());
        assert!(matches!(state.error, Some(SdkError::Validation(_))));

        op.reset();
        assert_eq!(op.state(), OperationState::default());
    }

    #[tokio::test]
    async fn test_decrypt_operation_surfaces_rejection() {
        let library = MockFheLibrary::new();
        let chain = Arc::new(MockChain::new(1));
        let session = session(&library, chain.clone());
        session.initialize().await.unwrap();

        let ct = session.encrypt_bool(true).unwrap();
        let op = DecryptOperation::new(session);
        let request = DecryptionRequest {
            ciphertext: ct.as_bytes().to_vec(),
            contract_address: Address::from_bytes([0x33; 20]),
            user_address: chain.signer_address(),
        };

        let result = op.user_decrypt(request.clone()).await.unwrap();
        assert_eq!(result.value, DecryptedValue::Bool(true));

        chain.reject_signatures(true);
        assert!(op.user_decrypt(request).await.is_none());
        assert!(matches!(op.state().error, Some(SdkError::SignatureRejected(_))));

        let public = op
            .public_decrypt(Address::from_bytes([0x33; 20]), ct.as_bytes())
            .await;
        assert!(public.is_some());
        assert!(op.state().error.is_none());
    }

    #[tokio::test]
    async fn test_reset_leaves_pending_untouched() {
        let tracker: OperationTracker<u32> = OperationTracker::new();
        tracker.state.send_modify(|s| {
            s.pending = true;
            s.result = Some(1);
            s.error = Some(SdkError::BatchFinalized);
        });
        tracker.reset();
        let state = tracker.state();
        assert!(state.pending);
        assert!(state.result.is_none());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_precondition_after_failed_reinit_clears_result() {
        let library = MockFheLibrary::new();
        let session = session(&library, Arc::new(MockChain::new(1)));
        session.initialize().await.unwrap();
        let op = EncryptOperation::new(session.clone());

        assert!(op.encrypt_uint8(1).await.is_some());
        assert!(op.state().result.is_some());

        library.fail_create(Some("node restarted"));
        assert!(session.initialize().await.is_err());

        assert!(op.encrypt_uint8(2).await.is_none());
        let state = op.state();
        assert!(!state.pending);
        assert!(state.result.is_none());
        assert!(matches!(state.error, Some(SdkError::Precondition(_))));
    }

    #[tokio::test]
    async fn test_pending_while_gateway_is_suspended() {
        let (release, gate) = oneshot::channel();
        let library = MockFheLibrary::new();
        let chain = Arc::new(MockChain::new(1));
        let gateway = Arc::new(GatedGateway {
            inner: MockGateway::new(),
            gate: Mutex::new(Some(gate)),
        });
        let session = Arc::new(
            FheSession::new(
                SessionConfig::new(chain.clone(), Address::from_bytes([0x33; 20])),
                Arc::new(library.clone()),
            )
            .unwrap()
            .with_signer(chain)
            .with_gateway(gateway),
        );
        session.initialize().await.unwrap();
        let ct = session.encrypt_uint8(9).unwrap();

        let op = Arc::new(DecryptOperation::new(session));
        let mut rx = op.subscribe();
        let task = {
            let op = op.clone();
            tokio::spawn(async move {
                op.public_decrypt(Address::from_bytes([0x33; 20]), ct.as_bytes())
                    .await
            })
        };

        rx.wait_for(|s| s.pending).await.unwrap();
        let state = op.state();
        assert!(state.pending);
        assert!(state.result.is_none());
        assert!(state.error.is_none());

        release.send(()).unwrap();
        let result = task.await.unwrap().unwrap();
        assert_eq!(result.value, DecryptedValue::Number(9));

        let state = op.state();
        assert!(!state.pending);
        assert_eq!(state.result, Some(result));
    }
}
