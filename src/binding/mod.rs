//! # Framework Binding
//!
//! Observable state for UI layers. [`FheProvider`] owns the shared session
//! and its initialization status; [`EncryptOperation`] and
//! [`DecryptOperation`] wrap session calls and publish pending/result/error
//! through `tokio::sync::watch` receivers instead of returning errors.

mod operation;
mod provider;

pub use operation::{DecryptOperation, EncryptOperation, OperationState, OperationTracker};
pub use provider::{FheProvider, ProviderStatus};
