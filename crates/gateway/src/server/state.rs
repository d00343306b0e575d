//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use common::ServiceError;

use crate::auth::FirebaseVerifier;
use crate::crypto::EnvelopeCodec;
use crate::signing::SigningService;

/// Application state shared across all request handlers.
///
/// Every capability is optional: a route whose backing component is not
/// configured answers 500 `not_configured` instead of failing startup.
#[derive(Clone, Default)]
pub struct AppState {
    codec: Option<Arc<EnvelopeCodec>>,
    signing: Option<SigningService>,
    verifier: Option<FirebaseVerifier>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codec(mut self, codec: EnvelopeCodec) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    pub fn with_signing(mut self, signing: SigningService) -> Self {
        self.signing = Some(signing);
        self
    }

    pub fn with_verifier(mut self, verifier: FirebaseVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn codec(&self) -> Result<&EnvelopeCodec, ServiceError> {
        self.codec
            .as_deref()
            .ok_or(ServiceError::ConfigurationMissing("Encryption secret"))
    }

    pub fn signing(&self) -> Result<&SigningService, ServiceError> {
        self.signing
            .as_ref()
            .ok_or(ServiceError::ConfigurationMissing("Starknet RPC"))
    }

    pub fn verifier(&self) -> Result<&FirebaseVerifier, ServiceError> {
        self.verifier
            .as_ref()
            .ok_or(ServiceError::ConfigurationMissing("Firebase project"))
    }
}
