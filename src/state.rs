// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::providers::moonpay::RequestSigner;

/// Shared handler state. Both members are immutable after startup, so
/// clones are cheap and need no locking.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<TokenVerifier>,
    pub signer: Arc<RequestSigner>,
}

impl AppState {
    pub fn new(verifier: TokenVerifier, signer: RequestSigner) -> Self {
        Self {
            verifier: Arc::new(verifier),
            signer: Arc::new(signer),
        }
    }
}
