//! Shared types for the HTTP API layer.

use std::sync::Arc;

use crate::core_state::{AccessSource, CoreState};
use crate::models::Account;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Authenticated account, injected into request extensions by the auth
/// middleware after the bearer token resolves.
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub account: Account,
    pub token: String,
}

impl AccountContext {
    pub fn source(&self) -> AccessSource {
        AccessSource::Account {
            account_id: self.account.id,
            username: self.account.username.clone(),
        }
    }
}
