//! Optional authentication capability hook, consulted by the router (C8)
//! immediately before dispatch.
//!
//! §9 Open Question 3: the source references `X-API-Key`/`Bearer` headers
//! from `main` but never wires them into the request pipeline it shows. This
//! implementation keeps the hook point explicit and real, while matching the
//! spec's non-goal of *not* implementing any particular verification scheme:
//! [`NullAuthManager`] is the default, and always succeeds.

use std::collections::HashMap;

use async_trait::async_trait;

/// Failure from an [`AuthManager`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("authentication failed: {0}")]
pub struct AuthError(pub String);

/// A capability consulted before routing a request (§9 Open Question 3).
/// Header names are lower-cased by the caller before lookup.
#[async_trait]
pub trait AuthManager: Send + Sync {
    /// Authenticate a request given its headers. `Ok(())` admits the
    /// request; `Err` causes the router to reject it before dispatch.
    async fn authenticate(&self, headers: &HashMap<String, String>) -> Result<(), AuthError>;
}

/// The default: no authentication is performed. Matches the spec's decision
/// to leave verification logic entirely out of the core.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuthManager;

#[async_trait]
impl AuthManager for NullAuthManager {
    async fn authenticate(&self, _headers: &HashMap<String, String>) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_auth_manager_always_admits() {
        let mgr = NullAuthManager;
        assert!(mgr.authenticate(&HashMap::new()).await.is_ok());
    }
}
