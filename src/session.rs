use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Authenticated user attached to the current process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub user_id: String,
    pub email: String,
    pub is_admin: bool,
}

/// Account-state failures the auth backend reports. Each variant maps to a
/// distinct user-facing dialog, so they stay separate codes instead of one
/// opaque error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no account is registered for this address")]
    NotRegistered,
    #[error("this account has been suspended")]
    Suspended,
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// Explicit session state shared with every component that used to read an
/// ambient global. Created once at startup; `sign_out` resets it and every
/// observer sees the change.
#[derive(Debug, Clone)]
pub struct SessionContext {
    tx: Arc<watch::Sender<Option<UserSession>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn sign_in(&self, session: UserSession) {
        info!("session opened for {}", session.user_id);
        self.tx.send_replace(Some(session));
    }

    pub fn sign_out(&self) {
        if self.tx.borrow().is_some() {
            info!("session closed");
        }
        self.tx.send_replace(None);
    }

    /// Snapshot of the current session, if any.
    pub fn current(&self) -> Option<UserSession> {
        self.tx.borrow().clone()
    }

    /// Observation handle for components that react to sign-in/sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<UserSession>> {
        self.tx.subscribe()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> UserSession {
        UserSession {
            user_id: id.to_string(),
            email: format!("{id}@example.com"),
            is_admin: false,
        }
    }

    #[test]
    fn starts_signed_out() {
        let ctx = SessionContext::new();
        assert_eq!(ctx.current(), None);
    }

    #[test]
    fn sign_in_then_out_round_trips() {
        let ctx = SessionContext::new();
        ctx.sign_in(session("u1"));
        assert_eq!(ctx.current().map(|s| s.user_id), Some("u1".to_string()));
        ctx.sign_out();
        assert_eq!(ctx.current(), None);
    }

    #[tokio::test]
    async fn observers_see_changes() {
        let ctx = SessionContext::new();
        let mut rx = ctx.subscribe();
        ctx.sign_in(session("u2"));
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_some());
    }
}
