//! # Session Manager
//!
//! Owns the current user's identity. Credentials are verified against the
//! [`CredentialStore`]; the resulting session blob is persisted to a
//! [`KeyValueStore`] so it survives restarts.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Uninitialized ──start()──► Loading ──blob ok──────► Authenticated     │
//! │                                 │                        │     ▲        │
//! │                                 └──none / malformed──┐   │     │        │
//! │                                                      ▼   ▼     │        │
//! │                                                    Anonymous ──┘        │
//! │                                                  logout  login/register │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transition is published on a `watch` channel; observers always see
//! the most recent state. A restored blob is trusted as-is: there is no
//! server-side check that the user still exists.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use shelf_core::{AuthState, Session};
use shelf_db::CredentialStore;

use crate::error::{ClientError, ClientResult};
use crate::storage::KeyValueStore;

/// Storage key of the session blob.
pub const SESSION_KEY: &str = "session";

/// What `register` did.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
    /// Account created and signed in.
    SignedIn(Session),
    /// Account created; the caller should send the user to login.
    AccountCreated { user_id: String },
}

impl RegisterOutcome {
    pub fn user_id(&self) -> &str {
        match self {
            RegisterOutcome::SignedIn(session) => &session.uid,
            RegisterOutcome::AccountCreated { user_id } => user_id,
        }
    }
}

/// Self-managed session: local verification, on-device persistence.
#[derive(Debug)]
pub struct SessionManager {
    credentials: CredentialStore,
    storage: Arc<dyn KeyValueStore>,
    state_tx: watch::Sender<AuthState>,
    auto_login_after_register: bool,
    /// Serializes start/login/register/logout.
    op_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        credentials: CredentialStore,
        storage: Arc<dyn KeyValueStore>,
        auto_login_after_register: bool,
    ) -> Self {
        let (state_tx, _) = watch::channel(AuthState::Uninitialized);
        Self {
            credentials,
            storage,
            state_tx,
            auto_login_after_register,
            op_lock: Mutex::new(()),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.state_tx.borrow().user_id().map(str::to_string)
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state_tx.borrow().session().cloned()
    }

    /// Subscribes to state changes. The receiver starts at the current state.
    pub fn watch_state(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restores the persisted session, if any. Calling it again is a no-op.
    pub async fn start(&self) -> AuthState {
        let _guard = self.op_lock.lock().await;

        if *self.state_tx.borrow() != AuthState::Uninitialized {
            return self.state();
        }

        self.state_tx.send_replace(AuthState::Loading);

        let next = match self.restore() {
            Some(session) => {
                info!(uid = %session.uid, "Restored session");
                AuthState::Authenticated(session)
            }
            None => {
                debug!("No stored session");
                AuthState::Anonymous
            }
        };

        self.state_tx.send_replace(next.clone());
        next
    }

    fn restore(&self) -> Option<Session> {
        let blob = match self.storage.get(SESSION_KEY) {
            Ok(blob) => blob?,
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                return None;
            }
        };

        match serde_json::from_str::<Session>(&blob) {
            Ok(session) if session.is_well_formed() => Some(session),
            Ok(_) | Err(_) => {
                warn!("Discarding malformed session blob");
                if let Err(e) = self.storage.remove(SESSION_KEY) {
                    warn!(error = %e, "Could not remove malformed session blob");
                }
                None
            }
        }
    }

    // =========================================================================
    // Login / Register / Logout
    // =========================================================================

    /// Verifies credentials and signs the user in.
    ///
    /// On failure the error kind is passed through unchanged and the state is
    /// left as it was.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Session> {
        let _guard = self.op_lock.lock().await;
        self.ensure_signed_out()?;

        let uid = self.credentials.verify_credential(email, password).await?;
        let session = self.open_session(&uid).await?;

        info!(uid = %session.uid, "Logged in");
        Ok(session)
    }

    /// Creates an account and, unless disabled, signs the new user in.
    pub async fn register(&self, email: &str, password: &str) -> ClientResult<RegisterOutcome> {
        let _guard = self.op_lock.lock().await;
        self.ensure_signed_out()?;

        let uid = self.credentials.register_credential(email, password).await?;

        if !self.auto_login_after_register {
            info!(uid = %uid, "Account created; sign-in required");
            return Ok(RegisterOutcome::AccountCreated { user_id: uid });
        }

        let session = self.open_session(&uid).await?;
        info!(uid = %session.uid, "Registered and logged in");
        Ok(RegisterOutcome::SignedIn(session))
    }

    /// Clears the persisted blob and the in-memory session. Never fails.
    pub async fn logout(&self) {
        let _guard = self.op_lock.lock().await;

        if let Err(e) = self.storage.remove(SESSION_KEY) {
            warn!(error = %e, "Could not remove stored session");
        }

        let previous = self.state();
        match previous {
            AuthState::Uninitialized => {}
            AuthState::Authenticated(session) => {
                info!(uid = %session.uid, "Logged out");
                self.state_tx.send_replace(AuthState::Anonymous);
            }
            AuthState::Loading | AuthState::Anonymous => {
                self.state_tx.send_replace(AuthState::Anonymous);
            }
        }
    }

    fn ensure_signed_out(&self) -> ClientResult<()> {
        match &*self.state_tx.borrow() {
            AuthState::Uninitialized | AuthState::Loading => Err(ClientError::NotReady),
            AuthState::Authenticated(session) => Err(ClientError::AlreadyAuthenticated {
                uid: session.uid.clone(),
            }),
            AuthState::Anonymous => Ok(()),
        }
    }

    async fn open_session(&self, uid: &str) -> ClientResult<Session> {
        let profile = self.credentials.profile(uid).await?;
        let session = Session::issue(&profile.id, &profile.email).with_profile(&profile);

        let blob = serde_json::to_string(&session)?;
        self.storage.set(SESSION_KEY, &blob)?;

        self.state_tx
            .send_replace(AuthState::Authenticated(session.clone()));
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use shelf_core::ErrorKind;
    use shelf_db::{Database, DbConfig, HashingConfig};

    async fn setup() -> (Database, Arc<MemoryStore>) {
        let db = Database::new(DbConfig::in_memory().hashing(HashingConfig::minimal()))
            .await
            .unwrap();
        (db, Arc::new(MemoryStore::new()))
    }

    fn manager(db: &Database, store: &Arc<MemoryStore>, auto_login: bool) -> SessionManager {
        SessionManager::new(db.credentials("test"), store.clone(), auto_login)
    }

    #[tokio::test]
    async fn test_start_without_blob_is_anonymous() {
        let (db, store) = setup().await;
        let sessions = manager(&db, &store, true);

        assert_eq!(sessions.state(), AuthState::Uninitialized);
        assert_eq!(sessions.start().await, AuthState::Anonymous);
        // Idempotent.
        assert_eq!(sessions.start().await, AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_register_signs_in_and_persists() {
        let (db, store) = setup().await;
        let sessions = manager(&db, &store, true);
        sessions.start().await;

        let outcome = sessions.register(" A@B.com ", "secret1").await.unwrap();
        let RegisterOutcome::SignedIn(session) = outcome else {
            panic!("expected auto-login");
        };

        assert_eq!(session.email, "a@b.com");
        assert!(session.created_at.is_some());
        assert_eq!(sessions.current_user_id().as_deref(), Some(session.uid.as_str()));

        let blob = store.get(SESSION_KEY).unwrap().unwrap();
        let stored: Session = serde_json::from_str(&blob).unwrap();
        assert_eq!(stored, session);
    }

    #[tokio::test]
    async fn test_session_survives_restart() {
        let (db, store) = setup().await;
        let first = manager(&db, &store, true);
        first.start().await;
        let outcome = first.register("a@b.com", "secret1").await.unwrap();
        drop(first);

        let second = manager(&db, &store, true);
        let state = second.start().await;
        assert_eq!(state.user_id(), Some(outcome.user_id()));
    }

    #[tokio::test]
    async fn test_malformed_blob_is_discarded() {
        let (db, store) = setup().await;
        store.set(SESSION_KEY, "{not json").unwrap();

        let sessions = manager(&db, &store, true);
        assert_eq!(sessions.start().await, AuthState::Anonymous);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);

        store
            .set(SESSION_KEY, r#"{"uid":"","email":"a@b.com","issuedAt":"2024-01-01T00:00:00Z"}"#)
            .unwrap();
        let sessions = manager(&db, &store, true);
        assert_eq!(sessions.start().await, AuthState::Anonymous);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_before_start_is_not_ready() {
        let (db, store) = setup().await;
        let sessions = manager(&db, &store, true);

        let err = sessions.login("a@b.com", "secret1").await.unwrap_err();
        assert!(matches!(err, ClientError::NotReady));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_login_failures_leave_state_unchanged() {
        let (db, store) = setup().await;
        db.credentials("test")
            .register_credential("a@b.com", "secret1")
            .await
            .unwrap();

        let sessions = manager(&db, &store, true);
        sessions.start().await;

        let err = sessions.login("a@b.com", "wrong-pass").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPassword);

        let err = sessions.login("nobody@b.com", "secret1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmailNotFound);

        let err = sessions.login("", "secret1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert_eq!(sessions.state(), AuthState::Anonymous);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_then_relogin_fails_closed() {
        let (db, store) = setup().await;
        let uid = db
            .credentials("test")
            .register_credential("a@b.com", "secret1")
            .await
            .unwrap();

        let sessions = manager(&db, &store, true);
        sessions.start().await;

        let session = sessions.login("A@B.COM", "secret1").await.unwrap();
        assert_eq!(session.uid, uid);

        let err = sessions.login("a@b.com", "secret1").await.unwrap_err();
        assert!(matches!(err, ClientError::AlreadyAuthenticated { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = sessions.register("c@d.com", "secret1").await.unwrap_err();
        assert!(matches!(err, ClientError::AlreadyAuthenticated { .. }));
        assert_eq!(sessions.current_user_id(), Some(uid));
    }

    #[tokio::test]
    async fn test_register_without_auto_login() {
        let (db, store) = setup().await;
        let sessions = manager(&db, &store, false);
        sessions.start().await;

        let outcome = sessions.register("a@b.com", "secret1").await.unwrap();
        assert!(matches!(outcome, RegisterOutcome::AccountCreated { .. }));
        assert_eq!(sessions.state(), AuthState::Anonymous);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);

        let session = sessions.login("a@b.com", "secret1").await.unwrap();
        assert_eq!(session.uid, outcome.user_id());
    }

    #[tokio::test]
    async fn test_duplicate_register_keeps_anonymous() {
        let (db, store) = setup().await;
        let sessions = manager(&db, &store, true);
        sessions.start().await;

        sessions.register("a@b.com", "secret1").await.unwrap();
        sessions.logout().await;

        let err = sessions.register("a@b.com", "other-pass").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateEmail);
        assert_eq!(sessions.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_logout_never_fails() {
        let (db, store) = setup().await;
        let sessions = manager(&db, &store, true);
        sessions.start().await;
        sessions.register("a@b.com", "secret1").await.unwrap();

        sessions.logout().await;
        assert_eq!(sessions.state(), AuthState::Anonymous);
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);

        sessions.logout().await;
        assert_eq!(sessions.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_watchers_see_transitions() {
        let (db, store) = setup().await;
        let sessions = manager(&db, &store, true);
        let mut rx = sessions.watch_state();

        sessions.start().await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::Anonymous);

        let outcome = sessions.register("a@b.com", "secret1").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().user_id(), Some(outcome.user_id()));

        sessions.logout().await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::Anonymous);
    }
}
