// Persisted authentication state: token plus user identity.
//
// All three fields change together. Writers are serialized through an async
// mutex and only publish a new snapshot after the backend committed the batch,
// so readers never observe a half-applied login or logout.
use crate::storage::{KeyValueStore, Mutation};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

pub const TOKEN_KEY: &str = "auth_token";
pub const USER_ID_KEY: &str = "user_id";
pub const USER_NAME_KEY: &str = "user_name";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

impl Session {
    fn from_entries(entries: &BTreeMap<String, String>) -> Self {
        Self {
            token: entries.get(TOKEN_KEY).cloned(),
            user_id: entries.get(USER_ID_KEY).cloned(),
            user_name: entries.get(USER_NAME_KEY).cloned(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The token, only when it can actually authenticate a request.
    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
    state: Arc<watch::Sender<Session>>,
}

impl SessionStore {
    /// Open the store, reading whatever session was persisted previously.
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Result<Self> {
        let entries = backend.load().context("Failed to load session")?;
        let session = Session::from_entries(&entries);
        log::debug!("Session opened (logged in: {})", session.is_logged_in());
        let (state, _) = watch::channel(session);
        Ok(Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
            state: Arc::new(state),
        })
    }

    /// Replace token, user id and user name in one committed batch.
    pub async fn save_session(&self, token: &str, user_id: &str, user_name: &str) -> Result<()> {
        let batch = vec![
            Mutation::Set(TOKEN_KEY.to_string(), token.to_string()),
            Mutation::Set(USER_ID_KEY.to_string(), user_id.to_string()),
            Mutation::Set(USER_NAME_KEY.to_string(), user_name.to_string()),
        ];
        self.commit(batch).await.context("Failed to save session")
    }

    /// Remove every session field. Clearing an empty store is a no-op success.
    pub async fn clear(&self) -> Result<()> {
        self.commit(vec![
            Mutation::Remove(TOKEN_KEY.to_string()),
            Mutation::Remove(USER_ID_KEY.to_string()),
            Mutation::Remove(USER_NAME_KEY.to_string()),
        ])
        .await
        .context("Failed to clear session")
    }

    /// The lock, the backend write and the snapshot publish travel together
    /// into the blocking task, so a caller that stops waiting cannot split them.
    async fn commit(&self, batch: Vec<Mutation>) -> Result<()> {
        let guard = self.write_lock.clone().lock_owned().await;
        let backend = self.backend.clone();
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let _guard = guard;
            let entries = backend.commit(&batch)?;
            state.send_replace(Session::from_entries(&entries));
            Ok(())
        })
        .await
        .context("Session write task failed")?
    }

    /// Current snapshot; all fields come from the same committed write.
    pub fn current(&self) -> Session {
        self.state.borrow().clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub async fn user_id(&self) -> Option<String> {
        self.state.borrow().user_id.clone()
    }

    pub async fn user_name(&self) -> Option<String> {
        self.state.borrow().user_name.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().is_logged_in()
    }

    /// Observe session changes; the receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }
}
