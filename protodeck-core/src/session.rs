//! # Sessions
//!
//! A [`Session`] is the state of one workspace tab: the loaded schema, the active client and
//! the include directories used for loading. The [`SessionStore`] maps opaque keys to
//! sessions.
//!
//! ## Concurrency
//!
//! Each session sits behind its own `tokio::sync::Mutex`. Every operation on a key locks that
//! session for its whole duration, including file I/O and the wait for a response, so
//! operations on one key run one after another in arrival order. Different keys only share a
//! `DashMap` shard during lookup.
use crate::client::DynamicClient;
use crate::schema::SchemaRoot;
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tonic::transport::Channel;
use tracing::debug;

/// Shared handle to one session.
pub type SessionHandle<S = Channel> = Arc<Mutex<Session<S>>>;

/// Snapshot of a session, as reported to a UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub exists: bool,
    pub connected: bool,
    pub has_schema: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

pub struct Session<S = Channel> {
    key: String,
    schema: Option<Arc<SchemaRoot>>,
    schema_path: Option<PathBuf>,
    client: Option<DynamicClient<S>>,
    endpoint: Option<String>,
    service_name: Option<String>,
    include_dirs: Vec<PathBuf>,
}

impl<S> Session<S> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            schema: None,
            schema_path: None,
            client: None,
            endpoint: None,
            service_name: None,
            include_dirs: vec![],
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn schema(&self) -> Option<&Arc<SchemaRoot>> {
        self.schema.as_ref()
    }

    pub fn schema_path(&self) -> Option<&Path> {
        self.schema_path.as_deref()
    }

    pub fn client(&self) -> Option<&DynamicClient<S>> {
        self.client.as_ref()
    }

    pub fn client_mut(&mut self) -> Option<&mut DynamicClient<S>> {
        self.client.as_mut()
    }

    /// Endpoint of the last connection. Kept after a disconnect.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Service of the last connection. Kept after a disconnect.
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn set_include_dirs(&mut self, dirs: Vec<PathBuf>) {
        self.include_dirs = dirs;
    }

    /// Replaces the schema. The active client belongs to the previous schema and is closed.
    pub fn set_schema(&mut self, path: Option<PathBuf>, schema: Arc<SchemaRoot>) {
        self.disconnect();
        self.schema = Some(schema);
        self.schema_path = path;
    }

    /// Installs a client, closing the previous one first.
    pub fn set_client(&mut self, client: DynamicClient<S>, endpoint: String, service_name: String) {
        self.disconnect();
        self.client = Some(client);
        self.endpoint = Some(endpoint);
        self.service_name = Some(service_name);
    }

    /// Closes the active client, if any. Returns whether there was one.
    pub fn disconnect(&mut self) -> bool {
        match self.client.take() {
            Some(client) => {
                debug!(session = %self.key, "Disconnecting");
                client.close();
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            exists: true,
            connected: self.is_connected(),
            has_schema: self.schema.is_some(),
            schema_path: self.schema_path.clone(),
            endpoint: self.endpoint.clone(),
            service_name: self.service_name.clone(),
        }
    }
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("schema", &self.schema.as_ref().map(|s| s.root_file()))
            .field("schema_path", &self.schema_path)
            .field("connected", &self.is_connected())
            .field("endpoint", &self.endpoint)
            .field("service_name", &self.service_name)
            .field("include_dirs", &self.include_dirs)
            .finish()
    }
}

/// Table of sessions addressed by opaque keys.
pub struct SessionStore<S = Channel> {
    sessions: DashMap<String, SessionHandle<S>>,
}

impl<S> Default for SessionStore<S> {
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl<S> SessionStore<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `key`, creating an empty one on first reference.
    pub fn get_or_create(&self, key: &str) -> SessionHandle<S> {
        self.sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(session = %key, "Creating session");
                Arc::new(Mutex::new(Session::new(key)))
            })
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<SessionHandle<S>> {
        self.sessions.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    pub async fn set_include_dirs(&self, key: &str, dirs: Vec<PathBuf>) {
        self.get_or_create(key).lock().await.set_include_dirs(dirs);
    }

    pub async fn set_schema(&self, key: &str, path: Option<PathBuf>, schema: Arc<SchemaRoot>) {
        self.get_or_create(key).lock().await.set_schema(path, schema);
    }

    pub async fn set_client(
        &self,
        key: &str,
        client: DynamicClient<S>,
        endpoint: String,
        service_name: String,
    ) {
        self.get_or_create(key)
            .lock()
            .await
            .set_client(client, endpoint, service_name);
    }

    /// Closes the client of `key`. Unknown keys and idle sessions are left as they are.
    ///
    /// Returns whether a client was closed.
    pub async fn disconnect(&self, key: &str) -> bool {
        match self.get(key) {
            Some(session) => session.lock().await.disconnect(),
            None => false,
        }
    }

    /// Reports the state of `key` without creating it.
    pub async fn status(&self, key: &str) -> SessionStatus {
        match self.get(key) {
            Some(session) => session.lock().await.status(),
            None => SessionStatus::default(),
        }
    }

    /// Removes `key`, closing its client once pending operations on it are done.
    ///
    /// Returns whether the key existed.
    pub async fn remove(&self, key: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(key) else {
            return false;
        };

        session.lock().await.disconnect();
        debug!(session = %key, "Removed session");
        true
    }

    pub fn keys(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<S> fmt::Debug for SessionStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("keys", &self.keys())
            .finish()
    }
}
