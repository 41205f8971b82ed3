//! Credential rotation for rate-limited catalog clients.
//!
//! The rotator owns an ordered, non-empty pool of [`CredentialSet`]s and the
//! client built for the currently selected one. Callers never hold the shared
//! slot itself: [`CredentialRotator::current_client`] hands out a
//! [`ClientHandle`] snapshot (an `Arc` to the client plus the index it was built
//! from). A rotation swaps the slot for a new client, but any handle already
//! in use keeps its own client alive until the request finishes.

use std::sync::Arc;

use parking_lot::Mutex;

/// One set of catalog API credentials. Immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    /// Position in the pool (0-based)
    pub index: usize,
    pub identity: String,
    pub secret: String,
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("index", &self.index)
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A snapshot of the client bound to one credential set.
pub struct ClientHandle<C> {
    /// Index of the credential set this client was built from
    pub index: usize,
    client: Arc<C>,
}

impl<C> Clone for ClientHandle<C> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            client: Arc::clone(&self.client),
        }
    }
}

impl<C> std::ops::Deref for ClientHandle<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.client
    }
}

/// Builds a client from a credential set.
pub type ClientFactory<C> = Box<dyn Fn(&CredentialSet) -> C + Send + Sync>;

/// Error building a rotator.
#[derive(Debug, thiserror::Error)]
pub enum RotatorError {
    #[error("No credential sets configured")]
    EmptyPool,
}

/// Round-robin credential rotator, safe to share between workers.
pub struct CredentialRotator<C> {
    pool: Vec<CredentialSet>,
    factory: ClientFactory<C>,
    current: Mutex<ClientHandle<C>>,
}

impl<C> CredentialRotator<C> {
    /// Create a rotator starting at credential index 0.
    ///
    /// Re-numbers the pool so each set's `index` matches its position.
    pub fn new(
        pool: Vec<CredentialSet>,
        factory: impl Fn(&CredentialSet) -> C + Send + Sync + 'static,
    ) -> Result<Self, RotatorError> {
        if pool.is_empty() {
            return Err(RotatorError::EmptyPool);
        }
        let pool: Vec<CredentialSet> = pool
            .into_iter()
            .enumerate()
            .map(|(index, set)| CredentialSet { index, ..set })
            .collect();
        let factory: ClientFactory<C> = Box::new(factory);
        let first = ClientHandle {
            index: 0,
            client: Arc::new(factory(&pool[0])),
        };
        tracing::debug!(pool_size = pool.len(), "Credential rotator ready");
        Ok(Self {
            pool,
            factory,
            current: Mutex::new(first),
        })
    }

    /// Number of credential sets in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Index of the currently selected credential set.
    pub fn current_index(&self) -> usize {
        self.current.lock().index
    }

    /// Snapshot of the current client.
    pub fn current_client(&self) -> ClientHandle<C> {
        self.current.lock().clone()
    }

    /// Advance to the next credential set (modulo pool size) and return its client.
    ///
    /// Never blocks on I/O and never fails.
    pub fn rotate(&self) -> ClientHandle<C> {
        let mut current = self.current.lock();
        let next = (current.index + 1) % self.pool.len();
        *current = self.build(next);
        tracing::info!(credential_index = next, "Switched catalog credentials");
        current.clone()
    }

    /// Rotate only if `observed` is still the current selection.
    ///
    /// Workers that hit a rate limit with the same handle all call this; only
    /// the first one advances the pool, the rest pick up the new client.
    pub fn rotate_after_failure(&self, observed: &ClientHandle<C>) -> ClientHandle<C> {
        let mut current = self.current.lock();
        if current.index == observed.index && Arc::ptr_eq(&current.client, &observed.client) {
            let next = (current.index + 1) % self.pool.len();
            *current = self.build(next);
            tracing::info!(credential_index = next, "Switched catalog credentials");
        }
        current.clone()
    }

    /// A fresh client for every credential set, in pool order.
    ///
    /// Does not change the current selection.
    pub fn each_client(&self) -> Vec<ClientHandle<C>> {
        (0..self.pool.len()).map(|index| self.build(index)).collect()
    }

    fn build(&self, index: usize) -> ClientHandle<C> {
        ClientHandle {
            index,
            client: Arc::new((self.factory)(&self.pool[index])),
        }
    }
}
