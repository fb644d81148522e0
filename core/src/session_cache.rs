/*
 * session_cache.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tidewire, an asynchronous HTTP and WebSocket client.
 *
 * Tidewire is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tidewire is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tidewire.  If not, see <http://www.gnu.org/licenses/>.
 */

//! TLS session cache shared by many connections to the same peers.
//!
//! Keyed by the resolved remote address (one host name may resolve to several peers).
//! A `SessionHandle` wraps a rustls session store: a handshake that starts with a cached
//! handle offers the tickets held in it, and tickets issued later on that connection land in
//! the same handle. Entries live as long as the cache; they are never expired.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use tokio_rustls::rustls::client::{ClientSessionMemoryCache, ClientSessionStore, Resumption};

/// Size of the rustls store behind each handle. rustls splits this into one slot per server
/// name for every eight units and evicts as soon as the slots are full, so a budget of one
/// server drops each ticket as it arrives.
const STORE_SIZE_PER_PEER: usize = 32;

/// Opaque handle to the negotiated session state for one peer.
#[derive(Clone)]
pub struct SessionHandle {
    store: Arc<ClientSessionMemoryCache>,
}

impl SessionHandle {
    /// An empty handle. A handshake using it performs a full negotiation.
    pub fn new() -> Self {
        Self {
            store: Arc::new(ClientSessionMemoryCache::new(STORE_SIZE_PER_PEER)),
        }
    }

    /// Resumption setting that makes a rustls client use (and fill) this handle.
    pub(crate) fn resumption(&self) -> Resumption {
        let store: Arc<dyn ClientSessionStore> = self.store.clone();
        Resumption::store(store)
    }

    /// True if both handles refer to the same session state.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_session(other)
    }
}

impl Eq for SessionHandle {}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionHandle({:p})", Arc::as_ptr(&self.store))
    }
}

/// Map from peer address to session handle, safe to share across tasks and threads.
#[derive(Default)]
pub struct TlsSessionCache {
    entries: RwLock<HashMap<SocketAddr, SessionHandle>>,
}

impl TlsSessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle recorded for `peer`, if any. Called just before a handshake begins.
    pub(crate) fn lookup(&self, peer: &SocketAddr) -> Option<SessionHandle> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(peer).cloned()
    }

    /// Store `handle` for `peer`, replacing any previous entry. Callers record only after a
    /// handshake that negotiated a new session.
    pub(crate) fn record(&self, peer: SocketAddr, handle: SessionHandle) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = entries.insert(peer, handle).is_some();
        tracing::debug!(%peer, replaced, "recorded new TLS session");
    }

    /// Handle to use for a handshake with `peer`: the cached one (resumption requested) or a
    /// fresh one. The flag is true when resumption will be requested.
    pub(crate) fn checkout(&self, peer: &SocketAddr) -> (SessionHandle, bool) {
        match self.lookup(peer) {
            Some(handle) => (handle, true),
            None => (SessionHandle::new(), false),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Peers that currently have a recorded session.
    pub fn peers(&self) -> Vec<SocketAddr> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.keys().copied().collect()
    }
}

impl fmt::Debug for TlsSessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSessionCache")
            .field("peers", &self.peers())
            .finish()
    }
}
