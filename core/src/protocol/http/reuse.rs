/*
 * reuse.rs
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

//! Sessions that resume TLS sessions across connections.
//!
//! A `ReuseClient` owns one `TlsSessionCache`; every `ReuseSession` it prepares threads that
//! cache into its TLS handshakes. Plain http targets never touch the cache. Each session runs
//! one request at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_rustls::rustls::ClientConfig;

use crate::cancel::CancelSignal;
use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::net::TlsSetup;
use crate::protocol::http::executor::Exchange;
use crate::protocol::http::request::Request;
use crate::protocol::http::response::Response;
use crate::protocol::http::session::{spawn_exchange, RequestHandle};
use crate::session_cache::TlsSessionCache;

/// Owner of the shared TLS session cache.
#[derive(Debug, Default)]
pub struct ReuseClient {
    cache: Arc<TlsSessionCache>,
    options: ClientOptions,
}

impl ReuseClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing cache (for example with WebSocket sessions).
    pub fn with_cache(cache: Arc<TlsSessionCache>) -> Self {
        Self {
            cache,
            options: ClientOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn session_cache(&self) -> &Arc<TlsSessionCache> {
        &self.cache
    }

    /// A session that handshakes with `tls` and resumes through this client's cache.
    pub fn prepare(&self, tls: Arc<ClientConfig>) -> ReuseSession {
        ReuseSession {
            tls: TlsSetup::with_cache(tls, self.cache.clone()),
            options: self.options.clone(),
            busy: Arc::new(AtomicBool::new(false)),
            in_flight: Mutex::new(None),
        }
    }
}

/// Single-flight HTTP session sharing its client's TLS session cache.
pub struct ReuseSession {
    tls: TlsSetup,
    options: ClientOptions,
    busy: Arc<AtomicBool>,
    in_flight: Mutex<Option<CancelSignal>>,
}

/// Clears the busy flag when dropped, so a cancelled or failed dispatch frees the session.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReuseSession {
    /// True when no request is in flight.
    pub fn is_ready(&self) -> bool {
        !self.busy.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(BusyGuard(self.busy.clone()))
    }

    /// Dispatch `request` on a new task. Fails with `Error::Busy` (and never calls
    /// `completion`) while another request is in flight. The session is ready again before
    /// `completion` runs.
    pub fn send<F>(&self, request: Request, completion: F) -> Result<RequestHandle>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        let guard = self.acquire()?;
        let exchange = Exchange::new(request, self.tls.clone(), &self.options);
        // Stored before the task exists: its completion may start the next dispatch.
        let cancel = CancelSignal::new();
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());
        Ok(spawn_exchange(exchange, cancel, move |result| {
            drop(guard);
            completion(result);
        }))
    }

    /// Run `request` on the current task, with the same single-flight rule as `send`.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let _guard = self.acquire()?;
        Exchange::new(request, self.tls.clone(), &self.options)
            .run()
            .await
    }

    /// Cancel the request started by the last `send`, if it is still running.
    pub fn cancel(&self) {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(signal) = in_flight.as_ref() {
            signal.cancel();
        }
    }

    pub fn session_cache(&self) -> Option<&Arc<TlsSessionCache>> {
        self.tls.cache()
    }
}
