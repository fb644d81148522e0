/*
 * session.rs
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

//! Asynchronous HTTP session: each request runs as its own task and reports through a
//! completion callback.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_rustls::rustls::ClientConfig;

use crate::cancel::CancelSignal;
use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::net::TlsSetup;
use crate::protocol::http::executor::Exchange;
use crate::protocol::http::request::Request;
use crate::protocol::http::response::Response;

/// Handle to an in-flight exchange started by `execute_async`.
///
/// Dropping the handle does not cancel the exchange; the completion still runs.
#[derive(Debug)]
pub struct RequestHandle {
    cancel: CancelSignal,
    task: JoinHandle<()>,
}

impl RequestHandle {
    /// Abort pending I/O. The completion receives `Error::Cancelled` unless it already ran.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the completion has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the completion to return. A panic inside the completion is resumed here.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
        }
    }
}

/// Spawn `exchange` and deliver its result (or cancellation on `cancel`) to `completion`
/// exactly once.
pub(crate) fn spawn_exchange<F>(
    exchange: Exchange,
    cancel: CancelSignal,
    completion: F,
) -> RequestHandle
where
    F: FnOnce(Result<Response>) + Send + 'static,
{
    let signal = cancel.clone();
    let task = tokio::spawn(async move {
        let result = tokio::select! {
            biased;
            _ = signal.cancelled() => {
                tracing::debug!("exchange cancelled");
                Err(Error::Cancelled)
            }
            result = exchange.run() => result,
        };
        completion(result);
    });
    RequestHandle { cancel, task }
}

/// HTTP session over a caller-supplied TLS configuration. Cheap to clone; exchanges share
/// nothing mutable.
#[derive(Clone)]
pub struct AsyncSession {
    tls: TlsSetup,
    options: ClientOptions,
}

impl AsyncSession {
    /// `tls` is used for every https target; trust anchors must already be loaded.
    pub fn new(tls: Arc<ClientConfig>) -> Self {
        Self {
            tls: TlsSetup::new(tls),
            options: ClientOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Start `request` on a new task and return at once. `completion` is called exactly once
    /// with the final response or the first failure. Must be called within a Tokio runtime.
    pub fn execute_async<F>(&self, request: Request, completion: F) -> RequestHandle
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        spawn_exchange(
            Exchange::new(request, self.tls.clone(), &self.options),
            CancelSignal::new(),
            completion,
        )
    }

    /// Run `request` to completion on the current task.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        Exchange::new(request, self.tls.clone(), &self.options)
            .run()
            .await
    }
}
