//! Scripted in-process network for tests.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;

use super::{Network, NetworkError};
use crate::message::{Request, Response, ResponseSource};

#[derive(Debug, Clone)]
enum Route {
    Reply { status: StatusCode, content_type: String, body: Bytes },
    Fail,
}

/// Network double answering from a route table.
///
/// Unknown URLs answer 404. While offline every fetch fails. While paused,
/// fetches wait until [`MockNetwork::release`] hands out a permit.
#[derive(Default)]
pub struct MockNetwork {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

fn normalize(url: &str) -> String {
    url::Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string())
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with the given status and body.
    pub fn route(&self, url: &str, status: u16, content_type: &str, body: impl Into<Bytes>) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.routes.lock().unwrap().insert(
            normalize(url),
            Route::Reply { status, content_type: content_type.to_string(), body: body.into() },
        );
    }

    /// Make every fetch of `url` fail at the transport level.
    pub fn fail(&self, url: &str) {
        self.routes.lock().unwrap().insert(normalize(url), Route::Fail);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Hold every subsequent fetch until released.
    pub fn pause(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held fetches proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(n);
        }
    }

    /// Total number of fetches attempted.
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of fetches attempted for `url`.
    pub fn calls_to(&self, url: &str) -> usize {
        let url = normalize(url);
        self.calls.lock().unwrap().iter().filter(|u| **u == url).count()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let url = normalize(&request.url);
        self.calls.lock().unwrap().push(url.clone());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.map_err(|e| NetworkError::Transport(e.to_string()))?.forget();
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Transport("offline".into()));
        }

        let route = self.routes.lock().unwrap().get(&url).cloned();
        match route {
            Some(Route::Reply { status, content_type, body }) => {
                Ok(Response::new(status, &content_type, body, ResponseSource::Network))
            }
            Some(Route::Fail) => Err(NetworkError::Transport(format!("connection refused: {url}"))),
            None => Ok(Response::new(StatusCode::NOT_FOUND, "text/plain", "not found", ResponseSource::Network)),
        }
    }
}
