//! Request logging: a bounded ring buffer of recent requests, fanned
//! out live to any `/_ldk/ws/logs` subscriber. Subscriber sends are
//! best-effort — a lagging or closed receiver never blocks a handler.

use crate::Emulator;
use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::broadcast;

const RING_CAPACITY: usize = 2000;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub method: String,
    pub path: String,
    pub service: String,
    pub body_size: usize,
    pub status: u16,
    pub latency_ms: u64,
}

pub struct LogRing {
    buffer: Mutex<VecDeque<LogEntry>>,
    tx: broadcast::Sender<LogEntry>,
}

impl LogRing {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(256);
        Arc::new(Self { buffer: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)), tx })
    }

    fn push(&self, entry: LogEntry) {
        {
            let mut buf = self.buffer.lock().unwrap();
            if buf.len() >= RING_CAPACITY {
                buf.pop_front();
            }
            buf.push_back(entry.clone());
        }
        // A lagging or dropped receiver is not this handler's problem.
        let _ = self.tx.send(entry);
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.buffer.lock().unwrap().iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }
}

fn service_name(headers: &HeaderMap, path: &str) -> String {
    if let Some(target) = headers.get("x-amz-target").and_then(|h| h.to_str().ok()) {
        if let Some(svc) = target.split('.').next() {
            return svc.to_string();
        }
    }
    path.trim_start_matches('/').split('/').next().filter(|s| !s.is_empty()).unwrap_or("root").to_string()
}

pub async fn log_requests(State(emulator): State<Arc<Emulator>>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let service = service_name(req.headers(), &path);

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(_) => {
            let resp = next.run(Request::from_parts(parts, Body::empty())).await;
            return resp;
        }
    };
    let body_size = bytes.len();
    let req = Request::from_parts(parts, Body::from(bytes));

    let start = Instant::now();
    let response = next.run(req).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    emulator.log_ring.push(LogEntry { method, path, service, body_size, status: response.status().as_u16(), latency_ms });

    response
}
