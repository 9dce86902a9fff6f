//! Fault injection: per-service deterministic PRNGs so a chaos run is
//! reproducible across restarts given the same seed-derived service
//! name and request order. "Dropping the connection" and "simulating
//! a timeout" both come out of the same `chaos_drop_rate` roll here —
//! the spec's configuration surface doesn't carve out a separate knob
//! for the two, and in a single-process emulator both look the same
//! to a client: it never gets a response.

use crate::Emulator;
use axum::{extract::Request, extract::State, middleware::Next, response::IntoResponse, response::Response};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct ChaosState {
    rngs: Mutex<HashMap<String, StdRng>>,
}

impl ChaosState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { rngs: Mutex::new(HashMap::new()) })
    }

    fn roll(&self, service: &str) -> f64 {
        let mut rngs = self.rngs.lock().unwrap();
        let rng = rngs.entry(service.to_string()).or_insert_with(|| {
            let mut hasher = DefaultHasher::new();
            service.hash(&mut hasher);
            StdRng::seed_from_u64(hasher.finish())
        });
        rng.gen_range(0.0..1.0)
    }

    fn latency_ms(&self, service: &str, min: u64, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        let mut rngs = self.rngs.lock().unwrap();
        let rng = rngs.entry(service.to_string()).or_insert_with(|| {
            let mut hasher = DefaultHasher::new();
            service.hash(&mut hasher);
            StdRng::seed_from_u64(hasher.finish())
        });
        if min >= max {
            min
        } else {
            rng.gen_range(min..=max)
        }
    }
}

fn service_name(req: &Request) -> String {
    req.headers()
        .get("x-amz-target")
        .and_then(|h| h.to_str().ok())
        .and_then(|t| t.split('.').next())
        .map(str::to_string)
        .unwrap_or_else(|| req.uri().path().trim_start_matches('/').split('/').next().unwrap_or("root").to_string())
}

pub async fn inject_chaos(State(emulator): State<Arc<Emulator>>, req: Request, next: Next) -> Response {
    let cfg = &emulator.config;
    if cfg.chaos_error_rate == 0.0 && cfg.chaos_drop_rate == 0.0 && cfg.chaos_latency_ms_max == 0 {
        return next.run(req).await;
    }

    let service = service_name(&req);

    if cfg.chaos_drop_rate > 0.0 && emulator.chaos.roll(&service) < cfg.chaos_drop_rate {
        // Never answer; the client's own timeout is what ends this.
        loop {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    let latency = emulator.chaos.latency_ms(&service, cfg.chaos_latency_ms_min, cfg.chaos_latency_ms_max);
    if latency > 0 {
        tokio::time::sleep(Duration::from_millis(latency)).await;
    }

    if cfg.chaos_error_rate > 0.0 && emulator.chaos.roll(&service) < cfg.chaos_error_rate {
        return crate::ApiError::from(aws_data_core::error::EmulatorError::Chaos).into_response();
    }

    next.run(req).await
}
