//! Virtual-hosted-style rewrite for the object engine: `Host:
//! <bucket>.<baseline-host>` is rewritten to path-style
//! (`/<bucket>/<key>`) before the request reaches the S3 handlers.
//! A no-op for every other service, since their `Host` headers never
//! match the `<bucket>.<baseline>` shape.

use crate::Emulator;
#[cfg(feature = "object")]
use axum::http::Uri;
use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use std::sync::Arc;

#[cfg(feature = "object")]
fn known_baseline_hosts(emulator: &Emulator) -> [String; 2] {
    [emulator.config.host.clone(), "localhost".to_string()]
}

#[cfg(feature = "object")]
fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}

#[cfg(feature = "object")]
fn rewrite_path_for_bucket(uri: &Uri, bucket: &str) -> Uri {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let rewritten = if path_and_query == "/" { format!("/{bucket}") } else { format!("/{bucket}{path_and_query}") };
    rewritten.parse().unwrap_or_else(|_| uri.clone())
}

#[cfg(feature = "object")]
pub async fn rewrite_vhost(State(emulator): State<Arc<Emulator>>, mut req: Request, next: Next) -> Response {
    let host = req.headers().get("host").and_then(|h| h.to_str().ok()).map(str::to_string);

    if let Some(host) = host {
        let host = strip_port(&host);
        for baseline in known_baseline_hosts(&emulator) {
            if let Some(bucket) = host.strip_suffix(&format!(".{baseline}")) {
                if !bucket.is_empty() {
                    *req.uri_mut() = rewrite_path_for_bucket(req.uri(), bucket);
                    break;
                }
            }
        }
    }

    next.run(req).await
}

#[cfg(not(feature = "object"))]
pub async fn rewrite_vhost(State(_emulator): State<Arc<Emulator>>, req: Request, next: Next) -> Response {
    next.run(req).await
}
