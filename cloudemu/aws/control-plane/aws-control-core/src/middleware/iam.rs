//! IAM policy evaluation. Runs after the wire protocol's signature
//! parsing (syntactically required upstream, never cryptographically
//! checked here) — this is policy simulation, not a credential broker.
//! See `storage/iam.rs` for why this isn't a faithful IAM engine: one
//! global account, policies evaluated as a single bound set rather
//! than resolved per assumed role.

use crate::Emulator;
use aws_data_core::storage::IamPolicy;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use aws_data_core::config::IamMode;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
enum Decision {
    Allow,
    Deny,
}

struct EvalResult {
    decision: Decision,
    reason: &'static str,
}

/// `AWS4-HMAC-SHA256 Credential=AKIA.../20260101/us-east-1/svc/aws4_request, ...`
fn principal_from_authorization(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.split("Credential=").nth(1))
        .and_then(|rest| rest.split('/').next())
        .unwrap_or("anonymous")
        .to_string()
}

fn service_and_operation(headers: &HeaderMap, path: &str) -> (String, String) {
    if let Some(target) = headers.get("x-amz-target").and_then(|h| h.to_str().ok()) {
        let mut parts = target.splitn(2, '.');
        let service = parts.next().unwrap_or("unknown").to_string();
        let operation = parts.next().unwrap_or("Unknown").to_string();
        return (service, operation);
    }
    let service = path.trim_start_matches('/').split('/').next().filter(|s| !s.is_empty()).unwrap_or("unknown").to_string();
    (service, "Unknown".to_string())
}

/// `*` spans any run of characters; everything else must match literally.
fn glob_match(pattern: &str, value: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();
    let (mut pi, mut vi) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut match_from = 0usize;

    while vi < v.len() {
        if pi < p.len() && (p[pi] == '*' || p[pi] == v[vi]) {
            if p[pi] == '*' {
                star = Some(pi);
                match_from = vi;
                pi += 1;
            } else {
                pi += 1;
                vi += 1;
            }
        } else if let Some(si) = star {
            pi = si + 1;
            match_from += 1;
            vi = match_from;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

fn as_str_list(v: &Value) -> Vec<String> {
    match v {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

fn condition_matches(condition: &Value, principal: &str) -> bool {
    let Some(ops) = condition.as_object() else { return true };
    for (op, kv) in ops {
        let Some(kv) = kv.as_object() else { return false };
        for (key, expected) in kv {
            let expected = as_str_list(expected);
            let actual = match key.as_str() {
                "aws:username" | "aws:principal" => principal,
                _ => return false,
            };
            let matches = match op.as_str() {
                "StringEquals" => expected.iter().any(|e| e == actual),
                "ArnLike" => expected.iter().any(|e| glob_match(e, actual)),
                _ => false, // unsupported operator: fail closed
            };
            if !matches {
                return false;
            }
        }
    }
    true
}

fn evaluate(principal: &str, action: &str, resource_arn: &str, policies: &[IamPolicy]) -> EvalResult {
    let mut allowed = false;

    for policy in policies {
        let Ok(doc) = serde_json::from_str::<Value>(&policy.document) else { continue };
        let Some(statements) = doc.get("Statement") else { continue };
        let statements = match statements {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };

        for stmt in statements {
            let effect = stmt.get("Effect").and_then(Value::as_str).unwrap_or("Deny");
            let actions = stmt.get("Action").map(as_str_list).unwrap_or_default();
            let resources = stmt.get("Resource").map(as_str_list).unwrap_or_default();

            let action_hit = actions.iter().any(|a| glob_match(a, action));
            let resource_hit = resources.iter().any(|r| glob_match(r, resource_arn));
            if !action_hit || !resource_hit {
                continue;
            }
            if let Some(cond) = stmt.get("Condition") {
                if !condition_matches(cond, principal) {
                    continue;
                }
            }

            if effect == "Deny" {
                return EvalResult { decision: Decision::Deny, reason: "explicit deny" };
            }
            if effect == "Allow" {
                allowed = true;
            }
        }
    }

    if allowed {
        EvalResult { decision: Decision::Allow, reason: "allowed by policy" }
    } else {
        EvalResult { decision: Decision::Deny, reason: "no matching allow statement" }
    }
}

fn access_denied_response(headers: &HeaderMap, reason: &str) -> Response {
    let is_json = headers.get("x-amz-target").is_some() || headers.get("content-type").and_then(|h| h.to_str().ok()).unwrap_or("").contains("json");
    if is_json {
        (axum::http::StatusCode::FORBIDDEN, Json(json!({"__type": "AccessDeniedException", "message": reason}))).into_response()
    } else {
        let body = format!("<ErrorResponse><Error><Code>AccessDenied</Code><Message>{reason}</Message></Error></ErrorResponse>");
        (axum::http::StatusCode::FORBIDDEN, [("content-type", "text/xml")], body).into_response()
    }
}

pub async fn evaluate_iam(State(emulator): State<Arc<Emulator>>, req: Request, next: Next) -> Response {
    if emulator.config.iam_mode == IamMode::Disabled {
        return next.run(req).await;
    }

    let headers = req.headers().clone();
    let path = req.uri().path().to_string();
    let principal = principal_from_authorization(&headers);
    let (service, operation) = service_and_operation(&headers, &path);
    let action = format!("{service}:{operation}");
    let resource_arn = format!("arn:aws:{service}:{}:{}:*", emulator.config.region, emulator.config.account_id);

    let policies = match emulator.storage.list_policies() {
        Ok(p) => p,
        Err(_) => return next.run(req).await,
    };

    let result = evaluate(&principal, &action, &resource_arn, &policies);

    if result.decision == Decision::Deny {
        tracing::warn!(%principal, %action, reason = result.reason, "iam: denied");
        if emulator.config.iam_mode == IamMode::Enforce {
            return access_denied_response(&headers, result.reason);
        }
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(document: serde_json::Value) -> IamPolicy {
        IamPolicy {
            name: "p".into(),
            arn: "arn:aws:iam::000000000000:policy/p".into(),
            path: "/".into(),
            default_version_id: "v1".into(),
            document: document.to_string(),
        }
    }

    #[test]
    fn glob_match_handles_prefix_suffix_and_middle_wildcards() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("dynamodb:*", "dynamodb:GetItem"));
        assert!(!glob_match("dynamodb:*", "sqs:SendMessage"));
        assert!(glob_match("arn:aws:s3:::my-bucket/*", "arn:aws:s3:::my-bucket/key.txt"));
        assert!(!glob_match("arn:aws:s3:::my-bucket/*", "arn:aws:s3:::other-bucket/key.txt"));
    }

    #[test]
    fn explicit_deny_beats_allow() {
        let policies = vec![
            policy(serde_json::json!({"Statement": [{"Effect": "Allow", "Action": "dynamodb:*", "Resource": "*"}]})),
            policy(serde_json::json!({"Statement": [{"Effect": "Deny", "Action": "dynamodb:DeleteTable", "Resource": "*"}]})),
        ];
        let result = evaluate("root", "dynamodb:DeleteTable", "arn:aws:dynamodb:us-east-1:000000000000:*", &policies);
        assert_eq!(result.decision, Decision::Deny);
    }

    #[test]
    fn no_matching_statement_denies_by_default() {
        let policies = vec![policy(serde_json::json!({"Statement": [{"Effect": "Allow", "Action": "sqs:*", "Resource": "*"}]}))];
        let result = evaluate("root", "dynamodb:GetItem", "arn:aws:dynamodb:us-east-1:000000000000:*", &policies);
        assert_eq!(result.decision, Decision::Deny);
    }

    #[test]
    fn condition_with_unsupported_operator_fails_closed() {
        let policies = vec![policy(serde_json::json!({
            "Statement": [{
                "Effect": "Allow", "Action": "dynamodb:*", "Resource": "*",
                "Condition": {"DateGreaterThan": {"aws:username": "alice"}},
            }]
        }))];
        let result = evaluate("alice", "dynamodb:GetItem", "arn:aws:dynamodb:us-east-1:000000000000:*", &policies);
        assert_eq!(result.decision, Decision::Deny);
    }

    #[test]
    fn condition_string_equals_matches_principal() {
        let policies = vec![policy(serde_json::json!({
            "Statement": [{
                "Effect": "Allow", "Action": "dynamodb:*", "Resource": "*",
                "Condition": {"StringEquals": {"aws:username": "alice"}},
            }]
        }))];
        assert_eq!(
            evaluate("alice", "dynamodb:GetItem", "arn:aws:dynamodb:us-east-1:000000000000:*", &policies).decision,
            Decision::Allow
        );
        assert_eq!(
            evaluate("bob", "dynamodb:GetItem", "arn:aws:dynamodb:us-east-1:000000000000:*", &policies).decision,
            Decision::Deny
        );
    }
}
