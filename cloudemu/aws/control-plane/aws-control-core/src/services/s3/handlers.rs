//! Path-style REST-XML dispatch for the object store: `/{bucket}` and
//! `/{bucket}/{key...}`, GET/PUT/DELETE/HEAD, plus the multipart trio
//! via `?uploads`/`?uploadId=`/`?partNumber=`.

use crate::error::ApiError;
use crate::Emulator;
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

pub async fn handle_request(State(emulator): State<Arc<Emulator>>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let mut parts = path.trim_start_matches('/').splitn(2, '/');
    let bucket = parts.next().unwrap_or("").to_string();
    let key = parts.next().map(str::to_string);

    let body = match axum::body::to_bytes(req.into_body(), 512 * 1024 * 1024).await {
        Ok(b) => b,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid body").into_response(),
    };

    let result = match (&method, bucket.is_empty(), &key) {
        (&Method::GET, true, _) => list_buckets(&emulator).await,
        (&Method::PUT, false, None) if query == "notification" => put_bucket_notification(&emulator, &bucket, body).await,
        (&Method::PUT, false, None) => create_bucket(&emulator, &bucket).await,
        (&Method::DELETE, false, None) => delete_bucket(&emulator, &bucket).await,
        (&Method::GET, false, None) => list_objects(&emulator, &bucket, &query).await,
        (&Method::PUT, false, Some(k)) if query.starts_with("partNumber=") => upload_part(&emulator, &query, body).await,
        (&Method::POST, false, Some(_)) if query == "uploads" => create_multipart(&emulator, &bucket, key.as_deref().unwrap()).await,
        (&Method::POST, false, Some(_)) if query.starts_with("uploadId=") => complete_multipart(&emulator, &query).await,
        (&Method::PUT, false, Some(k)) => put_object(&emulator, &bucket, k, body).await,
        (&Method::GET, false, Some(k)) => return get_object(&emulator, &bucket, k).await,
        (&Method::HEAD, false, Some(k)) => head_object(&emulator, &bucket, k).await,
        (&Method::DELETE, false, Some(k)) => delete_object(&emulator, &bucket, k).await,
        _ => Err(aws_data_core::error::EmulatorError::InvalidRequest(format!("unsupported object-store request: {method} {path}"))),
    };

    match result {
        Ok(resp) => resp,
        Err(e) => ApiError::from(e).into_xml_response(),
    }
}

type HandlerResult = Result<Response, aws_data_core::error::EmulatorError>;

async fn create_bucket(emulator: &Emulator, bucket: &str) -> HandlerResult {
    emulator.s3.storage.create_bucket(bucket)?;
    Ok(StatusCode::OK.into_response())
}

async fn delete_bucket(emulator: &Emulator, bucket: &str) -> HandlerResult {
    emulator.s3.storage.delete_bucket(bucket)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Registers handlers for `bucket`'s mutation notifications. Accepts a
/// JSON body shaped like the real API's `LambdaFunctionConfigurations`
/// list, trading XML fidelity for something this emulator's other
/// JSON-embedded-in-a-field configs (SNS's `FilterPolicy`, SQS's
/// `RedrivePolicy`) already do.
async fn put_bucket_notification(emulator: &Emulator, bucket: &str, body: Bytes) -> HandlerResult {
    let parsed: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| aws_data_core::error::EmulatorError::InvalidArgument(format!("invalid notification configuration: {e}")))?;
    let configs = parsed["LambdaFunctionConfigurations"].as_array().cloned().unwrap_or_default();

    for cfg in configs {
        let Some(function_arn) = cfg["LambdaFunctionArn"].as_str() else { continue };
        let function_name = function_arn.rsplit(':').next().unwrap_or(function_arn).to_string();
        let events = cfg["Events"].as_array().cloned().unwrap_or_default();
        for event in events {
            let Some(event) = event.as_str() else { continue };
            let event_prefix = event.strip_prefix("s3:").unwrap_or(event).trim_end_matches(":*").to_string();
            emulator
                .fabric
                .register_object_notification(aws_data_core::fabric::ObjectNotificationTarget {
                    bucket: bucket.to_string(),
                    event_prefix,
                    function_name: function_name.clone(),
                })
                .await;
        }
    }

    Ok(StatusCode::OK.into_response())
}

async fn list_buckets(emulator: &Emulator) -> HandlerResult {
    let buckets = emulator.s3.storage.list_buckets()?;
    let entries: String = buckets
        .iter()
        .map(|b| format!("<Bucket><Name>{}</Name><CreationDate>{}</CreationDate></Bucket>", b.name, b.created_at))
        .collect();
    let xml = format!(r#"<?xml version="1.0" encoding="UTF-8"?><ListAllMyBucketsResult><Buckets>{entries}</Buckets></ListAllMyBucketsResult>"#);
    Ok((StatusCode::OK, [("content-type", "application/xml")], xml).into_response())
}

async fn put_object(emulator: &Emulator, bucket: &str, key: &str, body: Bytes) -> HandlerResult {
    let meta = emulator.s3.storage.put_object(bucket, key, &body, None, json!({}))?;
    Ok((StatusCode::OK, [("etag", meta.etag.as_str())]).into_response())
}

async fn get_object(emulator: &Emulator, bucket: &str, key: &str) -> Response {
    match emulator.s3.storage.get_object(bucket, key, None) {
        Ok((meta, bytes)) => (
            StatusCode::OK,
            [("etag", meta.etag.as_str()), ("content-type", meta.content_type.as_deref().unwrap_or("application/octet-stream"))],
            bytes,
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_xml_response(),
    }
}

async fn head_object(emulator: &Emulator, bucket: &str, key: &str) -> HandlerResult {
    let meta = emulator.s3.storage.head_object(bucket, key, None)?;
    Ok((StatusCode::OK, [("etag", meta.etag.as_str()), ("content-length", meta.size.to_string().as_str())]).into_response())
}

async fn delete_object(emulator: &Emulator, bucket: &str, key: &str) -> HandlerResult {
    emulator.s3.storage.delete_object(bucket, key, None)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_objects(emulator: &Emulator, bucket: &str, query: &str) -> HandlerResult {
    let params = crate::adapters::aws_query::parse_query_string(query);
    let prefix = params.get("prefix").map(String::as_str);
    let delimiter = params.get("delimiter").map(String::as_str);
    let page = emulator.s3.storage.list_objects(bucket, prefix, delimiter, 1000)?;
    let contents: String = page
        .objects
        .iter()
        .map(|o| format!("<Contents><Key>{}</Key><Size>{}</Size><ETag>{}</ETag></Contents>", o.key, o.size, o.etag))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult><Name>{bucket}</Name><IsTruncated>{}</IsTruncated>{contents}</ListBucketResult>"#,
        page.is_truncated
    );
    Ok((StatusCode::OK, [("content-type", "application/xml")], xml).into_response())
}

async fn create_multipart(emulator: &Emulator, bucket: &str, key: &str) -> HandlerResult {
    let upload_id = emulator.s3.storage.create_multipart_upload(bucket, key, None)?;
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><InitiateMultipartUploadResult><Bucket>{bucket}</Bucket><Key>{key}</Key><UploadId>{upload_id}</UploadId></InitiateMultipartUploadResult>"#
    );
    Ok((StatusCode::OK, [("content-type", "application/xml")], xml).into_response())
}

async fn upload_part(emulator: &Emulator, query: &str, body: Bytes) -> HandlerResult {
    let params = crate::adapters::aws_query::parse_query_string(query);
    let upload_id = params.get("uploadId").cloned().unwrap_or_default();
    let part_number: u32 = params.get("partNumber").and_then(|s| s.parse().ok()).unwrap_or(1);
    let etag = emulator.s3.storage.upload_part(&upload_id, part_number, &body)?;
    Ok((StatusCode::OK, [("etag", etag.as_str())]).into_response())
}

async fn complete_multipart(emulator: &Emulator, query: &str) -> HandlerResult {
    let params = crate::adapters::aws_query::parse_query_string(query);
    let upload_id = params.get("uploadId").cloned().unwrap_or_default();
    let meta = emulator.s3.storage.complete_multipart_upload(&upload_id)?;
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><CompleteMultipartUploadResult><Bucket>{}</Bucket><Key>{}</Key><ETag>{}</ETag></CompleteMultipartUploadResult>"#,
        meta.bucket, meta.key, meta.etag
    );
    Ok((StatusCode::OK, [("content-type", "application/xml")], xml).into_response())
}
