//! HTTP-facing error wrapper shared by every dialect.
//!
//! `EmulatorError` carries the domain failure; this module only adds
//! the status-code mapping and the wire envelope. JSON-target services
//! (DynamoDB/SQS/SNS/EventBridge/SecretsManager/SSM/Cognito/Lambda/
//! StepFunctions-style `x-amz-target` dispatch) get the AWS JSON 1.1
//! envelope via the blanket `IntoResponse` impl; REST-XML services
//! (S3, and query-protocol callers that still expect XML) call
//! [`ApiError::into_xml_response`] explicitly instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub struct ApiError(pub aws_data_core::error::EmulatorError);

// Re-export for convenience
pub use aws_data_core::error::EmulatorError;

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ApiError {}

impl From<EmulatorError> for ApiError {
    fn from(inner: EmulatorError) -> Self {
        ApiError(inner)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError(EmulatorError::Io(e))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError(EmulatorError::Json(e))
    }
}

impl std::ops::Deref for ApiError {
    type Target = EmulatorError;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

fn status_for(err: &EmulatorError) -> StatusCode {
    match err {
        EmulatorError::NotFound(..)
        | EmulatorError::NoSuchBucket(_)
        | EmulatorError::NoSuchKey(_)
        | EmulatorError::NoSuchBucketPolicy(_)
        | EmulatorError::NonExistentQueue(_)
        | EmulatorError::ExecutionDoesNotExist(_)
        | EmulatorError::StateMachineDoesNotExist(_) => StatusCode::NOT_FOUND,

        EmulatorError::AlreadyExists(_) | EmulatorError::BucketAlreadyExists(_) | EmulatorError::UsernameExists(_) => {
            StatusCode::CONFLICT
        }

        EmulatorError::ConditionalCheckFailed(_) => StatusCode::BAD_REQUEST,
        EmulatorError::BucketNotEmpty(_)
        | EmulatorError::InvalidRequest(_)
        | EmulatorError::InvalidArgument(_)
        | EmulatorError::MalformedExpression(_)
        | EmulatorError::MalformedXml(_)
        | EmulatorError::MalformedPolicy(_)
        | EmulatorError::InvalidObjectState(_)
        | EmulatorError::InvalidDefinition(_)
        | EmulatorError::ReceiptHandleInvalid(_)
        | EmulatorError::UnknownOperation(_)
        | EmulatorError::UserNotConfirmed(_) => StatusCode::BAD_REQUEST,

        EmulatorError::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
        EmulatorError::AccessDenied(_) => StatusCode::FORBIDDEN,
        EmulatorError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        EmulatorError::Chaos => StatusCode::SERVICE_UNAVAILABLE,

        EmulatorError::Internal(_) | EmulatorError::Database(_) | EmulatorError::Io(_) | EmulatorError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl ApiError {
    /// REST-XML error envelope, the dialect S3 and classic query-protocol
    /// callers expect.
    pub fn into_xml_response(self) -> Response {
        let status = status_for(&self.0);
        let code = self.0.code();
        let message = self.0.message();
        let request_id = uuid::Uuid::new_v4().to_string();

        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
    <Code>{}</Code>
    <Message>{}</Message>
    <RequestId>{}</RequestId>
</Error>"#,
            code,
            quick_xml::escape::escape(&message),
            request_id
        );

        (status, [("content-type", "application/xml"), ("x-amz-request-id", &request_id)], body).into_response()
    }
}

impl IntoResponse for ApiError {
    /// AWS JSON 1.1 error envelope, the dialect every `x-amz-target`
    /// service in this emulator speaks.
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = json!({"__type": self.0.code(), "message": self.0.message()});
        (status, Json(body)).into_response()
    }
}
