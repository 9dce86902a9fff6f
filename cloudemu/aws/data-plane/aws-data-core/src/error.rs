//! Domain error taxonomy shared by every engine in this crate.
//!
//! Wire-format rendering (XML vs JSON envelopes) is layered on top of
//! this in `aws-control-core::error`; this type only carries the
//! *kind* and a distinguished error name/message pair.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("{0}")]
    NotFound(String, String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("{0}")]
    ConditionalCheckFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed expression: {0}")]
    MalformedExpression(String),

    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    #[error("no such key: {0}")]
    NoSuchKey(String),

    #[error("bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("bucket not empty: {0}")]
    BucketNotEmpty(String),

    #[error("no such bucket policy: {0}")]
    NoSuchBucketPolicy(String),

    #[error("invalid object state: {0}")]
    InvalidObjectState(String),

    #[error("malformed xml: {0}")]
    MalformedXml(String),

    #[error("malformed policy: {0}")]
    MalformedPolicy(String),

    #[error("non-existent queue: {0}")]
    NonExistentQueue(String),

    #[error("receipt handle is invalid: {0}")]
    ReceiptHandleInvalid(String),

    #[error("username already exists: {0}")]
    UsernameExists(String),

    #[error("user not confirmed: {0}")]
    UserNotConfirmed(String),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("execution does not exist: {0}")]
    ExecutionDoesNotExist(String),

    #[error("state machine does not exist: {0}")]
    StateMachineDoesNotExist(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("chaos-injected failure")]
    Chaos,

    #[error("database error: {0}")]
    Database(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EmulatorError {
    /// Distinguished wire error name (AWS `Code` / `__type`).
    pub fn code(&self) -> &'static str {
        match self {
            EmulatorError::NotFound(kind, _) => match kind.as_str() {
                "Queue" => "AWS.SimpleQueueService.NonExistentQueue",
                "Table" => "ResourceNotFoundException",
                "Secret" => "ResourceNotFoundException",
                "StateMachine" => "StateMachineDoesNotExist",
                "Execution" => "ExecutionDoesNotExist",
                "UserPool" | "User" => "ResourceNotFoundException",
                _ => "ResourceNotFoundException",
            },
            EmulatorError::AlreadyExists(_) => "ResourceExistsException",
            EmulatorError::ConditionalCheckFailed(_) => "ConditionalCheckFailedException",
            EmulatorError::InvalidRequest(_) => "InvalidRequestException",
            EmulatorError::InvalidArgument(_) => "InvalidParameterValueException",
            EmulatorError::MalformedExpression(_) => "ValidationException",
            EmulatorError::NoSuchBucket(_) => "NoSuchBucket",
            EmulatorError::NoSuchKey(_) => "NoSuchKey",
            EmulatorError::BucketAlreadyExists(_) => "BucketAlreadyExists",
            EmulatorError::BucketNotEmpty(_) => "BucketNotEmpty",
            EmulatorError::NoSuchBucketPolicy(_) => "NoSuchBucketPolicy",
            EmulatorError::InvalidObjectState(_) => "InvalidObjectState",
            EmulatorError::MalformedXml(_) => "MalformedXML",
            EmulatorError::MalformedPolicy(_) => "MalformedPolicy",
            EmulatorError::NonExistentQueue(_) => "AWS.SimpleQueueService.NonExistentQueue",
            EmulatorError::ReceiptHandleInvalid(_) => "ReceiptHandleIsInvalid",
            EmulatorError::UsernameExists(_) => "UsernameExistsException",
            EmulatorError::UserNotConfirmed(_) => "UserNotConfirmedException",
            EmulatorError::NotAuthorized(_) => "NotAuthorizedException",
            EmulatorError::AccessDenied(_) => "AccessDeniedException",
            EmulatorError::ExecutionDoesNotExist(_) => "ExecutionDoesNotExist",
            EmulatorError::StateMachineDoesNotExist(_) => "StateMachineDoesNotExist",
            EmulatorError::InvalidDefinition(_) => "InvalidDefinition",
            EmulatorError::UnknownOperation(_) => "UnknownOperationException",
            EmulatorError::NotImplemented(_) => "NotImplementedException",
            EmulatorError::Internal(_) | EmulatorError::Database(_) | EmulatorError::Io(_) | EmulatorError::Json(_) => {
                "InternalFailure"
            }
            EmulatorError::Chaos => "InternalFailure",
        }
    }

    pub fn message(&self) -> String {
        match self {
            EmulatorError::NotFound(kind, id) => format!("{} not found: {}", kind, id),
            other => other.to_string(),
        }
    }

    /// True for the category-6 "engine transient" kind the workflow
    /// engine's retry policy is allowed to swallow.
    pub fn is_transient(&self) -> bool {
        matches!(self, EmulatorError::Database(_) | EmulatorError::Io(_) | EmulatorError::Chaos)
    }
}

impl From<rusqlite::Error> for EmulatorError {
    fn from(e: rusqlite::Error) -> Self {
        let msg = e.to_string();
        if msg.contains("UNIQUE constraint") {
            EmulatorError::AlreadyExists(msg)
        } else {
            EmulatorError::Database(msg)
        }
    }
}

pub type Result<T> = std::result::Result<T, EmulatorError>;
