//! Embedded SQLite DDL for every persisted component. Queue and
//! pub/sub message delivery are deliberately absent: those engines are
//! in-memory only (see `crate::queue`, `crate::pubsub`, `crate::eventbus`).

pub const SCHEMA: &str = r#"
-- content-addressed blob fallback for in-memory engines (on-disk
-- engines keep blobs as plain files under data_dir/blobs instead)
CREATE TABLE IF NOT EXISTS blobs (
    hash TEXT PRIMARY KEY,
    data BLOB NOT NULL
);

-- KV engine (component D)
CREATE TABLE IF NOT EXISTS ddb_tables (
    name TEXT PRIMARY KEY,
    arn TEXT NOT NULL,
    key_schema TEXT NOT NULL,
    attribute_definitions TEXT NOT NULL,
    gsis TEXT NOT NULL,
    billing_mode TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ddb_items (
    table_name TEXT NOT NULL,
    pk TEXT NOT NULL,
    sk TEXT NOT NULL,
    item TEXT NOT NULL,
    version_ts INTEGER NOT NULL,
    PRIMARY KEY(table_name, pk, sk)
);
CREATE INDEX IF NOT EXISTS idx_ddb_items_table ON ddb_items(table_name);

-- Object store (component F)
CREATE TABLE IF NOT EXISTS buckets (
    name TEXT PRIMARY KEY,
    region TEXT NOT NULL,
    versioning_enabled INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS objects (
    bucket TEXT NOT NULL,
    key TEXT NOT NULL,
    version_id TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    size INTEGER NOT NULL,
    content_type TEXT,
    etag TEXT NOT NULL,
    is_latest INTEGER NOT NULL DEFAULT 1,
    is_delete_marker INTEGER NOT NULL DEFAULT 0,
    metadata TEXT,
    last_modified TEXT NOT NULL,
    PRIMARY KEY(bucket, key, version_id)
);
CREATE INDEX IF NOT EXISTS idx_objects_bucket_key ON objects(bucket, key);
CREATE INDEX IF NOT EXISTS idx_objects_latest ON objects(bucket, key, is_latest);

CREATE TABLE IF NOT EXISTS multipart_uploads (
    upload_id TEXT PRIMARY KEY,
    bucket TEXT NOT NULL,
    key TEXT NOT NULL,
    content_type TEXT,
    initiated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS multipart_parts (
    upload_id TEXT NOT NULL,
    part_number INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    size INTEGER NOT NULL,
    etag TEXT NOT NULL,
    PRIMARY KEY(upload_id, part_number)
);

-- Secrets store
CREATE TABLE IF NOT EXISTS secrets (
    name TEXT PRIMARY KEY,
    arn TEXT NOT NULL,
    description TEXT,
    current_version_id TEXT,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS secret_versions (
    secret_name TEXT NOT NULL,
    version_id TEXT NOT NULL,
    secret_value TEXT NOT NULL,
    stages TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY(secret_name, version_id)
);

-- Parameter store
CREATE TABLE IF NOT EXISTS parameters (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    type TEXT NOT NULL,
    version INTEGER NOT NULL,
    last_modified TEXT NOT NULL
);

-- Event bus (component G) persisted definitions; in-flight events
-- themselves are never persisted
CREATE TABLE IF NOT EXISTS event_buses (
    name TEXT PRIMARY KEY,
    arn TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS event_rules (
    bus_name TEXT NOT NULL,
    name TEXT NOT NULL,
    event_pattern TEXT,
    schedule_expression TEXT,
    state TEXT NOT NULL,
    arn TEXT NOT NULL,
    PRIMARY KEY(bus_name, name)
);

CREATE TABLE IF NOT EXISTS event_targets (
    bus_name TEXT NOT NULL,
    rule_name TEXT NOT NULL,
    target_id TEXT NOT NULL,
    arn TEXT NOT NULL,
    input_transformer TEXT,
    PRIMARY KEY(bus_name, rule_name, target_id)
);

-- Identity provider (component H)
CREATE TABLE IF NOT EXISTS cognito_user_pools (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    arn TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cognito_groups (
    pool_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    precedence INTEGER,
    PRIMARY KEY(pool_id, name)
);

CREATE TABLE IF NOT EXISTS cognito_users (
    pool_id TEXT NOT NULL,
    username TEXT NOT NULL,
    sub TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    password_salt TEXT NOT NULL,
    status TEXT NOT NULL,
    groups TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    PRIMARY KEY(pool_id, username)
);

CREATE TABLE IF NOT EXISTS cognito_user_attributes (
    pool_id TEXT NOT NULL,
    username TEXT NOT NULL,
    attr_name TEXT NOT NULL,
    attr_value TEXT NOT NULL,
    PRIMARY KEY(pool_id, username, attr_name)
);

-- Workflow engine (component I) definitions and execution history
CREATE TABLE IF NOT EXISTS sf_state_machines (
    name TEXT PRIMARY KEY,
    arn TEXT NOT NULL,
    definition TEXT NOT NULL,
    role_arn TEXT,
    workflow_type TEXT NOT NULL DEFAULT 'STANDARD',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sf_executions (
    arn TEXT PRIMARY KEY,
    state_machine_arn TEXT NOT NULL,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    input TEXT NOT NULL,
    output TEXT,
    error TEXT,
    cause TEXT,
    started_at TEXT NOT NULL,
    stopped_at TEXT,
    history TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_sf_executions_sm ON sf_executions(state_machine_arn);

-- Pub/sub (component G) persisted topic/subscription definitions;
-- message fan-out itself is in-memory only
CREATE TABLE IF NOT EXISTS sns_topics (
    arn TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sns_subscriptions (
    arn TEXT PRIMARY KEY,
    topic_arn TEXT NOT NULL,
    protocol TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    filter_policy TEXT,
    pending_confirmation INTEGER NOT NULL DEFAULT 0
);

-- Function compute runtime (component: functions)
CREATE TABLE IF NOT EXISTS lambda_functions (
    name TEXT PRIMARY KEY,
    arn TEXT NOT NULL,
    runtime TEXT NOT NULL,
    role TEXT NOT NULL,
    handler TEXT NOT NULL,
    code_hash TEXT NOT NULL,
    timeout_secs INTEGER NOT NULL,
    memory_mb INTEGER NOT NULL,
    environment TEXT NOT NULL DEFAULT '{}',
    last_modified TEXT NOT NULL
);

-- IAM stub
CREATE TABLE IF NOT EXISTS aws_iam_roles (
    arn TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    path TEXT NOT NULL,
    assume_role_policy_document TEXT NOT NULL,
    description TEXT,
    created_at INTEGER
);

CREATE TABLE IF NOT EXISTS aws_iam_policies (
    arn TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    path TEXT NOT NULL,
    default_version_id TEXT NOT NULL,
    document TEXT NOT NULL,
    created_at INTEGER
);

CREATE TABLE IF NOT EXISTS aws_iam_users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    arn TEXT NOT NULL,
    path TEXT NOT NULL,
    created_at INTEGER
);

CREATE TABLE IF NOT EXISTS aws_iam_access_keys (
    access_key_id TEXT PRIMARY KEY,
    user_name TEXT NOT NULL,
    secret_access_key TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER
);

CREATE TABLE IF NOT EXISTS aws_iam_role_policy_attachments (
    role_name TEXT NOT NULL,
    policy_arn TEXT NOT NULL,
    created_at INTEGER,
    PRIMARY KEY(role_name, policy_arn)
);

-- API gateway (component K, REST dialect)
CREATE TABLE IF NOT EXISTS aws_api_gateways (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    endpoint_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS aws_api_resources (
    id TEXT PRIMARY KEY,
    api_id TEXT NOT NULL,
    parent_id TEXT,
    path_part TEXT NOT NULL,
    path TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS aws_api_methods (
    api_id TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    http_method TEXT NOT NULL,
    authorization_type TEXT NOT NULL,
    api_key_required BOOLEAN NOT NULL,
    PRIMARY KEY(api_id, resource_id, http_method)
);

CREATE TABLE IF NOT EXISTS aws_api_integrations (
    api_id TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    http_method TEXT NOT NULL,
    function_name TEXT NOT NULL,
    PRIMARY KEY(api_id, resource_id, http_method)
);
"#;
