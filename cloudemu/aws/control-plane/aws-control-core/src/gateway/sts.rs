//! STS stub (port offset +11): just enough of the query-protocol
//! surface for SDKs that call `GetCallerIdentity`/`AssumeRole` during
//! client construction to get a plausible answer back, not a real
//! temporary-credential broker.

use crate::Emulator;
use crate::adapters::aws_query::parse_query_string;
use axum::{extract::State, response::IntoResponse, routing::any, Router};
use std::sync::Arc;

async fn handle_request(State(emulator): State<Arc<Emulator>>, body: String) -> impl IntoResponse {
    let params = parse_query_string(&body);
    let action = params.get("Action").map(String::as_str).unwrap_or("");
    let account_id = &emulator.config.account_id;

    let body = match action {
        "GetCallerIdentity" => format!(
            r#"<GetCallerIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
    <GetCallerIdentityResult>
        <Arn>arn:aws:iam::{account_id}:root</Arn>
        <UserId>{account_id}</UserId>
        <Account>{account_id}</Account>
    </GetCallerIdentityResult>
</GetCallerIdentityResponse>"#
        ),
        "AssumeRole" => {
            let role_arn = params.get("RoleArn").cloned().unwrap_or_default();
            format!(
                r#"<AssumeRoleResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
    <AssumeRoleResult>
        <Credentials>
            <AccessKeyId>ASIALDKSTUBKEY00000</AccessKeyId>
            <SecretAccessKey>ldkstubsecretaccesskey0000000000000000</SecretAccessKey>
            <SessionToken>ldkstubsessiontoken</SessionToken>
            <Expiration>2099-01-01T00:00:00Z</Expiration>
        </Credentials>
        <AssumedRoleUser>
            <Arn>{role_arn}</Arn>
            <AssumedRoleId>ldkstubrole:session</AssumedRoleId>
        </AssumedRoleUser>
    </AssumeRoleResult>
</AssumeRoleResponse>"#
            )
        }
        _ => format!(
            r#"<ErrorResponse><Error><Code>InvalidAction</Code><Message>Unsupported STS action: {action}</Message></Error></ErrorResponse>"#
        ),
    };

    ([("content-type", "text/xml")], body)
}

pub fn router(emulator: Arc<Emulator>) -> Router {
    let router = Router::new().route("/", any(handle_request)).with_state(emulator.clone());
    crate::middleware::apply(router, emulator)
}
