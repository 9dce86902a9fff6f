use crate::error::ApiError;
use crate::Emulator;
use aws_data_core::codec;
use aws_data_core::error::{EmulatorError, Result};
use aws_data_core::expr::{Names, Values};
use aws_data_core::storage::{CreateTableParams, GsiDefinition, KeySchema};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

pub async fn handle_request(State(emulator): State<Arc<Emulator>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let target = headers.get("x-amz-target").and_then(|h| h.to_str().ok()).unwrap_or("");
    let action = target.rsplit('.').next().unwrap_or(target);
    info!(action, "dynamodb request");

    let result = match action {
        "CreateTable" => create_table(&emulator, body).await,
        "DescribeTable" => describe_table(&emulator, body).await,
        "ListTables" => list_tables(&emulator, body).await,
        "DeleteTable" => delete_table(&emulator, body).await,
        "PutItem" => put_item(&emulator, body).await,
        "GetItem" => get_item(&emulator, body).await,
        "DeleteItem" => delete_item(&emulator, body).await,
        "UpdateItem" => update_item(&emulator, body).await,
        "Query" => query(&emulator, body).await,
        "Scan" => scan(&emulator, body).await,
        "BatchWriteItem" => batch_write_item(&emulator, body).await,
        "BatchGetItem" => batch_get_item(&emulator, body).await,
        _ => Err(EmulatorError::UnknownOperation(action.to_string())),
    };

    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn names_values(body: &Value) -> (Names, Values) {
    let names: Names = body["ExpressionAttributeNames"]
        .as_object()
        .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default();
    let values: Values = body["ExpressionAttributeValues"]
        .as_object()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), codec::from_wire(v))).collect())
        .unwrap_or_default();
    (names, values)
}

fn wire_item(raw: &Value) -> Result<Map<String, Value>> {
    let obj = raw.as_object().ok_or_else(|| EmulatorError::InvalidArgument("expected an item object".into()))?;
    Ok(codec::item_from_wire(obj))
}

async fn create_table(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["TableName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing TableName".into()))?;
    let key_schema_raw: Vec<Value> = serde_json::from_value(body["KeySchema"].clone()).unwrap_or_default();
    let partition_key = key_schema_raw
        .iter()
        .find(|k| k["KeyType"] == "HASH")
        .and_then(|k| k["AttributeName"].as_str())
        .ok_or_else(|| EmulatorError::InvalidArgument("key schema missing HASH key".into()))?
        .to_string();
    let sort_key = key_schema_raw.iter().find(|k| k["KeyType"] == "RANGE").and_then(|k| k["AttributeName"].as_str()).map(str::to_string);

    let gsis = body["GlobalSecondaryIndexes"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|g| {
                    let name = g["IndexName"].as_str()?.to_string();
                    let schema: Vec<Value> = serde_json::from_value(g["KeySchema"].clone()).ok()?;
                    let pk = schema.iter().find(|k| k["KeyType"] == "HASH")?["AttributeName"].as_str()?.to_string();
                    let sk = schema.iter().find(|k| k["KeyType"] == "RANGE").and_then(|k| k["AttributeName"].as_str()).map(str::to_string);
                    Some(GsiDefinition { name, partition_key: pk, sort_key: sk })
                })
                .collect()
        })
        .unwrap_or_default();

    let billing_mode = if body["BillingMode"].as_str() == Some("PAY_PER_REQUEST") || body.get("ProvisionedThroughput").is_none() {
        "PAY_PER_REQUEST".to_string()
    } else {
        "PROVISIONED".to_string()
    };

    let table = emulator.dynamodb.storage.create_table(CreateTableParams {
        name: name.to_string(),
        key_schema: KeySchema { partition_key, sort_key },
        gsis,
        billing_mode,
    })?;

    Ok(json!({
        "TableDescription": {
            "TableName": table.name,
            "TableArn": table.arn,
            "TableStatus": table.status,
            "CreationDateTime": table.created_at,
            "ItemCount": 0,
            "TableSizeBytes": 0,
        }
    }))
}

async fn describe_table(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["TableName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing TableName".into()))?;
    let table = emulator.dynamodb.storage.describe_table(name)?;
    Ok(json!({
        "Table": {
            "TableName": table.name,
            "TableArn": table.arn,
            "TableStatus": table.status,
            "CreationDateTime": table.created_at,
        }
    }))
}

async fn list_tables(emulator: &Emulator, _body: Value) -> Result<Value> {
    Ok(json!({"TableNames": emulator.dynamodb.storage.list_tables()?}))
}

async fn delete_table(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["TableName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing TableName".into()))?;
    emulator.dynamodb.storage.delete_table(name)?;
    Ok(json!({"TableDescription": {"TableName": name, "TableStatus": "DELETING"}}))
}

async fn put_item(emulator: &Emulator, body: Value) -> Result<Value> {
    let table = body["TableName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing TableName".into()))?;
    let item = wire_item(&body["Item"])?;
    let (names, values) = names_values(&body);
    let condition = body["ConditionExpression"].as_str();
    let previous = emulator.dynamodb.storage.put_item(table, item, condition, &names, &values)?;
    match (previous, body["ReturnValues"].as_str()) {
        (Some(prev), Some("ALL_OLD")) => Ok(json!({"Attributes": codec::item_to_wire(&prev)})),
        _ => Ok(json!({})),
    }
}

async fn get_item(emulator: &Emulator, body: Value) -> Result<Value> {
    let table = body["TableName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing TableName".into()))?;
    let key = wire_item(&body["Key"])?;
    let consistent = body["ConsistentRead"].as_bool().unwrap_or(false);
    match emulator.dynamodb.storage.get_item(table, &key, consistent)? {
        Some(item) => Ok(json!({"Item": codec::item_to_wire(&item)})),
        None => Ok(json!({})),
    }
}

async fn delete_item(emulator: &Emulator, body: Value) -> Result<Value> {
    let table = body["TableName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing TableName".into()))?;
    let key = wire_item(&body["Key"])?;
    let (names, values) = names_values(&body);
    let condition = body["ConditionExpression"].as_str();
    let previous = emulator.dynamodb.storage.delete_item(table, &key, condition, &names, &values)?;
    match (previous, body["ReturnValues"].as_str()) {
        (Some(prev), Some("ALL_OLD")) => Ok(json!({"Attributes": codec::item_to_wire(&prev)})),
        _ => Ok(json!({})),
    }
}

async fn update_item(emulator: &Emulator, body: Value) -> Result<Value> {
    let table = body["TableName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing TableName".into()))?;
    let key = wire_item(&body["Key"])?;
    let update_expr = body["UpdateExpression"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing UpdateExpression".into()))?;
    let (names, values) = names_values(&body);
    let condition = body["ConditionExpression"].as_str();
    let updated = emulator.dynamodb.storage.update_item(table, &key, update_expr, condition, &names, &values)?;
    Ok(json!({"Attributes": codec::item_to_wire(&updated)}))
}

async fn query(emulator: &Emulator, body: Value) -> Result<Value> {
    let table = body["TableName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing TableName".into()))?;
    let index_name = body["IndexName"].as_str();
    let (names, values) = names_values(&body);
    let key_cond = body["KeyConditionExpression"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing KeyConditionExpression".into()))?;

    let (pk_placeholder, sort_cond) = split_key_condition(key_cond)?;
    let partition_value = values.get(&pk_placeholder).cloned().ok_or_else(|| EmulatorError::InvalidArgument("missing partition key value".into()))?;

    let filter = body["FilterExpression"].as_str();
    let forward = body["ScanIndexForward"].as_bool().unwrap_or(true);
    let limit = body["Limit"].as_u64().map(|n| n as usize);

    let items = emulator.dynamodb.storage.query(table, index_name, &partition_value, sort_cond.as_deref(), filter, &names, &values, forward, limit)?;
    let wired: Vec<Value> = items.iter().map(|i| Value::Object(codec::item_to_wire(i))).collect();
    Ok(json!({"Items": wired, "Count": wired.len(), "ScannedCount": wired.len()}))
}

async fn scan(emulator: &Emulator, body: Value) -> Result<Value> {
    let table = body["TableName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing TableName".into()))?;
    let (names, values) = names_values(&body);
    let filter = body["FilterExpression"].as_str();
    let limit = body["Limit"].as_u64().map(|n| n as usize);
    let items = emulator.dynamodb.storage.scan(table, filter, &names, &values, limit)?;
    let wired: Vec<Value> = items.iter().map(|i| Value::Object(codec::item_to_wire(i))).collect();
    Ok(json!({"Items": wired, "Count": wired.len(), "ScannedCount": wired.len()}))
}

async fn batch_write_item(emulator: &Emulator, body: Value) -> Result<Value> {
    let requests = body["RequestItems"].as_object().ok_or_else(|| EmulatorError::InvalidArgument("missing RequestItems".into()))?;
    for (table, reqs) in requests {
        let mut puts = Vec::new();
        let mut deletes = Vec::new();
        for req in reqs.as_array().into_iter().flatten() {
            if let Some(put) = req.get("PutRequest") {
                puts.push(wire_item(&put["Item"])?);
            } else if let Some(del) = req.get("DeleteRequest") {
                deletes.push(wire_item(&del["Key"])?);
            }
        }
        emulator.dynamodb.storage.batch_write(table, puts, deletes)?;
    }
    Ok(json!({"UnprocessedItems": {}}))
}

async fn batch_get_item(emulator: &Emulator, body: Value) -> Result<Value> {
    let requests = body["RequestItems"].as_object().ok_or_else(|| EmulatorError::InvalidArgument("missing RequestItems".into()))?;
    let mut responses = Map::new();
    for (table, spec) in requests {
        let keys: Vec<Map<String, Value>> = spec["Keys"].as_array().into_iter().flatten().map(wire_item).collect::<Result<_>>()?;
        let items = emulator.dynamodb.storage.batch_get(table, &keys)?;
        let wired: Vec<Value> = items.iter().map(|i| Value::Object(codec::item_to_wire(i))).collect();
        responses.insert(table.clone(), Value::Array(wired));
    }
    Ok(json!({"Responses": responses, "UnprocessedKeys": {}}))
}

/// Splits `"pk = :p"` or `"pk = :p AND sk > :s"` into the equality
/// placeholder feeding the partition key and the raw sort-key clause
/// (if any) passed straight through to the expression evaluator.
fn split_key_condition(expr: &str) -> Result<(String, Option<String>)> {
    let mut clauses = expr.splitn(2, " AND ");
    let eq = clauses.next().unwrap_or_default();
    let rest = clauses.next().map(str::trim).map(str::to_string);

    let mut eq_parts = eq.splitn(2, '=');
    let _field = eq_parts.next();
    let placeholder = eq_parts.next().ok_or_else(|| EmulatorError::InvalidArgument("malformed KeyConditionExpression".into()))?.trim().to_string();
    Ok((placeholder, rest))
}
