use serde_json::json;

use crate::util::{api_request, exit_error, read_json_from_file};

pub async fn query(api_url: &str, user_id: &str, text: &str, metadata: Option<&str>) -> i32 {
    let mut body = json!({
        "user_id": user_id,
        "query": text
    });
    if let Some(raw) = metadata {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => exit_error(&format!("Invalid JSON in --metadata: {e}"), None),
        };
        if !value.is_object() {
            exit_error("--metadata must be a JSON object", None);
        }
        body["metadata"] = value;
    }

    api_request(
        api_url,
        reqwest::Method::POST,
        "/v1/coach/query",
        Some(body),
        &[],
    )
    .await
}

pub async fn upload(
    api_url: &str,
    user_id: &str,
    data_type: &str,
    data: Option<&str>,
    data_file: Option<&str>,
) -> i32 {
    let records = match (data, data_file) {
        (Some(raw), _) => match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => exit_error(&format!("Invalid JSON in --data: {e}"), None),
        },
        (None, Some(path)) => match read_json_from_file(path) {
            Ok(v) => v,
            Err(e) => exit_error(&e, None),
        },
        (None, None) => exit_error("either --data or --data-file is required", None),
    };

    let body = json!({
        "user_id": user_id,
        "data_type": data_type,
        "data": records
    });

    api_request(
        api_url,
        reqwest::Method::POST,
        "/v1/coach/upload",
        Some(body),
        &[],
    )
    .await
}
