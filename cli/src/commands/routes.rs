use crate::util::api_request;

pub async fn run(api_url: &str, user_id: Option<&str>, limit: Option<u32>) -> i32 {
    let mut query = Vec::new();
    if let Some(u) = user_id {
        query.push(("user_id".to_string(), u.to_string()));
    }
    if let Some(l) = limit {
        query.push(("limit".to_string(), l.to_string()));
    }

    api_request(api_url, reqwest::Method::GET, "/v1/routes", None, &query).await
}
