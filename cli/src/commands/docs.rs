use serde_json::json;

pub fn run(api_url: &str, open_browser: bool) -> i32 {
    let url = format!("{api_url}/docs");

    if open_browser {
        if let Err(e) = open::that(&url) {
            let err = json!({
                "error": "cli_error",
                "message": format!("Failed to open browser: {e}"),
                "docs_hint": url
            });
            eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
            return 4;
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "docs_url": url })).unwrap()
    );
    0
}
