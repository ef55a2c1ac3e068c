use clap::Subcommand;
use serde_json::json;

use crate::util::{api_request, exit_error};

#[derive(Subcommand)]
pub enum ContextCommands {
    /// Show the user's active conversation topic
    Topic,
    /// Merge metadata into the user's session
    Update {
        /// Metadata as a JSON object string
        #[arg(long)]
        metadata: String,
    },
    /// Forget the user's session (uploads, history, metadata)
    Clear,
}

pub async fn run(api_url: &str, user_id: &str, command: ContextCommands) -> i32 {
    match command {
        ContextCommands::Topic => {
            api_request(
                api_url,
                reqwest::Method::GET,
                &format!("/v1/context/{user_id}/topic"),
                None,
                &[],
            )
            .await
        }
        ContextCommands::Update { metadata } => {
            let value: serde_json::Value = match serde_json::from_str(&metadata) {
                Ok(v) => v,
                Err(e) => exit_error(&format!("Invalid JSON in --metadata: {e}"), None),
            };
            if !value.is_object() {
                exit_error("--metadata must be a JSON object", None);
            }
            let body = json!({ "metadata": value });
            api_request(
                api_url,
                reqwest::Method::PUT,
                &format!("/v1/context/{user_id}"),
                Some(body),
                &[],
            )
            .await
        }
        ContextCommands::Clear => {
            api_request(
                api_url,
                reqwest::Method::DELETE,
                &format!("/v1/context/{user_id}"),
                None,
                &[],
            )
            .await
        }
    }
}
