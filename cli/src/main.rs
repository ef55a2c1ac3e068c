use clap::{Parser, Subcommand};

mod commands;
mod util;

use commands::context::ContextCommands;

#[derive(Parser)]
#[command(
    name = "vital",
    version,
    about = "Vital Coach CLI for querying the coach, uploading health data, and inspecting routing"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "VITAL_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// User ID for user-scoped commands
    #[arg(long, env = "VITAL_USER_ID")]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Ask the coach a question
    Query {
        /// The question text
        text: String,
        /// Request metadata as a JSON object string
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Upload health records for the user
    Upload {
        /// Data kind: sleep, exercise, nutrition, or biometric
        #[arg(long)]
        data_type: String,
        /// Records as a JSON array string
        #[arg(long, required_unless_present = "data_file")]
        data: Option<String>,
        /// Read records from a JSON file (use '-' for stdin)
        #[arg(long, conflicts_with = "data")]
        data_file: Option<String>,
    },
    /// Session context operations
    Context {
        #[command(subcommand)]
        command: ContextCommands,
    },
    /// List the registered handler roster
    Handlers,
    /// List recent routing decisions
    Routes {
        /// Maximum number of entries to return
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print the interactive API docs URL
    Docs {
        /// Open the docs in a browser
        #[arg(long)]
        open: bool,
    },
}

fn require_user(user_id: Option<String>) -> String {
    user_id.unwrap_or_else(|| {
        util::exit_error(
            "user_id is required for this command",
            Some("Set --user-id or VITAL_USER_ID env var"),
        )
    })
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Query { text, metadata } => {
            let user_id = require_user(cli.user_id);
            commands::coach::query(&cli.api_url, &user_id, &text, metadata.as_deref()).await
        }
        Commands::Upload {
            data_type,
            data,
            data_file,
        } => {
            let user_id = require_user(cli.user_id);
            commands::coach::upload(
                &cli.api_url,
                &user_id,
                &data_type,
                data.as_deref(),
                data_file.as_deref(),
            )
            .await
        }
        Commands::Context { command } => {
            let user_id = require_user(cli.user_id);
            commands::context::run(&cli.api_url, &user_id, command).await
        }
        Commands::Handlers => commands::handlers::run(&cli.api_url).await,
        Commands::Routes { limit } => {
            commands::routes::run(&cli.api_url, cli.user_id.as_deref(), limit).await
        }
        Commands::Docs { open } => commands::docs::run(&cli.api_url, open),
    };

    std::process::exit(code);
}
