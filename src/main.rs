//! CLI for taskhub
//!
//! Subcommands:
//! - `serve`: run the HTTP API and the realtime gateway until SIGINT or SIGTERM
//! - `issue-token`: print a signed access token for a user id (manual testing)

use std::process::ExitCode;

use clap::Parser;
use taskhub::auth::JwtAuthenticator;
use taskhub::config::load_config;
use taskhub::utils::logging;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "taskhub", version)]
enum Command {
    /// Start the HTTP API and the realtime gateway
    Serve,
    /// Print a signed access token for a user
    IssueToken {
        /// User id placed in the token subject
        #[arg(long)]
        user_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.log.level);

    match cmd {
        Command::Serve => {
            if let Err(e) = taskhub::app::run(settings).await {
                error!("Server failed: {}", e);
                return ExitCode::FAILURE;
            }
            info!("Server stopped gracefully.");
        }
        Command::IssueToken { user_id } => {
            let jwt = JwtAuthenticator::new(
                settings.auth.jwt_secret.as_bytes(),
                settings.auth.token_ttl(),
            );
            match jwt.issue(user_id) {
                Ok(token) => println!("{token}"),
                Err(e) => {
                    error!("Failed to issue token: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}
