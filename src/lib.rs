pub mod auth;
pub mod cli;
pub mod config;
pub mod history;
pub mod models;
pub mod policy;
pub mod scheduler;
pub mod session;
pub mod transport;

use auth::AuthToken;
use cli::Args;
use config::ClientConfig;
use log::{ info, warn };
use policy::FallbackPolicy;
use scheduler::PostScheduler;
use session::ChatSession;
use std::error::Error;
use std::sync::Arc;
use transport::ChatClient;
use uuid::Uuid;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = ClientConfig::from(&args);
    let session_id = args.session_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

    info!("--- Client Configuration ---");
    info!("API Base URL: {}", config.api_base_url);
    info!("WebSocket URL: {}", config.ws_url);
    info!("Auth Token: {}", if config.auth_token.is_some() { "set" } else { "not set" });
    info!("Signed Handshake: {}", config.ws_secret.is_some());
    info!("Request Timeout: {:?}", config.request_timeout);
    info!("Connect Timeout: {:?}", config.connect_timeout);
    info!("REST Only: {}", config.rest_only);
    info!("Session ID: {}", session_id);
    info!("----------------------------");

    let token = AuthToken::new(config.auth_token.clone());
    let scheduler = PostScheduler::new(&config, token.clone())?;
    match scheduler.health().await {
        Ok(health) =>
            info!(
                "Backend is {} (version {})",
                health.status,
                health.version.as_deref().unwrap_or("unknown")
            ),
        Err(e) => warn!("Backend health check failed: {}", e),
    }

    let client = Arc::new(ChatClient::new(&config, token)?);
    let policy = if config.rest_only { FallbackPolicy::rest_only() } else { FallbackPolicy::new() };
    let session = ChatSession::new(client, config.request_timeout).with_policy(policy);

    cli::repl::run(session, scheduler, session_id).await
}
