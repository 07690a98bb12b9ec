//! Folio chat CLI: talk to the portfolio assistant from a terminal.
//!
//! This is the entry point for the `folio-chat` binary. Lines typed on stdin
//! are sent as chat messages; replies are printed as they are typed out.

mod input;
mod render;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use folio_chat_client::{
    ApiClient, ChatService, ChatTarget, ClientConfig, Delivery, ObjectId, Persona,
    TungsteniteConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use input::Input;
use render::Renderer;

/// Folio chat CLI - talk to the portfolio assistant.
#[derive(Parser, Debug)]
#[command(name = "folio-chat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base WebSocket URL of the chat service.
    #[arg(long, env = "FOLIO_WS_URL")]
    ws_url: Option<String>,

    /// Base HTTP URL of the API.
    #[arg(long, env = "FOLIO_API_URL")]
    api_url: Option<String>,

    /// Chat with a specific content item instead of the general assistant.
    #[arg(long)]
    object_id: Option<ObjectId>,

    /// Display title of the content item (defaults to its id).
    #[arg(long, requires = "object_id")]
    object_title: Option<String>,

    /// Persona to address (engineer, researcher, speaker, educator).
    #[arg(long)]
    persona: Option<Persona>,

    /// Do not reconnect when the service closes the connection.
    #[arg(long, default_value = "false")]
    no_reconnect: bool,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,
}

impl Args {
    fn config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = ClientConfig::from_env().context("invalid environment configuration")?;
        if let Some(ws_url) = &self.ws_url {
            config.ws_url.clone_from(ws_url);
        }
        if let Some(api_url) = &self.api_url {
            config.api_url.clone_from(api_url);
        }
        if self.no_reconnect {
            config.reconnect_on_close = false;
        }
        Ok(config)
    }

    fn target(&self) -> ChatTarget {
        match &self.object_id {
            Some(id) => {
                let title = self
                    .object_title
                    .clone()
                    .unwrap_or_else(|| id.as_str().to_string());
                ChatTarget::object(id.clone(), title)
            }
            None => ChatTarget::General,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.debug {
        "info,folio_chat=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = args.config()?;
    let target = args.target();
    tracing::info!(ws_url = %config.ws_url, chat_target = ?target, "Starting folio chat");

    let api = ApiClient::from_config(&config);
    let chat = ChatService::spawn(config, Arc::new(TungsteniteConnector), target.clone())
        .context("failed to start chat service")?;

    let stdout = std::io::stdout();
    let color = stdout.is_terminal();
    let mut renderer = Renderer::new(stdout, color);
    renderer.notice(input::HELP)?;

    let mut updates = chat.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut persona = args.persona;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match input::parse(&line) {
                    Input::Empty => {}
                    Input::Quit => break,
                    Input::Help => renderer.notice(input::HELP)?,
                    Input::Clear => {
                        chat.switch_target(target.clone()).await?;
                        renderer.notice("conversation cleared")?;
                    }
                    Input::Health => {
                        let text = match api.health().await {
                            Ok(health) => format!("service {} (version {})", health.status, health.version),
                            Err(e) => format!("health check failed: {e}"),
                        };
                        renderer.notice(&text)?;
                    }
                    Input::Contact => match api.contact_info().await {
                        Ok(contact) => {
                            renderer.notice(&format!("email: {}", contact.email))?;
                            renderer.notice(&format!("linkedin: {}", contact.linkedin))?;
                            renderer.notice(&format!("github: {}", contact.github))?;
                            renderer.notice(&format!("website: {}", contact.website))?;
                        }
                        Err(e) => renderer.notice(&format!("contact lookup failed: {e}"))?,
                    },
                    Input::Persona(choice) => {
                        persona = choice;
                        let name = persona.as_ref().map_or("any persona", Persona::title);
                        renderer.notice(&format!("now asking {name}"))?;
                    }
                    Input::Say(text) => match chat.send_as(text, persona).await? {
                        Delivery::Reconnecting => {
                            renderer.notice("not connected; reconnecting, message not sent")?;
                        }
                        Delivery::Failed => renderer.notice("message could not be sent")?,
                        Delivery::Sent | Delivery::Ignored => {}
                    },
                    Input::Invalid(reason) => renderer.notice(&reason)?,
                }
            }

            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                renderer.render(&snapshot)?;
            }
        }
    }

    // Cleanup: close the connection
    chat.shutdown().await?;

    Ok(())
}
