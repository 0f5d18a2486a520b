use anyhow::Result;
use clap::Parser;
use skillswap_live::{
    api::SkillSwapApi,
    cli::{Args, Command},
    config::Config,
    events::EventName,
    monitoring::setup_metrics,
    realtime::{RealtimeClient, Surfaces},
    tracing_setup::setup_tracing,
    transport::{Transport, WebSocketTransport},
    types::CounterKind,
    ui::{self, TerminalBroadcasts, TerminalCounter, TerminalNotifications},
    validation,
};
use std::sync::Arc;

use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup tracing/logging
    setup_tracing(&args.log_level, args.json_logs)?;

    info!(
        "Starting Skill Swap live client v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = Arc::new(Config::from_args(&args)?);

    match args.command.clone().unwrap_or(Command::Watch) {
        Command::Watch => watch(config).await,
        Command::Suggest { query } => {
            let api = SkillSwapApi::new(&config.api)?;
            let skills = api.search_skills(&query).await?;
            ui::print_suggestions(&config.display, &query, &skills);
            Ok(())
        }
        Command::CheckEmail { email } => {
            let api = SkillSwapApi::new(&config.api)?;
            let availability = api.check_email(&email).await?;
            ui::print_email_availability(&config.display, &email, availability.as_ref());
            Ok(())
        }
        Command::Validate { field, value } => {
            let outcome = validation::check(field, &value);
            ui::print_validation(&config.display, field, &outcome);
            if outcome.is_err() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn watch(config: Arc<Config>) -> Result<()> {
    // Setup metrics server if enabled
    if config.metrics.enabled {
        setup_metrics(config.metrics.port).await?;
        info!("Metrics server started on port {}", config.metrics.port);
    }

    ui::print_startup_banner(&config.display, config.channel.websocket.url.as_str());

    let transport: Arc<dyn Transport> = Arc::new(WebSocketTransport::new(
        "events",
        config.channel.websocket.clone(),
    ));
    let platform_transport = config.channel.platform_websocket().map(|ws| {
        Arc::new(WebSocketTransport::new("platform", ws)) as Arc<dyn Transport>
    });
    let api = Arc::new(SkillSwapApi::new(&config.api)?);

    let display = &config.display;
    let surfaces = Surfaces {
        notifications: Some(Box::new(TerminalNotifications::new(display))),
        pending: Some(Box::new(TerminalCounter::new(CounterKind::Pending, display))),
        active: Some(Box::new(TerminalCounter::new(CounterKind::Active, display))),
        broadcasts: Some(Box::new(TerminalBroadcasts::new(display))),
    };

    let mut client = RealtimeClient::new(&config, transport, platform_transport, api, surfaces);

    let status_display = config.display.clone();
    client
        .channel_mut()
        .on(EventName::ConnectionEstablished, move |event| {
            let id = event.payload["connection_id"].as_str().unwrap_or_default();
            ui::print_connection_status(&status_display, "CONNECTED", &format!("ID: {}", id));
            Ok(())
        });
    let status_display = config.display.clone();
    client
        .channel_mut()
        .on(EventName::ConnectionLost, move |event| {
            let reason = event.payload["reason"].as_str().unwrap_or("connection closed");
            ui::print_connection_status(&status_display, "DISCONNECTED", reason);
            Ok(())
        });

    let handle = client.handle();
    let stop_display = config.display.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ui::print_connection_status(&stop_display, "STOPPING", "Client shutting down");
            if let Err(e) = handle.shutdown() {
                error!("Shutdown request failed: {}", e);
            }
        }
    });

    // Start the client
    info!("Client started. Press Ctrl+C to shutdown...");
    if let Err(e) = client.run().await {
        error!("Realtime client error: {}", e);
        return Err(e.into());
    }

    info!("Client stopped successfully");
    Ok(())
}
