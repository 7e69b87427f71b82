pub mod cli;
pub mod config;

use crate::{
    cli::{Cli, Commands},
    config::{load_config, MonitorConfig},
};
use anyhow::Result;
use clap::Parser;
use clearing_house_connector::{ClearingHouseEvent, ClearingHouseSubscriber, PollingAccountLoader};
use solana_client::nonblocking::rpc_client::RpcClient;
use std::sync::Arc;
use tokio::{
    signal,
    sync::{broadcast::error::RecvError, watch},
};

/// The main entry point for the monitor.
/// This function handles CLI parsing, configuration, and the subscription loop.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let Commands::Run(run_cmd) = cli.command;
    let mut config = load_config_from_cli(&run_cmd)?;
    if !run_cmd.optional_accounts.is_empty() {
        config.monitor.optional_accounts = run_cmd.optional_accounts;
    }
    clearing_house_logger::init(&config.monitor.log)?;
    tracing::info!("Configuration loaded: {:#?}", &config);
    run_monitor(config).await?;

    Ok(())
}

fn load_config_from_cli(run_cmd: &cli::RunCmd) -> Result<MonitorConfig> {
    if let Some(config_path) = &run_cmd.config {
        println!("Loading configuration from '{}'", config_path);
        load_config(config_path)
    } else {
        println!("No config file provided, using default settings.");
        Ok(MonitorConfig::default())
    }
}

/// Subscribes, logs events until Ctrl+C, then tears everything down.
async fn run_monitor(config: MonitorConfig) -> Result<()> {
    let program_id = config.monitor.program_id()?;
    let optional_kinds = config.monitor.optional_kinds()?;

    let rpc_client = Arc::new(RpcClient::new_with_commitment(
        config.connector.solana.rpc_url.clone(),
        config.connector.solana.commitment_config(),
    ));
    let loader = Arc::new(PollingAccountLoader::new(
        rpc_client.clone(),
        config.connector.loader.clone(),
    ));
    let subscriber =
        ClearingHouseSubscriber::new(&config.connector, program_id, rpc_client, loader.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = tokio::spawn(loader.clone().run(shutdown_rx));

    let mut events = subscriber.events();
    if let Err(e) = subscriber.subscribe(optional_kinds).await {
        let _ = shutdown_tx.send(true);
        let _ = poller.await;
        return Err(e.into());
    }
    log_subscription(&subscriber);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event stream lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            signal = signal::ctrl_c() => {
                match signal {
                    Ok(()) => tracing::info!("Received Ctrl+C, initiating graceful shutdown..."),
                    Err(err) => tracing::error!(error = %err, "Failed to listen for shutdown signal."),
                }
                break;
            }
        }
    }

    subscriber.unsubscribe().await;
    let _ = shutdown_tx.send(true);
    poller.await?;
    tracing::info!("Shutdown complete.");
    Ok(())
}

fn log_subscription(subscriber: &ClearingHouseSubscriber) {
    for account in subscriber.tracked_accounts() {
        tracing::info!(address = %account.address, "Tracking {}", account.kind);
    }
    if let Ok(state) = subscriber.get_state_account() {
        tracing::info!(
            admin = %state.admin,
            exchange_paused = state.exchange_paused,
            funding_paused = state.funding_paused,
            "Clearing house state loaded"
        );
    }
}

/// One log line per event; the generic `update` only at debug level.
fn log_event(event: &ClearingHouseEvent) {
    match event {
        ClearingHouseEvent::Update => tracing::debug!("update"),
        ClearingHouseEvent::Error(e) => tracing::warn!("Subscriber error: {}", e),
        ClearingHouseEvent::StateAccountUpdate(state) => tracing::info!(
            exchange_paused = state.exchange_paused,
            funding_paused = state.funding_paused,
            "{}",
            event.name()
        ),
        ClearingHouseEvent::MarketsAccountUpdate(markets) => tracing::info!(
            initialized = markets.markets.iter().filter(|m| m.initialized).count(),
            "{}",
            event.name()
        ),
        ClearingHouseEvent::OrderStateAccountUpdate(order_state) => tracing::info!(
            min_order_quote_asset_amount = %order_state.min_order_quote_asset_amount,
            "{}",
            event.name()
        ),
        ClearingHouseEvent::TradeHistoryAccountUpdate(history) => {
            tracing::info!(head = history.head, "{}", event.name())
        }
        ClearingHouseEvent::DepositHistoryAccountUpdate(history) => {
            tracing::info!(head = history.head, "{}", event.name())
        }
        ClearingHouseEvent::FundingPaymentHistoryAccountUpdate(history) => {
            tracing::info!(head = history.head, "{}", event.name())
        }
        ClearingHouseEvent::FundingRateHistoryAccountUpdate(history) => {
            tracing::info!(head = history.head, "{}", event.name())
        }
        ClearingHouseEvent::ExtendedCurveHistoryAccountUpdate(history) => {
            tracing::info!(head = history.head, "{}", event.name())
        }
        ClearingHouseEvent::LiquidationHistoryAccountUpdate(history) => {
            tracing::info!(head = history.head, "{}", event.name())
        }
    }
}

