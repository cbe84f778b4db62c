mod channel;
mod config;
mod gate;
mod ledger;
mod query;
mod rpc;
mod validation;

use futures::future::select_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::channel::ChannelService;
use crate::config::GatewayConfig;
use crate::gate::LockGate;
use crate::ledger::{Collaborators, InMemoryLedger, LedgerError};
use crate::rpc::{BootstrapError, GatewayContext, RewardService, WalletService};

/// Top-level errors that stop the gateway.
#[derive(Debug, thiserror::Error)]
enum GatewayError {
	#[error("Configuration error: {0}")]
	Config(#[from] config::ConfigError),

	#[error("Ledger error: {0}")]
	Ledger(#[from] LedgerError),

	#[error("Bootstrap error: {0}")]
	Bootstrap(#[from] BootstrapError),

	#[error("Event channel error: {0}")]
	Channel(#[from] channel::ChannelError),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Server task failed: {0}")]
	Task(#[from] tokio::task::JoinError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,dag_explorer_gateway=debug"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	if let Err(e) = run().await {
		error!("Gateway stopped: {}", e);
		std::process::exit(1);
	}
}

async fn run() -> Result<(), GatewayError> {
	let config = GatewayConfig::from_env()?;
	info!("Starting explorer gateway");

	let ledger = match &config.snapshot_path {
		Some(path) => InMemoryLedger::load(path).await?,
		None => {
			info!("No ledger snapshot configured, starting empty");
			InMemoryLedger::new()
		}
	};
	let ledger = Collaborators::in_memory(Arc::new(ledger));

	// Wallet cardinality is checked before anything is served.
	let context = GatewayContext::bootstrap(ledger.wallet.as_ref()).await?;
	let gate = Arc::new(LockGate::new());

	let mut servers: Vec<JoinHandle<Result<(), GatewayError>>> = Vec::new();

	let channel_service = ChannelService::new(
		ledger.clone(),
		config.window,
		config.history_page_size,
	);
	let channel_addr = config.channel_addr;
	servers.push(tokio::spawn(async move {
		channel::server::serve(channel_addr, channel_service).await?;
		Ok::<(), GatewayError>(())
	}));

	if config.serve_rpc {
		let registry = Arc::new(WalletService::new(
			context.clone(),
			ledger.clone(),
			gate.clone(),
			config.transaction_history_limit,
		))
		.registry();
		let addr = config.rpc_addr;
		servers.push(tokio::spawn(async move {
			rpc::server::serve(addr, registry).await?;
			Ok::<(), GatewayError>(())
		}));
	}

	if config.serve_reward_rpc {
		let registry = Arc::new(RewardService::new(
			ledger.chain.clone(),
			ledger.rewards.clone(),
		))
		.registry();
		let addr = config.reward_rpc_addr;
		servers.push(tokio::spawn(async move {
			rpc::server::serve(addr, registry).await?;
			Ok::<(), GatewayError>(())
		}));
	}

	// Any server stopping takes the whole gateway down.
	let (finished, _, remaining) = select_all(servers).await;
	for server in remaining {
		server.abort();
	}
	finished??;
	Ok(())
}
