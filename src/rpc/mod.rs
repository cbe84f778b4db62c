//!
//! Request/response surface for programmatic callers.
//!
//! Two services share one [`GatewayContext`]: the wallet service with wallet,
//! mining and chain-status operations, and the reward service. Each is a
//! [`dispatcher::RpcRegistry`] served over JSON-RPC by [`server::serve`].

/// Startup context and bootstrap
pub mod context;
/// Named-operation registry
pub mod dispatcher;
pub mod reward_service;
/// HTTP transport
pub mod server;
pub mod types;
/// Wallet, mining and chain-status handlers
pub mod wallet_service;

pub use context::{BootstrapError, GatewayContext};
pub use reward_service::RewardService;
pub use wallet_service::WalletService;

use crate::ledger::{ChainStatus, LedgerError};
use serde::Serialize;

/// Chain summary returned by `getInfo` on both services.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NodeInfo {
	pub last_mci: u64,
	pub last_stable_mci: u64,
	pub count_unhandled: u64,
}

/// Last MCI, then last stable MCI, then the unhandled joint count.
pub async fn node_info(chain: &dyn ChainStatus) -> Result<NodeInfo, LedgerError> {
	let last_mci = chain.last_main_chain_index().await?;
	let last_stable_mci = chain.last_stable_mc_index().await?;
	let count_unhandled = chain.unhandled_joints().await?.len() as u64;
	Ok(NodeInfo {
		last_mci,
		last_stable_mci,
		count_unhandled,
	})
}
