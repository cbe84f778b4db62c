//! Deposit reward queries, served on their own listener.

use super::dispatcher::RpcRegistry;
use super::types::*;
use crate::ledger::{ChainStatus, RewardOracle};
use crate::validation::positive_integer;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct RewardService {
	chain: Arc<dyn ChainStatus>,
	rewards: Arc<dyn RewardOracle>,
}

impl RewardService {
	pub fn new(chain: Arc<dyn ChainStatus>, rewards: Arc<dyn RewardOracle>) -> Self {
		Self { chain, rewards }
	}

	pub fn registry(self: Arc<Self>) -> RpcRegistry {
		let mut registry = RpcRegistry::new("reward-rpc");
		registry.expose_method("getInfo", &self, Self::get_info);
		registry.expose_method("getTotalRewardByPeriod", &self, Self::get_total_reward_by_period);
		registry.expose_method("getCoinRewardRatio", &self, Self::get_coin_reward_ratio);
		info!("Reward RPC exposes {} methods", registry.methods().len());
		registry
	}

	fn reward_period(params: &Params) -> Result<u64, RpcError> {
		positive_integer(params.arg(0)).ok_or_else(|| RpcError::validation(INVALID_REWARD_PERIOD))
	}

	async fn get_info(self: Arc<Self>, _params: Params) -> RpcResult {
		let info = super::node_info(self.chain.as_ref()).await?;
		Ok(json!(info))
	}

	async fn get_total_reward_by_period(self: Arc<Self>, params: Params) -> RpcResult {
		let period = Self::reward_period(&params)?;
		Ok(json!(self.rewards.total_reward_by_period(period).await?))
	}

	async fn get_coin_reward_ratio(self: Arc<Self>, params: Params) -> RpcResult {
		let period = Self::reward_period(&params)?;
		Ok(json!(self.rewards.coin_reward_ratio(period).await?))
	}
}
