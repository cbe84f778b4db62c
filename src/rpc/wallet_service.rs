//!
//! Wallet, mining and chain-status operations.
//!
//! Every handler validates its arguments before touching a collaborator, and
//! multi-step handlers run their reads strictly in sequence, stopping at the
//! first failure.

use super::context::GatewayContext;
use super::dispatcher::RpcRegistry;
use super::types::*;
use crate::gate::{LockGate, LockKey};
use crate::ledger::{Collaborators, HistoryQuery, PaymentOutput};
use crate::validation::{
	is_valid_address, is_valid_address_any_case, is_valid_base64_hash, nonnegative_integer,
	positive_integer,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

/// Miner summary returned by `miningStatus`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MiningStatus {
	pub pow_count: u64,
	pub coinbase: u64,
	pub current_round: u64,
	pub max_mci: u64,
	pub difficulty: u64,
	#[serde(rename = "totalMine")]
	pub total_mine: u64,
	#[serde(rename = "totalPublishCoin")]
	pub total_publish_coin: u64,
	#[serde(rename = "depositRatio")]
	pub deposit_ratio: f64,
	#[serde(rename = "inflationRatio")]
	pub inflation_ratio: f64,
}

fn to_value<T: Serialize>(value: &T) -> RpcResult {
	serde_json::to_value(value)
		.map_err(|e| RpcError::InvalidRequest(format!("Failed to encode result: {}", e)))
}

fn to_json_string<T: Serialize>(value: &T) -> RpcResult {
	serde_json::to_string(value)
		.map(Value::String)
		.map_err(|e| RpcError::InvalidRequest(format!("Failed to encode result: {}", e)))
}

/// Handlers of the wallet RPC listener.
pub struct WalletService {
	context: GatewayContext,
	ledger: Collaborators,
	gate: Arc<LockGate>,
	history_limit: usize,
}

impl WalletService {
	pub fn new(
		context: GatewayContext,
		ledger: Collaborators,
		gate: Arc<LockGate>,
		history_limit: usize,
	) -> Self {
		Self {
			context,
			ledger,
			gate,
			history_limit,
		}
	}

	/// Registry exposing every wallet operation.
	pub fn registry(self: Arc<Self>) -> RpcRegistry {
		let mut registry = RpcRegistry::new("wallet-rpc");
		registry.expose_method("getInfo", &self, Self::get_info);
		registry.expose_method("getAllAddress", &self, Self::get_all_address);
		registry.expose_method("checkAddress", &self, Self::check_address);
		registry.expose_method("getBalance", &self, Self::get_balance);
		registry.expose_method("getMainBalance", &self, Self::get_main_balance);
		registry.expose_method("listTransactions", &self, Self::list_transactions);
		registry.expose_method("sendToAddress", &self, Self::send_to_address);
		registry.expose_method("miningStatus", &self, Self::mining_status);
		registry.expose_method("getCycleInfo", &self, Self::get_cycle_info);
		registry.expose_method("getRoundInfo", &self, Self::get_round_info);
		registry.expose_method("getDurationByRoundIndex", &self, Self::get_duration_by_round_index);
		registry.expose_method("getTotalNumOfUnits", &self, Self::get_total_num_of_units);
		registry.expose_method("getUnitInfo", &self, Self::get_unit_info);
		registry.expose_method("getMyAddress", &self, Self::get_my_address);
		registry.expose_method("getPeerList", &self, Self::get_peer_list);
		registry.expose_method("getMaxMci", &self, Self::get_max_mci);
		registry.expose_method("getMaxTrustMeMci", &self, Self::get_max_trust_me_mci);
		registry.expose_method("badJoints", &self, Self::bad_joints);
		registry.expose_method("unhandledJoints", &self, Self::unhandled_joints);
		info!("Wallet RPC exposes {} methods", registry.methods().len());
		registry
	}

	async fn get_info(self: Arc<Self>, _params: Params) -> RpcResult {
		to_value(&super::node_info(self.ledger.chain.as_ref()).await?)
	}

	async fn get_all_address(self: Arc<Self>, params: Params) -> RpcResult {
		let filter = match params.arg(0) {
			Value::Null => None,
			Value::String(s) if s.is_empty() => None,
			Value::String(s) if is_valid_address(s) => Some(s.clone()),
			_ => return Err(RpcError::validation(INVALID_ADDRESS)),
		};

		let wallet = self.ledger.wallet.clone();
		let wallet_id = self.context.wallet_id();
		let addresses = self
			.gate
			.with_lock(&[LockKey::EnumerateWalletAddresses], |guard| async move {
				let addresses = wallet.all_addresses_with_index(wallet_id).await;
				guard.unlock();
				addresses
			})
			.await?;

		match filter {
			Some(address) => {
				let entry = addresses
					.into_iter()
					.find(|a| a.address == address)
					.ok_or_else(|| RpcError::not_found(ADDRESS_NOT_FOUND))?;
				to_value(&entry)
			}
			None => to_value(&addresses),
		}
	}

	async fn check_address(self: Arc<Self>, params: Params) -> RpcResult {
		match params.str_arg(0) {
			Some(address) if is_valid_address(address) => Ok(json!("ok")),
			_ => Err(RpcError::validation(INVALID_ADDRESS)),
		}
	}

	async fn get_balance(self: Arc<Self>, params: Params) -> RpcResult {
		let Some(address) = params.str_arg(0) else {
			let balances = self
				.ledger
				.wallet
				.wallet_balance(self.context.wallet_id())
				.await?;
			return to_value(&balances);
		};
		if !is_valid_address(address) {
			return Err(RpcError::validation(INVALID_ADDRESS));
		}
		if !self.ledger.wallet.owns_address(address).await? {
			return Err(RpcError::not_found(ADDRESS_NOT_FOUND));
		}
		to_value(&self.ledger.addresses.address_balance(address).await?)
	}

	async fn get_main_balance(self: Arc<Self>, _params: Params) -> RpcResult {
		to_value(
			&self
				.ledger
				.wallet
				.outputs_balance(self.context.wallet_id())
				.await?,
		)
	}

	async fn list_transactions(self: Arc<Self>, params: Params) -> RpcResult {
		let query = if let Value::String(address) = params.arg(0) {
			if !is_valid_address(address) {
				return Err(RpcError::validation(INVALID_ADDRESS));
			}
			HistoryQuery::Address(address.clone())
		} else {
			let mut unit = None;
			let mut since_mci = None;
			let mut limit = None;
			match params.named("unit").as_str() {
				Some(u) if is_valid_base64_hash(u) => unit = Some(u.to_string()),
				_ => match nonnegative_integer(params.named("since_mci")) {
					Some(mci) => since_mci = Some(mci),
					None => limit = Some(self.history_limit),
				},
			}
			HistoryQuery::Wallet {
				wallet: self.context.wallet_id().to_string(),
				unit,
				since_mci,
				limit,
			}
		};
		debug!("Reading transaction history {:?}", query);
		to_value(&self.ledger.wallet.transaction_history(&query).await?)
	}

	fn payment_outputs(params: &Params) -> Result<Vec<PaymentOutput>, RpcError> {
		let wrong = || RpcError::validation(WRONG_PARAMETERS);
		let entries = params.arg(0).as_array().filter(|a| !a.is_empty()).ok_or_else(wrong)?;

		let mut outputs = Vec::with_capacity(entries.len());
		let mut invalid = Vec::new();
		let mut total = 0u64;
		for entry in entries {
			let address = entry.get("address").and_then(Value::as_str).ok_or_else(wrong)?;
			let amount = entry
				.get("amount")
				.and_then(positive_integer)
				.ok_or_else(wrong)?;
			total = total.checked_add(amount).ok_or_else(wrong)?;
			if is_valid_address_any_case(address) {
				outputs.push(PaymentOutput {
					address: address.to_uppercase(),
					amount,
				});
			} else {
				invalid.push(address);
			}
		}
		if !invalid.is_empty() {
			return Err(RpcError::Validation(invalid.join(",")));
		}
		Ok(outputs)
	}

	async fn send_to_address(self: Arc<Self>, params: Params) -> RpcResult {
		let requested = Self::payment_outputs(&params)?;
		let my_address = self.context.my_address();

		// Change goes back to the gateway's own address.
		let mut outputs = Vec::with_capacity(requested.len() + 1);
		outputs.push(PaymentOutput {
			address: my_address.to_string(),
			amount: 0,
		});
		outputs.extend(requested);

		let composer = self.ledger.composer.clone();
		let unit = self
			.gate
			.with_lock(&[LockKey::ComposePayment], |guard| async move {
				let unit = composer.send_payment(my_address, &outputs).await;
				guard.unlock();
				unit
			})
			.await?;
		info!("Payment {} sent from {}", unit, my_address);
		Ok(json!("succeed!"))
	}

	async fn mining_status(self: Arc<Self>, _params: Params) -> RpcResult {
		let me = self.context.my_address();
		let pow_count = self.ledger.addresses.pow_count(me).await?;
		let coinbase = self.ledger.addresses.coinbase_total(me).await?;
		let current_round = self.ledger.rounds.current_round_index().await?;
		let max_mci = self.ledger.chain.max_mci().await?;
		let difficulty = self.ledger.rounds.difficulty_of_round(current_round).await?;
		let previous = self
			.ledger
			.rounds
			.statistics_of_round(current_round.saturating_sub(1))
			.await?;

		to_json_string(&MiningStatus {
			pow_count,
			coinbase,
			current_round,
			max_mci,
			difficulty,
			total_mine: previous.total_mine,
			total_publish_coin: previous.total_publish_coin,
			deposit_ratio: previous.deposit_ratio,
			inflation_ratio: previous.inflation_ratio,
		})
	}

	async fn get_cycle_info(self: Arc<Self>, _params: Params) -> RpcResult {
		to_json_string(&self.ledger.rounds.cycles().await?)
	}

	async fn get_round_info(self: Arc<Self>, _params: Params) -> RpcResult {
		to_json_string(&self.ledger.rounds.rounds().await?)
	}

	async fn get_duration_by_round_index(self: Arc<Self>, params: Params) -> RpcResult {
		let round_index =
			positive_integer(params.arg(0)).ok_or_else(|| RpcError::validation(INVALID_ROUND_INDEX))?;
		to_value(&self.ledger.rounds.duration_of_round(round_index).await?)
	}

	async fn get_total_num_of_units(self: Arc<Self>, _params: Params) -> RpcResult {
		Ok(json!(self.ledger.units.unit_count().await?))
	}

	async fn get_unit_info(self: Arc<Self>, params: Params) -> RpcResult {
		let unit = params
			.str_arg(0)
			.ok_or_else(|| RpcError::validation(WRONG_PARAMETERS))?;
		match self.ledger.units.unit_info(unit).await? {
			Some(info) => to_json_string(&info),
			None => Err(RpcError::not_found(UNIT_NOT_FOUND)),
		}
	}

	async fn get_my_address(self: Arc<Self>, _params: Params) -> RpcResult {
		let me = self.context.my_address();
		let mut result = vec![json!({ "Address": me })];
		if let Some(deposit) = self.ledger.wallet.deposit_address(me).await? {
			result.push(json!({ "DepositAddress": deposit }));
		}
		Ok(Value::Array(result))
	}

	async fn get_peer_list(self: Arc<Self>, _params: Params) -> RpcResult {
		to_value(&self.ledger.network.connections().await?)
	}

	async fn get_max_mci(self: Arc<Self>, _params: Params) -> RpcResult {
		Ok(json!(self.ledger.chain.max_mci().await?))
	}

	async fn get_max_trust_me_mci(self: Arc<Self>, _params: Params) -> RpcResult {
		Ok(json!(self.ledger.chain.max_trust_me_mci().await?))
	}

	async fn bad_joints(self: Arc<Self>, _params: Params) -> RpcResult {
		let joints = self.ledger.chain.bad_joints().await?;
		if joints.is_empty() {
			return Ok(json!("Not bad Joints"));
		}
		to_json_string(&joints)
	}

	async fn unhandled_joints(self: Arc<Self>, _params: Params) -> RpcResult {
		let joints = self.ledger.chain.unhandled_joints().await?;
		if joints.is_empty() {
			return Ok(json!("No unhandled Joints"));
		}
		to_json_string(&joints)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ledger::in_mem::{SnapshotOutput, SnapshotUnit};
	use crate::ledger::{
		AddressIndex, Balances, HistoryEntry, InMemoryLedger, LedgerError, RoundRecord, RoundStatistics,
		Wallet, WalletAddress,
	};
	use crate::validation::chash::chash160;
	use std::time::Duration;
	use tokio::sync::Mutex;
	use tokio::time::{Instant, sleep};

	struct Fixture {
		ledger: Arc<InMemoryLedger>,
		registry: RpcRegistry,
		me: String,
	}

	async fn fixture() -> Fixture {
		let me = chash160(b"gateway");
		let ledger = Arc::new(InMemoryLedger::new());
		ledger
			.add_wallet(
				"wallet-1",
				vec![WalletAddress {
					address: me.clone(),
					address_index: 0,
					is_change: false,
				}],
			)
			.await;
		let mut funding = SnapshotUnit::new("funding", &[]);
		funding.is_stable = true;
		funding.main_chain_index = Some(3);
		funding.outputs.push(SnapshotOutput {
			address: me.clone(),
			amount: 500,
			is_spent: false,
		});
		ledger.append_unit(funding).await;

		let context = GatewayContext::bootstrap(ledger.as_ref()).await.unwrap();
		let service = Arc::new(WalletService::new(
			context,
			Collaborators::in_memory(ledger.clone()),
			Arc::new(LockGate::new()),
			200,
		));
		Fixture {
			ledger,
			registry: service.registry(),
			me,
		}
	}

	fn args(values: Vec<Value>) -> Params {
		Params::positional(values)
	}

	#[tokio::test]
	async fn check_address_validates_checksum() {
		let f = fixture().await;
		assert_eq!(
			f.registry
				.call("checkAddress", args(vec![json!("not-a-real-address")]))
				.await,
			Err(RpcError::validation(INVALID_ADDRESS))
		);
		assert_eq!(
			f.registry
				.call("checkAddress", args(vec![json!(chash160(b"someone"))]))
				.await,
			Ok(json!("ok"))
		);
		assert_eq!(
			f.registry.call("checkAddress", Params::default()).await,
			Err(RpcError::validation(INVALID_ADDRESS))
		);
	}

	#[tokio::test]
	async fn balance_distinguishes_invalid_and_foreign_addresses() {
		let f = fixture().await;
		assert_eq!(
			f.registry
				.call("getBalance", args(vec![json!("garbage")]))
				.await,
			Err(RpcError::validation(INVALID_ADDRESS))
		);
		assert_eq!(
			f.registry
				.call("getBalance", args(vec![json!(chash160(b"stranger"))]))
				.await,
			Err(RpcError::not_found(ADDRESS_NOT_FOUND))
		);

		let own = f
			.registry
			.call("getBalance", args(vec![json!(f.me)]))
			.await
			.unwrap();
		assert_eq!(own, json!({"base": {"stable": 500, "pending": 0}}));

		let wallet = f.registry.call("getBalance", Params::default()).await.unwrap();
		assert_eq!(wallet, own);
	}

	#[tokio::test]
	async fn all_address_filters_by_owned_address() {
		let f = fixture().await;
		let all = f.registry.call("getAllAddress", Params::default()).await.unwrap();
		assert_eq!(all.as_array().unwrap().len(), 1);

		let one = f
			.registry
			.call("getAllAddress", args(vec![json!(f.me)]))
			.await
			.unwrap();
		assert_eq!(one["address"], json!(f.me));

		assert_eq!(
			f.registry
				.call("getAllAddress", args(vec![json!(chash160(b"other"))]))
				.await,
			Err(RpcError::not_found(ADDRESS_NOT_FOUND))
		);
		assert_eq!(
			f.registry
				.call("getAllAddress", args(vec![json!("bogus")]))
				.await,
			Err(RpcError::validation(INVALID_ADDRESS))
		);
	}

	#[tokio::test]
	async fn send_to_address_validates_and_composes() {
		let f = fixture().await;
		let payee = chash160(b"payee");

		for bad in [
			json!([]),
			json!("x"),
			json!([{"address": payee, "amount": 0}]),
			json!([{"address": payee}]),
		] {
			assert_eq!(
				f.registry.call("sendToAddress", args(vec![bad])).await,
				Err(RpcError::validation(WRONG_PARAMETERS))
			);
		}

		let invalid = f
			.registry
			.call(
				"sendToAddress",
				args(vec![json!([
					{"address": "BAD1", "amount": 1},
					{"address": payee, "amount": 1},
					{"address": "BAD2", "amount": 1}
				])]),
			)
			.await;
		assert_eq!(invalid, Err(RpcError::Validation("BAD1,BAD2".to_string())));

		let sent = f
			.registry
			.call(
				"sendToAddress",
				args(vec![json!([{"address": payee.to_lowercase(), "amount": 120}])]),
			)
			.await;
		assert_eq!(sent, Ok(json!("succeed!")));
		assert_eq!(f.ledger.address_balance(&payee).await.unwrap()["base"].pending, 120);
		assert_eq!(f.ledger.address_balance(&f.me).await.unwrap()["base"].pending, 380);

		let broke = f
			.registry
			.call("sendToAddress", args(vec![json!([{"address": payee, "amount": 10_000}])]))
			.await;
		assert!(matches!(broke, Err(RpcError::Dependency(LedgerError::NotEnoughFunds(_)))));
	}

	#[tokio::test]
	async fn send_to_address_rejects_amounts_that_overflow() {
		let f = fixture().await;
		let first = chash160(b"first");
		let second = chash160(b"second");

		let outcome = f
			.registry
			.call(
				"sendToAddress",
				args(vec![json!([
					{"address": first, "amount": u64::MAX},
					{"address": second, "amount": 2}
				])]),
			)
			.await;
		assert_eq!(outcome, Err(RpcError::validation(WRONG_PARAMETERS)));

		for address in [&first, &second] {
			let balance = f.ledger.address_balance(address).await.unwrap();
			assert_eq!(balance["base"].stable, 0);
			assert_eq!(balance["base"].pending, 0);
		}
		let own = f.ledger.address_balance(&f.me).await.unwrap();
		assert_eq!(own["base"].stable, 500);
		assert_eq!(own["base"].pending, 0);
	}

	#[tokio::test]
	async fn mining_status_runs_the_full_chain() {
		let f = fixture().await;
		// No rounds yet: the chain stops at the round lookup.
		assert_eq!(
			f.registry.call("miningStatus", Params::default()).await,
			Err(RpcError::Dependency(LedgerError::Backend(
				"no rounds recorded".to_string()
			)))
		);

		f.ledger
			.add_round(
				RoundRecord {
					round_index: 1,
					difficulty: 3,
					seed: None,
					start_timestamp: None,
					end_timestamp: None,
				},
				Some(RoundStatistics {
					total_mine: 8,
					total_publish_coin: 900,
					deposit_ratio: 0.5,
					inflation_ratio: 0.1,
				}),
			)
			.await;
		f.ledger
			.add_round(
				RoundRecord {
					round_index: 2,
					difficulty: 4,
					seed: None,
					start_timestamp: None,
					end_timestamp: None,
				},
				None,
			)
			.await;

		let status = f.registry.call("miningStatus", Params::default()).await.unwrap();
		let status: Value = serde_json::from_str(status.as_str().unwrap()).unwrap();
		assert_eq!(status["current_round"], json!(2));
		assert_eq!(status["difficulty"], json!(4));
		assert_eq!(status["max_mci"], json!(3));
		assert_eq!(status["totalMine"], json!(8));
		assert_eq!(status["totalPublishCoin"], json!(900));
		assert_eq!(status["pow_count"], json!(0));
	}

	#[tokio::test]
	async fn unit_and_joint_queries() {
		let f = fixture().await;
		assert_eq!(
			f.registry
				.call("getUnitInfo", args(vec![json!("missing")]))
				.await,
			Err(RpcError::not_found(UNIT_NOT_FOUND))
		);
		let info = f
			.registry
			.call("getUnitInfo", args(vec![json!("funding")]))
			.await
			.unwrap();
		assert!(info.as_str().unwrap().contains("\"unit\":\"funding\""));

		assert_eq!(
			f.registry.call("badJoints", Params::default()).await,
			Ok(json!("Not bad Joints"))
		);
		assert_eq!(
			f.registry.call("unhandledJoints", Params::default()).await,
			Ok(json!("No unhandled Joints"))
		);
		assert_eq!(
			f.registry.call("getTotalNumOfUnits", Params::default()).await,
			Ok(json!(1))
		);
		assert_eq!(
			f.registry.call("getMyAddress", Params::default()).await,
			Ok(json!([{"Address": f.me}]))
		);
		assert_eq!(
			f.registry
				.call("getDurationByRoundIndex", args(vec![json!(0)]))
				.await,
			Err(RpcError::validation(INVALID_ROUND_INDEX))
		);
		assert_eq!(
			f.registry.call("getInfo", Params::default()).await,
			Ok(json!({"last_mci": 3, "last_stable_mci": 3, "count_unhandled": 0}))
		);
	}

	#[tokio::test]
	async fn list_transactions_shapes_the_query() {
		let f = fixture().await;
		assert_eq!(
			f.registry
				.call("listTransactions", args(vec![json!("nope")]))
				.await,
			Err(RpcError::validation(INVALID_ADDRESS))
		);
		let by_address = f
			.registry
			.call("listTransactions", args(vec![json!(f.me)]))
			.await
			.unwrap();
		assert_eq!(by_address[0]["action"], json!("received"));
		assert_eq!(by_address[0]["amount"], json!(500));

		let named: Params = serde_json::from_value(json!({"since_mci": 4})).unwrap();
		let since = f.registry.call("listTransactions", named).await.unwrap();
		assert!(since.as_array().unwrap().is_empty());
	}

	/// Wallet whose address enumeration records when it runs.
	struct ProbeWallet {
		inner: Arc<InMemoryLedger>,
		spans: Mutex<Vec<(Instant, Instant)>>,
	}

	#[async_trait::async_trait]
	impl Wallet for ProbeWallet {
		async fn wallet_ids(&self) -> Result<Vec<String>, LedgerError> {
			self.inner.wallet_ids().await
		}

		async fn wallet_addresses(&self, wallet: &str) -> Result<Vec<String>, LedgerError> {
			self.inner.wallet_addresses(wallet).await
		}

		async fn all_addresses_with_index(
			&self,
			wallet: &str,
		) -> Result<Vec<WalletAddress>, LedgerError> {
			let start = Instant::now();
			sleep(Duration::from_millis(20)).await;
			let result = self.inner.all_addresses_with_index(wallet).await;
			self.spans.lock().await.push((start, Instant::now()));
			result
		}

		async fn owns_address(&self, address: &str) -> Result<bool, LedgerError> {
			self.inner.owns_address(address).await
		}

		async fn wallet_balance(&self, wallet: &str) -> Result<Balances, LedgerError> {
			self.inner.wallet_balance(wallet).await
		}

		async fn outputs_balance(&self, wallet: &str) -> Result<Balances, LedgerError> {
			self.inner.outputs_balance(wallet).await
		}

		async fn transaction_history(
			&self,
			query: &HistoryQuery,
		) -> Result<Vec<HistoryEntry>, LedgerError> {
			self.inner.transaction_history(query).await
		}

		async fn deposit_address(&self, address: &str) -> Result<Option<String>, LedgerError> {
			self.inner.deposit_address(address).await
		}
	}

	#[tokio::test]
	async fn concurrent_address_enumeration_never_overlaps() {
		let f = fixture().await;
		let probe = Arc::new(ProbeWallet {
			inner: f.ledger.clone(),
			spans: Mutex::new(Vec::new()),
		});
		let mut ledger = Collaborators::in_memory(f.ledger.clone());
		ledger.wallet = probe.clone();
		let service = Arc::new(WalletService::new(
			GatewayContext::new("wallet-1", f.me.clone()),
			ledger,
			Arc::new(LockGate::new()),
			200,
		));
		let registry = Arc::new(service.registry());

		let calls: Vec<_> = (0..2)
			.map(|_| {
				let registry = registry.clone();
				tokio::spawn(async move { registry.call("getAllAddress", Params::default()).await })
			})
			.collect();
		for call in calls {
			assert!(call.await.unwrap().is_ok());
		}

		let mut spans = probe.spans.lock().await.clone();
		spans.sort();
		assert_eq!(spans.len(), 2);
		assert!(spans[0].1 <= spans[1].0, "enumerations overlapped: {:?}", spans);
	}
}
