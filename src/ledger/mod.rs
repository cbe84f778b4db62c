//! Ledger collaborator interfaces.
//!
//! The gateway never owns ledger data. Unit storage, stability computation,
//! rounds, the wallet, payment composition and the peer network all live
//! behind the traits below, and the query layer only reads through them.
//! Every method is async and may fail with a [`LedgerError`] whose message is
//! relayed to clients unchanged.

/// In-process implementation of every collaborator
pub mod in_mem;
/// Data types exchanged with collaborators
mod types;

pub use in_mem::InMemoryLedger;
pub use types::*;

use std::sync::Arc;

/// Read access to the unit graph.
#[async_trait::async_trait]
pub trait UnitStore: Send + Sync {
	/// Resolve a unit identifier to its sequence position.
	async fn rowid_of(&self, unit: &str) -> Result<Option<Rowid>, LedgerError>;

	/// Up to `limit` units with `rowid < anchor`, closest to the anchor first.
	async fn units_before(
		&self,
		anchor: Rowid,
		limit: usize,
	) -> Result<Vec<UnitRecord>, LedgerError>;

	/// Up to `limit` units with `rowid > anchor`, closest to the anchor first.
	async fn units_after(
		&self,
		anchor: Rowid,
		limit: usize,
	) -> Result<Vec<UnitRecord>, LedgerError>;

	/// Parent relationships of the given units.
	async fn parent_edges(&self, units: &[String]) -> Result<Vec<ParentEdge>, LedgerError>;

	/// The subset of `units` the ledger currently marks stable.
	async fn stable_among(&self, units: &[String]) -> Result<Vec<String>, LedgerError>;

	async fn unit_info(&self, unit: &str) -> Result<Option<UnitInfo>, LedgerError>;

	async fn unit_count(&self) -> Result<u64, LedgerError>;
}

/// Main-chain and joint bookkeeping.
#[async_trait::async_trait]
pub trait ChainStatus: Send + Sync {
	async fn last_main_chain_index(&self) -> Result<u64, LedgerError>;

	async fn last_stable_mc_index(&self) -> Result<u64, LedgerError>;

	async fn max_mci(&self) -> Result<u64, LedgerError>;

	async fn max_trust_me_mci(&self) -> Result<u64, LedgerError>;

	async fn unhandled_joints(&self) -> Result<Vec<UnhandledJoint>, LedgerError>;

	async fn bad_joints(&self) -> Result<Vec<BadJoint>, LedgerError>;

	async fn statistics(&self) -> Result<ExplorerStatistics, LedgerError>;
}

/// Per-address reads over the inputs and outputs tables.
#[async_trait::async_trait]
pub trait AddressIndex: Send + Sync {
	/// Whether the address authored a unit with a definition or appears in any input or output.
	async fn is_known_address(&self, address: &str) -> Result<bool, LedgerError>;

	/// Next page of transactions strictly after the two cursors.
	///
	/// `None` signals that the address has no further history.
	async fn address_transactions(
		&self,
		address: &str,
		last_inputs_rowid: Option<Rowid>,
		last_outputs_rowid: Option<Rowid>,
		limit: usize,
	) -> Result<Option<TransactionsPage>, LedgerError>;

	async fn unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, LedgerError>;

	async fn address_balance(&self, address: &str) -> Result<Balances, LedgerError>;

	async fn address_definition(
		&self,
		address: &str,
	) -> Result<Option<serde_json::Value>, LedgerError>;

	/// Number of units the address mined.
	async fn pow_count(&self, address: &str) -> Result<u64, LedgerError>;

	/// Sum of coinbase outputs paid to the address.
	async fn coinbase_total(&self, address: &str) -> Result<u64, LedgerError>;
}

/// Round bookkeeping owned by the consensus collaborator.
#[async_trait::async_trait]
pub trait RoundOracle: Send + Sync {
	async fn current_round_index(&self) -> Result<u64, LedgerError>;

	async fn difficulty_of_round(&self, round_index: u64) -> Result<u64, LedgerError>;

	async fn statistics_of_round(&self, round_index: u64) -> Result<RoundStatistics, LedgerError>;

	/// Duration of a round in seconds.
	async fn duration_of_round(&self, round_index: u64) -> Result<Option<i64>, LedgerError>;

	async fn last_timestamp_of_round(
		&self,
		round_index: u64,
	) -> Result<Option<chrono::DateTime<chrono::Utc>>, LedgerError>;

	async fn round_status(&self, round_index: u64) -> Result<Option<RoundStatus>, LedgerError>;

	async fn rounds(&self) -> Result<Vec<RoundRecord>, LedgerError>;

	async fn cycles(&self) -> Result<Vec<RoundCycle>, LedgerError>;
}

/// Local wallet: key derivation and balance aggregation.
#[async_trait::async_trait]
pub trait Wallet: Send + Sync {
	async fn wallet_ids(&self) -> Result<Vec<String>, LedgerError>;

	async fn wallet_addresses(&self, wallet: &str) -> Result<Vec<String>, LedgerError>;

	/// Every derived address with its derivation index.
	async fn all_addresses_with_index(
		&self,
		wallet: &str,
	) -> Result<Vec<WalletAddress>, LedgerError>;

	async fn owns_address(&self, address: &str) -> Result<bool, LedgerError>;

	async fn wallet_balance(&self, wallet: &str) -> Result<Balances, LedgerError>;

	/// Balance without header and witnessing commissions.
	async fn outputs_balance(&self, wallet: &str) -> Result<Balances, LedgerError>;

	async fn transaction_history(
		&self,
		query: &HistoryQuery,
	) -> Result<Vec<HistoryEntry>, LedgerError>;

	async fn deposit_address(&self, address: &str) -> Result<Option<String>, LedgerError>;
}

/// Composes, signs and broadcasts payments.
#[async_trait::async_trait]
pub trait PaymentComposer: Send + Sync {
	/// Returns the new unit identifier.
	async fn send_payment(
		&self,
		from_address: &str,
		outputs: &[PaymentOutput],
	) -> Result<String, LedgerError>;
}

/// Peer-to-peer layer.
#[async_trait::async_trait]
pub trait PeerNetwork: Send + Sync {
	async fn connections(&self) -> Result<Vec<PeerInfo>, LedgerError>;

	async fn online_peers(&self) -> Result<Vec<String>, LedgerError>;
}

/// Deposit reward calculations.
#[async_trait::async_trait]
pub trait RewardOracle: Send + Sync {
	async fn total_reward_by_period(&self, period: u64) -> Result<u64, LedgerError>;

	async fn coin_reward_ratio(&self, period: u64) -> Result<f64, LedgerError>;
}

/// Handles to every collaborator the gateway talks to.
#[derive(Clone)]
pub struct Collaborators {
	pub units: Arc<dyn UnitStore>,
	pub chain: Arc<dyn ChainStatus>,
	pub addresses: Arc<dyn AddressIndex>,
	pub rounds: Arc<dyn RoundOracle>,
	pub wallet: Arc<dyn Wallet>,
	pub composer: Arc<dyn PaymentComposer>,
	pub network: Arc<dyn PeerNetwork>,
	pub rewards: Arc<dyn RewardOracle>,
}

impl Collaborators {
	/// Route every collaborator to one in-process ledger.
	pub fn in_memory(ledger: Arc<InMemoryLedger>) -> Self {
		Self {
			units: ledger.clone(),
			chain: ledger.clone(),
			addresses: ledger.clone(),
			rounds: ledger.clone(),
			wallet: ledger.clone(),
			composer: ledger.clone(),
			network: ledger.clone(),
			rewards: ledger,
		}
	}
}
