//!
//! In-process ledger backing every collaborator trait.
//!
//! Units, inputs and outputs are kept in three append-only vectors whose
//! positions double as rowids (starting at 1), so the windowing and cursor
//! semantics match a table-backed store. The ledger can be seeded from a JSON
//! snapshot file and grows when payments are composed through it.

use super::*;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Author entry of a snapshot unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotAuthor {
	pub address: String,
	#[serde(default)]
	pub definition: Option<serde_json::Value>,
}

/// Output entry of a snapshot unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotOutput {
	pub address: String,
	pub amount: u64,
	#[serde(default)]
	pub is_spent: bool,
}

/// Unit as stored in a snapshot; rowids follow the order of the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotUnit {
	pub unit: String,
	#[serde(default)]
	pub parents: Vec<String>,
	#[serde(default)]
	pub best_parent: Option<String>,
	#[serde(default)]
	pub authors: Vec<SnapshotAuthor>,
	#[serde(default)]
	pub is_stable: bool,
	#[serde(default)]
	pub is_on_main_chain: bool,
	#[serde(default)]
	pub main_chain_index: Option<u64>,
	#[serde(default)]
	pub level: u64,
	#[serde(default)]
	pub sequence: Sequence,
	#[serde(default)]
	pub pow_type: Option<u8>,
	#[serde(default)]
	pub round_index: Option<u64>,
	#[serde(default)]
	pub timestamp: Option<DateTime<Utc>>,
	#[serde(default)]
	pub inputs: Vec<TransferLeg>,
	#[serde(default)]
	pub outputs: Vec<SnapshotOutput>,
}

impl SnapshotUnit {
	/// A bare unit with the given parents and nothing else.
	pub fn new(unit: impl Into<String>, parents: &[&str]) -> Self {
		let parents: Vec<String> = parents.iter().map(|p| p.to_string()).collect();
		Self {
			unit: unit.into(),
			best_parent: parents.first().cloned(),
			parents,
			authors: Vec::new(),
			is_stable: false,
			is_on_main_chain: false,
			main_chain_index: None,
			level: 0,
			sequence: Sequence::Good,
			pow_type: None,
			round_index: None,
			timestamp: None,
			inputs: Vec::new(),
			outputs: Vec::new(),
		}
	}
}

/// Wallet entry of a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotWallet {
	pub wallet: String,
	#[serde(default)]
	pub addresses: Vec<WalletAddress>,
}

/// Reward figures for one period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PeriodReward {
	pub total_reward: u64,
	pub coin_reward_ratio: f64,
}

/// Serialized form of an [`InMemoryLedger`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
	#[serde(default)]
	pub units: Vec<SnapshotUnit>,
	#[serde(default)]
	pub rounds: Vec<RoundRecord>,
	#[serde(default)]
	pub cycles: Vec<RoundCycle>,
	#[serde(default)]
	pub round_statistics: BTreeMap<u64, RoundStatistics>,
	#[serde(default)]
	pub wallets: Vec<SnapshotWallet>,
	#[serde(default)]
	pub deposit_addresses: BTreeMap<String, String>,
	#[serde(default)]
	pub peers: Vec<PeerInfo>,
	#[serde(default)]
	pub unhandled_joints: Vec<UnhandledJoint>,
	#[serde(default)]
	pub bad_joints: Vec<BadJoint>,
	#[serde(default)]
	pub max_trust_me_mci: Option<u64>,
	#[serde(default)]
	pub rewards: BTreeMap<u64, PeriodReward>,
}

struct InputRow {
	rowid: Rowid,
	unit_idx: usize,
	address: String,
}

struct OutputRow {
	rowid: Rowid,
	unit_idx: usize,
	output_index: u32,
	address: String,
	amount: u64,
	is_spent: bool,
}

#[derive(Default)]
struct LedgerState {
	units: Vec<SnapshotUnit>,
	by_hash: HashMap<String, usize>,
	inputs: Vec<InputRow>,
	outputs: Vec<OutputRow>,
	rounds: Vec<RoundRecord>,
	cycles: Vec<RoundCycle>,
	round_statistics: BTreeMap<u64, RoundStatistics>,
	wallets: Vec<SnapshotWallet>,
	deposit_addresses: BTreeMap<String, String>,
	peers: Vec<PeerInfo>,
	unhandled_joints: Vec<UnhandledJoint>,
	bad_joints: Vec<BadJoint>,
	max_trust_me_mci: Option<u64>,
	rewards: BTreeMap<u64, PeriodReward>,
}

impl LedgerState {
	fn push_unit(&mut self, unit: SnapshotUnit) -> Rowid {
		let unit_idx = self.units.len();
		for input in &unit.inputs {
			self.inputs.push(InputRow {
				rowid: self.inputs.len() as Rowid + 1,
				unit_idx,
				address: input.address.clone(),
			});
		}
		for (output_index, output) in unit.outputs.iter().enumerate() {
			self.outputs.push(OutputRow {
				rowid: self.outputs.len() as Rowid + 1,
				unit_idx,
				output_index: output_index as u32,
				address: output.address.clone(),
				amount: output.amount,
				is_spent: output.is_spent,
			});
		}
		self.by_hash.insert(unit.unit.clone(), unit_idx);
		self.units.push(unit);
		unit_idx as Rowid + 1
	}

	fn record(&self, idx: usize) -> UnitRecord {
		let unit = &self.units[idx];
		UnitRecord {
			unit: unit.unit.clone(),
			rowid: idx as Rowid + 1,
			is_stable: unit.is_stable,
			is_on_main_chain: unit.is_on_main_chain,
			main_chain_index: unit.main_chain_index,
			sequence: unit.sequence,
		}
	}

	fn output_legs(unit: &SnapshotUnit) -> Vec<TransferLeg> {
		unit.outputs
			.iter()
			.map(|o| TransferLeg {
				address: o.address.clone(),
				amount: o.amount,
			})
			.collect()
	}

	fn touches(unit: &SnapshotUnit, addresses: &BTreeSet<&str>) -> bool {
		unit.inputs.iter().any(|i| addresses.contains(i.address.as_str()))
			|| unit.outputs.iter().any(|o| addresses.contains(o.address.as_str()))
	}

	fn balance_of<'a>(&self, addresses: impl IntoIterator<Item = &'a str>) -> Balances {
		let addresses: BTreeSet<&str> = addresses.into_iter().collect();
		let mut base = AssetBalance::default();
		for row in self.outputs.iter().filter(|row| !row.is_spent) {
			let unit = &self.units[row.unit_idx];
			if !addresses.contains(row.address.as_str()) || unit.sequence != Sequence::Good {
				continue;
			}
			if unit.is_stable {
				base.stable = base.stable.saturating_add(row.amount);
			} else {
				base.pending = base.pending.saturating_add(row.amount);
			}
		}
		let mut balances = Balances::new();
		balances.insert(BASE_ASSET.to_string(), base);
		balances
	}

	fn history_entry(&self, idx: usize, mine: &BTreeSet<&str>) -> HistoryEntry {
		let unit = &self.units[idx];
		let spends_mine = unit.inputs.iter().any(|i| mine.contains(i.address.as_str()));
		let to_mine: u64 = unit
			.outputs
			.iter()
			.filter(|o| mine.contains(o.address.as_str()))
			.fold(0u64, |total, o| total.saturating_add(o.amount));
		let to_others: u64 = unit
			.outputs
			.iter()
			.filter(|o| !mine.contains(o.address.as_str()))
			.fold(0u64, |total, o| total.saturating_add(o.amount));
		let (action, amount) = match (unit.sequence, spends_mine) {
			(Sequence::FinalBad, _) => (TransactionAction::Invalid, to_mine.saturating_add(to_others)),
			(_, true) if to_others == 0 => (TransactionAction::Moved, to_mine),
			(_, true) => (TransactionAction::Sent, to_others),
			(_, false) => (TransactionAction::Received, to_mine),
		};
		let my_address = unit
			.outputs
			.iter()
			.map(|o| o.address.as_str())
			.chain(unit.inputs.iter().map(|i| i.address.as_str()))
			.find(|a| mine.contains(a))
			.map(str::to_string);
		let mut payer_addresses: Vec<String> =
			unit.inputs.iter().map(|i| i.address.clone()).collect();
		payer_addresses.dedup();

		HistoryEntry {
			action,
			amount,
			my_address,
			payer_addresses,
			confirmations: u8::from(unit.is_stable),
			unit: unit.unit.clone(),
			fee: 0,
			time: unit.timestamp,
			level: unit.level,
			asset: None,
		}
	}
}

/// Ledger held entirely in memory.
#[derive(Default)]
pub struct InMemoryLedger {
	state: RwLock<LedgerState>,
}

impl InMemoryLedger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Build a ledger from a snapshot, assigning rowids in list order.
	///
	/// Every parent must appear earlier in the list.
	pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
		let mut state = LedgerState {
			rounds: snapshot.rounds,
			cycles: snapshot.cycles,
			round_statistics: snapshot.round_statistics,
			wallets: snapshot.wallets,
			deposit_addresses: snapshot.deposit_addresses,
			peers: snapshot.peers,
			unhandled_joints: snapshot.unhandled_joints,
			bad_joints: snapshot.bad_joints,
			max_trust_me_mci: snapshot.max_trust_me_mci,
			rewards: snapshot.rewards,
			..Default::default()
		};
		for unit in snapshot.units {
			if let Some(missing) = unit.parents.iter().find(|p| !state.by_hash.contains_key(*p)) {
				return Err(LedgerError::UnitNotFound(missing.clone()));
			}
			state.push_unit(unit);
		}
		Ok(Self {
			state: RwLock::new(state),
		})
	}

	/// Load a snapshot file written as JSON.
	pub async fn load(path: &Path) -> Result<Self, LedgerError> {
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			LedgerError::Snapshot(format!("Failed to read snapshot {:?}: {}", path, e))
		})?;
		let snapshot: LedgerSnapshot = serde_json::from_str(&content).map_err(|e| {
			LedgerError::Snapshot(format!("Failed to parse snapshot {:?}: {}", path, e))
		})?;
		info!(
			"Loaded ledger snapshot from {:?}: {} units, {} rounds, {} wallets",
			path,
			snapshot.units.len(),
			snapshot.rounds.len(),
			snapshot.wallets.len()
		);
		Self::from_snapshot(snapshot)
	}

	fn compose_unit_id(from_address: &str, outputs: &[PaymentOutput], rowid: Rowid) -> String {
		let mut hasher = Sha256::new();
		hasher.update(from_address.as_bytes());
		for output in outputs {
			hasher.update(output.address.as_bytes());
			hasher.update(output.amount.to_be_bytes());
		}
		hasher.update(rowid.to_be_bytes());
		STANDARD.encode(hasher.finalize())
	}
}

#[cfg(test)]
impl InMemoryLedger {
	/// Append a unit and return its rowid.
	pub async fn append_unit(&self, unit: SnapshotUnit) -> Rowid {
		self.state.write().await.push_unit(unit)
	}

	/// Flip a unit to stable. Stability never reverts.
	pub async fn mark_stable(&self, unit: &str) -> Result<(), LedgerError> {
		let mut state = self.state.write().await;
		let idx = *state
			.by_hash
			.get(unit)
			.ok_or_else(|| LedgerError::UnitNotFound(unit.to_string()))?;
		state.units[idx].is_stable = true;
		Ok(())
	}

	pub async fn add_wallet(&self, wallet: &str, addresses: Vec<WalletAddress>) {
		self.state.write().await.wallets.push(SnapshotWallet {
			wallet: wallet.to_string(),
			addresses,
		});
	}

	pub async fn add_round(&self, round: RoundRecord, statistics: Option<RoundStatistics>) {
		let mut state = self.state.write().await;
		if let Some(statistics) = statistics {
			state.round_statistics.insert(round.round_index, statistics);
		}
		state.rounds.push(round);
	}

	pub async fn set_reward(&self, period: u64, reward: PeriodReward) {
		self.state.write().await.rewards.insert(period, reward);
	}
}

#[async_trait::async_trait]
impl UnitStore for InMemoryLedger {
	async fn rowid_of(&self, unit: &str) -> Result<Option<Rowid>, LedgerError> {
		let state = self.state.read().await;
		Ok(state.by_hash.get(unit).map(|idx| *idx as Rowid + 1))
	}

	async fn units_before(
		&self,
		anchor: Rowid,
		limit: usize,
	) -> Result<Vec<UnitRecord>, LedgerError> {
		let state = self.state.read().await;
		let end = usize::try_from(anchor.saturating_sub(1))
			.unwrap_or(usize::MAX)
			.min(state.units.len());
		Ok((0..end).rev().take(limit).map(|idx| state.record(idx)).collect())
	}

	async fn units_after(
		&self,
		anchor: Rowid,
		limit: usize,
	) -> Result<Vec<UnitRecord>, LedgerError> {
		let state = self.state.read().await;
		let start = usize::try_from(anchor)
			.unwrap_or(usize::MAX)
			.min(state.units.len());
		Ok((start..state.units.len())
			.take(limit)
			.map(|idx| state.record(idx))
			.collect())
	}

	async fn parent_edges(&self, units: &[String]) -> Result<Vec<ParentEdge>, LedgerError> {
		let state = self.state.read().await;
		let mut edges = Vec::new();
		for child in units {
			let Some(idx) = state.by_hash.get(child) else {
				continue;
			};
			let stored = &state.units[*idx];
			for parent in &stored.parents {
				edges.push(ParentEdge {
					child: child.clone(),
					parent: parent.clone(),
					is_best_parent: stored.best_parent.as_deref() == Some(parent.as_str()),
				});
			}
		}
		Ok(edges)
	}

	async fn stable_among(&self, units: &[String]) -> Result<Vec<String>, LedgerError> {
		let state = self.state.read().await;
		Ok(units
			.iter()
			.filter(|unit| {
				state
					.by_hash
					.get(unit.as_str())
					.is_some_and(|idx| state.units[*idx].is_stable)
			})
			.cloned()
			.collect())
	}

	async fn unit_info(&self, unit: &str) -> Result<Option<UnitInfo>, LedgerError> {
		let state = self.state.read().await;
		Ok(state.by_hash.get(unit).map(|idx| {
			let stored = &state.units[*idx];
			UnitInfo {
				unit: stored.unit.clone(),
				rowid: *idx as Rowid + 1,
				parents: stored.parents.clone(),
				authors: stored.authors.iter().map(|a| a.address.clone()).collect(),
				is_stable: stored.is_stable,
				is_on_main_chain: stored.is_on_main_chain,
				main_chain_index: stored.main_chain_index,
				level: stored.level,
				sequence: stored.sequence,
				pow_type: stored.pow_type,
				round_index: stored.round_index,
				timestamp: stored.timestamp,
				inputs: stored.inputs.clone(),
				outputs: LedgerState::output_legs(stored),
			}
		}))
	}

	async fn unit_count(&self) -> Result<u64, LedgerError> {
		Ok(self.state.read().await.units.len() as u64)
	}
}

#[async_trait::async_trait]
impl ChainStatus for InMemoryLedger {
	async fn last_main_chain_index(&self) -> Result<u64, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.units
			.iter()
			.filter_map(|u| u.main_chain_index)
			.max()
			.unwrap_or(0))
	}

	async fn last_stable_mc_index(&self) -> Result<u64, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.units
			.iter()
			.filter(|u| u.is_stable)
			.filter_map(|u| u.main_chain_index)
			.max()
			.unwrap_or(0))
	}

	async fn max_mci(&self) -> Result<u64, LedgerError> {
		self.last_main_chain_index().await
	}

	async fn max_trust_me_mci(&self) -> Result<u64, LedgerError> {
		let configured = self.state.read().await.max_trust_me_mci;
		match configured {
			Some(mci) => Ok(mci),
			None => self.last_stable_mc_index().await,
		}
	}

	async fn unhandled_joints(&self) -> Result<Vec<UnhandledJoint>, LedgerError> {
		Ok(self.state.read().await.unhandled_joints.clone())
	}

	async fn bad_joints(&self) -> Result<Vec<BadJoint>, LedgerError> {
		Ok(self.state.read().await.bad_joints.clone())
	}

	async fn statistics(&self) -> Result<ExplorerStatistics, LedgerError> {
		let last_mci = self.last_main_chain_index().await?;
		let last_stable_mci = self.last_stable_mc_index().await?;
		let state = self.state.read().await;
		let current_round_index = state.rounds.iter().map(|r| r.round_index).max().unwrap_or(0);
		let (total_mine, total_publish_coin) = state
			.round_statistics
			.values()
			.fold((0, 0), |(mine, coin), s| {
				(mine + s.total_mine, coin + s.total_publish_coin)
			});
		Ok(ExplorerStatistics {
			total_units: state.units.len() as u64,
			stable_units: state.units.iter().filter(|u| u.is_stable).count() as u64,
			last_mci,
			last_stable_mci,
			current_round_index,
			total_mine,
			total_publish_coin,
		})
	}
}

#[async_trait::async_trait]
impl AddressIndex for InMemoryLedger {
	async fn is_known_address(&self, address: &str) -> Result<bool, LedgerError> {
		let state = self.state.read().await;
		let authored = state.units.iter().any(|u| {
			u.authors
				.iter()
				.any(|a| a.address == address && a.definition.is_some())
		});
		Ok(authored
			|| state.inputs.iter().any(|row| row.address == address)
			|| state.outputs.iter().any(|row| row.address == address))
	}

	async fn address_transactions(
		&self,
		address: &str,
		last_inputs_rowid: Option<Rowid>,
		last_outputs_rowid: Option<Rowid>,
		limit: usize,
	) -> Result<Option<TransactionsPage>, LedgerError> {
		let state = self.state.read().await;
		let after_inputs = last_inputs_rowid.unwrap_or(0);
		let after_outputs = last_outputs_rowid.unwrap_or(0);

		let inputs: Vec<&InputRow> = state
			.inputs
			.iter()
			.filter(|row| row.rowid > after_inputs && row.address == address)
			.collect();
		let outputs: Vec<&OutputRow> = state
			.outputs
			.iter()
			.filter(|row| row.rowid > after_outputs && row.address == address)
			.collect();

		let picked: BTreeSet<usize> = inputs
			.iter()
			.map(|row| row.unit_idx)
			.chain(outputs.iter().map(|row| row.unit_idx))
			.collect::<BTreeSet<_>>()
			.into_iter()
			.take(limit)
			.collect();
		if picked.is_empty() {
			return Ok(None);
		}

		let new_last_inputs_rowid = inputs
			.iter()
			.filter(|row| picked.contains(&row.unit_idx))
			.map(|row| row.rowid)
			.max()
			.or(last_inputs_rowid);
		let new_last_outputs_rowid = outputs
			.iter()
			.filter(|row| picked.contains(&row.unit_idx))
			.map(|row| row.rowid)
			.max()
			.or(last_outputs_rowid);

		let transactions = picked
			.iter()
			.map(|idx| {
				let unit = &state.units[*idx];
				(
					unit.unit.clone(),
					AddressTransaction {
						unit: unit.unit.clone(),
						is_stable: unit.is_stable,
						timestamp: unit.timestamp,
						inputs: unit.inputs.clone(),
						outputs: LedgerState::output_legs(unit),
					},
				)
			})
			.collect();
		debug!(
			"Address {} page: {} units, cursors ({:?}, {:?})",
			address,
			picked.len(),
			new_last_inputs_rowid,
			new_last_outputs_rowid
		);

		Ok(Some(TransactionsPage {
			transactions,
			new_last_inputs_rowid,
			new_last_outputs_rowid,
		}))
	}

	async fn unspent_outputs(&self, address: &str) -> Result<Vec<UnspentOutput>, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.outputs
			.iter()
			.filter(|row| row.address == address && !row.is_spent)
			.map(|row| {
				let unit = &state.units[row.unit_idx];
				UnspentOutput {
					unit: unit.unit.clone(),
					output_index: row.output_index,
					amount: row.amount,
					is_stable: unit.is_stable,
				}
			})
			.collect())
	}

	async fn address_balance(&self, address: &str) -> Result<Balances, LedgerError> {
		Ok(self.state.read().await.balance_of([address]))
	}

	async fn address_definition(
		&self,
		address: &str,
	) -> Result<Option<serde_json::Value>, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.units
			.iter()
			.flat_map(|u| u.authors.iter())
			.find(|a| a.address == address && a.definition.is_some())
			.and_then(|a| a.definition.clone()))
	}

	async fn pow_count(&self, address: &str) -> Result<u64, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.units
			.iter()
			.filter(|u| u.pow_type == Some(1) && u.authors.iter().any(|a| a.address == address))
			.count() as u64)
	}

	async fn coinbase_total(&self, address: &str) -> Result<u64, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.outputs
			.iter()
			.filter(|row| row.address == address && state.units[row.unit_idx].pow_type == Some(3))
			.fold(0u64, |total, row| total.saturating_add(row.amount)))
	}
}

#[async_trait::async_trait]
impl RoundOracle for InMemoryLedger {
	async fn current_round_index(&self) -> Result<u64, LedgerError> {
		let state = self.state.read().await;
		state
			.rounds
			.iter()
			.map(|r| r.round_index)
			.max()
			.ok_or_else(|| LedgerError::Backend("no rounds recorded".to_string()))
	}

	async fn difficulty_of_round(&self, round_index: u64) -> Result<u64, LedgerError> {
		let state = self.state.read().await;
		state
			.rounds
			.iter()
			.find(|r| r.round_index == round_index)
			.map(|r| r.difficulty)
			.ok_or(LedgerError::RoundNotFound(round_index))
	}

	async fn statistics_of_round(&self, round_index: u64) -> Result<RoundStatistics, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.round_statistics
			.get(&round_index)
			.copied()
			.unwrap_or_default())
	}

	async fn duration_of_round(&self, round_index: u64) -> Result<Option<i64>, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.rounds
			.iter()
			.find(|r| r.round_index == round_index)
			.and_then(|r| match (r.start_timestamp, r.end_timestamp) {
				(Some(start), Some(end)) => Some((end - start).num_seconds()),
				_ => None,
			}))
	}

	async fn last_timestamp_of_round(
		&self,
		round_index: u64,
	) -> Result<Option<DateTime<Utc>>, LedgerError> {
		let state = self.state.read().await;
		let recorded = state
			.rounds
			.iter()
			.find(|r| r.round_index == round_index)
			.and_then(|r| r.end_timestamp);
		Ok(recorded.or_else(|| {
			state
				.units
				.iter()
				.filter(|u| u.round_index == Some(round_index))
				.filter_map(|u| u.timestamp)
				.max()
		}))
	}

	async fn round_status(&self, round_index: u64) -> Result<Option<RoundStatus>, LedgerError> {
		let state = self.state.read().await;
		let current = state.rounds.iter().map(|r| r.round_index).max();
		Ok(state
			.rounds
			.iter()
			.find(|r| r.round_index == round_index)
			.map(|round| RoundStatus {
				round_index,
				difficulty: round.difficulty,
				pow_count: state
					.units
					.iter()
					.filter(|u| u.round_index == Some(round_index) && u.pow_type == Some(1))
					.count() as u64,
				is_current: current == Some(round_index),
				start_timestamp: round.start_timestamp,
				end_timestamp: round.end_timestamp,
			}))
	}

	async fn rounds(&self) -> Result<Vec<RoundRecord>, LedgerError> {
		Ok(self.state.read().await.rounds.clone())
	}

	async fn cycles(&self) -> Result<Vec<RoundCycle>, LedgerError> {
		Ok(self.state.read().await.cycles.clone())
	}
}

#[async_trait::async_trait]
impl Wallet for InMemoryLedger {
	async fn wallet_ids(&self) -> Result<Vec<String>, LedgerError> {
		let state = self.state.read().await;
		Ok(state.wallets.iter().map(|w| w.wallet.clone()).collect())
	}

	async fn wallet_addresses(&self, wallet: &str) -> Result<Vec<String>, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.wallets
			.iter()
			.filter(|w| w.wallet == wallet)
			.flat_map(|w| w.addresses.iter().map(|a| a.address.clone()))
			.collect())
	}

	async fn all_addresses_with_index(
		&self,
		wallet: &str,
	) -> Result<Vec<WalletAddress>, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.wallets
			.iter()
			.filter(|w| w.wallet == wallet)
			.flat_map(|w| w.addresses.iter().cloned())
			.collect())
	}

	async fn owns_address(&self, address: &str) -> Result<bool, LedgerError> {
		let state = self.state.read().await;
		Ok(state
			.wallets
			.iter()
			.any(|w| w.addresses.iter().any(|a| a.address == address)))
	}

	async fn wallet_balance(&self, wallet: &str) -> Result<Balances, LedgerError> {
		let state = self.state.read().await;
		let addresses: Vec<&str> = state
			.wallets
			.iter()
			.filter(|w| w.wallet == wallet)
			.flat_map(|w| w.addresses.iter().map(|a| a.address.as_str()))
			.collect();
		Ok(state.balance_of(addresses))
	}

	// Commissions are not modelled here, so both balances coincide.
	async fn outputs_balance(&self, wallet: &str) -> Result<Balances, LedgerError> {
		self.wallet_balance(wallet).await
	}

	async fn transaction_history(
		&self,
		query: &HistoryQuery,
	) -> Result<Vec<HistoryEntry>, LedgerError> {
		let state = self.state.read().await;
		let (mine, unit_filter, since_mci, limit): (BTreeSet<&str>, _, _, _) = match query {
			HistoryQuery::Address(address) => {
				(BTreeSet::from([address.as_str()]), None, None, None)
			}
			HistoryQuery::Wallet {
				wallet,
				unit,
				since_mci,
				limit,
			} => (
				state
					.wallets
					.iter()
					.filter(|w| &w.wallet == wallet)
					.flat_map(|w| w.addresses.iter().map(|a| a.address.as_str()))
					.collect(),
				unit.as_deref(),
				*since_mci,
				*limit,
			),
		};

		let entries = (0..state.units.len())
			.rev()
			.filter(|idx| {
				let unit = &state.units[*idx];
				LedgerState::touches(unit, &mine)
					&& unit_filter.is_none_or(|u| u == unit.unit)
					&& since_mci.is_none_or(|mci| unit.main_chain_index.is_some_and(|m| m >= mci))
			})
			.take(limit.unwrap_or(usize::MAX))
			.map(|idx| state.history_entry(idx, &mine))
			.collect();
		Ok(entries)
	}

	async fn deposit_address(&self, address: &str) -> Result<Option<String>, LedgerError> {
		Ok(self.state.read().await.deposit_addresses.get(address).cloned())
	}
}

#[async_trait::async_trait]
impl PaymentComposer for InMemoryLedger {
	async fn send_payment(
		&self,
		from_address: &str,
		outputs: &[PaymentOutput],
	) -> Result<String, LedgerError> {
		let mut state = self.state.write().await;
		let overflow = || LedgerError::AmountOverflow(from_address.to_string());
		let required = outputs
			.iter()
			.try_fold(0u64, |total, o| total.checked_add(o.amount))
			.ok_or_else(overflow)?;

		let mut selected = Vec::new();
		let mut collected = 0u64;
		for (pos, row) in state.outputs.iter().enumerate() {
			if collected >= required {
				break;
			}
			let unit = &state.units[row.unit_idx];
			if row.address == from_address
				&& !row.is_spent
				&& unit.is_stable
				&& unit.sequence == Sequence::Good
			{
				collected = collected.checked_add(row.amount).ok_or_else(overflow)?;
				selected.push(pos);
			}
		}
		if collected < required {
			return Err(LedgerError::NotEnoughFunds(format!(
				"{} requires {} but only {} is spendable",
				from_address, required, collected
			)));
		}

		// The first output to the payer absorbs the change.
		let change = collected - required;
		let mut change_applied = false;
		let mut unit_outputs = Vec::with_capacity(outputs.len());
		for o in outputs {
			let amount = if !change_applied && o.address == from_address {
				change_applied = true;
				o.amount.checked_add(change).ok_or_else(overflow)?
			} else {
				o.amount
			};
			unit_outputs.push(SnapshotOutput {
				address: o.address.clone(),
				amount,
				is_spent: false,
			});
		}

		let mut inputs = Vec::with_capacity(selected.len());
		for pos in selected {
			let row = &mut state.outputs[pos];
			row.is_spent = true;
			inputs.push(TransferLeg {
				address: row.address.clone(),
				amount: row.amount,
			});
			let unit_idx = row.unit_idx;
			let output_index = row.output_index as usize;
			state.units[unit_idx].outputs[output_index].is_spent = true;
		}

		let rowid = state.units.len() as Rowid + 1;
		let unit_id = Self::compose_unit_id(from_address, outputs, rowid);
		let parents: Vec<&str> = state.units.last().map(|u| u.unit.as_str()).into_iter().collect();
		let mut unit = SnapshotUnit::new(unit_id.clone(), &parents);
		unit.authors.push(SnapshotAuthor {
			address: from_address.to_string(),
			definition: None,
		});
		unit.inputs = inputs;
		unit.outputs = unit_outputs;
		unit.timestamp = Some(Utc::now());
		state.push_unit(unit);

		info!("Composed payment unit {} from {}", unit_id, from_address);
		Ok(unit_id)
	}
}

#[async_trait::async_trait]
impl PeerNetwork for InMemoryLedger {
	async fn connections(&self) -> Result<Vec<PeerInfo>, LedgerError> {
		Ok(self.state.read().await.peers.clone())
	}

	async fn online_peers(&self) -> Result<Vec<String>, LedgerError> {
		let state = self.state.read().await;
		Ok(state.peers.iter().map(|p| p.url.clone()).collect())
	}
}

#[async_trait::async_trait]
impl RewardOracle for InMemoryLedger {
	async fn total_reward_by_period(&self, period: u64) -> Result<u64, LedgerError> {
		let state = self.state.read().await;
		state
			.rewards
			.get(&period)
			.map(|r| r.total_reward)
			.ok_or_else(|| LedgerError::Backend(format!("no reward recorded for period {}", period)))
	}

	async fn coin_reward_ratio(&self, period: u64) -> Result<f64, LedgerError> {
		let state = self.state.read().await;
		state
			.rewards
			.get(&period)
			.map(|r| r.coin_reward_ratio)
			.ok_or_else(|| LedgerError::Backend(format!("no reward recorded for period {}", period)))
	}
}
