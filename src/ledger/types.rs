//! Types shared between the gateway core and its ledger collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position of a row in one of the append-only ledger tables.
pub type Rowid = u64;

/// Asset key used for the native currency in balance maps.
pub const BASE_ASSET: &str = "base";

/// Sequence status assigned to a unit by the ledger.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Sequence {
    #[default]
    Good,
    TempBad,
    FinalBad,
}

/// A unit as it appears in the explorer graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitRecord {
    /// Content-addressed unit identifier.
    pub unit: String,
    /// Insertion position, strictly increasing.
    pub rowid: Rowid,
    pub is_stable: bool,
    pub is_on_main_chain: bool,
    pub main_chain_index: Option<u64>,
    pub sequence: Sequence,
}

/// Directed relationship from a unit to one of its parents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParentEdge {
    pub child: String,
    pub parent: String,
    pub is_best_parent: bool,
}

/// Amount moved to or from an address inside a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferLeg {
    pub address: String,
    pub amount: u64,
}

/// Full description of a single unit, relayed to clients as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitInfo {
    pub unit: String,
    pub rowid: Rowid,
    pub parents: Vec<String>,
    pub authors: Vec<String>,
    pub is_stable: bool,
    pub is_on_main_chain: bool,
    pub main_chain_index: Option<u64>,
    pub level: u64,
    pub sequence: Sequence,
    pub pow_type: Option<u8>,
    pub round_index: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub inputs: Vec<TransferLeg>,
    pub outputs: Vec<TransferLeg>,
}

/// One transaction in an address history page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddressTransaction {
    pub unit: String,
    pub is_stable: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub inputs: Vec<TransferLeg>,
    pub outputs: Vec<TransferLeg>,
}

/// Raw page returned by the address index.
///
/// The two cursors are the last rowid consumed from the inputs table and the
/// outputs table respectively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionsPage {
    pub transactions: BTreeMap<String, AddressTransaction>,
    pub new_last_inputs_rowid: Option<Rowid>,
    pub new_last_outputs_rowid: Option<Rowid>,
}

/// Unspent output owned by an address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnspentOutput {
    pub unit: String,
    pub output_index: u32,
    pub amount: u64,
    pub is_stable: bool,
}

/// Stable and pending amounts of one asset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetBalance {
    pub stable: u64,
    pub pending: u64,
}

/// Balances keyed by asset, with the native currency under [`BASE_ASSET`].
pub type Balances = BTreeMap<String, AssetBalance>;

/// A round as recorded by the round collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundRecord {
    pub round_index: u64,
    pub difficulty: u64,
    pub seed: Option<String>,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
}

/// A group of consecutive rounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundCycle {
    pub cycle_id: u64,
    pub first_round_index: u64,
    pub last_round_index: u64,
}

/// Aggregates computed by the round collaborator for a finished round.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RoundStatistics {
    pub total_mine: u64,
    pub total_publish_coin: u64,
    pub deposit_ratio: f64,
    pub inflation_ratio: f64,
}

/// Round summary streamed to the visualization client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundStatus {
    pub round_index: u64,
    pub difficulty: u64,
    pub pow_count: u64,
    pub is_current: bool,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
}

/// Network-wide numbers shown on the explorer dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExplorerStatistics {
    pub total_units: u64,
    pub stable_units: u64,
    pub last_mci: u64,
    pub last_stable_mci: u64,
    pub current_round_index: u64,
    pub total_mine: u64,
    pub total_publish_coin: u64,
}

/// Connection to a remote peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub url: String,
    pub is_inbound: bool,
}

/// Joint the ledger rejected permanently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BadJoint {
    pub unit: String,
    pub error: String,
}

/// Joint still waiting for its parents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnhandledJoint {
    pub unit: String,
    pub peer: String,
}

/// Address derived by the wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletAddress {
    pub address: String,
    pub address_index: u32,
    pub is_change: bool,
}

/// Direction of a wallet history entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionAction {
    Received,
    Sent,
    Moved,
    Invalid,
}

/// Entry of a wallet transaction history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub action: TransactionAction,
    pub amount: u64,
    pub my_address: Option<String>,
    #[serde(rename = "arrPayerAddresses")]
    pub payer_addresses: Vec<String>,
    pub confirmations: u8,
    pub unit: String,
    pub fee: u64,
    pub time: Option<DateTime<Utc>>,
    pub level: u64,
    pub asset: Option<String>,
}

/// Filter for a wallet transaction history read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryQuery {
    /// Every transaction touching one address.
    Address(String),
    /// Transactions of a wallet, optionally narrowed down.
    Wallet {
        wallet: String,
        unit: Option<String>,
        since_mci: Option<u64>,
        limit: Option<usize>,
    },
}

/// Payment destination passed to the composer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentOutput {
    pub address: String,
    pub amount: u64,
}

/// Error types reported by ledger collaborators.
///
/// The display text is relayed to clients unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{0}")]
    Backend(String),

    #[error("unit {0} not found")]
    UnitNotFound(String),

    #[error("round {0} not found")]
    RoundNotFound(u64),

    #[error("not enough funds: {0}")]
    NotEnoughFunds(String),

    #[error("payment amounts from {0} overflow")]
    AmountOverflow(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}
