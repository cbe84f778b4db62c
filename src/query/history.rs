//!
//! Cursor-based pagination over an address's transaction log.
//!
//! Two cursors, one for the inputs table and one for the outputs table, are
//! carried by the client between calls. The server keeps no paging state.

use crate::ledger::{AddressIndex, AddressTransaction, Balances, LedgerError, Rowid, UnspentOutput};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One page of an address history.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
	pub address: String,
	/// `None` once the address has no history past the cursors.
	#[serde(rename = "objTransactions")]
	pub transactions: Option<BTreeMap<String, AddressTransaction>>,
	pub end: bool,
	#[serde(rename = "newLastInputsROWID")]
	pub new_last_inputs_rowid: Option<Rowid>,
	#[serde(rename = "newLastOutputsROWID")]
	pub new_last_outputs_rowid: Option<Rowid>,
}

/// First page of an address plus its balance, unspent outputs and definition.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AddressOverview {
	pub address: String,
	#[serde(rename = "objTransactions")]
	pub transactions: Option<BTreeMap<String, AddressTransaction>>,
	pub unspent: Vec<UnspentOutput>,
	#[serde(rename = "objBalance")]
	pub balance: Balances,
	pub end: bool,
	pub definition: Option<serde_json::Value>,
	#[serde(rename = "newLastInputsROWID")]
	pub new_last_inputs_rowid: Option<Rowid>,
	#[serde(rename = "newLastOutputsROWID")]
	pub new_last_outputs_rowid: Option<Rowid>,
}

#[derive(Clone)]
pub struct AddressHistoryPaginator {
	addresses: Arc<dyn AddressIndex>,
	page_size: usize,
}

impl AddressHistoryPaginator {
	pub fn new(addresses: Arc<dyn AddressIndex>, page_size: usize) -> Self {
		Self {
			addresses,
			page_size,
		}
	}

	/// Next page strictly after the two cursors; `None` cursors start from the beginning.
	///
	/// A page shorter than the page size, or no page at all, ends pagination.
	pub async fn transactions_page(
		&self,
		address: &str,
		last_inputs_rowid: Option<Rowid>,
		last_outputs_rowid: Option<Rowid>,
	) -> Result<HistoryPage, LedgerError> {
		let page = self
			.addresses
			.address_transactions(address, last_inputs_rowid, last_outputs_rowid, self.page_size)
			.await?;

		let page = match page {
			Some(page) => HistoryPage {
				address: address.to_string(),
				end: page.transactions.len() < self.page_size,
				transactions: Some(page.transactions),
				new_last_inputs_rowid: page.new_last_inputs_rowid,
				new_last_outputs_rowid: page.new_last_outputs_rowid,
			},
			None => HistoryPage {
				address: address.to_string(),
				transactions: None,
				end: true,
				new_last_inputs_rowid: last_inputs_rowid,
				new_last_outputs_rowid: last_outputs_rowid,
			},
		};
		debug!(
			"History page for {}: end={}, cursors ({:?}, {:?})",
			address, page.end, page.new_last_inputs_rowid, page.new_last_outputs_rowid
		);
		Ok(page)
	}

	/// Overview of an address, or `None` if the ledger has never seen it.
	pub async fn address_overview(
		&self,
		address: &str,
	) -> Result<Option<AddressOverview>, LedgerError> {
		if !self.addresses.is_known_address(address).await? {
			return Ok(None);
		}
		let page = self.transactions_page(address, None, None).await?;
		let unspent = self.addresses.unspent_outputs(address).await?;
		let balance = self.addresses.address_balance(address).await?;
		let definition = self.addresses.address_definition(address).await?;

		Ok(Some(AddressOverview {
			address: page.address,
			transactions: page.transactions,
			unspent,
			balance,
			end: page.end,
			definition,
			new_last_inputs_rowid: page.new_last_inputs_rowid,
			new_last_outputs_rowid: page.new_last_outputs_rowid,
		}))
	}
}
