//! Startup context shared by the RPC services.

use crate::ledger::{LedgerError, Wallet};
use tracing::info;

/// Broken wallet assumptions found while starting up. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
	#[error("no wallets")]
	NoWallets,

	#[error("more than 1 wallet")]
	MultipleWallets,

	#[error("no addresses")]
	NoAddresses,

	#[error("more than 1 address")]
	MultipleAddresses,

	#[error("Ledger error during bootstrap: {0}")]
	Ledger(#[from] LedgerError),
}

/// The gateway's single wallet and its single address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayContext {
	wallet_id: String,
	my_address: String,
}

impl GatewayContext {
	pub fn new(wallet_id: impl Into<String>, my_address: impl Into<String>) -> Self {
		Self {
			wallet_id: wallet_id.into(),
			my_address: my_address.into(),
		}
	}

	/// Read the only wallet, then its only address.
	pub async fn bootstrap(wallet: &dyn Wallet) -> Result<Self, BootstrapError> {
		let wallet_id = match wallet.wallet_ids().await?.as_slice() {
			[] => return Err(BootstrapError::NoWallets),
			[only] => only.clone(),
			_ => return Err(BootstrapError::MultipleWallets),
		};
		let my_address = match wallet.wallet_addresses(&wallet_id).await?.as_slice() {
			[] => return Err(BootstrapError::NoAddresses),
			[only] => only.clone(),
			_ => return Err(BootstrapError::MultipleAddresses),
		};
		info!("Serving wallet {} with address {}", wallet_id, my_address);
		Ok(Self::new(wallet_id, my_address))
	}

	pub fn wallet_id(&self) -> &str {
		&self.wallet_id
	}

	pub fn my_address(&self) -> &str {
		&self.my_address
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ledger::{InMemoryLedger, WalletAddress};

	fn address(address: &str, index: u32) -> WalletAddress {
		WalletAddress {
			address: address.to_string(),
			address_index: index,
			is_change: false,
		}
	}

	#[tokio::test]
	async fn single_wallet_single_address() {
		let ledger = InMemoryLedger::new();
		ledger.add_wallet("w1", vec![address("ADDR", 0)]).await;
		let context = GatewayContext::bootstrap(&ledger).await.unwrap();
		assert_eq!(context.wallet_id(), "w1");
		assert_eq!(context.my_address(), "ADDR");
	}

	#[tokio::test]
	async fn cardinality_violations_abort() {
		let ledger = InMemoryLedger::new();
		assert!(matches!(
			GatewayContext::bootstrap(&ledger).await,
			Err(BootstrapError::NoWallets)
		));

		ledger.add_wallet("w1", vec![]).await;
		assert!(matches!(
			GatewayContext::bootstrap(&ledger).await,
			Err(BootstrapError::NoAddresses)
		));

		let ledger = InMemoryLedger::new();
		ledger
			.add_wallet("w1", vec![address("A", 0), address("B", 1)])
			.await;
		let err = GatewayContext::bootstrap(&ledger).await.unwrap_err();
		assert_eq!(err.to_string(), "more than 1 address");

		ledger.add_wallet("w2", vec![address("C", 0)]).await;
		assert!(matches!(
			GatewayContext::bootstrap(&ledger).await,
			Err(BootstrapError::MultipleWallets)
		));
	}
}
