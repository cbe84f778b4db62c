//!
//! Process-local mutual exclusion keyed by resource class.
//!
//! Each [`LockKey`] owns one async mutex. Callers acquire a set of keys in a
//! canonical order, so two holders of overlapping key sets cannot deadlock,
//! and release them when the returned [`LockGuard`] is dropped or explicitly
//! unlocked. Dropping covers every exit path, including errors and panics.

use itertools::Itertools;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Shared resources guarded by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
	/// Full enumeration of the wallet's derived addresses.
	EnumerateWalletAddresses,
	/// Composition of a payment from the gateway's own address.
	ComposePayment,
}

/// Held locks. Released exactly once, on `unlock` or drop.
pub struct LockGuard {
	keys: Vec<LockKey>,
	guards: Vec<OwnedMutexGuard<()>>,
}

impl LockGuard {
	#[cfg(test)]
	pub fn keys(&self) -> &[LockKey] {
		&self.keys
	}

	/// Release the locks now instead of at the end of scope.
	pub fn unlock(self) {
		drop(self);
	}
}

impl Drop for LockGuard {
	fn drop(&mut self) {
		// Release in reverse acquisition order.
		while self.guards.pop().is_some() {}
		debug!("Released locks {:?}", self.keys);
	}
}

/// Registry of per-key mutexes.
#[derive(Default)]
pub struct LockGate {
	locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl LockGate {
	pub fn new() -> Self {
		Self::default()
	}

	async fn mutex_for(&self, key: LockKey) -> Arc<Mutex<()>> {
		let mut locks = self.locks.lock().await;
		locks.entry(key).or_default().clone()
	}

	/// Acquire every key, waiting for current holders to release them.
	pub async fn lock(&self, keys: &[LockKey]) -> LockGuard {
		let keys: Vec<LockKey> = keys.iter().copied().sorted().dedup().collect();
		let mut guards = Vec::with_capacity(keys.len());
		for key in &keys {
			let mutex = self.mutex_for(*key).await;
			guards.push(mutex.lock_owned().await);
		}
		debug!("Acquired locks {:?}", keys);
		LockGuard { keys, guards }
	}

	/// Run `body` while holding `keys`.
	///
	/// The guard is handed to the body so it can release early; otherwise it
	/// is released when the body's future completes.
	pub async fn with_lock<F, Fut, T>(&self, keys: &[LockKey], body: F) -> T
	where
		F: FnOnce(LockGuard) -> Fut,
		Fut: Future<Output = T>,
	{
		let guard = self.lock(keys).await;
		body(guard).await
	}
}
