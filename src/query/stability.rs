//!
//! Stability refresh for navigation reads.
//!
//! Clients keep a set of units they still render as tentative. Before every
//! `next`, `prev` or `new` page is computed, the subset of that set the ledger
//! now marks stable is resolved so already-drawn nodes can be flipped in place.

use super::window::{Window, WindowedQueryEngine};
use crate::ledger::{LedgerError, Rowid, UnitStore};
use serde::Serialize;
use std::sync::Arc;

/// Resolves tentative units that have become stable.
#[derive(Clone)]
pub struct StabilityRefresh {
	units: Arc<dyn UnitStore>,
}

impl StabilityRefresh {
	pub fn new(units: Arc<dyn UnitStore>) -> Self {
		Self { units }
	}

	/// Subset of `previously_tentative` now marked stable, in no particular order.
	pub async fn units_that_became_stable(
		&self,
		previously_tentative: &[String],
	) -> Result<Vec<String>, LedgerError> {
		if previously_tentative.is_empty() {
			return Ok(Vec::new());
		}
		self.units.stable_among(previously_tentative).await
	}
}

/// Direction of a navigation read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
	/// Older units, strictly before the oldest displayed rowid.
	Older { last: Rowid },
	/// Newer units, strictly after the newest displayed rowid.
	Newer { first: Rowid },
	/// Units appended since the newest rowid the client knows about.
	Appended { since: Rowid },
}

/// A page plus the stability updates computed just before it.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationPage {
	#[serde(flatten)]
	pub window: Window,
	#[serde(rename = "arrStableUnits")]
	pub stable_units: Vec<String>,
}

/// Stability refresh followed by a windowed read.
#[derive(Clone)]
pub struct Navigator {
	windows: WindowedQueryEngine,
	stability: StabilityRefresh,
}

impl Navigator {
	pub fn new(windows: WindowedQueryEngine, stability: StabilityRefresh) -> Self {
		Self { windows, stability }
	}

	pub async fn navigate(
		&self,
		direction: Navigation,
		not_stable: &[String],
	) -> Result<NavigationPage, LedgerError> {
		let stable_units = self.stability.units_that_became_stable(not_stable).await?;
		let count = self.windows.limits().page_size;
		let window = match direction {
			Navigation::Older { last } => self.windows.window_before(last, count).await?,
			Navigation::Newer { first } => self.windows.window_after(first, count).await?,
			Navigation::Appended { since } => self.windows.window_after(since, count).await?,
		};
		Ok(NavigationPage {
			window,
			stable_units,
		})
	}
}
