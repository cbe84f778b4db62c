//!
//! Bounded windows over the append-only unit sequence.
//!
//! A window is at most `count` units scanned strictly before or strictly after
//! an anchor rowid, returned in ascending rowid order together with the
//! parent edges whose both ends are inside the window.

use crate::config::WindowLimits;
use crate::ledger::{LedgerError, ParentEdge, Rowid, UnitRecord, UnitStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Nodes and edges of one page of the unit graph.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Window {
	pub nodes: Vec<UnitRecord>,
	pub edges: Vec<ParentEdge>,
	/// Set when the scan returned fewer units than requested.
	#[serde(skip)]
	pub end: bool,
}

#[cfg(test)]
impl Window {
	pub fn first_rowid(&self) -> Option<Rowid> {
		self.nodes.first().map(|n| n.rowid)
	}

	pub fn last_rowid(&self) -> Option<Rowid> {
		self.nodes.last().map(|n| n.rowid)
	}
}

/// Re-windowing decision for a highlighted unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightPlan {
	/// Scan forward from the newest displayed anchor.
	Forward { anchor: Rowid, count: usize },
	/// Scan backward from the oldest displayed anchor.
	Backward { anchor: Rowid, count: usize },
	/// Fresh page placing the target near the top.
	Recentre { anchor: Rowid, count: usize },
}

/// Window chosen for a highlighted unit along with the decision that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightWindow {
	pub plan: HighlightPlan,
	pub window: Window,
}

/// Windowing over a [`UnitStore`].
#[derive(Clone)]
pub struct WindowedQueryEngine {
	units: Arc<dyn UnitStore>,
	limits: WindowLimits,
}

impl WindowedQueryEngine {
	pub fn new(units: Arc<dyn UnitStore>, limits: WindowLimits) -> Self {
		Self { units, limits }
	}

	pub fn limits(&self) -> WindowLimits {
		self.limits
	}

	/// Resolve a unit identifier to its rowid.
	pub async fn locate(&self, unit: &str) -> Result<Option<Rowid>, LedgerError> {
		self.units.rowid_of(unit).await
	}

	/// Up to `count` units with rowid strictly below `anchor`.
	pub async fn window_before(&self, anchor: Rowid, count: usize) -> Result<Window, LedgerError> {
		let mut nodes = self.units.units_before(anchor, count).await?;
		nodes.reverse();
		self.assemble(nodes, count).await
	}

	/// Up to `count` units with rowid strictly above `anchor`.
	pub async fn window_after(&self, anchor: Rowid, count: usize) -> Result<Window, LedgerError> {
		let nodes = self.units.units_after(anchor, count).await?;
		self.assemble(nodes, count).await
	}

	/// Backward window biased forward by the lookahead margin, so the unit at
	/// `anchor` lands near the top of the page.
	pub async fn window_before_with_margin(
		&self,
		anchor: Rowid,
		count: usize,
	) -> Result<Window, LedgerError> {
		let biased = anchor.saturating_add(self.limits.lookahead_margin);
		self.window_before(biased, count).await
	}

	/// The most recent page.
	pub async fn latest(&self) -> Result<Window, LedgerError> {
		self.window_before(Rowid::MAX, self.limits.page_size).await
	}

	/// Page centred on `unit`, or the most recent page with `false` when the
	/// unit is unknown.
	pub async fn around_unit(&self, unit: &str) -> Result<(Window, bool), LedgerError> {
		match self.locate(unit).await? {
			Some(rowid) => Ok((
				self.window_before_with_margin(rowid, self.limits.centered_page_size)
					.await?,
				true,
			)),
			None => {
				debug!("Unit {} not found, falling back to latest window", unit);
				Ok((self.latest().await?, false))
			}
		}
	}

	/// Decide how to bring `target` into view given the newest (`first`) and
	/// oldest (`last`) anchors of the page currently displayed.
	pub fn plan_highlight(&self, target: Rowid, first: Rowid, last: Rowid) -> HighlightPlan {
		let span = self.limits.highlight_span;
		let count = usize::try_from(span).unwrap_or(usize::MAX);

		if target > first && target < first.saturating_add(span) {
			return HighlightPlan::Forward {
				anchor: first,
				count,
			};
		}
		// Below zero every position is past the lower bound.
		let above_lower = last.checked_sub(span).is_none_or(|lower| target > lower);
		if target < last && above_lower {
			return HighlightPlan::Backward {
				anchor: last,
				count,
			};
		}
		HighlightPlan::Recentre {
			anchor: target.saturating_add(self.limits.lookahead_margin),
			count: self.limits.centered_page_size,
		}
	}

	/// Window bringing `target` into view, or `None` when the unit is unknown.
	pub async fn resolve_highlight_window(
		&self,
		target: &str,
		first: Rowid,
		last: Rowid,
	) -> Result<Option<HighlightWindow>, LedgerError> {
		let Some(rowid) = self.locate(target).await? else {
			return Ok(None);
		};
		let plan = self.plan_highlight(rowid, first, last);
		debug!("Highlight {} (rowid {}): {:?}", target, rowid, plan);
		let window = match plan {
			HighlightPlan::Forward { anchor, count } => self.window_after(anchor, count).await?,
			HighlightPlan::Backward { anchor, count } | HighlightPlan::Recentre { anchor, count } => {
				self.window_before(anchor, count).await?
			}
		};
		Ok(Some(HighlightWindow { plan, window }))
	}

	async fn assemble(&self, nodes: Vec<UnitRecord>, count: usize) -> Result<Window, LedgerError> {
		let ids: Vec<String> = nodes.iter().map(|n| n.unit.clone()).collect();
		let members: HashSet<&str> = ids.iter().map(String::as_str).collect();
		let edges = if ids.is_empty() {
			Vec::new()
		} else {
			self.units
				.parent_edges(&ids)
				.await?
				.into_iter()
				.filter(|e| members.contains(e.parent.as_str()))
				.collect()
		};
		Ok(Window {
			end: nodes.len() < count,
			nodes,
			edges,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ledger::InMemoryLedger;
	use crate::ledger::in_mem::SnapshotUnit;
	use std::sync::atomic::{AtomicUsize, Ordering};

	async fn chain(len: usize) -> Arc<InMemoryLedger> {
		let ledger = Arc::new(InMemoryLedger::new());
		for i in 1..=len {
			let parent = format!("u{}", i - 1);
			let parents: Vec<&str> = if i > 1 { vec![parent.as_str()] } else { vec![] };
			ledger
				.append_unit(SnapshotUnit::new(format!("u{}", i), &parents))
				.await;
		}
		ledger
	}

	fn rowids(window: &Window) -> Vec<Rowid> {
		window.nodes.iter().map(|n| n.rowid).collect()
	}

	/// Counts forward and backward scans while delegating to a real store.
	struct CountingStore {
		inner: Arc<InMemoryLedger>,
		before_calls: AtomicUsize,
		after_calls: AtomicUsize,
		last_before: std::sync::Mutex<Option<(Rowid, usize)>>,
	}

	#[async_trait::async_trait]
	impl UnitStore for CountingStore {
		async fn rowid_of(&self, unit: &str) -> Result<Option<Rowid>, LedgerError> {
			self.inner.rowid_of(unit).await
		}

		async fn units_before(
			&self,
			anchor: Rowid,
			limit: usize,
		) -> Result<Vec<UnitRecord>, LedgerError> {
			self.before_calls.fetch_add(1, Ordering::SeqCst);
			*self.last_before.lock().unwrap() = Some((anchor, limit));
			self.inner.units_before(anchor, limit).await
		}

		async fn units_after(
			&self,
			anchor: Rowid,
			limit: usize,
		) -> Result<Vec<UnitRecord>, LedgerError> {
			self.after_calls.fetch_add(1, Ordering::SeqCst);
			self.inner.units_after(anchor, limit).await
		}

		async fn parent_edges(&self, units: &[String]) -> Result<Vec<ParentEdge>, LedgerError> {
			self.inner.parent_edges(units).await
		}

		async fn stable_among(&self, units: &[String]) -> Result<Vec<String>, LedgerError> {
			self.inner.stable_among(units).await
		}

		async fn unit_info(
			&self,
			unit: &str,
		) -> Result<Option<crate::ledger::UnitInfo>, LedgerError> {
			self.inner.unit_info(unit).await
		}

		async fn unit_count(&self) -> Result<u64, LedgerError> {
			self.inner.unit_count().await
		}
	}

	#[tokio::test]
	async fn forward_then_backward_is_continuous() {
		let engine = WindowedQueryEngine::new(chain(300).await, WindowLimits::default());
		for anchor in [1u64, 37, 150] {
			let forward = engine.window_after(anchor, 100).await.unwrap();
			let back = engine
				.window_before(forward.last_rowid().unwrap(), 100)
				.await
				.unwrap();
			assert_eq!(back.first_rowid(), Some(anchor));
			assert_eq!(back.nodes.len(), 100);
			let expected: Vec<Rowid> = (anchor..anchor + 100).collect();
			assert_eq!(rowids(&back), expected);
		}
	}

	#[tokio::test]
	async fn end_flag_tracks_short_pages() {
		let engine = WindowedQueryEngine::new(chain(250).await, WindowLimits::default());

		let first = engine.window_after(0, 100).await.unwrap();
		assert_eq!(first.nodes.len(), 100);
		assert!(!first.end);

		let second = engine.window_after(100, 100).await.unwrap();
		assert_eq!(second.nodes.len(), 100);
		assert!(!second.end);

		let third = engine.window_after(200, 100).await.unwrap();
		assert_eq!(third.nodes.len(), 50);
		assert!(third.end);

		let oldest = engine.window_before(30, 100).await.unwrap();
		assert_eq!(rowids(&oldest), (1..30).collect::<Vec<_>>());
		assert!(oldest.end);

		let exact = engine.window_before(101, 100).await.unwrap();
		assert_eq!(exact.nodes.len(), 100);
		assert!(!exact.end);
	}

	#[tokio::test]
	async fn edges_stay_inside_the_window() {
		let engine = WindowedQueryEngine::new(chain(20).await, WindowLimits::default());
		let window = engine.window_after(5, 5).await.unwrap();
		assert_eq!(rowids(&window), vec![6, 7, 8, 9, 10]);
		// u6 -> u5 leaves the window, the other four edges are internal.
		assert_eq!(window.edges.len(), 4);
		assert!(window.edges.iter().all(|e| e.parent != "u5"));
		assert!(window.edges.iter().all(|e| e.is_best_parent));
	}

	#[tokio::test]
	async fn latest_and_unknown_unit_fallback() {
		let engine = WindowedQueryEngine::new(chain(150).await, WindowLimits::default());
		let latest = engine.latest().await.unwrap();
		assert_eq!(latest.first_rowid(), Some(51));
		assert_eq!(latest.last_rowid(), Some(150));

		let (window, found) = engine.around_unit("missing").await.unwrap();
		assert!(!found);
		assert_eq!(window, latest);

		let (centred, found) = engine.around_unit("u60").await.unwrap();
		assert!(found);
		assert_eq!(centred.last_rowid(), Some(84));
		assert_eq!(centred.nodes.len(), 84);
	}

	#[test]
	fn highlight_plan_reuses_nearby_boundaries() {
		let engine = WindowedQueryEngine::new(Arc::new(InMemoryLedger::new()), WindowLimits::default());

		assert_eq!(
			engine.plan_highlight(450, 400, 300),
			HighlightPlan::Forward {
				anchor: 400,
				count: 200
			}
		);
		assert_eq!(
			engine.plan_highlight(150, 400, 300),
			HighlightPlan::Backward {
				anchor: 300,
				count: 200
			}
		);
		assert_eq!(
			engine.plan_highlight(50, 90, 80),
			HighlightPlan::Backward {
				anchor: 80,
				count: 200
			}
		);
		assert_eq!(
			engine.plan_highlight(700, 400, 300),
			HighlightPlan::Recentre {
				anchor: 725,
				count: 100
			}
		);
		// Boundaries themselves are excluded.
		assert!(matches!(
			engine.plan_highlight(600, 400, 300),
			HighlightPlan::Recentre { .. }
		));
		assert!(matches!(
			engine.plan_highlight(100, 400, 300),
			HighlightPlan::Recentre { .. }
		));
	}

	#[tokio::test]
	async fn highlight_near_boundary_never_recentres() {
		let store = Arc::new(CountingStore {
			inner: chain(1000).await,
			before_calls: AtomicUsize::new(0),
			after_calls: AtomicUsize::new(0),
			last_before: std::sync::Mutex::new(None),
		});
		let engine = WindowedQueryEngine::new(store.clone(), WindowLimits::default());
		let (first, last) = (600, 500);

		for target in (first + 1)..(first + 200) {
			let found = engine
				.resolve_highlight_window(&format!("u{}", target), first, last)
				.await
				.unwrap()
				.unwrap();
			assert!(matches!(found.plan, HighlightPlan::Forward { .. }));
		}
		for target in (last - 199)..last {
			let found = engine
				.resolve_highlight_window(&format!("u{}", target), first, last)
				.await
				.unwrap()
				.unwrap();
			assert!(matches!(found.plan, HighlightPlan::Backward { .. }));
			assert_eq!(found.window.nodes.len(), 200);
		}
		assert_eq!(store.after_calls.load(Ordering::SeqCst), 199);
		assert_eq!(store.before_calls.load(Ordering::SeqCst), 199);
		assert_eq!(*store.last_before.lock().unwrap(), Some((500, 200)));

		let far = engine
			.resolve_highlight_window("u900", first, last)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(far.plan, HighlightPlan::Recentre { anchor: 925, count: 100 });
		assert_eq!(*store.last_before.lock().unwrap(), Some((925, 100)));
		assert_eq!(far.window.last_rowid(), Some(924));
	}

	#[tokio::test]
	async fn highlight_of_unknown_unit_is_not_found() {
		let engine = WindowedQueryEngine::new(chain(10).await, WindowLimits::default());
		assert!(
			engine
				.resolve_highlight_window("nope", 5, 1)
				.await
				.unwrap()
				.is_none()
		);
	}
}
