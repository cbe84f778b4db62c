//!
//! Per-message handling for the event channel.
//!
//! Each inbound request yields at most one outbound event. Lookups that miss
//! fall back to a default view or emit nothing, never an error event.

use super::types::*;
use crate::config::WindowLimits;
use crate::ledger::Collaborators;
use crate::query::{
	AddressHistoryPaginator, HighlightPlan, Navigation, Navigator, StabilityRefresh, Window,
	WindowedQueryEngine,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

/// Answers channel requests from the ledger collaborators.
#[derive(Clone)]
pub struct ChannelService {
	windows: WindowedQueryEngine,
	navigator: Navigator,
	history: AddressHistoryPaginator,
	ledger: Collaborators,
}

fn graph(window: &Window) -> Value {
	json!({
		"nodes": window.nodes,
		"edges": window.edges,
	})
}

fn payload<T: Serialize>(value: &T) -> Result<Value, ChannelError> {
	Ok(serde_json::to_value(value)?)
}

impl ChannelService {
	pub fn new(ledger: Collaborators, limits: WindowLimits, history_page_size: usize) -> Self {
		let windows = WindowedQueryEngine::new(ledger.units.clone(), limits);
		let navigator = Navigator::new(
			windows.clone(),
			StabilityRefresh::new(ledger.units.clone()),
		);
		let history = AddressHistoryPaginator::new(ledger.addresses.clone(), history_page_size);
		Self {
			windows,
			navigator,
			history,
			ledger,
		}
	}

	/// Parse a text frame and answer it.
	pub async fn handle_frame(&self, text: &str) -> Result<Option<ChannelEvent>, ChannelError> {
		let request: ChannelRequest = serde_json::from_str(text)?;
		self.handle(request).await
	}

	pub async fn handle(&self, request: ChannelRequest) -> Result<Option<ChannelEvent>, ChannelError> {
		debug!("Channel request {:?}", request);
		let event = match request {
			ChannelRequest::Last => {
				let window = self.windows.latest().await?;
				ChannelEvent::new("start", graph(&window))
			}
			ChannelRequest::Unit { unit } => {
				let (window, found) = self.windows.around_unit(&unit).await?;
				let mut data = graph(&window);
				if !found {
					data["not_found"] = json!(true);
				}
				ChannelEvent::new("start", data)
			}
			ChannelRequest::Address { address } => {
				match self.history.address_overview(&address).await? {
					Some(overview) => ChannelEvent::new("addressInfo", payload(&overview)?),
					None => ChannelEvent::bare("addressInfo"),
				}
			}
			ChannelRequest::Next { last, not_stable } => {
				let page = self
					.navigator
					.navigate(Navigation::Older { last }, &not_stable)
					.await?;
				ChannelEvent::new("next", payload(&page)?)
			}
			ChannelRequest::Prev { first, not_stable } => {
				let page = self
					.navigator
					.navigate(Navigation::Newer { first }, &not_stable)
					.await?;
				let mut data = payload(&page)?;
				data["end"] = json!(page.window.end);
				ChannelEvent::new("prev", data)
			}
			ChannelRequest::New { unit, not_stable } => {
				let page = self
					.navigator
					.navigate(Navigation::Appended { since: unit }, &not_stable)
					.await?;
				ChannelEvent::new("new", payload(&page)?)
			}
			ChannelRequest::Info { unit } => match self.ledger.units.unit_info(&unit).await? {
				Some(info) => ChannelEvent::new("info", payload(&info)?),
				None => return Ok(None),
			},
			ChannelRequest::HighlightNode { unit, first, last } => {
				let Some(found) = self
					.windows
					.resolve_highlight_window(&unit, first, last)
					.await?
				else {
					return Ok(Some(ChannelEvent::bare("info")));
				};
				let mut data = graph(&found.window);
				match found.plan {
					HighlightPlan::Forward { .. } => {
						data["end"] = json!(found.window.end);
						ChannelEvent::new("prev", data)
					}
					HighlightPlan::Backward { .. } => ChannelEvent::new("next", data),
					HighlightPlan::Recentre { .. } => ChannelEvent::new("start", data),
				}
			}
			ChannelRequest::NextPageTransactions {
				address,
				last_inputs_rowid,
				last_outputs_rowid,
			} => {
				let page = self
					.history
					.transactions_page(&address, last_inputs_rowid, last_outputs_rowid)
					.await?;
				ChannelEvent::new("nextPageTransactions", payload(&page)?)
			}
			ChannelRequest::StaticData => {
				ChannelEvent::new("staticdata", payload(&self.ledger.chain.statistics().await?)?)
			}
			ChannelRequest::GetRoundStatus { round_index } => {
				let status = self.ledger.rounds.round_status(round_index).await?;
				ChannelEvent::new("getRoundStatus", payload(&status)?)
			}
			ChannelRequest::GetOnlinePeers => {
				ChannelEvent::new("getOnlinePeers", payload(&self.ledger.network.online_peers().await?)?)
			}
			ChannelRequest::GetDurationTime { cur_round } => {
				// Unix seconds, null when the round has no timestamp yet.
				let timestamp = self
					.ledger
					.rounds
					.last_timestamp_of_round(cur_round)
					.await?
					.map(|t| t.timestamp());
				ChannelEvent::new("transTimeStamp", json!(timestamp))
			}
		};
		Ok(Some(event))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ledger::in_mem::{SnapshotOutput, SnapshotUnit};
	use crate::ledger::{InMemoryLedger, RoundRecord};
	use chrono::{TimeZone, Utc};
	use std::sync::Arc;

	async fn service(len: usize) -> (Arc<InMemoryLedger>, ChannelService) {
		let ledger = Arc::new(InMemoryLedger::new());
		for i in 1..=len {
			let parent = format!("u{}", i - 1);
			let parents: Vec<&str> = if i > 1 { vec![parent.as_str()] } else { vec![] };
			let mut unit = SnapshotUnit::new(format!("u{}", i), &parents);
			if i % 10 == 0 {
				unit.outputs.push(SnapshotOutput {
					address: "WATCHED".to_string(),
					amount: i as u64,
					is_spent: false,
				});
			}
			ledger.append_unit(unit).await;
		}
		let service = ChannelService::new(
			Collaborators::in_memory(ledger.clone()),
			WindowLimits::default(),
			5,
		);
		(ledger, service)
	}

	async fn send(service: &ChannelService, frame: Value) -> Option<ChannelEvent> {
		service.handle_frame(&frame.to_string()).await.unwrap()
	}

	fn node_count(event: &ChannelEvent) -> usize {
		event.data.as_ref().unwrap()["nodes"].as_array().unwrap().len()
	}

	#[tokio::test]
	async fn start_pages_and_unknown_unit_fallback() {
		let (_, service) = service(150).await;

		let last = send(&service, json!({"type": "last"})).await.unwrap();
		assert_eq!(last.event, "start");
		assert_eq!(node_count(&last), 100);
		assert!(last.data.as_ref().unwrap().get("not_found").is_none());

		let missing = send(&service, json!({"type": "unit", "unit": "ghost"})).await.unwrap();
		assert_eq!(missing.event, "start");
		assert_eq!(missing.data.as_ref().unwrap()["not_found"], json!(true));
		assert_eq!(node_count(&missing), 100);

		let found = send(&service, json!({"type": "unit", "unit": "u10"})).await.unwrap();
		assert_eq!(node_count(&found), 34);
	}

	#[tokio::test]
	async fn navigation_events_carry_stable_units() {
		let (ledger, service) = service(250).await;
		ledger.mark_stable("u5").await.unwrap();

		let next = send(
			&service,
			json!({"type": "next", "last": 120, "notStable": ["u5", "u6"]}),
		)
		.await
		.unwrap();
		assert_eq!(next.event, "next");
		let data = next.data.unwrap();
		assert_eq!(data["arrStableUnits"], json!(["u5"]));
		assert!(data.get("end").is_none());

		let prev = send(&service, json!({"type": "prev", "first": 200, "notStable": []}))
			.await
			.unwrap();
		assert_eq!(prev.event, "prev");
		assert_eq!(prev.data.as_ref().unwrap()["end"], json!(true));
		assert_eq!(node_count(&prev), 50);

		let new = send(&service, json!({"type": "new", "unit": 245})).await.unwrap();
		assert_eq!(new.event, "new");
		assert_eq!(node_count(&new), 5);
	}

	#[tokio::test]
	async fn highlight_emits_direction_specific_events() {
		let (_, service) = service(1000).await;

		let forward = send(
			&service,
			json!({"type": "highlightNode", "unit": "u650", "first": 600, "last": 500}),
		)
		.await
		.unwrap();
		assert_eq!(forward.event, "prev");
		assert_eq!(node_count(&forward), 200);
		assert_eq!(forward.data.as_ref().unwrap()["end"], json!(false));

		let backward = send(
			&service,
			json!({"type": "highlightNode", "unit": "u450", "first": 600, "last": 500}),
		)
		.await
		.unwrap();
		assert_eq!(backward.event, "next");

		let recentred = send(
			&service,
			json!({"type": "highlightNode", "unit": "u50", "first": 600, "last": 500}),
		)
		.await
		.unwrap();
		assert_eq!(recentred.event, "start");
		assert_eq!(node_count(&recentred), 74);

		let unknown = send(
			&service,
			json!({"type": "highlightNode", "unit": "ghost", "first": 600, "last": 500}),
		)
		.await
		.unwrap();
		assert_eq!(unknown, ChannelEvent::bare("info"));
	}

	#[tokio::test]
	async fn address_and_history_events() {
		let (_, service) = service(60).await;

		let info = send(&service, json!({"type": "address", "address": "WATCHED"}))
			.await
			.unwrap();
		assert_eq!(info.event, "addressInfo");
		let data = info.data.unwrap();
		assert_eq!(data["objTransactions"].as_object().unwrap().len(), 5);
		assert_eq!(data["end"], json!(false));
		assert_eq!(data["newLastOutputsROWID"], json!(5));

		let page = send(
			&service,
			json!({
				"type": "nextPageTransactions",
				"address": "WATCHED",
				"lastOutputsROWID": 5
			}),
		)
		.await
		.unwrap();
		let data = page.data.unwrap();
		assert_eq!(data["address"], json!("WATCHED"));
		assert_eq!(data["objTransactions"].as_object().unwrap().len(), 1);
		assert_eq!(data["end"], json!(true));

		let stranger = send(&service, json!({"type": "address", "address": "NOBODY"}))
			.await
			.unwrap();
		assert_eq!(stranger, ChannelEvent::bare("addressInfo"));
	}

	#[tokio::test]
	async fn info_and_dashboard_events() {
		let (ledger, service) = service(3).await;
		assert!(
			send(&service, json!({"type": "info", "unit": "ghost"}))
				.await
				.is_none()
		);
		let info = send(&service, json!({"type": "info", "unit": "u2"})).await.unwrap();
		assert_eq!(info.data.unwrap()["parents"], json!(["u1"]));

		let stats = send(&service, json!({"type": "staticdata"})).await.unwrap();
		assert_eq!(stats.data.unwrap()["total_units"], json!(3));

		let end = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
		ledger
			.add_round(
				RoundRecord {
					round_index: 7,
					difficulty: 2,
					seed: None,
					start_timestamp: None,
					end_timestamp: Some(end),
				},
				None,
			)
			.await;
		let duration = send(&service, json!({"type": "getDurationTime", "curRound": 7}))
			.await
			.unwrap();
		assert_eq!(duration.event, "transTimeStamp");
		assert_eq!(duration.data, Some(json!(end.timestamp())));

		let status = send(&service, json!({"type": "getRoundStatus", "round_index": 7}))
			.await
			.unwrap();
		assert_eq!(status.data.unwrap()["is_current"], json!(true));

		let peers = send(&service, json!({"type": "getOnlinePeers"})).await.unwrap();
		assert_eq!(peers.data, Some(json!([])));
	}

	#[tokio::test]
	async fn malformed_frames_are_errors() {
		let (_, service) = service(1).await;
		assert!(matches!(
			service.handle_frame("{\"type\":\"bogus\"}").await,
			Err(ChannelError::Malformed(_))
		));
		assert!(service.handle_frame("not json").await.is_err());
	}
}
