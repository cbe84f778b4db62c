//!
//! WebSocket listener for the event channel.
//!
//! Each connection gets a writer task fed by an unbounded queue. Every inbound
//! text frame is answered on its own task, so replies may leave in a different
//! order than requests arrived. Replies for a connection that has gone away are
//! dropped silently.

use super::handlers::ChannelService;
use super::types::*;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Bind `addr` and accept connections until the listener fails.
pub async fn serve(addr: SocketAddr, service: ChannelService) -> Result<(), ChannelError> {
	let listener = TcpListener::bind(addr).await?;
	serve_on(listener, service).await
}

/// Accept connections on an already bound listener.
pub async fn serve_on(listener: TcpListener, service: ChannelService) -> Result<(), ChannelError> {
	info!("Event channel listening on {}", listener.local_addr()?);
	let service = Arc::new(service);
	loop {
		let (stream, peer) = listener.accept().await?;
		let service = service.clone();
		tokio::spawn(async move {
			if let Err(e) = handle_connection(stream, peer, service).await {
				warn!("Connection {} ended with error: {}", peer, e);
			}
		});
	}
}

async fn handle_connection(
	stream: TcpStream,
	peer: SocketAddr,
	service: Arc<ChannelService>,
) -> Result<(), ChannelError> {
	let ws_stream = accept_async(stream).await?;
	info!("Client {} connected", peer);
	let (mut ws_sender, mut ws_receiver) = ws_stream.split();
	let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

	let writer = tokio::spawn(async move {
		while let Some(message) = rx.recv().await {
			if let Err(e) = ws_sender.send(message).await {
				debug!("Failed to write to {}: {}", peer, e);
				break;
			}
		}
	});

	while let Some(frame) = ws_receiver.next().await {
		match frame? {
			Message::Text(text) => {
				let service = service.clone();
				let tx = tx.clone();
				tokio::spawn(async move {
					match service.handle_frame(&text).await {
						Ok(Some(event)) => match serde_json::to_string(&event) {
							// A closed queue means the client left; nothing to do.
							Ok(encoded) => {
								let _ = tx.send(Message::Text(encoded));
							}
							Err(e) => error!("Failed to encode {} event: {}", event.event, e),
						},
						Ok(None) => debug!("No event for request from {}", peer),
						Err(e) => warn!("Dropped request from {}: {}", peer, e),
					}
				});
			}
			Message::Ping(payload) => {
				let _ = tx.send(Message::Pong(payload));
			}
			Message::Close(_) => break,
			_ => {}
		}
	}

	drop(tx);
	info!("Client {} disconnected", peer);
	// The writer drains queued replies, then stops once every sender is gone.
	if let Err(e) = writer.await {
		debug!("Writer task for {} failed: {}", peer, e);
	}
	Ok(())
}
