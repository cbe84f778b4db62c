//!
//! JSON-RPC 2.0 over HTTP.
//!
//! Requests are POSTed to `/` as a single object or a batch array. Every
//! response carries `Access-Control-Allow-Origin: *`.

use super::dispatcher::RpcRegistry;
use super::types::*;
use axum::{
	Json, Router,
	extract::State,
	http::{HeaderValue, header},
	response::{IntoResponse, Response},
	routing::post,
};
use futures::future::join_all;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

const PARSE_ERROR: i64 = -32700;

/// Router serving `registry` at `/`.
pub fn router(registry: RpcRegistry) -> Router {
	Router::new()
		.route("/", post(handle_rpc).options(preflight))
		.with_state(Arc::new(registry))
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(addr: SocketAddr, registry: RpcRegistry) -> std::io::Result<()> {
	let listener = TcpListener::bind(addr).await?;
	serve_on(listener, registry).await
}

/// Serve on an already bound listener.
pub async fn serve_on(listener: TcpListener, registry: RpcRegistry) -> std::io::Result<()> {
	info!(
		"{} listening on {}",
		registry.service(),
		listener.local_addr()?
	);
	axum::serve(listener, router(registry)).await
}

fn with_cors(response: impl IntoResponse) -> Response {
	let mut response = response.into_response();
	response.headers_mut().insert(
		header::ACCESS_CONTROL_ALLOW_ORIGIN,
		HeaderValue::from_static("*"),
	);
	response
}

async fn preflight() -> Response {
	let mut response = with_cors(());
	let headers = response.headers_mut();
	headers.insert(
		header::ACCESS_CONTROL_ALLOW_METHODS,
		HeaderValue::from_static("POST, OPTIONS"),
	);
	headers.insert(
		header::ACCESS_CONTROL_ALLOW_HEADERS,
		HeaderValue::from_static("content-type"),
	);
	response
}

fn error_response(code: i64, message: String) -> Value {
	serde_json::json!({
		"jsonrpc": "2.0",
		"error": RpcErrorObject { code, message },
		"id": Value::Null,
	})
}

async fn dispatch_one(registry: &RpcRegistry, call: Value) -> Value {
	let request: RpcRequest = match serde_json::from_value(call) {
		Ok(request) => request,
		Err(e) => {
			let err = RpcError::InvalidRequest(e.to_string());
			return error_response(err.code(), err.to_string());
		}
	};
	debug!("{}: call {}", registry.service(), request.method);
	let response = registry.handle(request).await;
	serde_json::to_value(response)
		.unwrap_or_else(|e| error_response(-32603, format!("Failed to encode response: {}", e)))
}

async fn handle_rpc(State(registry): State<Arc<RpcRegistry>>, body: String) -> Response {
	let payload: Value = match serde_json::from_str(&body) {
		Ok(payload) => payload,
		Err(e) => {
			return with_cors(Json(error_response(
				PARSE_ERROR,
				format!("Parse error: {}", e),
			)));
		}
	};

	match payload {
		Value::Array(calls) if calls.is_empty() => with_cors(Json(error_response(
			-32600,
			"Invalid request: empty batch".to_string(),
		))),
		Value::Array(calls) => {
			let responses =
				join_all(calls.into_iter().map(|call| dispatch_one(&registry, call))).await;
			with_cors(Json(Value::Array(responses)))
		}
		call => with_cors(Json(dispatch_one(&registry, call).await)),
	}
}
