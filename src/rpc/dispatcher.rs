//!
//! Named-operation registry.
//!
//! Handlers are registered under a method name and invoked with the call's
//! parameters. Every call produces exactly one [`RpcResult`]; an unknown method
//! is itself an error result.

use super::types::*;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

type Handler = Arc<dyn Fn(Params) -> BoxFuture<'static, RpcResult> + Send + Sync>;

/// Registry of RPC handlers for one service.
#[derive(Clone)]
pub struct RpcRegistry {
	service: &'static str,
	handlers: HashMap<String, Handler>,
}

impl RpcRegistry {
	pub fn new(service: &'static str) -> Self {
		Self {
			service,
			handlers: HashMap::new(),
		}
	}

	pub fn service(&self) -> &'static str {
		self.service
	}

	/// Register a free-standing handler.
	pub fn expose<F, Fut>(&mut self, method: &str, handler: F)
	where
		F: Fn(Params) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = RpcResult> + Send + 'static,
	{
		let handler: Handler =
			Arc::new(move |params| -> BoxFuture<'static, RpcResult> { Box::pin(handler(params)) });
		if self.handlers.insert(method.to_string(), handler).is_some() {
			warn!("{}: handler for {} replaced", self.service, method);
		}
	}

	/// Register a handler that runs against a shared service value.
	pub fn expose_method<S, F, Fut>(&mut self, method: &str, service: &Arc<S>, handler: F)
	where
		S: Send + Sync + 'static,
		F: Fn(Arc<S>, Params) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = RpcResult> + Send + 'static,
	{
		let service = service.clone();
		self.expose(method, move |params| handler(service.clone(), params));
	}

	/// Registered method names, sorted.
	pub fn methods(&self) -> Vec<&str> {
		let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
		methods.sort_unstable();
		methods
	}

	/// Invoke `method` and return its single outcome.
	pub async fn call(&self, method: &str, params: Params) -> RpcResult {
		let Some(handler) = self.handlers.get(method) else {
			debug!("{}: unknown method {}", self.service, method);
			return Err(RpcError::UnknownMethod(method.to_string()));
		};
		let result = handler(params).await;
		match &result {
			Ok(_) => debug!("{}: {} succeeded", self.service, method),
			Err(RpcError::Dependency(e)) => warn!("{}: {} failed: {}", self.service, method, e),
			Err(e) => debug!("{}: {} rejected: {}", self.service, method, e),
		}
		result
	}

	/// Run a JSON-RPC request and wrap the outcome.
	pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
		if let Some(version) = request.jsonrpc.as_deref().filter(|v| *v != "2.0") {
			return RpcResponse::from_result(
				request.id,
				Err(RpcError::InvalidRequest(format!(
					"unsupported jsonrpc version {}",
					version
				))),
			);
		}
		let result = self.call(&request.method, request.params).await;
		RpcResponse::from_result(request.id, result)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::{Value, json};

	struct Echo {
		prefix: String,
	}

	impl Echo {
		async fn echo(self: Arc<Self>, params: Params) -> RpcResult {
			match params.str_arg(0) {
				Some(s) => Ok(Value::String(format!("{}{}", self.prefix, s))),
				None => Err(RpcError::validation(WRONG_PARAMETERS)),
			}
		}
	}

	fn registry() -> RpcRegistry {
		let mut registry = RpcRegistry::new("test");
		registry.expose("ping", |_| async { Ok(json!("pong")) });
		let echo = Arc::new(Echo {
			prefix: "> ".to_string(),
		});
		registry.expose_method("echo", &echo, Echo::echo);
		registry
	}

	#[tokio::test]
	async fn dispatches_by_name() {
		let registry = registry();
		assert_eq!(registry.methods(), vec!["echo", "ping"]);
		assert_eq!(registry.call("ping", Params::default()).await, Ok(json!("pong")));
		assert_eq!(
			registry
				.call("echo", Params::positional(vec![json!("hi")]))
				.await,
			Ok(json!("> hi"))
		);
		assert_eq!(
			registry.call("echo", Params::default()).await,
			Err(RpcError::validation(WRONG_PARAMETERS))
		);
	}

	#[tokio::test]
	async fn unknown_method_and_bad_version_are_errors() {
		let registry = registry();
		assert!(matches!(
			registry.call("nope", Params::default()).await,
			Err(RpcError::UnknownMethod(_))
		));

		let request: RpcRequest =
			serde_json::from_value(json!({"jsonrpc": "1.0", "method": "ping", "id": 7})).unwrap();
		let response = registry.handle(request).await;
		assert_eq!(response.id, json!(7));
		assert!(matches!(response.outcome, RpcOutcome::Error(ref e) if e.code == -32600));
	}
}
