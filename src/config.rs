/*!
Gateway configuration.

Use `GatewayConfig::from_env()` to build a configuration from environment
variables. Every value has a default matching a stock explorer deployment.
*/

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Units per navigation page.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Distance from a window boundary inside which a highlight reuses the current view.
pub const DEFAULT_HIGHLIGHT_SPAN: u64 = 200;
/// Units in a freshly centred highlight window.
pub const DEFAULT_CENTERED_PAGE_SIZE: usize = 100;
/// How far past the target a centred window starts scanning backward.
pub const DEFAULT_LOOKAHEAD_MARGIN: u64 = 25;
/// Transactions per address history page.
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 5;
/// Rows returned by an unfiltered wallet history read.
pub const DEFAULT_TRANSACTION_HISTORY_LIMIT: usize = 200;

const DEFAULT_CHANNEL_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_RPC_ADDR: &str = "127.0.0.1:6553";
const DEFAULT_REWARD_RPC_ADDR: &str = "127.0.0.1:6883";

/// Error type for configuration parsing issues.
#[derive(Debug, thiserror::Error)]
#[error("ConfigError: {0}")]
pub struct ConfigError(String);

/// Sizes and thresholds of the windowed query engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
	pub page_size: usize,
	pub highlight_span: u64,
	pub centered_page_size: usize,
	pub lookahead_margin: u64,
}

impl Default for WindowLimits {
	fn default() -> Self {
		Self {
			page_size: DEFAULT_PAGE_SIZE,
			highlight_span: DEFAULT_HIGHLIGHT_SPAN,
			centered_page_size: DEFAULT_CENTERED_PAGE_SIZE,
			lookahead_margin: DEFAULT_LOOKAHEAD_MARGIN,
		}
	}
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
	/// Listener of the visualization event channel.
	pub channel_addr: SocketAddr,
	pub serve_rpc: bool,
	pub rpc_addr: SocketAddr,
	pub serve_reward_rpc: bool,
	pub reward_rpc_addr: SocketAddr,
	/// JSON ledger snapshot served by the in-process ledger.
	pub snapshot_path: Option<PathBuf>,
	pub window: WindowLimits,
	pub history_page_size: usize,
	pub transaction_history_limit: usize,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			channel_addr: parse_default(DEFAULT_CHANNEL_ADDR),
			serve_rpc: true,
			rpc_addr: parse_default(DEFAULT_RPC_ADDR),
			serve_reward_rpc: true,
			reward_rpc_addr: parse_default(DEFAULT_REWARD_RPC_ADDR),
			snapshot_path: None,
			window: WindowLimits::default(),
			history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
			transaction_history_limit: DEFAULT_TRANSACTION_HISTORY_LIMIT,
		}
	}
}

impl GatewayConfig {
	/// Load configuration from environment variables.
	///
	/// Recognized environment variables:
	/// - `GATEWAY_CHANNEL_ADDR` - event channel listener, defaults to `127.0.0.1:8000`
	/// - `GATEWAY_SERVE_RPC` / `GATEWAY_RPC_ADDR` - wallet RPC, defaults to `true` / `127.0.0.1:6553`
	/// - `GATEWAY_SERVE_REWARD_RPC` / `GATEWAY_REWARD_RPC_ADDR` - reward RPC, defaults to `true` / `127.0.0.1:6883`
	/// - `GATEWAY_SNAPSHOT` - optional ledger snapshot path
	/// - `GATEWAY_PAGE_SIZE`, `GATEWAY_HIGHLIGHT_SPAN`, `GATEWAY_CENTERED_PAGE_SIZE`,
	///   `GATEWAY_LOOKAHEAD_MARGIN` - window constants
	/// - `GATEWAY_HISTORY_PAGE_SIZE`, `GATEWAY_TRANSACTION_HISTORY_LIMIT` - history sizes
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Build a configuration from an arbitrary key lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let defaults = Self::default();
		let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

		let window = WindowLimits {
			page_size: parse_or(&var, "GATEWAY_PAGE_SIZE", defaults.window.page_size)?,
			highlight_span: parse_or(
				&var,
				"GATEWAY_HIGHLIGHT_SPAN",
				defaults.window.highlight_span,
			)?,
			centered_page_size: parse_or(
				&var,
				"GATEWAY_CENTERED_PAGE_SIZE",
				defaults.window.centered_page_size,
			)?,
			lookahead_margin: parse_or(
				&var,
				"GATEWAY_LOOKAHEAD_MARGIN",
				defaults.window.lookahead_margin,
			)?,
		};
		if window.page_size == 0 || window.centered_page_size == 0 {
			return Err(ConfigError("window page sizes must be at least 1".into()));
		}

		let serve_rpc = match var("GATEWAY_SERVE_RPC") {
			Some(s) => parse_bool(&s).map_err(|_| {
				ConfigError(format!("failed to parse GATEWAY_SERVE_RPC='{}' as boolean", s))
			})?,
			None => defaults.serve_rpc,
		};
		let serve_reward_rpc = match var("GATEWAY_SERVE_REWARD_RPC") {
			Some(s) => parse_bool(&s).map_err(|_| {
				ConfigError(format!(
					"failed to parse GATEWAY_SERVE_REWARD_RPC='{}' as boolean",
					s
				))
			})?,
			None => defaults.serve_reward_rpc,
		};

		Ok(GatewayConfig {
			channel_addr: parse_or(&var, "GATEWAY_CHANNEL_ADDR", defaults.channel_addr)?,
			serve_rpc,
			rpc_addr: parse_or(&var, "GATEWAY_RPC_ADDR", defaults.rpc_addr)?,
			serve_reward_rpc,
			reward_rpc_addr: parse_or(&var, "GATEWAY_REWARD_RPC_ADDR", defaults.reward_rpc_addr)?,
			snapshot_path: var("GATEWAY_SNAPSHOT").map(PathBuf::from),
			window,
			history_page_size: parse_or(
				&var,
				"GATEWAY_HISTORY_PAGE_SIZE",
				defaults.history_page_size,
			)?,
			transaction_history_limit: parse_or(
				&var,
				"GATEWAY_TRANSACTION_HISTORY_LIMIT",
				defaults.transaction_history_limit,
			)?,
		})
	}
}

fn parse_default(addr: &str) -> SocketAddr {
	addr.parse()
		.unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 0)))
}

fn parse_or<T, V>(var: &V, key: &str, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
	V: Fn(&str) -> Option<String>,
{
	match var(key) {
		Some(s) => s
			.trim()
			.parse::<T>()
			.map_err(|e| ConfigError(format!("failed to parse {}='{}': {}", key, s, e))),
		None => Ok(default),
	}
}

/// Parse a boolean-like string. Accepts `1`, `true`, `yes`, `on` as true; `0`, `false`, `no`, `off` as false.
fn parse_bool(s: &str) -> Result<bool, ()> {
	match s.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(()),
	}
}
