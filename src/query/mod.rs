//!
//! Query orchestration over the ledger collaborators.
//!
//! Shapes raw collaborator rows into the bounded responses the event channel
//! and the RPC services return: graph windows, stability updates and address
//! history pages.

/// Address history pagination
pub mod history;
/// Stability refresh and navigation reads
pub mod stability;
/// Windowed reads over the unit sequence
pub mod window;

pub use history::AddressHistoryPaginator;
pub use stability::{Navigation, Navigator, StabilityRefresh};
pub use window::{HighlightPlan, Window, WindowedQueryEngine};
