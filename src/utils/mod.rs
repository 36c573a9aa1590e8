//!
//! Utility module for marketplace sync.
//!
//! Re-exports formatting helpers used when rendering amounts for external consumers.
/// Amount formatting
pub mod coins;

pub use coins::{TON_DECIMALS, format_coins};
