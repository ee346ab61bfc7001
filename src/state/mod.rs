//! State module for the values that flow between crawler and announcer
//!
//! # Components
//!
//! - `CatalogEntry`: one fetched catalog entry
//! - `FeedTarget` / `PendingItem`: an entry routed to a delivery feed
//! - `ScanState`: per-tier "last fully covered" timestamps

mod entry;
mod scan_state;

// Re-export main types
pub use entry::{CatalogEntry, FeedTarget, PendingItem};
pub use scan_state::{Coverage, ScanState};
