// Copyright (c) 2025 Flavio Neto
// Licensed under the MIT License. See LICENSE file for details.

//! Transfer listing pipeline.
//!
//! Raw `mega-transfers` text flows one way through this module:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ MegaClient   │────▶│ parser       │────▶│ SessionState │
//! │ (raw text)   │     │ (records)    │     │ (shared)     │
//! └──────────────┘     └──────────────┘     └──────┬───────┘
//!                                                  │ watch
//!                                                  ▼
//!                                           ┌──────────────┐
//!                                           │ view redraw  │
//!                                           └──────────────┘
//! ```
//!
//! The monitor owns the only write path; the view only ever reads.

pub mod monitor;
pub mod parser;
pub mod types;

// Re-export commonly used items
pub use monitor::{snapshot, MonitorCommand, SessionState, TransferMonitor, RETRYING_HINT};
pub use parser::parse_listing;
pub use types::{Direction, TransferRecord, TransferState, MAX_FILENAME_DISPLAY, UNKNOWN_SIZE};
