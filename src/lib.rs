//! Skydiving logbook core: jump listing, background hydration, search and
//! conflict-aware jump numbering over a pluggable repository.
//!
//! # Examples
//!
//! Pure list state with [`core::state::JumpListState`]:
//! ```
//! use jumplog::{
//!     core::{state::JumpListState, view::DateDisplay},
//!     jump::JumpRecord,
//! };
//!
//! let mut state = JumpListState::new(DateDisplay::default());
//! let jobs = state.replace_all(vec![
//!     JumpRecord { id: Some(1), jump_number: Some(1), ..JumpRecord::default() },
//!     JumpRecord { id: Some(2), jump_number: Some(2), ..JumpRecord::default() },
//! ]);
//! assert_eq!(jobs.len(), 2);
//! assert_eq!(state.set_query("2").filtered, 1);
//! ```
//!
//! Runtime usage with a SQLite repository:
//! ```no_run
//! use std::sync::Arc;
//!
//! use jumplog::{
//!     engine::resolver::ShiftPolicy,
//!     jump::JumpRecord,
//!     persist::sqlite::SqliteRepository,
//!     runtime::handle::{spawn_logbook, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let repo = SqliteRepository::open("logbook.db").expect("open sqlite");
//! let handle = spawn_logbook(Arc::new(repo), RuntimeConfig::default());
//! handle.load().await.expect("load");
//! let number = handle.next_jump_number().await.expect("next number");
//! let _id = handle
//!     .save(
//!         JumpRecord { jump_number: Some(number), ..JumpRecord::default() },
//!         ShiftPolicy::Reject,
//!     )
//!     .await
//!     .expect("save");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// List state and the pure helpers behind it.
pub mod core;
/// Background hydration and the save pipeline.
pub mod engine;
/// Jump domain records and date decoding.
pub mod jump;
/// Repository contract and implementations.
pub mod persist;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types.
pub mod types;
