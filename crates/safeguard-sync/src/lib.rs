//! Safeguard Sync - the policy engine task and its observer protocol.
//!
//! A single spawned task owns all mutable decision state; transports
//! reach it through a cloneable [`EngineHandle`]. Observers register a
//! connection, opt into the broadcast set with a `state` message, and
//! from then on receive every applied mutation in order.
//!
//! # Example
//!
//! ```no_run
//! use safeguard_core::classifier::{PageUrls, RequestDescriptor};
//! use safeguard_storage::Database;
//! use safeguard_sync::Engine;
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> Result<(), safeguard_sync::EngineError> {
//! let db = Database::in_memory()?;
//! let (tab_commands, _tab_rx) = mpsc::unbounded_channel();
//! let engine = Engine::spawn(db, PageUrls::default(), tab_commands)?;
//!
//! let verdict = engine
//!     .classify(RequestDescriptor::navigation("http://example.com/"))
//!     .await?;
//! println!("{verdict:?}");
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod protocol;

pub use engine::{ConnectionId, Engine, EngineError, EngineHandle, SyncConnection};
pub use protocol::{ClientMessage, HandshakeMessage, RecentEntry, ServerMessage, TabCommand};
