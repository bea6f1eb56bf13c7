//! Line-oriented multi-user TCP chat server
//!
//! Clients connect over plain TCP, pick a display name and exchange
//! broadcast or direct messages, one UTF-8 line per message.
//!
//! # Commands
//! - `!quit` - leave the chat
//! - `!name <name>` - pick a display name
//! - `!dm <recipient> <text...>` - private message
//! - anything else - broadcast to every other participant
//!
//! # Architecture
//! - `Registry` is the only shared state: participants keyed by name
//!   behind a single mutex, always read through snapshots
//! - `Router` runs three independent loops (broadcast, direct message,
//!   registry update), each draining its own `mpsc` queue
//! - Each connection runs a `Session` that parses lines and emits router
//!   requests; names change only through the update loop
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use line_chat::{Config, Listener, Registry, Router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), line_chat::AppError> {
//!     let registry = Arc::new(Registry::new());
//!     let (router, handle) = Router::new(Arc::clone(&registry));
//!     router.spawn();
//!
//!     Listener::bind(Config::default(), registry, handle).await?.run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod participant;
pub mod registry;
pub mod router;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use error::{AppError, CommandError, SendError};
pub use handler::handle_connection;
pub use listener::Listener;
pub use message::{BroadcastMessage, Command, DirectMessage};
pub use participant::{Connection, Participant};
pub use registry::Registry;
pub use router::{RegistryUpdate, Router, RouterHandle, RouterTasks};
pub use session::{Session, SessionState};
pub use types::{ParticipantId, SERVER_NAME};
