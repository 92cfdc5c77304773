//! # Lode Core
//!
//! Shared building blocks for the Lode governance contracts:
//! - `types` - epochs, amounts, container ids, node states, constants
//! - `error` - the `GovError` abort taxonomy
//! - `store` - key-value store, write overlay, namespaced keys
//! - `context` - per-transaction `Context`, `invoke` / `query`
//! - `notification` - events consumed by the Inner Ring
//!
//! ## Execution Model
//!
//! ```text
//!   tx ──► invoke(store, env, op)
//!             │
//!             ├── Context { Overlay, Environment, events }
//!             │      ├── get / scan        (overlay, then base store)
//!             │      ├── put / delete      (buffered)
//!             │      └── require_alphabet  (Witness over derived address)
//!             │
//!             └── Ok  ──► store.apply(batch) + Receipt { events }
//!                 Err ──► nothing written
//! ```

pub mod codec;
pub mod context;
pub mod error;
pub mod notification;
pub mod store;
pub mod types;

pub use context::*;
pub use error::*;
pub use notification::*;
pub use store::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{decode, encode};
    pub use crate::context::{invoke, query, Context, Environment, Receipt};
    pub use crate::error::{GovError, Result};
    pub use crate::notification::{Event, Notification};
    pub use crate::store::{KvStore, MemoryStore, Namespace};
    pub use crate::types::*;
}
