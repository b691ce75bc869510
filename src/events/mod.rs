//! Stream event synchronisation: payload types, the dispatch registry, the
//! shared store and the provider that owns the connection.

pub mod context;
pub mod payloads;
pub mod provider;
pub mod registry;

pub use context::{Change, ConnectionState, EventContext, EventLogEntry, Interest, StoreState, Subscription};
pub use payloads::{EventPayload, QueueItem, QueueItemStatus, QueueSnapshot};
pub use provider::{MountMode, StreamProvider};
pub use registry::{DispatchOutcome, EventHandler, EventRegistry, TransformError};
