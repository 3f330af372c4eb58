//! TABULA Events - Change Events and Subscriptions
//!
//! Tables report committed writes and databases report lifecycle changes
//! through an [`EventEmitter`]: a kind-keyed listener registry with
//! `on`/`once`/`off` and removable [`Subscription`] handles.
//!
//! # Key Types
//!
//! - `TableEvent`: `Insert`, `Update { updated, previous }`, `Delete`
//! - `DatabaseEvent`: `Ready`, `DeleteTable(name)`, `Disconnect`, `Delete`
//! - `EventEmitter<E>`: listener registry for any [`Event`]

mod emitter;
mod events;

pub use emitter::{Event, EventEmitter, ListenerId, Subscription};
pub use events::{DatabaseEvent, DatabaseEventKind, TableEvent, TableEventKind};
