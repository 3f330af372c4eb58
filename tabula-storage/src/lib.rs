//! TABULA Storage - Backend Contract and In-Memory Backend
//!
//! Defines the storage abstraction tables are bound to. Concrete engines
//! (SQL, key-value, remote) implement [`Backend`]; [`MemoryBackend`] is the
//! reference implementation used by tests and embedded callers.

mod backend;
mod memory;

pub use backend::Backend;
pub use memory::MemoryBackend;
