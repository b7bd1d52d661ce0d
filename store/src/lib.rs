// Local persistence for the assistant:
// - Key-value store abstraction with in-memory and file-backed adapters
// - Ordered conversation store, restored across restarts
// - Timed cache for generated business content

pub mod kv;
pub use kv::*;

pub mod conversation;
pub use conversation::*;

pub mod cache;
pub use cache::*;
