// Text assistant: one request/response cycle per user message, with
// optimistic history updates, tool-call round-tripping, and the cached
// pharmacy content service.

pub mod endpoint;
pub use endpoint::*;

pub mod session;
pub use session::*;

pub mod content;
pub use content::*;
