// Core assistant functionality shared by the chat and voice sessions:
// - API client for the generative endpoint
// - Request/response wire types
// - Retry policy for rate-limited calls
// - Tool declarations and local resolution stubs
// - Pharmacy business content model
// - Configuration loading
// - Shared error types

pub mod client;
pub use client::*;

pub mod types;
pub use types::*;

pub mod config;
pub use config::*;

pub mod errors;
pub use errors::*;

pub mod retry;
pub use retry::*;

pub mod tools;
pub use tools::*;

pub mod content;
pub use content::*;

pub mod forms;
pub use forms::{BookingForm, ContactForm, FormRelayClient};
