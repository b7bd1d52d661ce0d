// Realtime voice assistant: PCM codec, gapless playback scheduling, the
// live wire protocol, and the duplex session manager.

pub mod audio;
pub use audio::*;

pub mod playback;
pub use playback::*;

pub mod wire;
pub use wire::*;

pub mod transport;
pub use transport::*;

pub mod session;
pub use session::*;
