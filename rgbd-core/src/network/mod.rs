pub mod endpoint;
pub mod receiver;
pub mod status;
pub mod streamer;

pub use endpoint::Endpoint;
pub use receiver::FrameReceiver;
pub use status::{StatusReceiver, StreamStatus};
pub use streamer::FrameStreamer;
