pub mod driver;
pub mod player;

pub use driver::{camera_frame, AnimationDriver, CameraFrame, FrameSink, PlaybackState};
pub use player::{PlayerHandle, PlayerStatus};
