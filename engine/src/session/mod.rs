//! Session Module
//!
//! The lab's lifecycle object and its seams to the outside world: the host
//! surface, the command channel and user feedback.

pub mod commands;
pub mod feedback;
pub mod host;
pub mod manager;

pub use commands::SessionCommand;
pub use feedback::{Banner, BannerKind, Feedback, Toast, ToastKind};
pub use host::{FrameHandle, HeadlessHost, HostEvent, HostSurface, ListenerId, SurfaceId, Viewport};
pub use manager::{LabSession, SceneContext, SessionState};
