//! Scene management
//!
//! A Scene is one logical render target. The renderer owns every registered
//! Scene and ticks them once per frame; everything a Scene displays lives in
//! the submodules below.
//!
//! ## Layout
//!
//! ```text
//! ModelScene
//!  ├─ Camera ◄── SmoothControls (damped orbit)
//!  ├─ RetainedContent (from the AssetCache) + Framing
//!  ├─ AnimationPlayback
//!  ├─ placement: pivot or AR dolly (position, yaw, scale)
//!  └─ capabilities: Loading, Staging, ...
//! ```

pub mod animation;
pub mod camera;
pub mod capability;
pub mod framing;
mod model_scene;

pub use animation::{AnimationPlayback, LoopMode};
pub use camera::Camera;
pub use capability::{Capability, LoadingCapability, RevealPolicy, SourceChange, StagingCapability};
pub use framing::Framing;
pub use model_scene::{ContentAnchor, ModelScene, SceneSnapshot};
