pub mod config;
pub mod detection;
pub mod driver;
pub mod error;
pub mod legend;
pub mod models;
pub mod render;
pub mod source;
pub mod views;

pub use config::Config;
pub use detection::{DetectionAdapter, ModelHandle, ModelLoader, RawPrediction};
pub use driver::{DriverEvent, DriverState, Epoch, FrameDriver, FrameLoop, FrameOutput};
pub use error::{DetectError, DetectResult};
pub use models::{
    BoundingBox, ColorLegendEntry, DetailRow, Detection, DetectionBatch, DetectionStats,
};
pub use render::{OverlayRenderer, RgbaCanvas, Surface};
pub use source::{Frame, FrameSource};
pub use views::{CameraView, DetectionContext, ImageView, VideoView, ViewModel};

#[cfg(feature = "gui")]
pub mod gui;
