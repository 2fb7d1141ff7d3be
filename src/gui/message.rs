use crate::error::DetectResult;
use crate::gui::screens::{
    ScreenMessage, camera_page::CameraScreen, image_page::ImageScreen,
    model_error::ModelErrorScreen, video_page::VideoScreen,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Image,
    Video,
    Camera,
}

#[derive(Debug, Clone)]
pub enum Message {
    ModelReady(DetectResult<()>),
    SelectTab(Tab),
    Image(ScreenMessage<ImageScreen>),
    Video(ScreenMessage<VideoScreen>),
    Camera(ScreenMessage<CameraScreen>),
    ModelError(ScreenMessage<ModelErrorScreen>),
}
