mod app;
mod message;
mod screens;
mod state;
mod widgets;

use anyhow::Result;

pub use app::ObjscopeApp;
pub use message::{Message, Tab};
pub use state::AppState;

use crate::config::Config;
use crate::views::DetectionContext;

/// Open the desktop window and block until it closes.
pub fn run(config: Config) -> Result<()> {
    let ctx = DetectionContext::from_config(&config)?;
    iced::application(
        move || ObjscopeApp::new(ctx.clone()),
        ObjscopeApp::update,
        ObjscopeApp::view,
    )
    .title("objscope - Object Detection")
    .theme(ObjscopeApp::theme)
    .window_size((1280.0, 820.0))
    .run()
    .map_err(|e| anyhow::anyhow!("GUI error: {}", e))
}
