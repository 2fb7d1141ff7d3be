use std::path::PathBuf;

use iced::widget::image::Handle;
use iced::widget::{button, column, row, text};
use iced::{Element, Task};
use rfd::AsyncFileDialog;

use super::{ParentMessage, Screen, ScreenMessage, escalate};
use crate::error::DetectResult;
use crate::gui::{AppState, widgets};
use crate::views::image::load_still;
use crate::views::{DetectionContext, ImageResult, ImageView, ImageViewState};

pub struct ImageScreen {
    view: ImageView,
    handle: Option<Handle>,
    /// Bumped per selection so late results for an earlier file are ignored.
    request: u64,
    busy: bool,
}

#[derive(Debug, Clone)]
pub enum ImageMessage {
    Pick,
    Picked(Option<PathBuf>),
    Detected(u64, DetectResult<ImageResult>),
    Clear,
}

impl ImageScreen {
    pub fn new(ctx: DetectionContext) -> Self {
        Self {
            view: ImageView::new(ctx),
            handle: None,
            request: 0,
            busy: false,
        }
    }
}

impl Screen for ImageScreen {
    type Message = ImageMessage;
    type ParentMessage = ParentMessage;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let mut controls = row![
            button("Upload image").on_press(ScreenMessage::ScreenMessage(ImageMessage::Pick))
        ]
        .spacing(10);
        if self.view.path().is_some() {
            controls = controls.push(
                button("Clear")
                    .style(button::secondary)
                    .on_press(ScreenMessage::ScreenMessage(ImageMessage::Clear)),
            );
        }

        let mut main = column![].spacing(8);
        if let Some(path) = self.view.path() {
            main = main.push(text(path.display().to_string()).size(14));
        }
        if let ImageViewState::Failed(error) = self.view.state() {
            main = main.push(widgets::error_line(error.to_string()));
        }
        let placeholder = if self.busy {
            "Detecting objects..."
        } else {
            "Upload an image to detect objects"
        };
        main = main.push(widgets::frame(self.handle.as_ref(), placeholder));

        widgets::layout(
            controls,
            main,
            widgets::results(&self.view.view_model()),
        )
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            ImageMessage::Pick => Task::perform(
                AsyncFileDialog::new()
                    .add_filter("Images", &["png", "jpg", "jpeg", "bmp", "webp", "gif"])
                    .pick_file(),
                |handle| {
                    ScreenMessage::ScreenMessage(ImageMessage::Picked(
                        handle.map(|h| h.path().to_path_buf()),
                    ))
                },
            ),
            ImageMessage::Picked(None) => Task::none(),
            ImageMessage::Picked(Some(path)) => {
                self.view.select(path.clone());
                self.handle = None;
                self.busy = true;
                self.request += 1;
                let request = self.request;
                let ctx = state.ctx.clone();
                Task::perform(
                    async move {
                        let frame = load_still(&path).await?;
                        ctx.detect_still(frame).await
                    },
                    move |result| ScreenMessage::ScreenMessage(ImageMessage::Detected(request, result)),
                )
            }
            ImageMessage::Detected(request, _) if request != self.request => Task::none(),
            ImageMessage::Detected(_, result) => {
                self.busy = false;
                match self.view.apply_result(result) {
                    Ok(result) => {
                        self.handle = Some(widgets::to_handle(result.annotated()));
                        Task::none()
                    }
                    Err(e) => escalate(&e),
                }
            }
            ImageMessage::Clear => {
                self.view.clear();
                self.handle = None;
                self.busy = false;
                self.request += 1;
                Task::none()
            }
        }
    }
}
