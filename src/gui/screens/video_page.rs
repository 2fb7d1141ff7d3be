use std::path::PathBuf;

use iced::widget::image::Handle;
use iced::widget::{button, column, row, text};
use iced::{Element, Task};
use rfd::AsyncFileDialog;
use tracing::warn;

use super::{OpenedSource, ParentMessage, Screen, ScreenMessage, escalate, listen};
use crate::driver::{DriverEvent, DriverState, FrameLoop};
use crate::gui::{AppState, widgets};
use crate::source::PlaybackMode;
use crate::views::{DetectionContext, PlayAction, VideoView};

pub struct VideoScreen {
    view: VideoView,
    handle: Option<Handle>,
    notice: Option<String>,
}

#[derive(Debug, Clone)]
pub enum VideoMessage {
    Pick,
    PickFolder,
    Picked(Option<PathBuf>),
    Toggle,
    Opened(OpenedSource),
    Event(DriverEvent),
    LoopFinished,
}

impl VideoScreen {
    pub fn new(ctx: DetectionContext) -> (Self, Task<ScreenMessage<Self>>) {
        let mut view = VideoView::new(ctx, PlaybackMode::Realtime);
        let events = view.stream_mut().take_events();
        let screen = Self {
            view,
            handle: None,
            notice: None,
        };
        (screen, listen(events, VideoMessage::Event))
    }

    pub fn stop(&mut self) {
        self.view.stop();
    }

    fn run(frame_loop: FrameLoop) -> Task<ScreenMessage<Self>> {
        Task::perform(frame_loop.run(), |_| {
            ScreenMessage::ScreenMessage(VideoMessage::LoopFinished)
        })
    }
}

impl Screen for VideoScreen {
    type Message = VideoMessage;
    type ParentMessage = ParentMessage;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let stream = self.view.stream();
        let toggle_label = match stream.state() {
            DriverState::Running => "Pause",
            DriverState::Paused => "Resume",
            DriverState::Starting => "Opening...",
            DriverState::Idle | DriverState::Stopped => "Play",
        };
        let mut toggle = button(toggle_label);
        if self.view.path().is_some() && stream.state() != DriverState::Starting {
            toggle = toggle.on_press(ScreenMessage::ScreenMessage(VideoMessage::Toggle));
        }
        let controls = row![
            button("Upload video").on_press(ScreenMessage::ScreenMessage(VideoMessage::Pick)),
            button("Open frame folder")
                .style(button::secondary)
                .on_press(ScreenMessage::ScreenMessage(VideoMessage::PickFolder)),
            toggle,
        ]
        .spacing(10);

        let mut main = column![].spacing(8);
        if let Some(path) = self.view.path() {
            main = main.push(text(path.display().to_string()).size(14));
        }
        if let Some(notice) = &self.notice {
            main = main.push(widgets::error_line(notice.clone()));
        }
        if let Some(error) = stream.error() {
            main = main.push(widgets::error_line(error.to_string()));
        }
        if stream.ended() {
            main = main.push(text("Video ended"));
        }
        main = main.push(widgets::frame(
            self.handle.as_ref(),
            "Upload an animated GIF or a folder of frames",
        ));

        widgets::layout(controls, main, widgets::results(&self.view.view_model()))
    }

    fn update(
        &mut self,
        message: Self::Message,
        _state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            VideoMessage::Pick => Task::perform(
                AsyncFileDialog::new().add_filter("Animated GIF", &["gif"]).pick_file(),
                |handle| {
                    ScreenMessage::ScreenMessage(VideoMessage::Picked(
                        handle.map(|h| h.path().to_path_buf()),
                    ))
                },
            ),
            VideoMessage::PickFolder => Task::perform(AsyncFileDialog::new().pick_folder(), |handle| {
                ScreenMessage::ScreenMessage(VideoMessage::Picked(
                    handle.map(|h| h.path().to_path_buf()),
                ))
            }),
            VideoMessage::Picked(None) => Task::none(),
            VideoMessage::Picked(Some(path)) => {
                self.view.upload(path);
                self.handle = None;
                self.notice = None;
                Task::none()
            }
            VideoMessage::Toggle => {
                self.notice = None;
                match self.view.toggle() {
                    Ok(PlayAction::Open(source)) => Task::perform(OpenedSource::open(source), |opened| {
                        ScreenMessage::ScreenMessage(VideoMessage::Opened(opened))
                    }),
                    Ok(PlayAction::Run(frame_loop)) => Self::run(frame_loop),
                    Ok(PlayAction::Paused) => Task::none(),
                    Err(e) => {
                        warn!("cannot toggle playback: {e}");
                        self.notice = Some(e.to_string());
                        Task::none()
                    }
                }
            }
            VideoMessage::Opened(opened) => match self.view.source_opened(opened.take()) {
                Ok(frame_loop) => Self::run(frame_loop),
                Err(_) => Task::none(),
            },
            VideoMessage::Event(event) => {
                let fatal = match &event {
                    DriverEvent::Failed { error, .. } => escalate(error),
                    _ => Task::none(),
                };
                if self.view.apply(event) {
                    if let Some(latest) = self.view.stream().latest() {
                        self.handle = Some(widgets::to_handle(latest.annotated()));
                    }
                }
                fatal
            }
            VideoMessage::LoopFinished => Task::none(),
        }
    }
}
