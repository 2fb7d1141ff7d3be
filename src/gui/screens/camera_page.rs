use iced::widget::image::Handle;
use iced::widget::{button, column, row, text};
use iced::{Element, Task};

use super::{OpenedSource, ParentMessage, Screen, ScreenMessage, escalate, listen};
use crate::driver::{DriverEvent, DriverState, FrameLoop};
use crate::gui::{AppState, widgets};
use crate::views::{CameraView, DetectionContext, PlayAction};

pub struct CameraScreen {
    view: CameraView,
    handle: Option<Handle>,
}

#[derive(Debug, Clone)]
pub enum CameraMessage {
    Start,
    Stop,
    Opened(OpenedSource),
    Event(DriverEvent),
    LoopFinished,
}

impl CameraScreen {
    pub fn new(ctx: DetectionContext) -> (Self, Task<ScreenMessage<Self>>) {
        let mut view = CameraView::new(ctx);
        let events = view.stream_mut().take_events();
        let screen = Self { view, handle: None };
        (screen, listen(events, CameraMessage::Event))
    }

    pub fn stop(&mut self) {
        self.view.stop_camera();
        self.handle = None;
    }

    fn run(frame_loop: FrameLoop) -> Task<ScreenMessage<Self>> {
        Task::perform(frame_loop.run(), |_| {
            ScreenMessage::ScreenMessage(CameraMessage::LoopFinished)
        })
    }
}

impl Screen for CameraScreen {
    type Message = CameraMessage;
    type ParentMessage = ParentMessage;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let stream = self.view.stream();
        let action = match stream.state() {
            DriverState::Starting => button("Starting camera..."),
            DriverState::Running | DriverState::Paused => button("Stop camera")
                .style(button::danger)
                .on_press(ScreenMessage::ScreenMessage(CameraMessage::Stop)),
            DriverState::Idle | DriverState::Stopped => button("Start camera")
                .on_press(ScreenMessage::ScreenMessage(CameraMessage::Start)),
        };
        let controls = row![
            action,
            text(self.view.settings().device.clone()).size(14)
        ]
        .spacing(10);

        let mut main = column![].spacing(8);
        if let Some(error) = stream.error() {
            main = main.push(widgets::error_line(error.to_string()));
        }
        main = main.push(widgets::frame(
            self.handle.as_ref(),
            "Start the camera to detect objects live",
        ));

        widgets::layout(controls, main, widgets::results(&self.view.view_model()))
    }

    fn update(
        &mut self,
        message: Self::Message,
        _state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            CameraMessage::Start => match self.view.start_camera() {
                Ok(PlayAction::Open(source)) => Task::perform(OpenedSource::open(source), |opened| {
                    ScreenMessage::ScreenMessage(CameraMessage::Opened(opened))
                }),
                Ok(PlayAction::Run(frame_loop)) => Self::run(frame_loop),
                Ok(PlayAction::Paused) | Err(_) => Task::none(),
            },
            CameraMessage::Stop => {
                self.stop();
                Task::none()
            }
            CameraMessage::Opened(opened) => {
                self.handle = None;
                match self.view.camera_opened(opened.take()) {
                    Ok(frame_loop) => Self::run(frame_loop),
                    Err(_) => Task::none(),
                }
            }
            CameraMessage::Event(event) => {
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
            CameraMessage::LoopFinished => Task::none(),
        }
    }
}
