use iced::widget::{button, column, container, row, text};
use iced::{Element, Length, Task, Theme};

use super::message::{Message, Tab};
use super::screens::camera_page::CameraScreen;
use super::screens::image_page::ImageScreen;
use super::screens::loading_page::LoadingPageScreen;
use super::screens::model_error::{ModelErrorParentMessage, ModelErrorScreen};
use super::screens::video_page::VideoScreen;
use super::screens::{ParentMessage, Screen, ScreenMessage};
use super::state::AppState;
use crate::error::DetectError;
use crate::views::DetectionContext;

enum ModelStatus {
    Loading(LoadingPageScreen),
    Ready,
    Failed(ModelErrorScreen),
}

pub struct ObjscopeApp {
    state: AppState,
    model: ModelStatus,
    tab: Tab,
    image: ImageScreen,
    video: VideoScreen,
    camera: CameraScreen,
}

fn load_model(ctx: &DetectionContext) -> Task<Message> {
    let adapter = ctx.adapter.clone();
    Task::perform(
        async move { adapter.ensure_model_ready().await.map(|_| ()) },
        Message::ModelReady,
    )
}

impl ObjscopeApp {
    pub fn new(ctx: DetectionContext) -> (Self, Task<Message>) {
        let (video, video_events) = VideoScreen::new(ctx.clone());
        let (camera, camera_events) = CameraScreen::new(ctx.clone());
        let boot = Task::batch([
            load_model(&ctx),
            video_events.map(Message::Video),
            camera_events.map(Message::Camera),
        ]);
        let app = Self {
            image: ImageScreen::new(ctx.clone()),
            video,
            camera,
            state: AppState::new(ctx),
            model: ModelStatus::Loading(LoadingPageScreen),
            tab: Tab::Image,
        };
        (app, boot)
    }

    pub fn theme(&self) -> Theme {
        Theme::Dark
    }

    fn model_failed(&mut self, error: DetectError) -> Task<Message> {
        self.video.stop();
        self.camera.stop();
        self.model = ModelStatus::Failed(ModelErrorScreen::new(error));
        Task::none()
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ModelReady(Ok(())) => {
                self.model = ModelStatus::Ready;
                Task::none()
            }
            Message::ModelReady(Err(error)) => self.model_failed(error),
            Message::SelectTab(tab) if tab != self.tab => {
                // Leaving a streaming tab releases its source.
                match self.tab {
                    Tab::Video => self.video.stop(),
                    Tab::Camera => self.camera.stop(),
                    Tab::Image => {}
                }
                self.tab = tab;
                Task::none()
            }
            Message::SelectTab(_) => Task::none(),
            Message::Image(ScreenMessage::ScreenMessage(msg)) => self
                .image
                .update(msg, &mut self.state)
                .map(Message::Image),
            Message::Video(ScreenMessage::ScreenMessage(msg)) => self
                .video
                .update(msg, &mut self.state)
                .map(Message::Video),
            Message::Camera(ScreenMessage::ScreenMessage(msg)) => self
                .camera
                .update(msg, &mut self.state)
                .map(Message::Camera),
            Message::Image(ScreenMessage::ParentMessage(ParentMessage::ModelFailed(error)))
            | Message::Video(ScreenMessage::ParentMessage(ParentMessage::ModelFailed(error)))
            | Message::Camera(ScreenMessage::ParentMessage(ParentMessage::ModelFailed(error))) => {
                self.model_failed(error)
            }
            Message::ModelError(ScreenMessage::ScreenMessage(msg)) => match &mut self.model {
                ModelStatus::Failed(screen) => screen
                    .update(msg, &mut self.state)
                    .map(Message::ModelError),
                _ => Task::none(),
            },
            Message::ModelError(ScreenMessage::ParentMessage(ModelErrorParentMessage::Retry)) => {
                self.model = ModelStatus::Loading(LoadingPageScreen);
                load_model(&self.state.ctx)
            }
        }
    }

    fn tab_button(&self, label: &'static str, tab: Tab) -> Element<'_, Message> {
        let style = if self.tab == tab {
            button::primary
        } else {
            button::secondary
        };
        button(text(label))
            .style(style)
            .on_press(Message::SelectTab(tab))
            .into()
    }

    pub fn view(&self) -> Element<'_, Message> {
        match &self.model {
            ModelStatus::Loading(screen) => {
                return screen.view().map(|msg| match msg {
                    ScreenMessage::ScreenMessage(never) => match never {},
                    ScreenMessage::ParentMessage(never) => match never {},
                });
            }
            ModelStatus::Failed(screen) => return screen.view().map(Message::ModelError),
            ModelStatus::Ready => {}
        }

        let header = row![
            text("objscope").size(28),
            container(
                row![
                    self.tab_button("Image", Tab::Image),
                    self.tab_button("Video", Tab::Video),
                    self.tab_button("Camera", Tab::Camera),
                ]
                .spacing(8)
            )
            .align_right(Length::Fill),
        ]
        .spacing(20)
        .padding(16);

        let body = match self.tab {
            Tab::Image => self.image.view().map(Message::Image),
            Tab::Video => self.video.view().map(Message::Video),
            Tab::Camera => self.camera.view().map(Message::Camera),
        };

        column![header, body].into()
    }
}
