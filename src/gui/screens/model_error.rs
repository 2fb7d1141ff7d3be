use iced::{
    Alignment::Center,
    Element, Task,
    widget::{button, column, container, text},
};

use crate::error::DetectError;
use crate::gui::{
    AppState, widgets,
    screens::{Screen, ScreenMessage},
};

/// Full-window prompt after the model failed to load.
#[derive(Debug, Clone)]
pub struct ModelErrorScreen {
    error: DetectError,
}

#[derive(Debug, Clone)]
pub enum ModelErrorMessage {
    Retry,
}

#[derive(Debug, Clone)]
pub enum ModelErrorParentMessage {
    Retry,
}

impl ModelErrorScreen {
    pub fn new(error: DetectError) -> Self {
        Self { error }
    }
}

impl Screen for ModelErrorScreen {
    type Message = ModelErrorMessage;
    type ParentMessage = ModelErrorParentMessage;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        container(
            column![
                text("Failed to load the AI model").size(24),
                widgets::error_line(self.error.to_string()),
                button("Retry").on_press(ScreenMessage::ScreenMessage(ModelErrorMessage::Retry)),
            ]
            .spacing(16)
            .align_x(Center),
        )
        .center_x(iced::Length::Fill)
        .center_y(iced::Length::Fill)
        .into()
    }

    fn update(
        &mut self,
        message: Self::Message,
        _state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            ModelErrorMessage::Retry => {
                Task::done(ScreenMessage::ParentMessage(ModelErrorParentMessage::Retry))
            }
        }
    }
}
