use std::convert::Infallible;

use iced::{
    Alignment::Center,
    Element, Task,
    widget::{column, container, text},
};

use crate::gui::{
    AppState,
    screens::{Screen, ScreenMessage},
};

/// Shown while the detection model loads.
#[derive(Debug, Clone)]
pub struct LoadingPageScreen;

impl Screen for LoadingPageScreen {
    type Message = Infallible;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        container(
            column![
                text("Loading AI model...").size(24),
                text("This may take a few seconds on first use"),
            ]
            .spacing(10)
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
        match message {}
    }
}
