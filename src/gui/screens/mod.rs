pub mod camera_page;
pub mod image_page;
pub mod loading_page;
pub mod model_error;
pub mod video_page;

use std::fmt;
use std::sync::{Arc, Mutex};

use iced::futures::stream;
use iced::{Element, Task};
use tokio::sync::mpsc;

use crate::driver::DriverEvent;
use crate::error::DetectError;
use crate::gui::AppState;
use crate::source::{FrameSource, open_source};

pub enum ScreenMessage<S: Screen> {
    ScreenMessage(S::Message),
    ParentMessage(S::ParentMessage),
}

impl<S: Screen> Clone for ScreenMessage<S> {
    fn clone(&self) -> Self {
        match self {
            ScreenMessage::ScreenMessage(m) => ScreenMessage::ScreenMessage(m.clone()),
            ScreenMessage::ParentMessage(m) => ScreenMessage::ParentMessage(m.clone()),
        }
    }
}

impl<S: Screen> fmt::Debug for ScreenMessage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenMessage::ScreenMessage(m) => f.debug_tuple("ScreenMessage").field(m).finish(),
            ScreenMessage::ParentMessage(m) => f.debug_tuple("ParentMessage").field(m).finish(),
        }
    }
}

pub trait Screen: Sized {
    type Message: fmt::Debug + Clone;
    type ParentMessage: fmt::Debug + Clone;
    fn view(&self) -> Element<'_, ScreenMessage<Self>>;
    fn update(&mut self, message: Self::Message, state: &mut AppState)
    -> Task<ScreenMessage<Self>>;
}

/// What a detection screen reports upward.
#[derive(Debug, Clone)]
pub enum ParentMessage {
    /// The model could not be loaded; the whole window switches to the retry prompt.
    ModelFailed(DetectError),
}

/// Escalate `error` to the parent when it is fatal to the session.
fn escalate<S>(error: &DetectError) -> Task<ScreenMessage<S>>
where
    S: Screen<ParentMessage = ParentMessage>,
{
    if error.is_fatal() {
        Task::done(ScreenMessage::ParentMessage(ParentMessage::ModelFailed(
            error.clone(),
        )))
    } else {
        Task::none()
    }
}

/// A source opened off the update loop, carried back through a message.
#[derive(Clone)]
pub struct OpenedSource(Arc<Mutex<Option<anyhow::Result<Box<dyn FrameSource>>>>>);

impl OpenedSource {
    pub async fn open(source: Box<dyn FrameSource>) -> Self {
        Self(Arc::new(Mutex::new(Some(open_source(source).await))))
    }

    pub fn take(&self) -> anyhow::Result<Box<dyn FrameSource>> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .unwrap_or_else(|| Err(anyhow::anyhow!("source was already handed over")))
    }
}

impl fmt::Debug for OpenedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpenedSource")
    }
}

/// Forward every driver event into the update loop.
fn listen<S, F>(events: Option<mpsc::Receiver<DriverEvent>>, wrap: F) -> Task<ScreenMessage<S>>
where
    S: Screen + 'static,
    S::Message: Send + 'static,
    S::ParentMessage: Send + 'static,
    F: Fn(DriverEvent) -> S::Message + Send + 'static,
{
    let Some(rx) = events else {
        return Task::none();
    };
    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    });
    Task::run(events, move |event| ScreenMessage::ScreenMessage(wrap(event)))
}
