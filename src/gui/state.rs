use crate::views::DetectionContext;

/// State shared by every screen.
pub struct AppState {
    pub ctx: DetectionContext,
}

impl AppState {
    pub fn new(ctx: DetectionContext) -> Self {
        Self { ctx }
    }
}
