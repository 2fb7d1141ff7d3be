use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use image::RgbImage;

use super::{Frame, FrameSource, decode_image};

enum Origin {
    File(PathBuf),
    Memory,
}

/// A single image, yielded once.
pub struct StillSource {
    origin: Origin,
    frame: Option<Frame>,
    delivered: bool,
}

impl StillSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            origin: Origin::File(path.into()),
            frame: None,
            delivered: false,
        }
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self {
            origin: Origin::Memory,
            frame: Some(Arc::new(image)),
            delivered: false,
        }
    }
}

#[async_trait]
impl FrameSource for StillSource {
    async fn open(&mut self) -> Result<()> {
        if let Origin::File(path) = &self.origin {
            self.frame = Some(Arc::new(decode_image(path).await?));
        }
        self.delivered = false;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.delivered {
            return Ok(None);
        }
        self.delivered = true;
        Ok(self.frame.clone())
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.frame.as_ref().map(|f| f.dimensions())
    }

    fn close(&mut self) {
        self.delivered = true;
    }

    fn describe(&self) -> String {
        match &self.origin {
            Origin::File(path) => format!("image {}", path.display()),
            Origin::Memory => "in-memory image".to_string(),
        }
    }
}
