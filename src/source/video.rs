use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;
use tracing::info;

use super::{Frame, FrameSource, decode_image};

/// Browsers treat GIF delays this short as "unspecified".
const MIN_GIF_DELAY: Duration = Duration::from_millis(20);
const DEFAULT_GIF_DELAY: Duration = Duration::from_millis(100);

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    #[default]
    Realtime,
    EveryFrame,
}

struct VideoFrame {
    image: Frame,
    duration: Duration,
}

/// Playback position that only advances while playing.
#[derive(Debug, Clone, Default)]
struct PlaybackClock {
    playing_since: Option<Instant>,
    accumulated: Duration,
}

impl PlaybackClock {
    fn play(&mut self, now: Instant) {
        if self.playing_since.is_none() {
            self.playing_since = Some(now);
        }
    }

    fn pause(&mut self, now: Instant) {
        if let Some(since) = self.playing_since.take() {
            self.accumulated += now.saturating_duration_since(since);
        }
    }

    fn position(&self, now: Instant) -> Duration {
        self.accumulated
            + self
                .playing_since
                .map(|since| now.saturating_duration_since(since))
                .unwrap_or_default()
    }
}

/// A GIF or a directory of frames, decoded whole on `open`. In realtime mode
/// `next_frame` returns the frame under the playback clock; in every-frame
/// mode it steps one frame per call.
pub struct VideoSource {
    path: PathBuf,
    mode: PlaybackMode,
    /// Rate used for directories of frames.
    fps: u32,
    frames: Vec<VideoFrame>,
    clock: PlaybackClock,
    cursor: usize,
}

impl VideoSource {
    pub fn new(path: impl Into<PathBuf>, mode: PlaybackMode, fps: u32) -> Self {
        Self {
            path: path.into(),
            mode,
            fps: fps.max(1),
            frames: Vec::new(),
            clock: PlaybackClock::default(),
            cursor: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|f| f.duration).sum()
    }

    /// Index of the frame showing at `position`, `None` past the end.
    fn frame_index_at(&self, position: Duration) -> Option<usize> {
        let mut end = Duration::ZERO;
        for (i, frame) in self.frames.iter().enumerate() {
            end += frame.duration;
            if position < end {
                return Some(i);
            }
        }
        None
    }

    async fn load_frames(&self) -> Result<Vec<VideoFrame>> {
        if self.path.is_dir() {
            return load_directory(&self.path, self.fps).await;
        }
        let is_gif = self
            .path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("gif"))
            .unwrap_or(false);
        if !is_gif {
            anyhow::bail!(
                "unsupported video {}; use an animated GIF or a directory of frames",
                self.path.display()
            );
        }
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_gif(&path))
            .await
            .context("GIF decoding task panicked")?
    }
}

fn load_gif(path: &Path) -> Result<Vec<VideoFrame>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let decoder = GifDecoder::new(BufReader::new(file))
        .with_context(|| format!("failed to read GIF {}", path.display()))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .with_context(|| format!("failed to decode GIF frames of {}", path.display()))?;

    Ok(frames
        .into_iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = Duration::from_secs_f64(numer as f64 / denom.max(1) as f64 / 1000.0);
            let duration = if delay < MIN_GIF_DELAY {
                DEFAULT_GIF_DELAY
            } else {
                delay
            };
            let rgb = image::DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8();
            VideoFrame {
                image: Arc::new(rgb),
                duration,
            }
        })
        .collect())
}

async fn load_directory(dir: &Path, fps: u32) -> Result<Vec<VideoFrame>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let duration = Duration::from_secs_f64(1.0 / fps as f64);
    let mut frames = Vec::with_capacity(paths.len());
    for path in paths {
        frames.push(VideoFrame {
            image: Arc::new(decode_image(&path).await?),
            duration,
        });
    }
    Ok(frames)
}

#[async_trait]
impl FrameSource for VideoSource {
    async fn open(&mut self) -> Result<()> {
        let frames = self.load_frames().await?;
        if frames.is_empty() {
            anyhow::bail!("{} contains no frames", self.path.display());
        }
        let (w, h) = frames[0].image.dimensions();
        if frames.iter().any(|f| f.image.dimensions() != (w, h)) {
            anyhow::bail!("frames in {} differ in size", self.path.display());
        }
        self.frames = frames;
        self.clock = PlaybackClock::default();
        self.cursor = 0;
        info!(
            path = %self.path.display(),
            frames = self.frames.len(),
            width = w,
            height = h,
            "video opened"
        );
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        let index = match self.mode {
            PlaybackMode::EveryFrame => {
                let i = self.cursor;
                self.cursor += 1;
                (i < self.frames.len()).then_some(i)
            }
            PlaybackMode::Realtime => {
                let now = Instant::now();
                self.clock.play(now);
                self.frame_index_at(self.clock.position(now))
            }
        };
        Ok(index.map(|i| self.frames[i].image.clone()))
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.first().map(|f| f.image.dimensions())
    }

    fn pause(&mut self) {
        self.clock.pause(Instant::now());
    }

    fn resume(&mut self) {
        if self.mode == PlaybackMode::Realtime {
            self.clock.play(Instant::now());
        }
    }

    fn close(&mut self) {
        self.frames.clear();
    }

    fn describe(&self) -> String {
        format!("video {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Delay, RgbImage, Rgba, RgbaImage};
    use image::codecs::gif::GifEncoder;

    fn write_frames(dir: &Path, count: u8) {
        for i in 0..count {
            RgbImage::from_pixel(6, 4, image::Rgb([i * 10, 0, 0]))
                .save(dir.join(format!("frame_{i:03}.png")))
                .unwrap();
        }
    }

    #[test]
    fn clock_only_advances_while_playing() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::default();
        assert_eq!(clock.position(t0 + Duration::from_secs(5)), Duration::ZERO);

        clock.play(t0);
        clock.pause(t0 + Duration::from_millis(300));
        assert_eq!(
            clock.position(t0 + Duration::from_secs(9)),
            Duration::from_millis(300)
        );

        clock.play(t0 + Duration::from_secs(10));
        assert_eq!(
            clock.position(t0 + Duration::from_millis(10_200)),
            Duration::from_millis(500)
        );
    }

    #[tokio::test]
    async fn directory_frames_in_name_order() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        write_frames(dir.path(), 3);
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let mut source = VideoSource::new(dir.path(), PlaybackMode::EveryFrame, 10);
        source.open().await?;
        assert_eq!(source.frame_count(), 3);
        assert_eq!(source.total_duration(), Duration::from_millis(300));

        for i in 0..3u8 {
            let frame = source.next_frame().await?.unwrap();
            assert_eq!(frame.get_pixel(0, 0).0[0], i * 10);
        }
        assert!(source.next_frame().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn frame_lookup_by_position() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        write_frames(dir.path(), 4);
        let mut source = VideoSource::new(dir.path(), PlaybackMode::Realtime, 4);
        source.open().await?;

        assert_eq!(source.frame_index_at(Duration::ZERO), Some(0));
        assert_eq!(source.frame_index_at(Duration::from_millis(260)), Some(1));
        assert_eq!(source.frame_index_at(Duration::from_millis(999)), Some(3));
        assert_eq!(source.frame_index_at(Duration::from_millis(1000)), None);
        Ok(())
    }

    #[tokio::test]
    async fn decodes_animated_gif() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("clip.gif");
        {
            let file = File::create(&path)?;
            let mut encoder = GifEncoder::new(file);
            for shade in [0u8, 200] {
                let frame = image::Frame::from_parts(
                    RgbaImage::from_pixel(8, 8, Rgba([shade, shade, shade, 255])),
                    0,
                    0,
                    Delay::from_numer_denom_ms(50, 1),
                );
                encoder.encode_frame(frame)?;
            }
        }

        let mut source = VideoSource::new(&path, PlaybackMode::EveryFrame, 25);
        source.open().await?;
        assert_eq!(source.frame_count(), 2);
        assert_eq!(source.dimensions(), Some((8, 8)));
        assert_eq!(source.total_duration(), Duration::from_millis(100));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_unknown_containers_and_empty_dirs() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let mut empty = VideoSource::new(dir.path(), PlaybackMode::Realtime, 25);
        assert!(empty.open().await.is_err());

        let mut mp4 = VideoSource::new(dir.path().join("clip.mp4"), PlaybackMode::Realtime, 25);
        assert!(mp4.open().await.is_err());
        Ok(())
    }
}
