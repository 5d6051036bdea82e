//! Live playback while frames are still being extracted.
//!
//! The producer writes numbered frame images into a directory; the consumer
//! picks up `N.jpg` when its tick comes and deletes it once painted. A missing
//! frame while the producer is still running means playback outran extraction,
//! which is an error rather than a reason to wait.

use crate::extract::frame_path;
use crate::quantizer::{quantize_image, ColorMode, Frame, GlyphPalette};
use crate::scheduler::FrameSource;
use crate::{GlyphreelError, Result};
use log::debug;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Head start given to the producer before the first frame is consumed
pub const PRODUCER_HEAD_START: Duration = Duration::from_millis(1000);

/// Handle to a background producer task
pub struct Producer {
    handle: Option<JoinHandle<Result<()>>>,
}

impl Producer {
    /// Run `job` in the background
    pub fn spawn<F>(job: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(job)),
        }
    }

    /// Whether the producer is still running
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the producer and return its outcome.
    ///
    /// The outcome is only reported once; later calls return `Ok(())`.
    pub async fn finish(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(GlyphreelError::ProducerFailure {
                command: "frame producer".to_string(),
                code: None,
                output: e.to_string(),
            }),
        }
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        // Aborting drops the running command, which kills it
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Frame source reading `1.jpg`, `2.jpg`, ... from a directory fed by a producer
pub struct FrameDirectory<'a> {
    dir: PathBuf,
    next_index: u64,
    producer: &'a mut Producer,
    palette: &'a GlyphPalette,
    mode: ColorMode,
    painted: Option<PathBuf>,
}

impl<'a> FrameDirectory<'a> {
    pub fn new(
        dir: &Path,
        producer: &'a mut Producer,
        palette: &'a GlyphPalette,
        mode: ColorMode,
    ) -> Self {
        Self {
            dir: dir.to_path_buf(),
            next_index: 1,
            producer,
            palette,
            mode,
            painted: None,
        }
    }

    /// Index of the frame file consumed next
    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}

impl FrameSource for FrameDirectory<'_> {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        let path = frame_path(&self.dir, self.next_index);

        if !path.exists() {
            if self.producer.is_alive() {
                return Err(GlyphreelError::Outrun {
                    frame: self.next_index,
                    dir: self.dir.clone(),
                });
            }
            self.producer.finish().await?;
            // The last frame may have landed between the check and the producer exiting
            if !path.exists() {
                debug!("No frame {} and the producer is done", self.next_index);
                return Ok(None);
            }
        }

        let image = image::open(&path)?.to_rgb8();
        let frame = quantize_image(&image, self.palette, self.mode);
        self.painted = Some(path);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<()> {
        if let Some(path) = self.painted.take() {
            fs::remove_file(&path).map_err(|e| {
                GlyphreelError::Io(std::io::Error::new(
                    e.kind(),
                    format!("could not delete frame file {}: {}", path.display(), e),
                ))
            })?;
        }
        Ok(())
    }
}
