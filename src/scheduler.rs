//! Fixed-rate playback loop.
//!
//! Every tick decodes one frame, renders and paints it, then sleeps for what is
//! left of the tick budget. A tick that overruns its budget does not sleep; if a
//! soundtrack is playing it is stopped and started again so the audio player
//! catches up with the late picture. A soundtrack that fails to start is dropped
//! and playback continues silently.

use crate::audio::Clip;
use crate::cli::ColorTarget;
use crate::codec::FrameReader;
use crate::quantizer::{Frame, GlyphPalette};
use crate::renderer::{render_frame, Screen};
use crate::Result;
use log::{debug, info, warn};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// A sequence of frames consumed one per tick
#[allow(async_fn_in_trait)]
pub trait FrameSource {
    /// Next frame, `None` at end of stream
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Called once the frame returned last has been painted
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<R: Read> FrameSource for FrameReader<R> {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        FrameReader::next_frame(self)
    }
}

/// Time budget of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBudget {
    interval: Duration,
}

impl TickBudget {
    /// `round(1000 / fps)` milliseconds
    pub fn from_fps(fps: u8) -> Self {
        let millis = (1000.0 / fps.max(1) as f64).round() as u64;
        Self {
            interval: Duration::from_millis(millis),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep left after `elapsed`, or `None` when the tick overran its budget
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.interval.checked_sub(elapsed)
    }
}

/// Lifecycle of a playback run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Priming,
    Running,
    Draining,
    Terminated,
}

/// Summary of a finished playback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub frames: u64,
    pub overruns: u64,
    pub elapsed: Duration,
    /// Why the soundtrack was dropped mid-playback, if it was
    pub audio_error: Option<String>,
}

pub struct PlaybackScheduler<'a> {
    palette: &'a GlyphPalette,
    target: ColorTarget,
    budget: TickBudget,
    state: PlaybackState,
}

impl<'a> PlaybackScheduler<'a> {
    pub fn new(fps: u8, palette: &'a GlyphPalette, target: ColorTarget) -> Self {
        Self {
            palette,
            target,
            budget: TickBudget::from_fps(fps),
            state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn budget(&self) -> TickBudget {
        self.budget
    }

    fn transition(&mut self, state: PlaybackState) {
        debug!("Playback state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Play `source` to its end on `screen`.
    ///
    /// The screen is finished on every exit path; errors from the source abort
    /// playback and are returned.
    pub async fn run<S, C, W>(
        &mut self,
        source: &mut S,
        mut clip: Option<&mut C>,
        screen: &mut Screen<W>,
    ) -> Result<PlaybackStats>
    where
        S: FrameSource,
        C: Clip,
        W: Write,
    {
        self.transition(PlaybackState::Priming);
        let started = Instant::now();

        let result = self.run_ticks(source, clip.as_deref_mut(), screen).await;

        let finished = screen.finish();
        if let Some(clip) = clip {
            if let Err(e) = clip.stop() {
                warn!("Could not stop the soundtrack: {}", e);
            }
        }
        self.transition(PlaybackState::Terminated);

        let mut stats = result?;
        finished?;
        stats.elapsed = started.elapsed();
        info!(
            "Played {} frames in {:.2}s ({} overruns)",
            stats.frames,
            stats.elapsed.as_secs_f64(),
            stats.overruns
        );
        Ok(stats)
    }

    async fn run_ticks<S, C, W>(
        &mut self,
        source: &mut S,
        mut clip: Option<&mut C>,
        screen: &mut Screen<W>,
    ) -> Result<PlaybackStats>
    where
        S: FrameSource,
        C: Clip,
        W: Write,
    {
        let mut stats = PlaybackStats::default();

        keep_playing(&mut clip, &mut stats, false);
        screen.begin()?;
        self.transition(PlaybackState::Running);

        loop {
            let tick_start = Instant::now();
            keep_playing(&mut clip, &mut stats, false);

            let frame = match source.next_frame().await? {
                Some(frame) => frame,
                None => break,
            };
            screen.paint(&render_frame(&frame, self.palette, self.target))?;
            source.release()?;
            stats.frames += 1;

            match self.budget.remaining(tick_start.elapsed()) {
                Some(sleep) => tokio::time::sleep(sleep).await,
                None => {
                    stats.overruns += 1;
                    keep_playing(&mut clip, &mut stats, true);
                }
            }
        }

        self.transition(PlaybackState::Draining);
        Ok(stats)
    }
}

/// Start the clip, or stop and start it when `restart` is set.
///
/// Once playback runs, a failing clip is dropped and the rest plays silently.
fn keep_playing<C: Clip>(clip: &mut Option<&mut C>, stats: &mut PlaybackStats, restart: bool) {
    let Some(current) = clip.as_deref_mut() else {
        return;
    };

    let result = if restart {
        current.stop().and_then(|()| current.start())
    } else {
        current.start()
    };

    if let Err(e) = result {
        warn!("Soundtrack dropped, continuing without sound: {}", e);
        let _ = current.stop();
        stats.audio_error = Some(e.to_string());
        *clip = None;
    }
}
