//! Soundtrack playback through an external audio player process.

use crate::{GlyphreelError, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// An opened audio clip.
///
/// `start` and `stop` must be idempotent and must not block: the scheduler calls
/// `start` on every tick.
pub trait Clip {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
}

/// Clip played by spawning an ffplay-compatible player.
///
/// Stopping kills the player and remembers how far it got; starting again
/// resumes from that position.
pub struct ExternalClip {
    player: String,
    path: PathBuf,
    child: Option<Child>,
    started_at: Option<Instant>,
    position: Duration,
    ended: bool,
}

/// Open `path` for playback with the given player executable
pub fn open_clip(path: &Path, player: &str) -> Result<ExternalClip> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| {
            GlyphreelError::Audio(format!("could not open audio file {}: {}", path.display(), e))
        })?;
    if metadata.len() == 0 {
        return Err(GlyphreelError::Audio(format!("audio file {} is empty", path.display())));
    }

    let status = Command::new(player)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| {
            GlyphreelError::Audio(format!("audio player '{}' is not available: {}", player, e))
        })?;
    if !status.success() {
        return Err(GlyphreelError::Audio(format!(
            "audio player '{}' exited with {}",
            player, status
        )));
    }

    debug!("Opened audio clip {} with {}", path.display(), player);
    Ok(ExternalClip {
        player: player.to_string(),
        path: path.to_path_buf(),
        child: None,
        started_at: None,
        position: Duration::ZERO,
        ended: false,
    })
}

impl ExternalClip {
    /// Playback position reached so far
    pub fn position(&self) -> Duration {
        self.position + self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn is_playing(&mut self) -> bool {
        match self.child.as_mut().map(|child| child.try_wait()) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) => {
                // The player exited by itself: the soundtrack is over
                self.child = None;
                self.started_at = None;
                self.ended = true;
                false
            }
            None => false,
        }
    }
}

impl Clip for ExternalClip {
    fn start(&mut self) -> Result<()> {
        if self.ended || self.is_playing() {
            return Ok(());
        }

        let child = Command::new(&self.player)
            .args(["-nodisp", "-autoexit", "-loglevel", "quiet", "-ss"])
            .arg(format!("{:.3}", self.position.as_secs_f64()))
            .arg(&self.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                GlyphreelError::Audio(format!("could not start '{}': {}", self.player, e))
            })?;

        self.child = Some(child);
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("Could not stop audio player: {}", e);
            }
            let _ = child.wait();
        }
        if let Some(started_at) = self.started_at.take() {
            self.position += started_at.elapsed();
        }
        Ok(())
    }
}

impl Drop for ExternalClip {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let result = open_clip(Path::new("does-not-exist.wav"), "ffplay");
        assert!(matches!(result, Err(GlyphreelError::Audio(_))));
    }

    #[test]
    fn test_open_missing_player() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let result = open_clip(&path, "glyphreel-no-such-player");
        assert!(matches!(result, Err(GlyphreelError::Audio(_))));
    }

    #[test]
    fn test_stop_accumulates_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        // No player process, only the position bookkeeping
        let mut clip = ExternalClip {
            player: "ffplay".to_string(),
            path,
            child: None,
            started_at: Some(Instant::now() - Duration::from_millis(500)),
            position: Duration::from_secs(1),
            ended: false,
        };
        clip.stop().unwrap();
        assert!(clip.position() >= Duration::from_millis(1500));
        assert!(clip.started_at.is_none());
    }
}
