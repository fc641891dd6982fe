//! Alert sound playback.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::types::counters::Category;
use crate::types::errors::PlaybackError;

/// Starts playing one sound file.
///
/// Returns once playback has started or failed to start; the sound keeps
/// playing in the background.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, path: &Path, volume: f32) -> Result<(), PlaybackError>;
}

/// How an alert's sound request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Sound is disabled in the settings.
    Skipped,
    Played,
    PlayedOnRetry,
    Failed(String),
}

/// Maps a sound parameter to a bundled file.
///
/// Only the per-category alert sounds are accepted; anything else is
/// rejected before touching the filesystem.
pub fn resolve_sound_path(assets_dir: &Path, sound: &str) -> Result<PathBuf, PlaybackError> {
    Category::ALL
        .iter()
        .map(Category::sound_file)
        .find(|known| *known == sound)
        .map(|known| assets_dir.join(known))
        .ok_or_else(|| PlaybackError::UnknownSound(sound.to_string()))
}

/// Plays `path`, retrying exactly once after `retry_delay` on failure.
/// Failures are logged, never raised.
pub async fn play_alert_sound(
    player: Arc<dyn SoundPlayer>,
    path: PathBuf,
    volume: f32,
    retry_delay: Duration,
) -> PlaybackOutcome {
    match attempt(player.clone(), path.clone(), volume).await {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Playing sound");
            return PlaybackOutcome::Played;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Audio play failed, retrying");
        }
    }

    tokio::time::sleep(retry_delay).await;

    match attempt(player, path.clone(), volume).await {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Playing sound after retry");
            PlaybackOutcome::PlayedOnRetry
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Retry failed too");
            PlaybackOutcome::Failed(e.to_string())
        }
    }
}

async fn attempt(
    player: Arc<dyn SoundPlayer>,
    path: PathBuf,
    volume: f32,
) -> Result<(), PlaybackError> {
    tokio::task::spawn_blocking(move || player.play(&path, volume))
        .await
        .map_err(|e| PlaybackError::NoOutputDevice(e.to_string()))?
}

/// Player for builds without audio output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

impl SoundPlayer for SilentPlayer {
    fn play(&self, path: &Path, _volume: f32) -> Result<(), PlaybackError> {
        tracing::debug!(path = %path.display(), "audio disabled; not playing");
        Ok(())
    }
}

#[cfg(feature = "desktop")]
pub use rodio_player::RodioPlayer;

#[cfg(feature = "desktop")]
mod rodio_player {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;
    use std::sync::mpsc;
    use std::thread;

    use rodio::{Decoder, OutputStream, Sink};

    use super::SoundPlayer;
    use crate::types::errors::PlaybackError;

    /// Plays each sound on its own thread, which owns the output stream
    /// until the sound has finished.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RodioPlayer;

    impl SoundPlayer for RodioPlayer {
        fn play(&self, path: &Path, volume: f32) -> Result<(), PlaybackError> {
            let (tx, rx) = mpsc::channel::<Result<(), PlaybackError>>();
            let path = path.to_path_buf();

            thread::spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(output) => output,
                    Err(err) => {
                        let _ = tx.send(Err(PlaybackError::NoOutputDevice(err.to_string())));
                        return;
                    }
                };
                let file = match File::open(&path) {
                    Ok(file) => file,
                    Err(err) => {
                        let _ = tx.send(Err(PlaybackError::FileNotFound(format!(
                            "{}: {}",
                            path.display(),
                            err
                        ))));
                        return;
                    }
                };
                let decoder = match Decoder::new(BufReader::new(file)) {
                    Ok(decoder) => decoder,
                    Err(err) => {
                        let _ = tx.send(Err(PlaybackError::DecodeFailed(err.to_string())));
                        return;
                    }
                };
                let sink = match Sink::try_new(&handle) {
                    Ok(sink) => sink,
                    Err(err) => {
                        let _ = tx.send(Err(PlaybackError::NoOutputDevice(err.to_string())));
                        return;
                    }
                };
                sink.set_volume(volume.clamp(0.0, 2.0));
                sink.append(decoder);
                let _ = tx.send(Ok(()));
                sink.sleep_until_end();
            });

            rx.recv().unwrap_or_else(|_| {
                Err(PlaybackError::NoOutputDevice(
                    "audio thread exited".to_string(),
                ))
            })
        }
    }
}

/// The player matching the enabled features.
pub fn default_player() -> Arc<dyn SoundPlayer> {
    #[cfg(feature = "desktop")]
    {
        Arc::new(RodioPlayer)
    }
    #[cfg(not(feature = "desktop"))]
    {
        Arc::new(SilentPlayer)
    }
}
