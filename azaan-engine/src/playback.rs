//! The audio action triggered at each prayer.

use crate::common::Prayer;
use crate::config::AudioConfig;
use crate::error::PlaybackError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

/// Plays the call to prayer and returns once it has finished.
#[async_trait]
pub trait Player: Send + Sync {
    async fn play(&self, prayer: Prayer) -> Result<(), PlaybackError>;
}

/// Runs an external audio program on a fixed file, e.g. `afplay azaan.mp3`.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    command: String,
    args: Vec<String>,
    file: PathBuf,
}

impl CommandPlayer {
    pub fn new(audio: &AudioConfig) -> Self {
        Self {
            command: audio.command.clone(),
            args: audio.args.clone(),
            file: audio.file.clone(),
        }
    }
}

#[async_trait]
impl Player for CommandPlayer {
    async fn play(&self, prayer: Prayer) -> Result<(), PlaybackError> {
        info!("Time for {} prayer! Playing azaan...", prayer);
        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(&self.file)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| PlaybackError::Spawn {
                command: self.command.clone(),
                source,
            })?;
        if !status.success() {
            return Err(PlaybackError::ExitStatus {
                command: self.command.clone(),
                status,
            });
        }
        info!("Azaan for {} completed.", prayer);
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn player(command: &str, args: &[&str]) -> CommandPlayer {
        CommandPlayer::new(&AudioConfig {
            file: PathBuf::from("azaan.mp3"),
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    #[tokio::test]
    async fn successful_command_is_ok() {
        // `true` ignores its arguments, including the file path.
        assert!(player("true", &[]).play(Prayer::Fajr).await.is_ok());
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let err = player("false", &[]).play(Prayer::Asr).await.unwrap_err();
        assert!(matches!(err, PlaybackError::ExitStatus { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = player("definitely-not-an-audio-player", &[])
            .play(Prayer::Isha)
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Spawn { .. }));
    }
}
