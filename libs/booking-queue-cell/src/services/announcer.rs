use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::BookingQueueError;

/// Substrings (lower-case) that mark a voice as female-sounding.
pub const FEMALE_VOICE_HINTS: [&str; 5] = ["female", "woman", "girl", "samantha", "google us english"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub name: String,
}

impl Voice {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Text-to-speech output.
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Completes once [`Announcer::voices`] returns the final list.
    async fn voices_ready(&self);

    fn voices(&self) -> Vec<Voice>;

    /// Speaks `text`, using the platform default when `voice` is `None`.
    async fn speak(&self, text: &str, voice: Option<&Voice>) -> Result<(), BookingQueueError>;
}

pub fn select_voice(voices: &[Voice]) -> Option<&Voice> {
    voices.iter().find(|voice| {
        let name = voice.name.to_lowercase();
        FEMALE_VOICE_HINTS.iter().any(|hint| name.contains(hint))
    })
}

pub fn next_patient_announcement(full_name: &str) -> String {
    format!("Next patient is {}", full_name)
}

#[derive(Clone)]
pub struct AnnouncementService {
    announcer: Arc<dyn Announcer>,
    ready_timeout: Duration,
}

impl AnnouncementService {
    pub fn new(announcer: Arc<dyn Announcer>) -> Self {
        Self {
            announcer,
            ready_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }

    /// Waits for the voice list, then speaks with a female-sounding voice if
    /// one is installed. Past the timeout the default voice is used.
    pub async fn announce(&self, text: &str) -> Result<(), BookingQueueError> {
        if timeout(self.ready_timeout, self.announcer.voices_ready()).await.is_err() {
            warn!("Voices not ready after {:?}, using default voice", self.ready_timeout);
            return self.announcer.speak(text, None).await;
        }

        let voices = self.announcer.voices();
        let voice = select_voice(&voices);
        debug!("Announcing with voice {:?}", voice.map(|v| v.name.as_str()));

        self.announcer.speak(text, voice).await
    }

    /// Fire-and-forget announcement; failures are logged.
    pub fn announce_next_patient(&self, full_name: &str) -> JoinHandle<()> {
        let service = self.clone();
        let text = next_patient_announcement(full_name);

        tokio::spawn(async move {
            if let Err(e) = service.announce(&text).await {
                warn!("Announcement failed: {}", e);
            }
        })
    }
}

/// Writes announcements to the log. Used when no speech command is set.
pub struct LogAnnouncer {
    voices: Vec<Voice>,
}

impl LogAnnouncer {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }
}

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn voices_ready(&self) {}

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    async fn speak(&self, text: &str, voice: Option<&Voice>) -> Result<(), BookingQueueError> {
        info!(voice = ?voice.map(|v| v.name.as_str()), "Announcement: {}", text);
        Ok(())
    }
}

/// Runs an external speech program as `<program> [-v <voice>] <text>`.
pub struct CommandAnnouncer {
    program: String,
    voices: Vec<Voice>,
}

impl CommandAnnouncer {
    pub fn new(program: impl Into<String>, voices: Vec<Voice>) -> Self {
        Self {
            program: program.into(),
            voices,
        }
    }
}

#[async_trait]
impl Announcer for CommandAnnouncer {
    async fn voices_ready(&self) {}

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    async fn speak(&self, text: &str, voice: Option<&Voice>) -> Result<(), BookingQueueError> {
        let mut command = Command::new(&self.program);
        if let Some(voice) = voice {
            command.arg("-v").arg(&voice.name);
        }
        command.arg(text);

        let status = command
            .status()
            .await
            .map_err(|e| BookingQueueError::Announcement(format!("{}: {}", self.program, e)))?;

        if !status.success() {
            return Err(BookingQueueError::Announcement(format!(
                "{} exited with {}",
                self.program, status
            )));
        }

        Ok(())
    }
}

pub fn announcer_from_config(config: &AppConfig) -> Arc<dyn Announcer> {
    let voices: Vec<Voice> = config.announcer_voices.iter().map(Voice::new).collect();

    match &config.announcer_command {
        Some(program) => {
            info!("Announcements spoken through {}", program);
            Arc::new(CommandAnnouncer::new(program.clone(), voices))
        }
        None => {
            info!("No announcer command configured, announcements are logged only");
            Arc::new(LogAnnouncer::new(voices))
        }
    }
}
