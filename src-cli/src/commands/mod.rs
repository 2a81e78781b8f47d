//! Command implementations and the connection setup they share.

pub mod init;
pub mod plan;
pub mod run;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dialoguer::Password;
use gradesync::config::{find_config_file, load_config};
use gradesync::remote::{CourseId, MoodleClient, MoodleSessionProvider, Session, SessionProvider};
use gradesync::{GradebookClient, GradebookConfig, ObservedSnapshot};
use secrecy::SecretString;

use crate::error::{CliError, CliResult};

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub json: bool,
}

impl GlobalOptions {
    pub fn load(&self) -> CliResult<GradebookConfig> {
        let path = find_config_file(self.config.as_deref())?;
        log::info!("Using gradebook file {}", path.display());
        Ok(load_config(&path)?)
    }
}

/// A logged-in connection to the gradebook named by the config.
pub struct Connection {
    pub client: MoodleClient,
    pub provider: MoodleSessionProvider,
    pub session: Session,
    pub course: CourseId,
}

impl Connection {
    pub async fn open(config: &GradebookConfig) -> CliResult<Self> {
        let password = password_for(config)?;
        let client = MoodleClient::new(&config.base_url)?;
        let provider = client.session_provider(config.username.clone(), password);
        let session = provider.establish().await.map_err(CliError::Login)?;
        log::info!("Logged in to {} as {}", client.base_url(), config.username);

        Ok(Self {
            client,
            provider,
            session,
            course: CourseId(config.course_id),
        })
    }

    pub async fn snapshot(&self) -> CliResult<ObservedSnapshot> {
        let entities = self.client.fetch_tree(&self.session, self.course).await?;
        log::debug!("Scraped {} gradebook entries", entities.len());
        Ok(ObservedSnapshot::new(entities))
    }
}

/// The configured password, or a prompt when the file names no source.
fn password_for(config: &GradebookConfig) -> CliResult<SecretString> {
    if config.has_password_source() {
        return Ok(config.password()?);
    }

    let password = Password::new()
        .with_prompt(format!("Password for {}", config.username))
        .interact()?;
    Ok(SecretString::from(password))
}

/// Raised by Ctrl-C. The executor checks it between actions.
pub fn interrupt_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        log::warn!("Ctrl-C handler not installed: {}", e);
    }
    flag
}
