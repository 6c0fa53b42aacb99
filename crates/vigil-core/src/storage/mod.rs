mod config;
pub mod database;
pub mod memory;

pub use config::{CalendarConfig, Config, EmailConfig, EmailProvider, ScheduleConfig};
pub use database::Database;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::error::StorageError;
use crate::model::{CheckInHistory, Contact, NotificationState, SubjectId};

/// Persistence collaborator for subjects.
///
/// The core never touches storage directly; every read and write goes
/// through this trait. Implementations must be safe to share between the
/// scheduler's workers.
pub trait SubjectStore: Send + Sync {
    /// Every known subject, in a stable order.
    fn list_subjects(&self) -> Result<Vec<SubjectId>, StorageError>;

    fn load_history(&self, subject: &SubjectId) -> Result<CheckInHistory, StorageError>;

    /// Append a check-in, creating the subject if needed.
    fn append_check_in(&self, subject: &SubjectId, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Unset contact if none was ever saved.
    fn load_contact(&self, subject: &SubjectId) -> Result<Contact, StorageError>;

    /// Replace the contact wholesale, creating the subject if needed.
    fn save_contact(&self, subject: &SubjectId, contact: &Contact) -> Result<(), StorageError>;

    fn load_notification_state(
        &self,
        subject: &SubjectId,
    ) -> Result<NotificationState, StorageError>;

    /// Record a successful notification. Must not move the marker backward.
    fn save_notification_state(
        &self,
        subject: &SubjectId,
        notified_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

impl<S: SubjectStore + ?Sized> SubjectStore for std::sync::Arc<S> {
    fn list_subjects(&self) -> Result<Vec<SubjectId>, StorageError> {
        (**self).list_subjects()
    }

    fn load_history(&self, subject: &SubjectId) -> Result<CheckInHistory, StorageError> {
        (**self).load_history(subject)
    }

    fn append_check_in(&self, subject: &SubjectId, at: DateTime<Utc>) -> Result<(), StorageError> {
        (**self).append_check_in(subject, at)
    }

    fn load_contact(&self, subject: &SubjectId) -> Result<Contact, StorageError> {
        (**self).load_contact(subject)
    }

    fn save_contact(&self, subject: &SubjectId, contact: &Contact) -> Result<(), StorageError> {
        (**self).save_contact(subject, contact)
    }

    fn load_notification_state(
        &self,
        subject: &SubjectId,
    ) -> Result<NotificationState, StorageError> {
        (**self).load_notification_state(subject)
    }

    fn save_notification_state(
        &self,
        subject: &SubjectId,
        notified_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        (**self).save_notification_state(subject, notified_at)
    }
}

/// Returns `~/.config/vigil[-dev]/` based on VIGIL_ENV.
///
/// Set VIGIL_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("VIGIL_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("vigil-dev")
    } else {
        base_dir.join("vigil")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
