//! In-process subject storage.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::SubjectStore;
use crate::error::StorageError;
use crate::model::{CheckInHistory, Contact, NotificationState, Subject, SubjectId};

/// Map-backed store. Useful for tests and for embedding the core where
/// persistence is handled elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    subjects: Mutex<BTreeMap<SubjectId, Subject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a whole subject.
    pub fn insert(&self, subject: Subject) -> Result<(), StorageError> {
        self.lock()?.insert(subject.id.clone(), subject);
        Ok(())
    }

    /// Copy of one subject's aggregate, if known.
    pub fn snapshot(&self, subject: &SubjectId) -> Result<Option<Subject>, StorageError> {
        Ok(self.lock()?.get(subject).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<SubjectId, Subject>>, StorageError> {
        self.subjects
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store mutex poisoned".into()))
    }

    fn with_subject<T>(
        &self,
        subject: &SubjectId,
        f: impl FnOnce(&mut Subject) -> T,
    ) -> Result<T, StorageError> {
        let mut map = self.lock()?;
        let entry = map
            .entry(subject.clone())
            .or_insert_with(|| Subject::new(subject.clone()));
        Ok(f(entry))
    }
}

impl SubjectStore for MemoryStore {
    fn list_subjects(&self) -> Result<Vec<SubjectId>, StorageError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn load_history(&self, subject: &SubjectId) -> Result<CheckInHistory, StorageError> {
        Ok(self
            .lock()?
            .get(subject)
            .map(|s| s.history.clone())
            .unwrap_or_default())
    }

    fn append_check_in(&self, subject: &SubjectId, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.with_subject(subject, |s| s.history.push(at))
    }

    fn load_contact(&self, subject: &SubjectId) -> Result<Contact, StorageError> {
        Ok(self
            .lock()?
            .get(subject)
            .map(|s| s.contact.clone())
            .unwrap_or_default())
    }

    fn save_contact(&self, subject: &SubjectId, contact: &Contact) -> Result<(), StorageError> {
        self.with_subject(subject, |s| s.contact = contact.clone())
    }

    fn load_notification_state(
        &self,
        subject: &SubjectId,
    ) -> Result<NotificationState, StorageError> {
        Ok(self
            .lock()?
            .get(subject)
            .map(|s| s.notification)
            .unwrap_or_default())
    }

    fn save_notification_state(
        &self,
        subject: &SubjectId,
        notified_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.with_subject(subject, |s| s.notification.mark_notified(notified_at))
    }
}
