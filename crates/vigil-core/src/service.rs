//! User-facing check-in operations over a store and a clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::Result;
use crate::model::{Contact, SubjectId};
use crate::storage::SubjectStore;
use crate::streak::{CheckInStatus, DayMark, StreakEngine};

/// What a check-in request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CheckInOutcome {
    Recorded { at: DateTime<Utc> },
    /// Nothing written; the subject already has a check-in today.
    AlreadyCheckedIn,
}

pub struct CheckInService<S, C> {
    store: S,
    clock: C,
    engine: StreakEngine,
}

impl<S: SubjectStore, C: Clock> CheckInService<S, C> {
    pub fn new(store: S, clock: C, engine: StreakEngine) -> Self {
        Self {
            store,
            clock,
            engine,
        }
    }

    /// Record a check-in at the current instant, at most once per day.
    pub fn check_in(&self, subject: &SubjectId) -> Result<CheckInOutcome> {
        let now = self.clock.now();
        let history = self.store.load_history(subject)?;

        if self.engine.is_checked_in_today(&history, now) {
            tracing::debug!(subject = %subject, "already checked in today");
            return Ok(CheckInOutcome::AlreadyCheckedIn);
        }

        self.store.append_check_in(subject, now)?;
        tracing::info!(subject = %subject, at = %now, "check-in recorded");
        Ok(CheckInOutcome::Recorded { at: now })
    }

    pub fn status(&self, subject: &SubjectId) -> Result<CheckInStatus> {
        let history = self.store.load_history(subject)?;
        Ok(self.engine.status(&history, self.clock.now()))
    }

    /// Last `days` calendar days, oldest first.
    pub fn recent_days(&self, subject: &SubjectId, days: usize) -> Result<Vec<DayMark>> {
        let history = self.store.load_history(subject)?;
        Ok(self.engine.recent_days(&history, self.clock.now(), days))
    }

    pub fn contact(&self, subject: &SubjectId) -> Result<Contact> {
        Ok(self.store.load_contact(subject)?)
    }

    /// Validate and replace the emergency contact.
    pub fn update_contact(&self, subject: &SubjectId, name: &str, email: &str) -> Result<Contact> {
        let contact = Contact::new(name, email)?;
        self.store.save_contact(subject, &contact)?;
        tracing::info!(subject = %subject, "emergency contact updated");
        Ok(contact)
    }
}
