//! Check-in data model.
//!
//! A [`Subject`] aggregates a check-in history, one emergency contact and
//! the notification marker the scheduler uses for dedup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Opaque subject identifier (device or account binding).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single check-in. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckInEvent {
    at: DateTime<Utc>,
}

impl CheckInEvent {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// All check-ins of one subject, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckInHistory {
    events: Vec<CheckInEvent>,
}

impl CheckInHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_instants<I>(instants: I) -> Self
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        Self {
            events: instants.into_iter().map(CheckInEvent::new).collect(),
        }
    }

    pub fn push(&mut self, at: DateTime<Utc>) {
        self.events.push(CheckInEvent::new(at));
    }

    pub fn events(&self) -> &[CheckInEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Latest recorded instant, regardless of insertion order.
    pub fn last_check_in(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(CheckInEvent::at).max()
    }
}

impl FromIterator<DateTime<Utc>> for CheckInHistory {
    fn from_iter<T: IntoIterator<Item = DateTime<Utc>>>(iter: T) -> Self {
        Self::from_instants(iter)
    }
}

/// Emergency contact. Both fields empty means "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

impl Contact {
    /// Build a validated contact. Fields are trimmed.
    pub fn new(name: &str, email: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        let email = email.trim();

        if name.is_empty() {
            return Err(ValidationError::Empty("name"));
        }
        if email.is_empty() {
            return Err(ValidationError::Empty("email"));
        }
        validate_email(email)?;

        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    pub fn unset() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        !self.name.is_empty() && !self.email.is_empty()
    }
}

/// Structural check only: one `@`, non-empty local part, dotted domain.
fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = |message: &str| ValidationError::InvalidValue {
        field: "email",
        message: message.to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("missing '@'"))?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid("malformed address"));
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid("domain must contain a dot"));
    }
    Ok(())
}

/// Scheduler dedup marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationState {
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl NotificationState {
    /// Record a send at `at`. Never moves the marker backward.
    pub fn mark_notified(&mut self, at: DateTime<Utc>) {
        self.last_notified_at = Some(match self.last_notified_at {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }
}

/// Aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub history: CheckInHistory,
    pub contact: Contact,
    pub notification: NotificationState,
}

impl Subject {
    pub fn new(id: SubjectId) -> Self {
        Self {
            id,
            history: CheckInHistory::new(),
            contact: Contact::unset(),
            notification: NotificationState::default(),
        }
    }
}
