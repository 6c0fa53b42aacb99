//! # Vigil Core Library
//!
//! Vigil is a dead-man's switch: a person checks in once a day, and if
//! check-ins lapse for too long their emergency contact gets an email.
//!
//! ## Architecture
//!
//! - **Clock**: injectable "now" so every computation can be pinned in tests
//! - **Streak engine**: pure calendar-day math over a check-in history
//!   (checked in today, days missed, consecutive-day streak)
//! - **Notification scheduler**: periodic batch that picks overdue subjects,
//!   respects a cooldown, and sends one email per eligible subject
//! - **Storage**: the `SubjectStore` persistence trait with SQLite and
//!   in-memory implementations, plus TOML configuration
//!
//! ## Key Components
//!
//! - [`StreakEngine`]: status derivation
//! - [`NotificationScheduler`]: eligibility, dispatch and dedup
//! - [`CheckInService`]: check-in and contact operations
//! - [`SubjectStore`]: persistence collaborator
//! - [`Config`]: application configuration

pub mod clock;
pub mod error;
pub mod model;
pub mod notify;
pub mod service;
pub mod storage;
pub mod streak;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConfigError, CoreError, DispatchError, StorageError, ValidationError};
pub use model::{CheckInEvent, CheckInHistory, Contact, NotificationState, Subject, SubjectId};
pub use notify::{
    day_count, ConfiguredTransport, EmailMessage, EmailTransport, LogTransport, NotificationScheduler,
    OutcomeStatus, ResendTransport, RunSummary, SchedulerSettings, SubjectOutcome,
};
pub use service::{CheckInOutcome, CheckInService};
pub use storage::{Config, Database, MemoryStore, SubjectStore};
pub use streak::{CheckInStatus, DayMark, StatusLevel, StreakEngine, NEVER_CHECKED_IN};
