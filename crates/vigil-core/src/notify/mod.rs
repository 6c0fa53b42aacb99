//! Emergency contact notification: eligibility, message rendering,
//! transports and the batch scheduler.

pub mod message;
pub mod scheduler;
pub mod transport;

pub use message::{day_count, EmailMessage, EmergencyNotice};
pub use scheduler::{
    evaluate, Eligibility, NotificationScheduler, OutcomeStatus, RunSummary, SchedulerSettings,
    SubjectOutcome,
};
pub use transport::{ConfiguredTransport, EmailTransport, LogTransport, ResendTransport};
