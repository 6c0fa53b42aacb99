//! Batch emergency notifier.
//!
//! One [`NotificationScheduler::run`] walks every subject with a configured
//! contact, decides whether the subject is overdue and out of cooldown, and
//! sends at most one email per eligible subject. Per-subject failures are
//! recorded in the [`RunSummary`] and never abort the run.
//!
//! Subjects are processed concurrently on a bounded pool. Each subject's
//! read, send and marker write happen under that subject's lock, so two
//! overlapping runs on the same scheduler cannot double-notify.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::message::EmergencyNotice;
use super::transport::EmailTransport;
use crate::clock::Clock;
use crate::error::{DispatchError, Result};
use crate::model::{CheckInHistory, NotificationState, SubjectId};
use crate::storage::{ScheduleConfig, SubjectStore};
use crate::streak::{StreakEngine, NEVER_CHECKED_IN};

/// Tunables for a scheduler instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Last check-in must be at least this old before notifying.
    pub missed_threshold: Duration,
    /// Minimum gap between notifications for one subject.
    pub cooldown: Duration,
    pub max_concurrency: usize,
    pub dispatch_timeout: std::time::Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}

impl From<&ScheduleConfig> for SchedulerSettings {
    fn from(cfg: &ScheduleConfig) -> Self {
        Self {
            missed_threshold: cfg.missed_threshold(),
            cooldown: cfg.cooldown(),
            max_concurrency: cfg.max_concurrency.max(1),
            dispatch_timeout: cfg.dispatch_timeout(),
        }
    }
}

/// Result of the eligibility check for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Checked in within the missed threshold.
    NotOverdue,
    /// Overdue, but notified within the cooldown.
    CoolingDown,
    Eligible {
        /// `None` if the subject never checked in.
        days_since_check_in: Option<u32>,
        last_check_in: Option<DateTime<Utc>>,
    },
}

/// Decide whether a subject must be notified at `now`.
pub fn evaluate(
    engine: &StreakEngine,
    settings: &SchedulerSettings,
    history: &CheckInHistory,
    state: &NotificationState,
    now: DateTime<Utc>,
) -> Eligibility {
    let last_check_in = history.last_check_in();

    // A window reaching past the earliest representable instant covers
    // every recorded event.
    if let Some(last) = last_check_in {
        match now.checked_sub_signed(settings.missed_threshold) {
            Some(cutoff) if last <= cutoff => {}
            _ => return Eligibility::NotOverdue,
        }
    }

    if let Some(notified) = state.last_notified_at {
        match now.checked_sub_signed(settings.cooldown) {
            Some(cutoff) if notified <= cutoff => {}
            _ => return Eligibility::CoolingDown,
        }
    }

    let days = engine.days_missed(history, now);
    Eligibility::Eligible {
        days_since_check_in: (days != NEVER_CHECKED_IN).then_some(days),
        last_check_in,
    }
}

/// Reported outcome for a subject that reached dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Notified,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectOutcome {
    pub subject: SubjectId,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Summary of one scheduler run. Skipped subjects are counted in
/// `evaluated` but have no outcome entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub evaluated: usize,
    pub processed: usize,
    pub outcomes: Vec<SubjectOutcome>,
}

impl RunSummary {
    pub fn notified(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Notified)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.processed - self.notified()
    }

    pub fn outcome_for(&self, subject: &SubjectId) -> Option<&OutcomeStatus> {
        self.outcomes
            .iter()
            .find(|o| &o.subject == subject)
            .map(|o| &o.status)
    }
}

/// Per-subject async mutexes shared by every run of one scheduler.
///
/// Entries live only while some task holds or waits on them.
#[derive(Default)]
struct SubjectLocks {
    inner: Mutex<HashMap<SubjectId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SubjectLocks {
    fn lock_for(&self, subject: &SubjectId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(subject.clone()).or_default().clone()
    }

    /// Hand back a lock from [`lock_for`](Self::lock_for), dropping the
    /// entry once no other task references it.
    fn release(&self, subject: &SubjectId, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if map.get(subject).is_some_and(|l| Arc::strong_count(l) == 1) {
            map.remove(subject);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Emergency notification batch runner.
pub struct NotificationScheduler<S, T, C> {
    worker: Worker<S, T>,
    clock: Arc<C>,
}

/// Everything a spawned task needs, cheaply cloneable.
struct Worker<S, T> {
    store: Arc<S>,
    transport: Arc<T>,
    engine: StreakEngine,
    settings: Arc<SchedulerSettings>,
    locks: Arc<SubjectLocks>,
}

impl<S, T> Clone for Worker<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            engine: self.engine,
            settings: Arc::clone(&self.settings),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S, T, C> NotificationScheduler<S, T, C>
where
    S: SubjectStore + 'static,
    T: EmailTransport + 'static,
    C: Clock + 'static,
{
    pub fn new(
        store: Arc<S>,
        transport: Arc<T>,
        clock: Arc<C>,
        engine: StreakEngine,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            worker: Worker {
                store,
                transport,
                engine,
                settings: Arc::new(settings),
                locks: Arc::new(SubjectLocks::default()),
            },
            clock,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.worker.settings
    }

    /// Evaluate every subject once and notify the eligible ones.
    ///
    /// # Errors
    ///
    /// Only a failure to enumerate subjects is returned; everything
    /// per-subject ends up in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let now = self.clock.now();
        let subjects = self.worker.store.list_subjects()?;
        let evaluated = subjects.len();

        tracing::info!(subjects = evaluated, at = %now, "notification run started");

        let permits = Arc::new(Semaphore::new(self.worker.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::with_capacity(evaluated);

        for subject in subjects {
            let worker = self.worker.clone();
            let permits = Arc::clone(&permits);
            let owner = subject.clone();
            let handle = tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => worker.process(&subject, now).await,
                    Err(_) => Some(OutcomeStatus::Failed {
                        reason: "worker pool closed".into(),
                    }),
                };
                outcome.map(|status| SubjectOutcome { subject, status })
            });
            spawned.insert(handle.id(), owner);
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Some(outcome))) => outcomes.push(outcome),
                Ok((_, None)) => {}
                Err(e) => match spawned.remove(&e.id()) {
                    Some(subject) => {
                        tracing::error!(subject = %subject, error = %e, "notification task aborted");
                        outcomes.push(SubjectOutcome {
                            subject,
                            status: OutcomeStatus::Failed {
                                reason: format!("notification task aborted: {e}"),
                            },
                        });
                    }
                    None => tracing::error!(error = %e, "notification task aborted"),
                },
            }
        }
        outcomes.sort_by(|a, b| a.subject.cmp(&b.subject));

        let summary = RunSummary {
            started_at: now,
            evaluated,
            processed: outcomes.len(),
            outcomes,
        };
        tracing::info!(
            evaluated = summary.evaluated,
            processed = summary.processed,
            notified = summary.notified(),
            failed = summary.failed(),
            "notification run finished"
        );
        Ok(summary)
    }
}

enum Handled {
    Skipped,
    Notified,
}

impl<S, T> Worker<S, T>
where
    S: SubjectStore,
    T: EmailTransport,
{
    /// `None` when the subject was skipped.
    async fn process(&self, subject: &SubjectId, now: DateTime<Utc>) -> Option<OutcomeStatus> {
        let lock = self.locks.lock_for(subject);
        let result = {
            let _guard = lock.lock().await;
            self.notify_if_due(subject, now).await
        };
        self.locks.release(subject, lock);

        match result {
            Ok(Handled::Skipped) => None,
            Ok(Handled::Notified) => {
                tracing::info!(subject = %subject, "emergency contact notified");
                Some(OutcomeStatus::Notified)
            }
            Err(e) => {
                tracing::warn!(subject = %subject, error = %e, "emergency notification failed");
                Some(OutcomeStatus::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn notify_if_due(&self, subject: &SubjectId, now: DateTime<Utc>) -> Result<Handled> {
        let contact = self.store.load_contact(subject)?;
        if !contact.is_set() {
            tracing::debug!(subject = %subject, "no emergency contact, skipping");
            return Ok(Handled::Skipped);
        }

        let history = self.store.load_history(subject)?;
        let state = self.store.load_notification_state(subject)?;

        let (days_since_check_in, last_check_in) =
            match evaluate(&self.engine, &self.settings, &history, &state, now) {
                Eligibility::NotOverdue => return Ok(Handled::Skipped),
                Eligibility::CoolingDown => {
                    tracing::debug!(subject = %subject, "notified recently, skipping");
                    return Ok(Handled::Skipped);
                }
                Eligibility::Eligible {
                    days_since_check_in,
                    last_check_in,
                } => (days_since_check_in, last_check_in),
            };

        let message = EmergencyNotice {
            recipient_name: contact.name.clone(),
            subject_id: subject.clone(),
            days_since_check_in,
            last_check_in,
            threshold_days: self.settings.missed_threshold.num_days().max(1),
        }
        .render(&contact.email, self.engine.offset());

        tokio::time::timeout(self.settings.dispatch_timeout, self.transport.send(&message))
            .await
            .map_err(DispatchError::from)??;

        self.store
            .save_notification_state(subject, now)
            .map_err(|e| {
                tracing::error!(
                    subject = %subject,
                    error = %e,
                    "email sent but notification marker not saved"
                );
                e
            })?;
        Ok(Handled::Notified)
    }
}
