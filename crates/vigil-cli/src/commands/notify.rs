use clap::Subcommand;
use std::sync::Arc;
use vigil_core::{
    Config, ConfiguredTransport, CoreError, Database, EmailTransport, LogTransport, MemoryStore,
    NotificationScheduler, RunSummary, SchedulerSettings, StorageError, Subject, SubjectStore,
    SystemClock,
};

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Evaluate every subject once and email overdue contacts
    Run {
        /// Log the emails instead of sending them (does not update markers)
        #[arg(long)]
        dry_run: bool,
    },
}

pub fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let runtime = tokio::runtime::Runtime::new()?;

    let summary = match action {
        NotifyAction::Run { dry_run: true } => {
            // In-memory copy so a dry run never touches notification markers.
            let db = Database::open()?;
            let snapshot = MemoryStore::new();
            copy_subjects(&db, &snapshot)?;
            runtime.block_on(run_once(&config, Arc::new(snapshot), LogTransport))?
        }
        NotifyAction::Run { dry_run: false } => {
            let transport = ConfiguredTransport::from_config(
                &config.email,
                config.schedule.dispatch_timeout(),
            )?;
            runtime.block_on(run_once(&config, Arc::new(Database::open()?), transport))?
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_once<S, T>(
    config: &Config,
    store: Arc<S>,
    transport: T,
) -> Result<RunSummary, CoreError>
where
    S: SubjectStore + 'static,
    T: EmailTransport + 'static,
{
    NotificationScheduler::new(
        store,
        Arc::new(transport),
        Arc::new(SystemClock),
        config.streak_engine(),
        SchedulerSettings::from(&config.schedule),
    )
    .run()
    .await
}

fn copy_subjects(
    from: &impl SubjectStore,
    to: &MemoryStore,
) -> Result<(), StorageError> {
    for id in from.list_subjects()? {
        let mut subject = Subject::new(id.clone());
        subject.history = from.load_history(&id)?;
        subject.contact = from.load_contact(&id)?;
        subject.notification = from.load_notification_state(&id)?;
        to.insert(subject)?;
    }
    Ok(())
}
