use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vigil_core::SubjectId;

mod commands;

#[derive(Parser)]
#[command(name = "vigil", version, about = "Vigil daily check-in CLI")]
struct Cli {
    /// Subject to act on (device or account id)
    #[arg(long, global = true, env = "VIGIL_SUBJECT", default_value = "default")]
    subject: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record today's check-in
    CheckIn,
    /// Show check-in status
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the recent-days strip
    History {
        /// Number of days to show
        #[arg(long, default_value_t = 7)]
        days: usize,
    },
    /// Emergency contact management
    Contact {
        #[command(subcommand)]
        action: commands::contact::ContactAction,
    },
    /// Emergency notification runs
    Notify {
        #[command(subcommand)]
        action: commands::notify::NotifyAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vigil_core=info,vigil=info")),
        )
        .init();

    let cli = Cli::parse();
    let subject = SubjectId::new(cli.subject);
    let result = match cli.command {
        Commands::CheckIn => commands::checkin::run(&subject),
        Commands::Status { json } => commands::status::run(&subject, json),
        Commands::History { days } => commands::history::run(&subject, days),
        Commands::Contact { action } => commands::contact::run(&subject, action),
        Commands::Notify { action } => commands::notify::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
