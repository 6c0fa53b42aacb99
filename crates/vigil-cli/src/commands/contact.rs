use clap::Subcommand;
use vigil_core::{day_count, Config, SubjectId};

use super::open_service_with;

#[derive(Subcommand)]
pub enum ContactAction {
    /// Show the emergency contact
    Show,
    /// Replace the emergency contact
    Set {
        /// Contact name
        name: String,
        /// Contact email address
        email: String,
    },
}

pub fn run(subject: &SubjectId, action: ContactAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let service = open_service_with(&config)?;

    match action {
        ContactAction::Show => {
            let contact = service.contact(subject)?;
            if contact.is_set() {
                println!("{} <{}>", contact.name, contact.email);
            } else {
                println!("no emergency contact set");
            }
        }
        ContactAction::Set { name, email } => {
            let contact = service.update_contact(subject, &name, &email)?;
            println!("emergency contact set: {} <{}>", contact.name, contact.email);
            println!(
                "they will be emailed if you miss check-ins for {}",
                threshold_phrase(config.schedule.missed_threshold_hours)
            );
        }
    }
    Ok(())
}

/// Whole days when the threshold divides evenly, hours otherwise.
fn threshold_phrase(hours: u32) -> String {
    match hours {
        1 => "1 hour".to_string(),
        h if h % 24 == 0 => day_count(i64::from(h / 24)),
        h => format!("{h} hours"),
    }
}
