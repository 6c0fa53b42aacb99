use vigil_core::{CheckInOutcome, SubjectId};

use super::open_service;

pub fn run(subject: &SubjectId) -> Result<(), Box<dyn std::error::Error>> {
    let service = open_service()?;

    match service.check_in(subject)? {
        CheckInOutcome::Recorded { at } => println!("checked in at {}", at.to_rfc3339()),
        CheckInOutcome::AlreadyCheckedIn => println!("already checked in today"),
    }

    let status = service.status(subject)?;
    println!("streak: {} day(s)", status.consecutive_days);
    Ok(())
}
