use vigil_core::SubjectId;

use super::open_service;

pub fn run(subject: &SubjectId, days: usize) -> Result<(), Box<dyn std::error::Error>> {
    let service = open_service()?;

    for mark in service.recent_days(subject, days)? {
        let cell = if mark.checked_in { "[x]" } else { "[ ]" };
        let today = if mark.is_today { "  <- today" } else { "" };
        println!("{} {} {cell}{today}", mark.date.format("%a"), mark.date.format("%m/%d"));
    }
    Ok(())
}
