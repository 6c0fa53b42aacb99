use vigil_core::{SubjectId, NEVER_CHECKED_IN};

use super::open_service;

pub fn run(subject: &SubjectId, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let service = open_service()?;
    let status = service.status(subject)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let last = status
        .last_check_in
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    let missed = if status.days_missed == NEVER_CHECKED_IN {
        "never checked in".to_string()
    } else {
        status.days_missed.to_string()
    };

    println!("subject:          {subject}");
    println!("last check-in:    {last}");
    println!("checked in today: {}", if status.checked_in_today { "yes" } else { "no" });
    println!("days missed:      {missed}");
    println!("streak:           {} day(s)", status.consecutive_days);
    println!("status:           {}", status.level.message());
    Ok(())
}
