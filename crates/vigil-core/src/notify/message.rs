//! Emergency email content.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::model::SubjectId;

/// Rendered email ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Facts the emergency email carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyNotice {
    pub recipient_name: String,
    pub subject_id: SubjectId,
    /// `None` when the subject never checked in.
    pub days_since_check_in: Option<u32>,
    pub last_check_in: Option<DateTime<Utc>>,
    /// Overdue window, in whole days, quoted in the subject line.
    pub threshold_days: i64,
}

impl EmergencyNotice {
    fn days_phrase(&self) -> String {
        match self.days_since_check_in {
            Some(days) => day_count(i64::from(days)),
            None => "an unknown number of days".to_string(),
        }
    }

    fn last_seen_phrase(&self, offset: FixedOffset) -> String {
        match self.last_check_in {
            Some(at) => format!(
                "Last check-in: {}",
                at.with_timezone(&offset).format("%Y-%m-%d %H:%M (UTC%:z)")
            ),
            None => "This person has never checked in.".to_string(),
        }
    }

    /// Render for `to`, formatting timestamps in `offset`.
    pub fn render(&self, to: &str, offset: FixedOffset) -> EmailMessage {
        let subject = format!(
            "Urgent: {} has not checked in for over {}",
            self.subject_id,
            day_count(self.threshold_days)
        );
        let days = self.days_phrase();
        let last_seen = self.last_seen_phrase(offset);

        let text = format!(
            "Dear {name},\n\n\
             {id}, who listed you as their emergency contact, has not checked in on Vigil for {days}.\n\n\
             This may mean that:\n\
             - they are in an emergency\n\
             - they simply forgot to check in\n\
             - they could use a call from you\n\n\
             Please get in touch with them as soon as you can.\n\n\
             --\n\
             Sent automatically by Vigil. {last_seen}\n",
            name = self.recipient_name,
            id = self.subject_id,
        );

        let html = format!(
            "<div style=\"font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;\">\
             <h1 style=\"color: #e74c3c;\">Emergency notice</h1>\
             <p>Dear {name},</p>\
             <p>{id}, who listed you as their emergency contact, has not checked in on Vigil for <strong>{days}</strong>.</p>\
             <p>This may mean that:</p>\
             <ul><li>they are in an emergency</li><li>they simply forgot to check in</li><li>they could use a call from you</li></ul>\
             <p>Please get in touch with them as soon as you can.</p>\
             <hr style=\"border: none; border-top: 1px solid #eee; margin: 20px 0;\">\
             <p style=\"color: #999; font-size: 12px;\">Sent automatically by Vigil. {last_seen}</p>\
             </div>",
            name = escape_html(&self.recipient_name),
            id = escape_html(self.subject_id.as_str()),
            last_seen = escape_html(&last_seen),
        );

        EmailMessage {
            to: to.to_string(),
            subject,
            text,
            html,
        }
    }
}

/// "1 day", "3 days".
pub fn day_count(days: i64) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
