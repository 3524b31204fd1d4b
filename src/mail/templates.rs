//! HTML email rendering
//!
//! One template per notification kind, selected by the stored kind
//! rather than by inspecting titles. Both reminder windows share the
//! reminder template, differing only in the remaining-time text.

use crate::database::NotificationKind;
use crate::error::Result;
use askama::Template;

/// Data available to the email templates.
///
/// Unused fields stay empty for kinds that do not need them.
#[derive(Clone, Debug, Default)]
pub struct EmailContext {
    pub user_name: String,
    pub message: String,
    pub court_name: String,
    pub date: String,
    pub time: String,
    pub cancelled_at: String,
    pub cancel_policy: String,
    pub time_remaining: String,
}

#[derive(Template)]
#[template(path = "email/confirmation.html")]
struct ConfirmationEmail {
    user_name: String,
    message: String,
    court_name: String,
    date: String,
    time: String,
}

#[derive(Template)]
#[template(path = "email/cancellation.html")]
struct CancellationEmail {
    user_name: String,
    message: String,
    court_name: String,
    date: String,
    time: String,
    cancelled_at: String,
    cancel_policy: String,
}

#[derive(Template)]
#[template(path = "email/reminder.html")]
struct ReminderEmail {
    user_name: String,
    message: String,
    court_name: String,
    date: String,
    time: String,
    time_remaining: String,
}

/// Render the email body for a notification kind.
pub fn render_email(kind: NotificationKind, ctx: &EmailContext) -> Result<String> {
    let html = match kind {
        NotificationKind::Confirmation => ConfirmationEmail {
            user_name: ctx.user_name.clone(),
            message: ctx.message.clone(),
            court_name: ctx.court_name.clone(),
            date: ctx.date.clone(),
            time: ctx.time.clone(),
        }
        .render()?,
        NotificationKind::Cancellation => CancellationEmail {
            user_name: ctx.user_name.clone(),
            message: ctx.message.clone(),
            court_name: ctx.court_name.clone(),
            date: ctx.date.clone(),
            time: ctx.time.clone(),
            cancelled_at: ctx.cancelled_at.clone(),
            cancel_policy: ctx.cancel_policy.clone(),
        }
        .render()?,
        NotificationKind::Reminder24h | NotificationKind::Reminder2h => ReminderEmail {
            user_name: ctx.user_name.clone(),
            message: ctx.message.clone(),
            court_name: ctx.court_name.clone(),
            date: ctx.date.clone(),
            time: ctx.time.clone(),
            time_remaining: ctx.time_remaining.clone(),
        }
        .render()?,
    };

    Ok(html)
}
