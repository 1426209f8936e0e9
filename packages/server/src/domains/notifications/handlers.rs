//! Worker-side job handlers for outbound notifications.

use serde::{Deserialize, Serialize};

use crate::kernel::jobs::JobRegistry;

/// Type tag of the outbound-email job.
pub const SEND_EMAIL_JOB: &str = "send_email";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailPayload {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Register all notification job types on the worker registry.
pub fn register_handlers(registry: &mut JobRegistry) {
    registry.register::<SendEmailPayload, _, _>(SEND_EMAIL_JOB, |payload, deps| async move {
        deps.mailer
            .send(&payload.to, &payload.subject, &payload.body)
            .await
    });
}
