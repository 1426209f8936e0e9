pub mod handlers;
pub mod mailer;
pub mod notifier;
pub mod templates;

pub use handlers::{register_handlers, SendEmailPayload, SEND_EMAIL_JOB};
pub use mailer::{LogMailer, Mailer};
pub use notifier::{NotificationKind, Notifier};
