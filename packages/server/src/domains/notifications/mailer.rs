//! Outbound mail seam.
//!
//! Real SMTP/provider transport is deployment plumbing; the worker binary
//! wires the logging implementation unless an integration replaces it.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Writes the mail to the log instead of a wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(to, subject, body_len = body.len(), "email dispatched");
        Ok(())
    }
}
