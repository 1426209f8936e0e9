//! Job registry mapping type tags to handlers.
//!
//! Each domain registers its job types at startup; the worker pool looks up
//! the handler by the job's type tag and executes it with the deserialized
//! payload.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;

use super::job::Job;
use crate::kernel::deps::WorkerDeps;

type BoxedHandler = Box<
    dyn Fn(serde_json::Value, Arc<WorkerDeps>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

/// Registry that maps job type strings to handlers.
///
/// # Example
///
/// ```ignore
/// let mut registry = JobRegistry::new();
/// registry.register::<SendEmailPayload, _, _>("send_email", |payload, deps| async move {
///     deps.mailer.send(&payload.to, &payload.subject, &payload.body).await
/// });
/// ```
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<&'static str, BoxedHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a job type with its handler. The payload type is
    /// deserialized from the job's JSON payload before the handler runs.
    pub fn register<P, F, Fut>(&mut self, job_type: &'static str, handler: F)
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(P, Arc<WorkerDeps>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let boxed: BoxedHandler = Box::new(move |value, deps| {
            let handler = handler.clone();
            Box::pin(async move {
                let payload: P = serde_json::from_value(value)
                    .map_err(|e| anyhow!("failed to deserialize {job_type} payload: {e}"))?;
                handler(payload, deps).await
            })
        });
        self.handlers.insert(job_type, boxed);
    }

    /// Execute a job using its registered handler.
    ///
    /// Returns an error if the job type is unknown, the payload does not
    /// deserialize, or the handler fails.
    pub async fn execute(&self, job: &Job, deps: Arc<WorkerDeps>) -> Result<()> {
        let handler = self
            .handlers
            .get(job.job_type.as_str())
            .ok_or_else(|| anyhow!("unknown job type: {}", job.job_type))?;
        handler(job.payload.clone(), deps).await
    }

    pub fn is_registered(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn registered_types(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

/// Thread-safe registry wrapped in Arc.
pub type SharedJobRegistry = Arc<JobRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Ping {
        #[allow(dead_code)]
        target: String,
    }

    #[test]
    fn register_and_check() {
        let mut registry = JobRegistry::new();
        registry.register::<Ping, _, _>("ping", |_payload, _deps| async move { Ok(()) });

        assert!(registry.is_registered("ping"));
        assert!(!registry.is_registered("pong"));
        assert!(registry.registered_types().contains(&"ping"));
    }
}
