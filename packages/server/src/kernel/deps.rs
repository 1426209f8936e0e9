//! Worker-side dependency bundle.
//!
//! Job handlers receive one `Arc<WorkerDeps>`; everything they may touch
//! hangs off it. The API side wires its own state in `server::app`.

use std::sync::Arc;

use crate::domains::notifications::Mailer;

pub struct WorkerDeps {
    pub mailer: Arc<dyn Mailer>,
}

impl WorkerDeps {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}
