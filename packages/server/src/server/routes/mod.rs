pub mod audit;
pub mod auth;
pub mod events;
pub mod health;
pub mod resources;
pub mod users;

use crate::domains::audit::ActorContext;
use crate::server::middleware::{ClientMeta, CurrentUser};

/// Actor context for audit entries, from the authenticated caller plus the
/// request's network metadata.
pub(crate) fn actor_context(user: &CurrentUser, meta: Option<&ClientMeta>) -> ActorContext {
    ActorContext {
        user_id: user.user_id,
        ip_address: meta.and_then(|m| m.ip.map(|ip| ip.to_string())),
        user_agent: meta.and_then(|m| m.user_agent.clone()),
    }
}
