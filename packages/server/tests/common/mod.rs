//! Shared test harness: engines wired to in-memory fakes with a fixed
//! clock and a sequential ID generator, so every scenario is
//! deterministic.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use scheduler_core::common::{Clock, IdGen, ResourceId, UserId};
use scheduler_core::domains::approvals::ApprovalEngine;
use scheduler_core::domains::audit::{ActorContext, AuditRecorder, AuditSigner};
use scheduler_core::domains::notifications::Notifier;
use scheduler_core::domains::reservations::{
    BookingPolicy, DirectBooking, LateCancelPolicy, ReservationEngine,
};
use scheduler_core::domains::resources::{Resource, ResourceType};
use scheduler_core::domains::users::{Role, User};
use scheduler_core::kernel::test_dependencies::{
    FixedClock, InMemoryJobQueue, InMemoryStore, SeqIdGen,
};

pub const TEST_AUDIT_SECRET: &str = "audit-secret-for-tests";

pub fn t(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub queue: Arc<InMemoryJobQueue>,
    pub clock: Arc<FixedClock>,
    pub id_gen: Arc<SeqIdGen>,
    pub audit: AuditRecorder,
    pub engine: ReservationEngine,
    pub approvals: ApprovalEngine,
}

impl Harness {
    /// Direct-booking harness with the clock parked at 2025-06-01 00:00 UTC.
    pub fn new() -> Self {
        Self::with_booking_policy(Arc::new(DirectBooking))
    }

    pub fn with_booking_policy(policy: Arc<dyn BookingPolicy>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let clock = Arc::new(FixedClock::new(t("2025-06-01T00:00:00Z")));
        let id_gen = Arc::new(SeqIdGen::new());

        let audit = AuditRecorder::new(
            store.clone(),
            AuditSigner::new(TEST_AUDIT_SECRET),
            clock.clone(),
            id_gen.clone(),
        );
        let notifier = Arc::new(Notifier::new(queue.clone(), clock.clone(), id_gen.clone()));

        let engine = ReservationEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            audit.clone(),
            notifier.clone(),
            clock.clone(),
            id_gen.clone(),
            policy,
            Arc::new(LateCancelPolicy::default()),
        );
        let approvals = ApprovalEngine::new(store.clone(), store.clone(), audit.clone(), notifier);

        Self {
            store,
            queue,
            clock,
            id_gen,
            audit,
            engine,
            approvals,
        }
    }

    pub async fn seed_user(&self, email: &str, role: Role) -> User {
        let now = self.clock.now();
        let user = User {
            id: UserId::from_uuid(self.id_gen.new_uuid()),
            subject: format!("sub-{email}"),
            email: email.to_string(),
            display_name: email.split('@').next().unwrap_or(email).to_string(),
            role,
            manager_id: None,
            penalty_score: 0,
            penalty_expires_at: None,
            is_active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.seed_user(user.clone()).await;
        user
    }

    pub async fn seed_room(&self, name: &str) -> Resource {
        self.seed_resource(name, ResourceType::MeetingRoom, Some(8), None)
            .await
    }

    pub async fn seed_resource(
        &self,
        name: &str,
        resource_type: ResourceType,
        capacity: Option<i32>,
        required_role: Option<Role>,
    ) -> Resource {
        let now = self.clock.now();
        let resource = Resource {
            id: ResourceId::from_uuid(self.id_gen.new_uuid()),
            name: name.to_string(),
            resource_type,
            capacity,
            location: None,
            attributes: serde_json::json!({}),
            required_role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.seed_resource(resource.clone()).await;
        resource
    }

    pub fn actor(&self, user: &User) -> ActorContext {
        ActorContext {
            user_id: user.id,
            ip_address: Some("198.51.100.10".to_string()),
            user_agent: Some("integration-tests".to_string()),
        }
    }

    /// Park the clock `hours` before `at` so cancellation-window tests can
    /// position themselves relative to an occurrence start.
    pub fn set_clock_before(&self, at: DateTime<Utc>, hours: i64) {
        self.clock.set(at - Duration::hours(hours));
    }
}
