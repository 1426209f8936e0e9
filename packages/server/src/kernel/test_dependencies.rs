//! Deterministic in-memory implementations of every capability seam.
//!
//! The engines are written against the store/queue/clock/IdP traits, so
//! tests exercise real control flow against these fakes: a single
//! [`InMemoryStore`] standing in for Postgres, an [`InMemoryJobQueue`] for
//! Redis, a manually advanced [`FixedClock`], a sequential [`SeqIdGen`],
//! and a [`FakeOidcProvider`] that signs HS256 tokens verified through the
//! normal JWKS path.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::common::pagination::Page;
use crate::common::{AppError, AppResult, Clock, IdGen, ReservationId, ResourceId, UserId};
use crate::domains::audit::{AuditEntry, AuditFilter, AuditStore};
use crate::domains::auth::{OidcProvider, ProviderMetadata, TokenBundle};
use crate::domains::reservations::models::intervals_overlap;
use crate::domains::reservations::{
    ApprovalStatus, Assignment, CancelOutcome, NewBooking, Reservation, ReservationInstance,
    ReservationStore, TransitionOutcome,
};
use crate::domains::resources::{CreateResource, Resource, ResourceStore, ResourceType, UpdateResource};
use crate::domains::users::store::{UpsertUser, UserStore};
use crate::domains::users::{Role, User};
use crate::kernel::jobs::{Job, JobQueue};

// ============================================================================
// Clock and ID generation
// ============================================================================

/// A clock that only moves when told to.
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Sequential IDs: 1, 2, 3, … encoded into UUIDs.
#[derive(Default)]
pub struct SeqIdGen {
    counter: AtomicU64,
}

impl SeqIdGen {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGen for SeqIdGen {
    fn new_uuid(&self) -> Uuid {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Uuid::from_u128(n as u128)
    }

    fn new_token(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("token-{n}")
    }
}

// ============================================================================
// In-memory job queue
// ============================================================================

#[derive(Default)]
struct QueueState {
    main: VecDeque<Job>,
    delayed: Vec<(Job, DateTime<Utc>)>,
    dlq: Vec<Job>,
}

/// Mirrors the Redis queue's main/delayed/DLQ structure.
#[derive(Default)]
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn main_len(&self) -> usize {
        self.state.lock().await.main.len()
    }

    pub async fn main_jobs(&self) -> Vec<Job> {
        self.state.lock().await.main.iter().cloned().collect()
    }

    pub async fn delayed_entries(&self) -> Vec<(Job, DateTime<Utc>)> {
        self.state.lock().await.delayed.clone()
    }

    pub async fn dlq_jobs(&self) -> Vec<Job> {
        self.state.lock().await.dlq.clone()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: &Job) -> AppResult<()> {
        self.state.lock().await.main.push_front(job.clone());
        Ok(())
    }

    async fn dequeue(&self) -> AppResult<Option<Job>> {
        Ok(self.state.lock().await.main.pop_back())
    }

    async fn enqueue_delayed(&self, job: &Job, visible_at: DateTime<Utc>) -> AppResult<()> {
        self.state.lock().await.delayed.push((job.clone(), visible_at));
        Ok(())
    }

    async fn dead_letter(&self, job: &Job) -> AppResult<()> {
        self.state.lock().await.dlq.push(job.clone());
        Ok(())
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut state = self.state.lock().await;
        let (due, pending): (Vec<_>, Vec<_>) = state
            .delayed
            .drain(..)
            .partition(|(_, visible_at)| *visible_at <= now);
        state.delayed = pending;
        let promoted = due.len();
        for (job, _) in due {
            state.main.push_front(job);
        }
        Ok(promoted)
    }
}

// ============================================================================
// In-memory store (users, resources, reservations, audit)
// ============================================================================

#[derive(Default)]
struct MemState {
    users: HashMap<UserId, User>,
    resources: HashMap<ResourceId, Resource>,
    reservations: HashMap<ReservationId, Reservation>,
    instances: Vec<ReservationInstance>,
    assignments: Vec<Assignment>,
    audit: Vec<AuditEntry>,
}

/// One fake standing in for the whole transactional store; it implements
/// each per-domain store trait with the same semantics as the Postgres
/// implementations.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn seed_resource(&self, resource: Resource) {
        self.state.lock().await.resources.insert(resource.id, resource);
    }

    pub async fn instances(&self) -> Vec<ReservationInstance> {
        self.state.lock().await.instances.clone()
    }

    pub async fn assignments(&self) -> Vec<Assignment> {
        self.state.lock().await.assignments.clone()
    }

    pub async fn reservation_count(&self) -> usize {
        self.state.lock().await.reservations.len()
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }

    pub async fn user(&self, id: UserId) -> Option<User> {
        self.state.lock().await.users.get(&id).cloned()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).filter(|u| u.deleted_at.is_none()).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned())
    }

    async fn upsert_by_email(&self, params: UpsertUser<'_>) -> AppResult<User> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .users
            .values_mut()
            .find(|u| u.email == params.email && u.deleted_at.is_none())
        {
            existing.display_name = params.display_name.to_string();
            existing.updated_at = params.now;
            return Ok(existing.clone());
        }

        let user = User {
            id: params.id,
            subject: params.subject.to_string(),
            email: params.email.to_string(),
            display_name: params.display_name.to_string(),
            role: Role::General,
            manager_id: None,
            penalty_score: 0,
            penalty_expires_at: None,
            is_active: true,
            deleted_at: None,
            created_at: params.now,
            updated_at: params.now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list(&self, page: Page) -> AppResult<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn add_penalty(
        &self,
        id: UserId,
        points: i32,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&id)
            .filter(|u| u.deleted_at.is_none())
            .ok_or(AppError::NotFound("user"))?;
        user.penalty_score += points;
        user.penalty_expires_at = Some(expires_at);
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn create(&self, params: CreateResource) -> AppResult<Resource> {
        let resource = Resource {
            id: params.id,
            name: params.name,
            resource_type: params.resource_type,
            capacity: params.capacity,
            location: params.location,
            attributes: params.attributes,
            required_role: params.required_role,
            is_active: true,
            created_at: params.now,
            updated_at: params.now,
        };
        self.state.lock().await.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn update(&self, id: ResourceId, params: UpdateResource) -> AppResult<Resource> {
        let mut state = self.state.lock().await;
        let resource = state.resources.get_mut(&id).ok_or(AppError::NotFound("resource"))?;
        if let Some(name) = params.name {
            resource.name = name;
        }
        if let Some(capacity) = params.capacity {
            resource.capacity = Some(capacity);
        }
        if let Some(location) = params.location {
            resource.location = Some(location);
        }
        if let Some(attributes) = params.attributes {
            resource.attributes = attributes;
        }
        if let Some(required_role) = params.required_role {
            resource.required_role = Some(required_role);
        }
        if let Some(is_active) = params.is_active {
            resource.is_active = is_active;
        }
        Ok(resource.clone())
    }

    async fn delete(&self, id: ResourceId) -> AppResult<()> {
        self.state
            .lock()
            .await
            .resources
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::NotFound("resource"))
    }

    async fn find_by_id(&self, id: ResourceId) -> AppResult<Option<Resource>> {
        Ok(self.state.lock().await.resources.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[ResourceId]) -> AppResult<Vec<Resource>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.resources.get(id).cloned())
            .collect())
    }

    async fn list(&self, resource_type: Option<ResourceType>) -> AppResult<Vec<Resource>> {
        let state = self.state.lock().await;
        let mut resources: Vec<Resource> = state
            .resources
            .values()
            .filter(|r| resource_type.map_or(true, |t| r.resource_type == t))
            .cloned()
            .collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(resources)
    }

    async fn find_available(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resource_type: ResourceType,
    ) -> AppResult<Vec<Resource>> {
        let state = self.state.lock().await;
        let mut free: Vec<Resource> = state
            .resources
            .values()
            .filter(|r| r.resource_type == resource_type && r.is_active)
            .filter(|r| {
                !state.assignments.iter().any(|a| {
                    a.resource_id == r.id
                        && state.instances.iter().any(|i| {
                            i.id == a.instance_id
                                && i.status != crate::domains::reservations::InstanceStatus::Cancelled
                                && intervals_overlap(i.start_at, i.end_at, start, end)
                        })
                })
            })
            .cloned()
            .collect();
        free.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(free)
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn create_booking(&self, booking: &NewBooking) -> AppResult<()> {
        let mut state = self.state.lock().await;

        for new_instance in &booking.instances {
            let conflict = state.assignments.iter().any(|a| {
                booking.resource_ids.contains(&a.resource_id)
                    && state.instances.iter().any(|i| {
                        i.id == a.instance_id
                            && i.status != crate::domains::reservations::InstanceStatus::Cancelled
                            && intervals_overlap(
                                i.start_at,
                                i.end_at,
                                new_instance.start_at,
                                new_instance.end_at,
                            )
                    })
            });
            if conflict {
                return Err(AppError::ResourceNotAvailable);
            }
        }

        state
            .reservations
            .insert(booking.reservation.id, booking.reservation.clone());
        for instance in &booking.instances {
            state.instances.push(instance.clone());
            for resource_id in &booking.resource_ids {
                state.assignments.push(Assignment {
                    instance_id: instance.id,
                    resource_id: *resource_id,
                });
            }
        }
        Ok(())
    }

    async fn find_reservation(
        &self,
        id: ReservationId,
        start_hint: Option<DateTime<Utc>>,
    ) -> AppResult<Option<Reservation>> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .get(&id)
            .filter(|r| start_hint.map_or(true, |s| r.start_at == s))
            .cloned())
    }

    async fn find_instances(&self, id: ReservationId) -> AppResult<Vec<ReservationInstance>> {
        let state = self.state.lock().await;
        let mut instances: Vec<ReservationInstance> = state
            .instances
            .iter()
            .filter(|i| i.reservation_id == id)
            .cloned()
            .collect();
        instances.sort_by_key(|i| i.start_at);
        Ok(instances)
    }

    async fn find_assigned_resources(&self, id: ReservationId) -> AppResult<Vec<ResourceId>> {
        let state = self.state.lock().await;
        let mut resources: Vec<ResourceId> = state
            .instances
            .iter()
            .filter(|i| i.reservation_id == id)
            .flat_map(|i| {
                state
                    .assignments
                    .iter()
                    .filter(move |a| a.instance_id == i.id)
                    .map(|a| a.resource_id)
            })
            .collect();
        resources.sort();
        resources.dedup();
        Ok(resources)
    }

    async fn cancel_instance(
        &self,
        id: ReservationId,
        instance_start_at: DateTime<Utc>,
    ) -> AppResult<CancelOutcome> {
        let mut state = self.state.lock().await;

        let position = state
            .instances
            .iter()
            .position(|i| i.reservation_id == id && i.start_at == instance_start_at)
            .ok_or(AppError::NotFound("reservation instance"))?;
        let instance = state.instances.remove(position);
        state.assignments.retain(|a| a.instance_id != instance.id);

        let parent_removed = !state.instances.iter().any(|i| i.reservation_id == id);
        if parent_removed {
            state.reservations.remove(&id);
        }

        Ok(CancelOutcome {
            instance,
            parent_removed,
        })
    }

    async fn set_status_from_pending(
        &self,
        id: ReservationId,
        start_hint: Option<DateTime<Utc>>,
        new_status: ApprovalStatus,
    ) -> AppResult<TransitionOutcome> {
        let mut state = self.state.lock().await;
        let Some(reservation) = state
            .reservations
            .get_mut(&id)
            .filter(|r| start_hint.map_or(true, |s| r.start_at == s))
        else {
            return Ok(TransitionOutcome::Missing);
        };

        match reservation.approval_status {
            ApprovalStatus::Pending => {
                reservation.approval_status = new_status;
                reservation.version += 1;
                Ok(TransitionOutcome::Applied)
            }
            ApprovalStatus::Confirmed => Ok(TransitionOutcome::WasConfirmed),
            ApprovalStatus::Rejected => Ok(TransitionOutcome::WasRejected),
        }
    }

    async fn list_for_organizer(
        &self,
        organizer_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Reservation>> {
        let state = self.state.lock().await;
        let mut reservations: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.organizer_id == organizer_id && r.start_at >= from && r.start_at < to)
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.start_at);
        Ok(reservations)
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn append(&self, entry: &AuditEntry) -> AppResult<()> {
        self.state.lock().await.audit.push(entry.clone());
        Ok(())
    }

    async fn list(&self, filter: &AuditFilter, page: Page) -> AppResult<Vec<AuditEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<AuditEntry> = state
            .audit
            .iter()
            .filter(|e| filter.user_id.map_or(true, |id| e.actor_user_id == id))
            .filter(|e| filter.action.map_or(true, |a| e.action == a))
            .filter(|e| {
                filter
                    .target_type
                    .as_ref()
                    .map_or(true, |t| &e.target_type == t)
            })
            .filter(|e| filter.target_id.as_ref().map_or(true, |t| &e.target_id == t))
            .filter(|e| filter.from.map_or(true, |from| e.created_at >= from))
            .filter(|e| filter.to.map_or(true, |to| e.created_at <= to))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }
}

// ============================================================================
// Fake identity provider
// ============================================================================

/// The identity the fake IdP will assert on the next code exchange.
#[derive(Debug, Clone)]
pub struct PrimedLogin {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub nonce: String,
}

/// Signs HS256 ID tokens and publishes the matching symmetric JWKS, so the
/// session core's full verification path (JWKS lookup included) runs
/// against it unchanged.
pub struct FakeOidcProvider {
    pub issuer: String,
    pub client_id: String,
    secret: String,
    clock: Arc<dyn Clock>,
    next: Mutex<Option<PrimedLogin>>,
    refresh_rotates: bool,
}

impl FakeOidcProvider {
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        secret: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            secret: secret.into(),
            clock,
            next: Mutex::new(None),
            refresh_rotates: false,
        }
    }

    pub fn with_rotating_refresh(mut self) -> Self {
        self.refresh_rotates = true;
        self
    }

    /// Set the identity asserted by the next `exchange_code` call.
    pub async fn prime(&self, login: PrimedLogin) {
        *self.next.lock().await = Some(login);
    }
}

#[async_trait]
impl OidcProvider for FakeOidcProvider {
    async fn metadata(&self) -> AppResult<ProviderMetadata> {
        Ok(ProviderMetadata {
            issuer: self.issuer.clone(),
            authorization_endpoint: format!("{}/authorize", self.issuer),
            token_endpoint: format!("{}/token", self.issuer),
            jwks_uri: format!("{}/jwks", self.issuer),
        })
    }

    async fn jwks(&self) -> AppResult<jsonwebtoken::jwk::JwkSet> {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;

        let jwks = serde_json::json!({
            "keys": [{
                "kty": "oct",
                "kid": "fake-idp-key",
                "alg": "HS256",
                "k": URL_SAFE_NO_PAD.encode(self.secret.as_bytes()),
            }]
        });
        serde_json::from_value(jwks).map_err(|e| AppError::Oidc(e.to_string()))
    }

    async fn exchange_code(&self, code: &str, _code_verifier: &str) -> AppResult<TokenBundle> {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let login = self
            .next
            .lock()
            .await
            .take()
            .ok_or_else(|| AppError::Oidc("no login primed on fake IdP".into()))?;

        let now = self.clock.now();
        let access_token = format!("access-{code}");
        let claims = crate::domains::auth::IdTokenClaims {
            iss: self.issuer.clone(),
            sub: login.sub,
            aud: crate::domains::auth::Audience::Single(self.client_id.clone()),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
            email: Some(login.email),
            name: Some(login.name),
            nonce: Some(login.nonce),
            at_hash: Some(crate::domains::auth::token::compute_at_hash(&access_token)),
        };

        let mut header = Header::new(jsonwebtoken::Algorithm::HS256);
        header.kid = Some("fake-idp-key".into());
        let id_token = encode(&header, &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| AppError::Oidc(e.to_string()))?;

        Ok(TokenBundle {
            access_token,
            id_token: Some(id_token),
            refresh_token: Some(format!("refresh-{code}")),
            expires_in: Some(3600),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenBundle> {
        Ok(TokenBundle {
            access_token: format!("refreshed-{refresh_token}"),
            id_token: None,
            refresh_token: self
                .refresh_rotates
                .then(|| format!("rotated-{refresh_token}")),
            expires_in: Some(3600),
        })
    }
}
