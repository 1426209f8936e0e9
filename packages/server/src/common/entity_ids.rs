//! Typed ID definitions for all domain entities.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for User entities.
pub struct User;

/// Marker type for Resource entities (meeting rooms and equipment).
pub struct Resource;

/// Marker type for Reservation entities (booking parents).
pub struct Reservation;

/// Marker type for ReservationInstance entities (concrete occurrences).
pub struct ReservationInstance;

/// Marker type for AuditEntry entities.
pub struct AuditEntry;

/// Marker type for Job entities (queued background work).
pub struct Job;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for User entities.
pub type UserId = Id<User>;

/// Typed ID for Resource entities.
pub type ResourceId = Id<Resource>;

/// Typed ID for Reservation entities.
pub type ReservationId = Id<Reservation>;

/// Typed ID for ReservationInstance entities.
pub type InstanceId = Id<ReservationInstance>;

/// Typed ID for AuditEntry entities.
pub type AuditEntryId = Id<AuditEntry>;

/// Typed ID for queued jobs.
pub type JobId = Id<Job>;
