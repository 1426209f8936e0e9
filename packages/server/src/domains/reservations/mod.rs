pub mod models;
pub mod policy;
pub mod recurrence;
pub mod service;
pub mod store;

pub use models::{
    ApprovalStatus, Assignment, InstanceStatus, Reservation, ReservationInstance,
};
pub use policy::{BookingPolicy, CancellationPolicy, DirectBooking, LateCancelPolicy, RequireApproval};
pub use service::{CreateReservationRequest, ReservationEngine};
pub use store::{
    CancelOutcome, NewBooking, PgReservationStore, ReservationStore, TransitionOutcome,
};
