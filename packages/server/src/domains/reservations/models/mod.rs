mod assignment;
mod instance;
mod reservation;

pub use assignment::Assignment;
pub use instance::{intervals_overlap, InstanceStatus, ReservationInstance};
pub use reservation::{ApprovalStatus, Reservation};
