//! DIF assignment and enrollment: moving an IPCP from `Initialized`
//! through `Assigned` to `Enrolled`, and keeping its neighbor table
//! alive afterwards.

mod controller;
mod neighbor_maintenance;

pub use controller::{EnrollmentController, ENROLLMENT_OBJECT_CLASS, ENROLLMENT_OBJECT_NAME};
pub use neighbor_maintenance::{DeadNeighbor, NeighborMaintenance};
