//! Service layer for the room coordinator.
//!
//! # Components
//!
//! - `matchmaker` - places users into rooms
//! - `leave` - removes users from rooms
//! - `provisioner` - HTTP client for the external room API

pub mod leave;
pub mod matchmaker;
pub mod provisioner;

pub use leave::{LeaveCoordinator, LeftRoom};
pub use matchmaker::{JoinedRoom, MatchMaker, MatchSettings};
pub use provisioner::{HttpRoomProvisioner, RoomProvisioner};
