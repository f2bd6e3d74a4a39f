//! HTTP request handlers for the room coordinator.

pub mod health;
pub mod metrics;
pub mod rooms;
pub mod tokens;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use rooms::{join_random_room, leave_room};
pub use tokens::generate_management_token;
