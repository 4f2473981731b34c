pub mod menu;
pub mod role;
pub mod tenant;
pub mod user;

pub use crate::db::enums::Status;

/// Generates a new record id.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
