use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::enums::Status;

/// A customer/organization boundary.
///
/// Tenant ownership is expressed through the configured owner role id, not a column here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}
