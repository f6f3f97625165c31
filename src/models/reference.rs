//! Read-only reference data owned by other parts of the platform.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Equipment a schedule maintains. Maps to the `assets` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Asset {
    pub id: i64,
    pub name: String,
    pub organization_id: i64,
}

/// Reusable checklist item template. Maps to the `tasks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub procedure: Option<String>,
}
