use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interval::Alignment;

/// A completed statistics update for one alignment.
///
/// `updated_to` is the boundary the run brought the statistics up to. Delivery
/// data logged at or after it is not yet covered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub alignment: Alignment,
    pub updated_to: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(
        alignment: Alignment,
        updated_to: DateTime<Utc>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alignment,
            updated_to,
            recorded_at,
        }
    }
}

/// One row of raw delivery data waiting to be summarised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEntry {
    pub id: Uuid,
    pub logged_at: DateTime<Utc>,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
}

impl DeliveryEntry {
    pub fn new(logged_at: DateTime<Utc>, impressions: u64, clicks: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            logged_at,
            impressions,
            clicks,
        }
    }
}
