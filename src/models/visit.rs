use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::analytics::user_agent::VisitClassification;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PageVisit {
    pub id: i64,
    pub page: String,
    pub page_friendly_name: String,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    /// Wall-clock milliseconds
    pub timestamp: i64,
    /// Engagement in seconds, reported after the page was loaded
    pub duration: Option<i64>,
    pub screen_width: Option<i64>,
    pub screen_height: Option<i64>,
    pub analytics_consent: bool,
}

/// A visit about to be recorded
#[derive(Debug, Clone)]
pub struct NewPageVisit {
    pub page: String,
    pub page_friendly_name: String,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub timestamp: NaiveDateTime,
    pub analytics_consent: bool,
    pub classification: VisitClassification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    /// Both dimensions must be present and non-zero
    pub fn from_parts(width: Option<u32>, height: Option<u32>) -> Option<Self> {
        match (width, height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some(Self { width, height }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum VisitOutcome {
    /// A new visit row was written
    Recorded { visit_id: i64, new_visitor: bool },
    /// Same origin hit the same page inside the dedup window
    Duplicate { visit_id: i64 },
}

impl VisitOutcome {
    pub fn visit_id(&self) -> i64 {
        match self {
            VisitOutcome::Recorded { visit_id, .. } | VisitOutcome::Duplicate { visit_id } => {
                *visit_id
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationOutcome {
    /// The stored duration grew
    pub duration_updated: bool,
    pub screen_updated: bool,
    /// Today's recomputed average, `None` when no visit qualified for it
    pub average_duration: Option<f64>,
}

impl DurationOutcome {
    pub fn average_updated(&self) -> bool {
        self.average_duration.is_some()
    }
}
