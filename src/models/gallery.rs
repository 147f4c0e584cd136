use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Catalog entry. The catalog belongs to gallery management; tracking only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GalleryImage {
    pub id: i64,
    pub title: String,
    pub filename: Option<String>,
    pub created_at: i64,
}

/// At most one row per (image, IP, day); a same-day revisit refreshes `timestamp`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GalleryView {
    pub id: i64,
    pub image_id: i64,
    pub ip_address: String,
    pub view_date: NaiveDate,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "view_id")]
pub enum GalleryViewOutcome {
    Created(i64),
    Refreshed(i64),
}

impl GalleryViewOutcome {
    pub fn view_id(&self) -> i64 {
        match self {
            GalleryViewOutcome::Created(id) | GalleryViewOutcome::Refreshed(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, GalleryViewOutcome::Created(_))
    }
}
