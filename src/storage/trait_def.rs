use crate::models::{
    DailyStats, DurationOutcome, GalleryImage, GalleryView, GalleryViewOutcome, NewPageVisit, PageVisit,
    ScreenSize, VisitOutcome,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence for visits, gallery views and daily rollups.
///
/// Every mutating method is one transaction: detail rows and the rollup
/// counters they feed commit or roll back together.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Create the rollup row for `date` if it does not exist yet
    async fn ensure_daily_stats(&self, date: NaiveDate) -> StorageResult<()>;

    /// Record a visit unless the same IP hit the same page within `dedup_window`.
    ///
    /// The visit is a new visitor when no earlier visit from its IP exists that
    /// day. Rollup counters are bumped per [`crate::models::DailyStatsDelta::for_page_visit`].
    async fn record_page_visit(
        &self,
        visit: &NewPageVisit,
        dedup_window: TimeDelta,
    ) -> StorageResult<VisitOutcome>;

    async fn get_page_visit(&self, visit_id: i64) -> StorageResult<Option<PageVisit>>;

    /// Raise the stored duration (never lowers it), set the screen size when
    /// given, and recompute `today`'s average duration.
    ///
    /// Returns `None` when the visit does not exist.
    async fn update_visit_engagement(
        &self,
        visit_id: i64,
        duration_secs: i64,
        screen: Option<ScreenSize>,
        today: NaiveDate,
    ) -> StorageResult<Option<DurationOutcome>>;

    /// Record a gallery view, or refresh today's existing view from the same IP.
    ///
    /// Returns `None` when the image is not in the catalog.
    async fn record_gallery_view(
        &self,
        image_id: i64,
        ip: IpAddr,
        now: NaiveDateTime,
    ) -> StorageResult<Option<GalleryViewOutcome>>;

    async fn get_gallery_view(&self, view_id: i64) -> StorageResult<Option<GalleryView>>;

    async fn create_gallery_image(
        &self,
        title: &str,
        filename: Option<&str>,
    ) -> StorageResult<GalleryImage>;

    async fn get_gallery_image(&self, image_id: i64) -> StorageResult<Option<GalleryImage>>;

    async fn list_gallery_images(&self) -> StorageResult<Vec<GalleryImage>>;

    /// Rollup rows with `from <= date <= to`, newest first
    async fn daily_stats_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StorageResult<Vec<DailyStats>>;

    /// Visit counts per raw path since the start of `since`, skipping paths
    /// under `excluded_prefixes`, most visited first
    async fn page_visit_counts_since(
        &self,
        since: NaiveDate,
        excluded_prefixes: &[&str],
    ) -> StorageResult<Vec<(String, i64)>>;

    /// View counts per image title since the start of `since`, most viewed first
    async fn gallery_view_counts_since(&self, since: NaiveDate)
        -> StorageResult<Vec<(String, i64)>>;

    /// Visit counts per origin IP on `date`, most active first
    async fn visitor_ip_counts_on(&self, date: NaiveDate) -> StorageResult<Vec<(String, i64)>>;
}
