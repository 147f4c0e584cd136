//! Visit, engagement and gallery tracking on top of [`Storage`]
//!
//! Operations return [`TrackingResult`] so the HTTP layer can tell a
//! suppressed duplicate, a missing record and a database failure apart.
//! Persistence failures are logged here, where the context is richest.

use chrono::{Days, NaiveDate, TimeDelta};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::clock::{Clock, SystemClock};
use super::context::ClientContext;
use super::error::{TrackingError, TrackingResult};
use super::page_names::{PageNameResolver, REPORT_EXCLUDED_PREFIXES};
use super::report::{ip_counts, named_counts, page_breakdown, DailyVisitors, StatisticsReport};
use super::user_agent::VisitClassification;
use crate::config::TrackingConfig;
use crate::models::{DurationOutcome, GalleryViewOutcome, NewPageVisit, ScreenSize, VisitOutcome};
use crate::storage::Storage;

pub struct VisitorTracker {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    resolver: PageNameResolver,
    config: TrackingConfig,
}

impl VisitorTracker {
    pub fn new(storage: Arc<dyn Storage>, config: TrackingConfig) -> Self {
        Self::with_clock(storage, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        storage: Arc<dyn Storage>,
        config: TrackingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            clock,
            resolver: PageNameResolver::builtin(),
            config,
        }
    }

    pub fn with_resolver(mut self, resolver: PageNameResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PageNameResolver {
        &self.resolver
    }

    fn dedup_window(&self) -> TimeDelta {
        i64::try_from(self.config.dedup_window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// First day of the report window ending today
    fn window_start(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(self.config.report_window_days))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Record a page view and feed today's rollup.
    ///
    /// A repeat of the same page from the same IP inside the dedup window is
    /// reported as [`VisitOutcome::Duplicate`] and changes nothing.
    pub async fn track_page_visit(
        &self,
        path: Option<&str>,
        client: &ClientContext,
    ) -> TrackingResult<VisitOutcome> {
        let path = path.ok_or(TrackingError::MissingPath)?;

        let visit = NewPageVisit {
            page: path.to_string(),
            page_friendly_name: self.resolver.resolve(Some(path)),
            ip_address: client.client_ip.to_string(),
            user_agent: client.user_agent.clone(),
            referer: client.referer.clone(),
            timestamp: self.clock.now(),
            analytics_consent: client.analytics_consent,
            classification: VisitClassification::from_user_agent(&client.user_agent),
        };

        let outcome = self
            .storage
            .record_page_visit(&visit, self.dedup_window())
            .await
            .inspect_err(|e| {
                error!(page = %path, ip = %client.client_ip, error = %e, "failed to record page visit")
            })?;

        match outcome {
            VisitOutcome::Duplicate { visit_id } => {
                debug!(page = %path, ip = %client.client_ip, visit_id, "duplicate visit ignored");
            }
            VisitOutcome::Recorded {
                visit_id,
                new_visitor,
            } => {
                debug!(
                    page = %path,
                    name = %visit.page_friendly_name,
                    ip = %client.client_ip,
                    visit_id,
                    new_visitor,
                    "page visit recorded"
                );
            }
        }

        Ok(outcome)
    }

    /// Attach engagement data to a recorded visit and refresh today's average.
    ///
    /// The stored duration only ever grows. `average_duration` in the outcome
    /// is `None` when no visit today qualifies for the average; the duration
    /// and screen size are still saved in that case.
    pub async fn update_visit_duration(
        &self,
        visit_id: i64,
        duration_secs: i64,
        screen: Option<ScreenSize>,
    ) -> TrackingResult<DurationOutcome> {
        if duration_secs < 0 {
            return Err(TrackingError::InvalidDuration(duration_secs));
        }

        let today = self.clock.today();
        let outcome = self
            .storage
            .update_visit_engagement(visit_id, duration_secs, screen, today)
            .await
            .inspect_err(|e| error!(visit_id, error = %e, "failed to update visit duration"))?
            .ok_or(TrackingError::VisitNotFound(visit_id))?;

        debug!(
            visit_id,
            duration_secs,
            duration_updated = outcome.duration_updated,
            average = ?outcome.average_duration,
            "visit engagement updated"
        );

        Ok(outcome)
    }

    /// Count a gallery image view, once per image, IP and day.
    ///
    /// `client` is `None` outside of a request (batch jobs, the admin CLI);
    /// nothing is tracked then.
    pub async fn track_gallery_view(
        &self,
        image_id: i64,
        client: Option<&ClientContext>,
    ) -> TrackingResult<Option<GalleryViewOutcome>> {
        let Some(client) = client else {
            debug!(image_id, "no request context, gallery view not tracked");
            return Ok(None);
        };

        let outcome = self
            .storage
            .record_gallery_view(image_id, client.client_ip, self.clock.now())
            .await
            .inspect_err(|e| {
                error!(image_id, ip = %client.client_ip, error = %e, "failed to record gallery view")
            })?
            .ok_or(TrackingError::ImageNotFound(image_id))?;

        if let GalleryViewOutcome::Refreshed(view_id) = outcome {
            debug!(image_id, view_id, ip = %client.client_ip, "image already viewed today");
        }

        Ok(Some(outcome))
    }

    /// Build the dashboard report, degrading to an all-zero report on failure
    pub async fn get_statistics(&self) -> StatisticsReport {
        match self.try_get_statistics().await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "failed to build statistics, returning empty report");
                let today = self.clock.today();
                StatisticsReport::empty(self.window_start(today), today)
            }
        }
    }

    /// Build the report over `[today - report_window_days, today]`
    pub async fn try_get_statistics(&self) -> TrackingResult<StatisticsReport> {
        let today = self.clock.today();
        let window_start = self.window_start(today);

        self.storage.ensure_daily_stats(today).await?;

        let rollups = self.storage.daily_stats_between(window_start, today).await?;
        let mut report = StatisticsReport::from_rollups(window_start, today, rollups);

        let page_rows = self
            .storage
            .page_visit_counts_since(window_start, REPORT_EXCLUDED_PREFIXES)
            .await?;
        report.page_visits = page_breakdown(page_rows, &self.resolver);

        report.gallery_views =
            named_counts(self.storage.gallery_view_counts_since(window_start).await?);

        let mut daily_unique_ips = Vec::with_capacity(report.daily_stats.len());
        for day in &report.daily_stats {
            let visitors = ip_counts(self.storage.visitor_ip_counts_on(day.date).await?);
            daily_unique_ips.push(DailyVisitors {
                date: day.date,
                visitors,
            });
        }
        report.daily_unique_ips = daily_unique_ips;

        info!(
            from = %window_start,
            to = %today,
            days = report.daily_stats.len(),
            total_visits = report.total_visits,
            "statistics report built"
        );

        Ok(report)
    }
}
