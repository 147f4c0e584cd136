//! Dashboard report over a window of daily rollups

use chrono::NaiveDate;
use serde::Serialize;

use super::page_names::PageNameResolver;
use crate::models::DailyStats;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BrowserBreakdown {
    pub chrome: i64,
    pub firefox: i64,
    pub safari: i64,
    pub edge: i64,
    pub other: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OsBreakdown {
    pub windows: i64,
    pub mac: i64,
    pub linux: i64,
    pub ios: i64,
    pub android: i64,
    pub other: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceBreakdown {
    pub desktop: i64,
    pub mobile: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsentBreakdown {
    pub analytics: i64,
    pub only_necessary: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpVisitCount {
    pub ip_address: String,
    pub visit_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyVisitors {
    pub date: NaiveDate,
    pub visitors: Vec<IpVisitCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    /// Rollup rows inside the window, newest first
    pub daily_stats: Vec<DailyStats>,
    pub total_visits: i64,
    pub unique_visitors: i64,
    pub total_gallery_views: i64,
    /// Mean of the per-day averages that are present and positive
    pub avg_duration: f64,
    pub browser_stats: BrowserBreakdown,
    pub os_stats: OsBreakdown,
    pub device_stats: DeviceBreakdown,
    pub cookie_consent: ConsentBreakdown,
    pub page_visits: Vec<NamedCount>,
    pub gallery_views: Vec<NamedCount>,
    pub daily_unique_ips: Vec<DailyVisitors>,
}

impl StatisticsReport {
    /// All counters zero, all collections empty
    pub fn empty(window_start: NaiveDate, window_end: NaiveDate) -> Self {
        Self {
            window_start,
            window_end,
            daily_stats: Vec::new(),
            total_visits: 0,
            unique_visitors: 0,
            total_gallery_views: 0,
            avg_duration: 0.0,
            browser_stats: BrowserBreakdown::default(),
            os_stats: OsBreakdown::default(),
            device_stats: DeviceBreakdown::default(),
            cookie_consent: ConsentBreakdown::default(),
            page_visits: Vec::new(),
            gallery_views: Vec::new(),
            daily_unique_ips: Vec::new(),
        }
    }

    /// Fold the rollup rows of the window into totals
    pub fn from_rollups(
        window_start: NaiveDate,
        window_end: NaiveDate,
        rollups: Vec<DailyStats>,
    ) -> Self {
        let mut report = Self::empty(window_start, window_end);
        let mut duration_sum = 0.0;
        let mut days_with_duration = 0u32;

        for day in &rollups {
            report.total_visits += day.total_visits;
            report.unique_visitors += day.unique_visitors;
            report.total_gallery_views += day.gallery_views;

            let browsers = &mut report.browser_stats;
            browsers.chrome += day.chrome_users;
            browsers.firefox += day.firefox_users;
            browsers.safari += day.safari_users;
            browsers.edge += day.edge_users;
            browsers.other += day.other_browsers;

            let os = &mut report.os_stats;
            os.windows += day.windows_users;
            os.mac += day.mac_users;
            os.linux += day.linux_users;
            os.ios += day.ios_users;
            os.android += day.android_users;
            os.other += day.other_os;

            report.device_stats.desktop += day.desktop_users;
            report.device_stats.mobile += day.mobile_users;

            report.cookie_consent.analytics += day.consent_count;
            // Inconsistent rows must not subtract from other days
            report.cookie_consent.only_necessary +=
                (day.unique_visitors - day.consent_count).max(0);

            if let Some(avg) = day.avg_duration.filter(|avg| *avg > 0.0) {
                duration_sum += avg;
                days_with_duration += 1;
            }
        }

        if days_with_duration > 0 {
            report.avg_duration = duration_sum / f64::from(days_with_duration);
        }

        report.daily_stats = rollups;
        report
    }
}

/// Label raw-path counts for display, keeping the storage order
pub fn page_breakdown(rows: Vec<(String, i64)>, resolver: &PageNameResolver) -> Vec<NamedCount> {
    rows.into_iter()
        .map(|(path, count)| NamedCount {
            name: resolver.resolve(Some(&path)),
            count,
        })
        .filter(|entry| !entry.name.is_empty())
        .collect()
}

pub fn named_counts(rows: Vec<(String, i64)>) -> Vec<NamedCount> {
    rows.into_iter()
        .map(|(name, count)| NamedCount { name, count })
        .collect()
}

pub fn ip_counts(rows: Vec<(String, i64)>) -> Vec<IpVisitCount> {
    rows.into_iter()
        .map(|(ip_address, visit_count)| IpVisitCount {
            ip_address,
            visit_count,
        })
        .collect()
}
