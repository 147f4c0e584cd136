use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::analytics::user_agent::{Browser, OperatingSystem, VisitClassification};

/// Per-day rollup. Counter columns default to zero when the row is created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailyStats {
    pub id: i64,
    pub date: NaiveDate,
    pub total_visits: i64,
    pub unique_visitors: i64,
    pub gallery_views: i64,
    pub avg_duration: Option<f64>,
    pub consent_count: i64,
    pub chrome_users: i64,
    pub firefox_users: i64,
    pub safari_users: i64,
    pub edge_users: i64,
    pub other_browsers: i64,
    pub windows_users: i64,
    pub mac_users: i64,
    pub linux_users: i64,
    pub ios_users: i64,
    pub android_users: i64,
    pub other_os: i64,
    pub mobile_users: i64,
    pub desktop_users: i64,
}

/// Amounts to add to a rollup row in a single `col = col + ?` update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyStatsDelta {
    pub total_visits: i64,
    pub unique_visitors: i64,
    pub gallery_views: i64,
    pub consent_count: i64,
    pub chrome_users: i64,
    pub firefox_users: i64,
    pub safari_users: i64,
    pub edge_users: i64,
    pub other_browsers: i64,
    pub windows_users: i64,
    pub mac_users: i64,
    pub linux_users: i64,
    pub ios_users: i64,
    pub android_users: i64,
    pub other_os: i64,
    pub mobile_users: i64,
    pub desktop_users: i64,
}

impl DailyStatsDelta {
    /// Every qualifying visit counts once. Client buckets and consent are
    /// counted per unique visitor only.
    pub fn for_page_visit(
        new_visitor: bool,
        classification: &VisitClassification,
        analytics_consent: bool,
    ) -> Self {
        let mut delta = Self {
            total_visits: 1,
            ..Self::default()
        };
        if !new_visitor {
            return delta;
        }

        delta.unique_visitors = 1;
        if analytics_consent {
            delta.consent_count = 1;
        }

        match classification.browser {
            Browser::Chrome => delta.chrome_users = 1,
            Browser::Firefox => delta.firefox_users = 1,
            Browser::Safari => delta.safari_users = 1,
            Browser::Edge => delta.edge_users = 1,
            Browser::Other | Browser::Unknown => delta.other_browsers = 1,
        }

        match classification.os {
            OperatingSystem::Windows => delta.windows_users = 1,
            OperatingSystem::Mac => delta.mac_users = 1,
            OperatingSystem::Linux => delta.linux_users = 1,
            OperatingSystem::Ios => delta.ios_users = 1,
            OperatingSystem::Android => delta.android_users = 1,
            OperatingSystem::Other | OperatingSystem::Unknown => delta.other_os = 1,
        }

        if classification.mobile {
            delta.mobile_users = 1;
        } else {
            delta.desktop_users = 1;
        }

        delta
    }

    pub fn gallery_view() -> Self {
        Self {
            gallery_views: 1,
            ..Self::default()
        }
    }

    /// Column/value pairs in a stable order, for building the update statement
    pub fn columns(&self) -> [(&'static str, i64); 17] {
        [
            ("total_visits", self.total_visits),
            ("unique_visitors", self.unique_visitors),
            ("gallery_views", self.gallery_views),
            ("consent_count", self.consent_count),
            ("chrome_users", self.chrome_users),
            ("firefox_users", self.firefox_users),
            ("safari_users", self.safari_users),
            ("edge_users", self.edge_users),
            ("other_browsers", self.other_browsers),
            ("windows_users", self.windows_users),
            ("mac_users", self.mac_users),
            ("linux_users", self.linux_users),
            ("ios_users", self.ios_users),
            ("android_users", self.android_users),
            ("other_os", self.other_os),
            ("mobile_users", self.mobile_users),
            ("desktop_users", self.desktop_users),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.columns().iter().all(|(_, value)| *value == 0)
    }
}
