mod daily_stats;
mod gallery;
mod visit;

pub use daily_stats::{DailyStats, DailyStatsDelta};
pub use gallery::{GalleryImage, GalleryView, GalleryViewOutcome};
pub use visit::{DurationOutcome, NewPageVisit, PageVisit, ScreenSize, VisitOutcome};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Wall-clock timestamp as stored in the database (milliseconds)
pub fn epoch_millis(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_millis()
}

/// Half-open `[start, end)` millisecond range covering one calendar day
pub fn day_bounds(date: NaiveDate) -> (i64, i64) {
    let start = epoch_millis(date.and_time(NaiveTime::MIN));
    let end = date
        .succ_opt()
        .map(|next| epoch_millis(next.and_time(NaiveTime::MIN)))
        .unwrap_or(i64::MAX);
    (start, end)
}
