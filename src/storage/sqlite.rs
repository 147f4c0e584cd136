use crate::analytics::page_names::ENGAGEMENT_EXCLUDED_PREFIXES;
use crate::models::{
    day_bounds, epoch_millis, DailyStats, DailyStatsDelta, DurationOutcome, GalleryImage,
    GalleryView, GalleryViewOutcome, NewPageVisit, PageVisit, ScreenSize, VisitOutcome,
};
use crate::storage::{Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// How long a writer waits for the database lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const DAILY_STATS_COLUMNS: &str = r#"
    id, date, total_visits, unique_visitors, gallery_views, avg_duration, consent_count,
    chrome_users, firefox_users, safari_users, edge_users, other_browsers,
    windows_users, mac_users, linux_users, ios_users, android_users, other_os,
    mobile_users, desktop_users
"#;

const PAGE_VISIT_COLUMNS: &str = r#"
    id, page, page_friendly_name, ip_address, user_agent, referer, timestamp,
    duration, screen_width, screen_height, analytics_consent
"#;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        // An in-memory database lives and dies with its connection
        if database_url.contains(":memory:") {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Transaction holding the write lock from its first statement; a deferred
    /// one that reads first gets SQLITE_BUSY on upgrade instead of waiting
    async fn begin_write(&self) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }
}

/// ` AND instr(page, ?) <> 1` once per prefix; bind the prefixes in order
fn prefix_exclusion_clause(prefixes: &[&str]) -> String {
    prefixes
        .iter()
        .map(|_| " AND instr(page, ?) <> 1")
        .collect()
}

async fn ensure_day(conn: &mut SqliteConnection, date: NaiveDate) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO daily_stats (date)
        VALUES (?)
        ON CONFLICT(date) DO NOTHING
        "#,
    )
    .bind(date)
    .execute(conn)
    .await?;

    Ok(())
}

/// Bump rollup counters in place so concurrent writers never lose an update
async fn apply_delta(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    delta: &DailyStatsDelta,
) -> Result<(), sqlx::Error> {
    let columns = delta.columns();
    let assignments = columns
        .iter()
        .map(|(column, _)| format!("{column} = {column} + ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE daily_stats SET {assignments} WHERE date = ?");

    let mut query = sqlx::query(&sql);
    for (_, value) in columns {
        query = query.bind(value);
    }
    query.bind(date).execute(conn).await?;

    Ok(())
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS page_visits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page TEXT NOT NULL,
                page_friendly_name TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL DEFAULT '',
                referer TEXT NOT NULL DEFAULT '',
                timestamp INTEGER NOT NULL,
                duration INTEGER,
                screen_width INTEGER,
                screen_height INTEGER,
                analytics_consent INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_page_visits_ip_time ON page_visits(ip_address, timestamp)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_page_visits_time ON page_visits(timestamp)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gallery_images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                filename TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gallery_views (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                image_id INTEGER NOT NULL REFERENCES gallery_images(id),
                ip_address TEXT NOT NULL,
                view_date TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                UNIQUE (image_id, ip_address, view_date)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_gallery_views_time ON gallery_views(timestamp)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL UNIQUE,
                total_visits INTEGER NOT NULL DEFAULT 0,
                unique_visitors INTEGER NOT NULL DEFAULT 0,
                gallery_views INTEGER NOT NULL DEFAULT 0,
                avg_duration REAL,
                consent_count INTEGER NOT NULL DEFAULT 0,
                chrome_users INTEGER NOT NULL DEFAULT 0,
                firefox_users INTEGER NOT NULL DEFAULT 0,
                safari_users INTEGER NOT NULL DEFAULT 0,
                edge_users INTEGER NOT NULL DEFAULT 0,
                other_browsers INTEGER NOT NULL DEFAULT 0,
                windows_users INTEGER NOT NULL DEFAULT 0,
                mac_users INTEGER NOT NULL DEFAULT 0,
                linux_users INTEGER NOT NULL DEFAULT 0,
                ios_users INTEGER NOT NULL DEFAULT 0,
                android_users INTEGER NOT NULL DEFAULT 0,
                other_os INTEGER NOT NULL DEFAULT 0,
                mobile_users INTEGER NOT NULL DEFAULT 0,
                desktop_users INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn ensure_daily_stats(&self, date: NaiveDate) -> StorageResult<()> {
        let mut conn = self.pool.acquire().await?;
        ensure_day(&mut conn, date).await?;
        Ok(())
    }

    async fn record_page_visit(
        &self,
        visit: &NewPageVisit,
        dedup_window: TimeDelta,
    ) -> StorageResult<VisitOutcome> {
        let now = epoch_millis(visit.timestamp);
        let today = visit.timestamp.date();
        let (day_start, _) = day_bounds(today);

        let mut tx = self.begin_write().await?;

        let recent = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM page_visits
            WHERE ip_address = ? AND page = ? AND timestamp > ?
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(&visit.ip_address)
        .bind(&visit.page)
        .bind(now.saturating_sub(dedup_window.num_milliseconds()))
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(visit_id) = recent {
            // Nothing written; dropping the transaction rolls it back
            return Ok(VisitOutcome::Duplicate { visit_id });
        }

        let seen_today = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM page_visits
            WHERE ip_address = ? AND timestamp >= ? AND timestamp <= ?
            LIMIT 1
            "#,
        )
        .bind(&visit.ip_address)
        .bind(day_start)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;
        let new_visitor = seen_today.is_none();

        ensure_day(&mut tx, today).await?;
        let delta = DailyStatsDelta::for_page_visit(
            new_visitor,
            &visit.classification,
            visit.analytics_consent,
        );
        apply_delta(&mut tx, today, &delta).await?;

        let visit_id = sqlx::query(
            r#"
            INSERT INTO page_visits
                (page, page_friendly_name, ip_address, user_agent, referer, timestamp, analytics_consent)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&visit.page)
        .bind(&visit.page_friendly_name)
        .bind(&visit.ip_address)
        .bind(&visit.user_agent)
        .bind(&visit.referer)
        .bind(now)
        .bind(visit.analytics_consent)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        Ok(VisitOutcome::Recorded {
            visit_id,
            new_visitor,
        })
    }

    async fn get_page_visit(&self, visit_id: i64) -> StorageResult<Option<PageVisit>> {
        let sql = format!("SELECT {PAGE_VISIT_COLUMNS} FROM page_visits WHERE id = ?");
        let visit = sqlx::query_as::<_, PageVisit>(&sql)
            .bind(visit_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(visit)
    }

    async fn update_visit_engagement(
        &self,
        visit_id: i64,
        duration_secs: i64,
        screen: Option<ScreenSize>,
        today: NaiveDate,
    ) -> StorageResult<Option<DurationOutcome>> {
        let mut tx = self.begin_write().await?;

        let stored = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT duration FROM page_visits WHERE id = ?",
        )
        .bind(visit_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(stored) = stored else {
            return Ok(None);
        };

        // Beacons can arrive late or twice; only a longer duration wins
        let duration_updated = stored.map_or(true, |current| duration_secs > current);
        if duration_updated {
            sqlx::query("UPDATE page_visits SET duration = ? WHERE id = ?")
                .bind(duration_secs)
                .bind(visit_id)
                .execute(&mut *tx)
                .await?;
        }

        let screen_updated = match screen {
            Some(screen) => {
                sqlx::query("UPDATE page_visits SET screen_width = ?, screen_height = ? WHERE id = ?")
                    .bind(i64::from(screen.width))
                    .bind(i64::from(screen.height))
                    .bind(visit_id)
                    .execute(&mut *tx)
                    .await?;
                true
            }
            None => false,
        };

        ensure_day(&mut tx, today).await?;

        // Average over visitors, each counted once with their longest visit
        let (day_start, day_end) = day_bounds(today);
        let sql = format!(
            r#"
            SELECT AVG(longest) FROM (
                SELECT MAX(duration) AS longest
                FROM page_visits
                WHERE timestamp >= ? AND timestamp < ? AND duration IS NOT NULL{}
                GROUP BY ip_address
            )
            "#,
            prefix_exclusion_clause(ENGAGEMENT_EXCLUDED_PREFIXES)
        );
        let mut query = sqlx::query_scalar::<_, Option<f64>>(&sql)
            .bind(day_start)
            .bind(day_end);
        for prefix in ENGAGEMENT_EXCLUDED_PREFIXES {
            query = query.bind(*prefix);
        }
        let average_duration = query.fetch_one(&mut *tx).await?;

        if let Some(average) = average_duration {
            sqlx::query("UPDATE daily_stats SET avg_duration = ? WHERE date = ?")
                .bind(average)
                .bind(today)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Some(DurationOutcome {
            duration_updated,
            screen_updated,
            average_duration,
        }))
    }

    async fn record_gallery_view(
        &self,
        image_id: i64,
        ip: IpAddr,
        now: NaiveDateTime,
    ) -> StorageResult<Option<GalleryViewOutcome>> {
        let ip_address = ip.to_string();
        let today = now.date();
        let timestamp = epoch_millis(now);

        let mut tx = self.begin_write().await?;

        let image = sqlx::query_scalar::<_, i64>("SELECT id FROM gallery_images WHERE id = ?")
            .bind(image_id)
            .fetch_optional(&mut *tx)
            .await?;
        if image.is_none() {
            return Ok(None);
        }

        let existing = sqlx::query_as::<_, GalleryView>(
            r#"
            SELECT id, image_id, ip_address, view_date, timestamp
            FROM gallery_views
            WHERE image_id = ? AND ip_address = ? AND view_date = ?
            "#,
        )
        .bind(image_id)
        .bind(&ip_address)
        .bind(today)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(view) = existing {
            sqlx::query("UPDATE gallery_views SET timestamp = ? WHERE id = ?")
                .bind(timestamp)
                .bind(view.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(Some(GalleryViewOutcome::Refreshed(view.id)));
        }

        let view_id = sqlx::query(
            r#"
            INSERT INTO gallery_views (image_id, ip_address, view_date, timestamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(image_id)
        .bind(&ip_address)
        .bind(today)
        .bind(timestamp)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        ensure_day(&mut tx, today).await?;
        apply_delta(&mut tx, today, &DailyStatsDelta::gallery_view()).await?;

        tx.commit().await?;

        Ok(Some(GalleryViewOutcome::Created(view_id)))
    }

    async fn get_gallery_view(&self, view_id: i64) -> StorageResult<Option<GalleryView>> {
        let view = sqlx::query_as::<_, GalleryView>(
            r#"
            SELECT id, image_id, ip_address, view_date, timestamp
            FROM gallery_views
            WHERE id = ?
            "#,
        )
        .bind(view_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(view)
    }

    async fn create_gallery_image(
        &self,
        title: &str,
        filename: Option<&str>,
    ) -> StorageResult<GalleryImage> {
        let created_at = chrono::Utc::now().timestamp();

        let id = sqlx::query(
            r#"
            INSERT INTO gallery_images (title, filename, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(title)
        .bind(filename)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?
        .last_insert_rowid();

        Ok(GalleryImage {
            id,
            title: title.to_string(),
            filename: filename.map(str::to_string),
            created_at,
        })
    }

    async fn get_gallery_image(&self, image_id: i64) -> StorageResult<Option<GalleryImage>> {
        let image = sqlx::query_as::<_, GalleryImage>(
            r#"
            SELECT id, title, filename, created_at
            FROM gallery_images
            WHERE id = ?
            "#,
        )
        .bind(image_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(image)
    }

    async fn list_gallery_images(&self) -> StorageResult<Vec<GalleryImage>> {
        let images = sqlx::query_as::<_, GalleryImage>(
            r#"
            SELECT id, title, filename, created_at
            FROM gallery_images
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(images)
    }

    async fn daily_stats_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StorageResult<Vec<DailyStats>> {
        let sql = format!(
            "SELECT {DAILY_STATS_COLUMNS} FROM daily_stats WHERE date >= ? AND date <= ? ORDER BY date DESC"
        );
        let rows = sqlx::query_as::<_, DailyStats>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows)
    }

    async fn page_visit_counts_since(
        &self,
        since: NaiveDate,
        excluded_prefixes: &[&str],
    ) -> StorageResult<Vec<(String, i64)>> {
        let (since_start, _) = day_bounds(since);
        let sql = format!(
            r#"
            SELECT page, COUNT(id) AS visit_count
            FROM page_visits
            WHERE timestamp >= ?{}
            GROUP BY page
            ORDER BY visit_count DESC, page ASC
            "#,
            prefix_exclusion_clause(excluded_prefixes)
        );

        let mut query = sqlx::query_as::<_, (String, i64)>(&sql).bind(since_start);
        for prefix in excluded_prefixes {
            query = query.bind(*prefix);
        }

        Ok(query.fetch_all(self.pool.as_ref()).await?)
    }

    async fn gallery_view_counts_since(
        &self,
        since: NaiveDate,
    ) -> StorageResult<Vec<(String, i64)>> {
        let (since_start, _) = day_bounds(since);
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT gi.title, COUNT(gv.id) AS view_count
            FROM gallery_images gi
            JOIN gallery_views gv ON gv.image_id = gi.id
            WHERE gv.timestamp >= ?
            GROUP BY gi.title
            ORDER BY view_count DESC, gi.title ASC
            "#,
        )
        .bind(since_start)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn visitor_ip_counts_on(&self, date: NaiveDate) -> StorageResult<Vec<(String, i64)>> {
        let (day_start, day_end) = day_bounds(date);
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT ip_address, COUNT(id) AS visit_count
            FROM page_visits
            WHERE timestamp >= ? AND timestamp < ?
            GROUP BY ip_address
            ORDER BY visit_count DESC, ip_address ASC
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }
}
