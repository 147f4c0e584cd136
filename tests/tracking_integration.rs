//! Integration tests for visit, engagement and gallery tracking
//!
//! Every test runs against a fresh in-memory SQLite database and a manual
//! clock, so dedup windows and day boundaries can be crossed on demand.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::net::IpAddr;
use std::sync::Arc;
use visitor_stats::analytics::{
    ClientContext, ErrorKind, ManualClock, PageNameResolver, TrackingError, VisitorTracker,
};
use visitor_stats::config::TrackingConfig;
use visitor_stats::models::{DailyStats, GalleryViewOutcome, ScreenSize, VisitOutcome};
use visitor_stats::storage::{SqliteStorage, Storage};

const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const FIREFOX_LINUX: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

fn client(ip: &str) -> ClientContext {
    ClientContext::new(ip.parse::<IpAddr>().unwrap()).with_user_agent(CHROME_WINDOWS)
}

struct Harness {
    storage: Arc<dyn Storage>,
    clock: Arc<ManualClock>,
    tracker: VisitorTracker,
}

/// Helper to create a tracker over in-memory storage, starting at 2024-06-15 10:00
async fn setup() -> Harness {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    let storage: Arc<dyn Storage> = Arc::new(storage);

    let clock = Arc::new(ManualClock::new(at(2024, 6, 15, 10, 0, 0)));
    let tracker =
        VisitorTracker::with_clock(Arc::clone(&storage), TrackingConfig::default(), clock.clone());

    Harness {
        storage,
        clock,
        tracker,
    }
}

async fn rollup(storage: &Arc<dyn Storage>, date: NaiveDate) -> DailyStats {
    let mut rows = storage.daily_stats_between(date, date).await.unwrap();
    assert_eq!(rows.len(), 1, "expected one rollup row for {date}");
    rows.remove(0)
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_repeat_visit_inside_window_is_suppressed() {
    let h = setup().await;
    let visitor = client("203.0.113.7");

    let first = h.tracker.track_page_visit(Some("/speisekarte"), &visitor).await.unwrap();
    let VisitOutcome::Recorded { visit_id, new_visitor } = first else {
        panic!("first visit should be recorded, got {first:?}");
    };
    assert!(new_visitor);

    h.clock.advance(TimeDelta::seconds(2));
    let second = h.tracker.track_page_visit(Some("/speisekarte"), &visitor).await.unwrap();
    assert_eq!(second, VisitOutcome::Duplicate { visit_id });

    let stats = rollup(&h.storage, day(2024, 6, 15)).await;
    assert_eq!(stats.total_visits, 1);
    assert_eq!(stats.unique_visitors, 1);

    // Six seconds after the first visit the window has passed
    h.clock.advance(TimeDelta::seconds(4));
    let third = h.tracker.track_page_visit(Some("/speisekarte"), &visitor).await.unwrap();
    assert_eq!(
        third,
        VisitOutcome::Recorded {
            visit_id: visit_id + 1,
            new_visitor: false
        }
    );

    let stats = rollup(&h.storage, day(2024, 6, 15)).await;
    assert_eq!(stats.total_visits, 2);
    assert_eq!(stats.unique_visitors, 1);
}

#[tokio::test]
async fn test_dedup_is_per_page_and_per_ip() {
    let h = setup().await;

    let a = client("203.0.113.7");
    let b = client("198.51.100.20");

    assert!(matches!(
        h.tracker.track_page_visit(Some("/"), &a).await.unwrap(),
        VisitOutcome::Recorded { .. }
    ));
    assert!(matches!(
        h.tracker.track_page_visit(Some("/galerie"), &a).await.unwrap(),
        VisitOutcome::Recorded { .. }
    ));
    assert!(matches!(
        h.tracker.track_page_visit(Some("/"), &b).await.unwrap(),
        VisitOutcome::Recorded { .. }
    ));

    let stats = rollup(&h.storage, day(2024, 6, 15)).await;
    assert_eq!(stats.total_visits, 3);
    assert_eq!(stats.unique_visitors, 2);
}

#[tokio::test]
async fn test_unique_visitor_counted_once_per_day() {
    let h = setup().await;
    let visitor = client("203.0.113.7");

    for path in ["/", "/galerie", "/kontakt", "/reservierung"] {
        h.tracker.track_page_visit(Some(path), &visitor).await.unwrap();
        h.clock.advance(TimeDelta::minutes(1));
    }

    let stats = rollup(&h.storage, day(2024, 6, 15)).await;
    assert_eq!(stats.total_visits, 4);
    assert_eq!(stats.unique_visitors, 1);

    // Same visitor on the next day starts a fresh count
    h.clock.set(at(2024, 6, 16, 9, 0, 0));
    let outcome = h.tracker.track_page_visit(Some("/"), &visitor).await.unwrap();
    assert!(matches!(
        outcome,
        VisitOutcome::Recorded {
            new_visitor: true,
            ..
        }
    ));

    let next = rollup(&h.storage, day(2024, 6, 16)).await;
    assert_eq!(next.total_visits, 1);
    assert_eq!(next.unique_visitors, 1);
    assert_eq!(rollup(&h.storage, day(2024, 6, 15)).await.unique_visitors, 1);
}

#[tokio::test]
async fn test_category_buckets_follow_unique_visitors() {
    let h = setup().await;

    let chrome = client("203.0.113.7").with_consent(true);
    let firefox = ClientContext::new("198.51.100.20".parse().unwrap()).with_user_agent(FIREFOX_LINUX);
    let iphone = ClientContext::new("192.0.2.44".parse().unwrap()).with_user_agent(SAFARI_IPHONE);
    let bot = ClientContext::new("192.0.2.99".parse().unwrap()).with_user_agent("curl/8.4.0");

    h.tracker.track_page_visit(Some("/"), &chrome).await.unwrap();
    h.tracker.track_page_visit(Some("/kontakt"), &chrome).await.unwrap();
    h.tracker.track_page_visit(Some("/"), &firefox).await.unwrap();
    h.tracker.track_page_visit(Some("/"), &iphone).await.unwrap();
    h.tracker.track_page_visit(Some("/"), &bot).await.unwrap();

    let stats = rollup(&h.storage, day(2024, 6, 15)).await;
    assert_eq!(stats.total_visits, 5);
    assert_eq!(stats.unique_visitors, 4);
    assert_eq!(stats.consent_count, 1);

    assert_eq!(stats.chrome_users, 1);
    assert_eq!(stats.firefox_users, 1);
    assert_eq!(stats.safari_users, 1);
    assert_eq!(stats.other_browsers, 1);

    assert_eq!(stats.windows_users, 1);
    assert_eq!(stats.linux_users, 1);
    // iOS user agents carry "like Mac OS X"
    assert_eq!(stats.mac_users, 1);
    assert_eq!(stats.other_os, 1);

    assert_eq!(stats.mobile_users, 1);
    assert_eq!(stats.desktop_users, 3);
}

#[tokio::test]
async fn test_visit_fields_are_persisted() {
    let h = setup().await;
    let visitor = client("203.0.113.7")
        .with_referer("https://www.google.com/")
        .with_consent(true);

    let outcome = h
        .tracker
        .track_page_visit(Some("/galerie/bild/12"), &visitor)
        .await
        .unwrap();

    let visit = h
        .storage
        .get_page_visit(outcome.visit_id())
        .await
        .unwrap()
        .expect("visit should exist");
    assert_eq!(visit.page, "/galerie/bild/12");
    assert_eq!(visit.page_friendly_name, "Gallery");
    assert_eq!(visit.ip_address, "203.0.113.7");
    assert_eq!(visit.user_agent, CHROME_WINDOWS);
    assert_eq!(visit.referer, "https://www.google.com/");
    assert!(visit.analytics_consent);
    assert_eq!(visit.duration, None);
    assert_eq!(visit.screen_width, None);
}

#[tokio::test]
async fn test_custom_resolver_names_stored_visits() {
    let h = setup().await;
    let tracker = h.tracker.with_resolver(PageNameResolver::detailed());
    assert_eq!(
        tracker.resolver().resolve(Some("/speisekarte/kategorie/suppen")),
        "Menu: Suppen"
    );

    let visitor = client("203.0.113.7");
    let image_visit = tracker
        .track_page_visit(Some("/galerie/bild/12"), &visitor)
        .await
        .unwrap()
        .visit_id();
    let menu_visit = tracker
        .track_page_visit(Some("/speisekarte/kategorie/desserts"), &visitor)
        .await
        .unwrap()
        .visit_id();

    let image = h.storage.get_page_visit(image_visit).await.unwrap().unwrap();
    assert_eq!(image.page_friendly_name, "Gallery: Single image");
    let menu = h.storage.get_page_visit(menu_visit).await.unwrap().unwrap();
    assert_eq!(menu.page_friendly_name, "Menu: Desserts");

    let report = tracker.get_statistics().await;
    let mut names: Vec<&str> = report.page_visits.iter().map(|p| p.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["Gallery: Single image", "Menu: Desserts"]);
}

#[tokio::test]
async fn test_missing_path_is_rejected_without_side_effects() {
    let h = setup().await;

    let err = h
        .tracker
        .track_page_visit(None, &client("203.0.113.7"))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackingError::MissingPath));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let rows = h
        .storage
        .daily_stats_between(day(2024, 6, 15), day(2024, 6, 15))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_duration_only_grows() {
    let h = setup().await;
    let visit_id = h
        .tracker
        .track_page_visit(Some("/"), &client("203.0.113.7"))
        .await
        .unwrap()
        .visit_id();

    let first = h.tracker.update_visit_duration(visit_id, 30, None).await.unwrap();
    assert!(first.duration_updated);
    assert_eq!(first.average_duration, Some(30.0));

    let shorter = h.tracker.update_visit_duration(visit_id, 10, None).await.unwrap();
    assert!(!shorter.duration_updated);

    let visit = h.storage.get_page_visit(visit_id).await.unwrap().unwrap();
    assert_eq!(visit.duration, Some(30));

    let longer = h.tracker.update_visit_duration(visit_id, 45, None).await.unwrap();
    assert!(longer.duration_updated);
    assert_eq!(longer.average_duration, Some(45.0));

    let visit = h.storage.get_page_visit(visit_id).await.unwrap().unwrap();
    assert_eq!(visit.duration, Some(45));
}

#[tokio::test]
async fn test_average_uses_longest_visit_per_ip() {
    let h = setup().await;
    let a = client("203.0.113.7");
    let b = client("198.51.100.20");

    let a_home = h.tracker.track_page_visit(Some("/"), &a).await.unwrap().visit_id();
    let a_menu = h.tracker.track_page_visit(Some("/speisekarte"), &a).await.unwrap().visit_id();
    let b_home = h.tracker.track_page_visit(Some("/"), &b).await.unwrap().visit_id();
    let b_admin = h.tracker.track_page_visit(Some("/admin"), &b).await.unwrap().visit_id();

    h.tracker.update_visit_duration(a_home, 20, None).await.unwrap();
    h.tracker.update_visit_duration(a_menu, 40, None).await.unwrap();
    h.tracker.update_visit_duration(b_admin, 1000, None).await.unwrap();
    let outcome = h.tracker.update_visit_duration(b_home, 10, None).await.unwrap();

    // (40 + 10) / 2; the admin visit does not count
    assert_eq!(outcome.average_duration, Some(25.0));
    assert!(outcome.average_updated());

    let stats = rollup(&h.storage, day(2024, 6, 15)).await;
    assert_eq!(stats.avg_duration, Some(25.0));
}

#[tokio::test]
async fn test_duration_saved_when_no_visit_qualifies() {
    let h = setup().await;
    let visit_id = h
        .tracker
        .track_page_visit(Some("/admin/galerie"), &client("203.0.113.7"))
        .await
        .unwrap()
        .visit_id();

    let screen = ScreenSize::from_parts(Some(1920), Some(1080));
    let outcome = h
        .tracker
        .update_visit_duration(visit_id, 12, screen)
        .await
        .unwrap();
    assert!(outcome.duration_updated);
    assert!(outcome.screen_updated);
    assert_eq!(outcome.average_duration, None);
    assert!(!outcome.average_updated());

    let visit = h.storage.get_page_visit(visit_id).await.unwrap().unwrap();
    assert_eq!(visit.duration, Some(12));
    assert_eq!(visit.screen_width, Some(1920));
    assert_eq!(visit.screen_height, Some(1080));

    let stats = rollup(&h.storage, day(2024, 6, 15)).await;
    assert_eq!(stats.avg_duration, None);
}

#[tokio::test]
async fn test_partial_screen_size_is_ignored() {
    let h = setup().await;
    let visit_id = h
        .tracker
        .track_page_visit(Some("/"), &client("203.0.113.7"))
        .await
        .unwrap()
        .visit_id();

    let screen = ScreenSize::from_parts(Some(1920), None);
    assert!(screen.is_none());

    let outcome = h.tracker.update_visit_duration(visit_id, 5, screen).await.unwrap();
    assert!(!outcome.screen_updated);

    let visit = h.storage.get_page_visit(visit_id).await.unwrap().unwrap();
    assert_eq!(visit.screen_width, None);
    assert_eq!(visit.screen_height, None);
}

#[tokio::test]
async fn test_duration_for_unknown_visit() {
    let h = setup().await;

    let err = h.tracker.update_visit_duration(4242, 30, None).await.unwrap_err();
    assert!(matches!(err, TrackingError::VisitNotFound(4242)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_negative_duration_is_rejected() {
    let h = setup().await;
    let visit_id = h
        .tracker
        .track_page_visit(Some("/"), &client("203.0.113.7"))
        .await
        .unwrap()
        .visit_id();

    let err = h.tracker.update_visit_duration(visit_id, -3, None).await.unwrap_err();
    assert!(matches!(err, TrackingError::InvalidDuration(-3)));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let visit = h.storage.get_page_visit(visit_id).await.unwrap().unwrap();
    assert_eq!(visit.duration, None);
}

#[tokio::test]
async fn test_gallery_view_counted_once_per_day() {
    let h = setup().await;
    let image = h
        .storage
        .create_gallery_image("Terrasse im Sommer", Some("terrasse.jpg"))
        .await
        .unwrap();
    let visitor = client("203.0.113.7");

    let first = h
        .tracker
        .track_gallery_view(image.id, Some(&visitor))
        .await
        .unwrap()
        .unwrap();
    assert!(first.is_new());
    let created_at = h
        .storage
        .get_gallery_view(first.view_id())
        .await
        .unwrap()
        .unwrap()
        .timestamp;

    h.clock.advance(TimeDelta::hours(2));
    let second = h
        .tracker
        .track_gallery_view(image.id, Some(&visitor))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, GalleryViewOutcome::Refreshed(first.view_id()));

    let view = h
        .storage
        .get_gallery_view(first.view_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.timestamp - created_at, 2 * 60 * 60 * 1000);
    assert_eq!(view.view_date, day(2024, 6, 15));

    assert_eq!(rollup(&h.storage, day(2024, 6, 15)).await.gallery_views, 1);

    // Another visitor counts separately
    let other = h
        .tracker
        .track_gallery_view(image.id, Some(&client("198.51.100.20")))
        .await
        .unwrap()
        .unwrap();
    assert!(other.is_new());
    assert_eq!(rollup(&h.storage, day(2024, 6, 15)).await.gallery_views, 2);

    // The same visitor counts again the next day
    h.clock.set(at(2024, 6, 16, 8, 0, 0));
    let next_day = h
        .tracker
        .track_gallery_view(image.id, Some(&visitor))
        .await
        .unwrap()
        .unwrap();
    assert!(next_day.is_new());
    assert_ne!(next_day.view_id(), first.view_id());
    assert_eq!(rollup(&h.storage, day(2024, 6, 16)).await.gallery_views, 1);
}

#[tokio::test]
async fn test_gallery_view_for_unknown_image() {
    let h = setup().await;

    let err = h
        .tracker
        .track_gallery_view(99, Some(&client("203.0.113.7")))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackingError::ImageNotFound(99)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_gallery_view_without_request_context() {
    let h = setup().await;
    let image = h.storage.create_gallery_image("Weinkeller", None).await.unwrap();

    let outcome = h.tracker.track_gallery_view(image.id, None).await.unwrap();
    assert!(outcome.is_none());

    let rows = h
        .storage
        .daily_stats_between(day(2024, 6, 15), day(2024, 6, 15))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_concurrent_visits_keep_counters_consistent() {
    let h = setup().await;
    let tracker = Arc::new(h.tracker);

    let mut handles = vec![];
    for i in 0..20 {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            let visitor = client(&format!("10.0.0.{}", i % 5));
            let path = format!("/seite-{i}");
            tracker.track_page_visit(Some(path.as_str()), &visitor).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = rollup(&h.storage, day(2024, 6, 15)).await;
    assert_eq!(stats.total_visits, 20);
    assert_eq!(stats.unique_visitors, 5);
    assert_eq!(stats.chrome_users, 5);
}

#[tokio::test]
async fn test_gallery_catalog() {
    let h = setup().await;

    let first = h
        .storage
        .create_gallery_image("Terrasse im Sommer", Some("terrasse.jpg"))
        .await
        .unwrap();
    let second = h.storage.create_gallery_image("Weinkeller", None).await.unwrap();

    let fetched = h.storage.get_gallery_image(first.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "Terrasse im Sommer");
    assert_eq!(fetched.filename.as_deref(), Some("terrasse.jpg"));
    assert!(h.storage.get_gallery_image(second.id + 1).await.unwrap().is_none());

    let ids: Vec<i64> = h
        .storage
        .list_gallery_images()
        .await
        .unwrap()
        .iter()
        .map(|image| image.id)
        .collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

/// File-backed storage with a multi-connection pool, as deployed
async fn setup_file_backed(dir: &tempfile::TempDir) -> Harness {
    let url = format!("sqlite://{}", dir.path().join("visits.db").display());
    let storage = SqliteStorage::new(&url, 5).await.unwrap();
    storage.init().await.unwrap();
    let storage: Arc<dyn Storage> = Arc::new(storage);

    let clock = Arc::new(ManualClock::new(at(2024, 6, 15, 10, 0, 0)));
    let tracker =
        VisitorTracker::with_clock(Arc::clone(&storage), TrackingConfig::default(), clock.clone());

    Harness {
        storage,
        clock,
        tracker,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_visits_on_pooled_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let h = setup_file_backed(&dir).await;
    let tracker = Arc::new(h.tracker);

    let mut handles = vec![];
    for i in 0..40 {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            let visitor = client(&format!("10.0.1.{i}"));
            tracker.track_page_visit(Some("/"), &visitor).await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(
            outcome,
            VisitOutcome::Recorded {
                new_visitor: true,
                ..
            }
        ));
    }

    let stats = rollup(&h.storage, day(2024, 6, 15)).await;
    assert_eq!(stats.total_visits, 40);
    assert_eq!(stats.unique_visitors, 40);
    assert_eq!(stats.windows_users, 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gallery_revisits_on_pooled_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let h = setup_file_backed(&dir).await;
    let image_id = h.storage.create_gallery_image("Gastraum", None).await.unwrap().id;
    let tracker = Arc::new(h.tracker);

    let mut handles = vec![];
    for _ in 0..12 {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            tracker
                .track_gallery_view(image_id, Some(&client("203.0.113.7")))
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap().unwrap();
        if outcome.is_new() {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(rollup(&h.storage, day(2024, 6, 15)).await.gallery_views, 1);
}
