//! Visitor analytics
//!
//! Page visits, engagement beacons and gallery views are recorded as detail
//! rows and folded into one rollup row per calendar day, which the
//! statistics report later reads back.

pub mod clock;
pub mod context;
pub mod error;
pub mod ip_extractor;
pub mod page_names;
pub mod report;
pub mod tracker;
pub mod user_agent;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::ClientContext;
pub use error::{ErrorKind, TrackingError, TrackingResult};
pub use ip_extractor::extract_client_ip;
pub use page_names::{get_friendly_page_name, PageNameResolver};
pub use report::StatisticsReport;
pub use tracker::VisitorTracker;
pub use user_agent::{detect_browser, detect_mobile, detect_os, Browser, OperatingSystem};
