//! User-agent classification
//!
//! Case-insensitive substring sniffing. Checks run in a fixed priority order
//! because real user agents carry several overlapping tokens
//! (Chrome sends "Safari", Edge sends "Chrome").

use serde::{Deserialize, Serialize};
use std::fmt;

/// Legacy EdgeHTML sends "Edge/", Chromium Edge sends "Edg/"
const EDGE_TOKENS: &[&str] = &["edge", "edg/"];

const MOBILE_KEYWORDS: &[&str] = &["mobile", "android", "iphone", "ipad", "ipod", "windows phone"];

/// Browser family derived from a user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
    Other,
    Unknown,
}

impl Browser {
    pub fn as_str(self) -> &'static str {
        match self {
            Browser::Chrome => "Chrome",
            Browser::Firefox => "Firefox",
            Browser::Safari => "Safari",
            Browser::Edge => "Edge",
            Browser::Other => "Other",
            Browser::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system family derived from a user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingSystem {
    Windows,
    Mac,
    Linux,
    Ios,
    Android,
    Other,
    Unknown,
}

impl OperatingSystem {
    pub fn as_str(self) -> &'static str {
        match self {
            OperatingSystem::Windows => "Windows",
            OperatingSystem::Mac => "Mac",
            OperatingSystem::Linux => "Linux",
            OperatingSystem::Ios => "iOS",
            OperatingSystem::Android => "Android",
            OperatingSystem::Other => "Other",
            OperatingSystem::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the daily rollup needs to know about a visitor's client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitClassification {
    pub browser: Browser,
    pub os: OperatingSystem,
    pub mobile: bool,
}

impl VisitClassification {
    pub fn from_user_agent(user_agent: &str) -> Self {
        Self {
            browser: detect_browser(user_agent),
            os: detect_os(user_agent),
            mobile: detect_mobile(user_agent),
        }
    }
}

pub fn detect_browser(user_agent: &str) -> Browser {
    if user_agent.is_empty() {
        return Browser::Unknown;
    }
    let ua = user_agent.to_lowercase();
    let edge = EDGE_TOKENS.iter().any(|token| ua.contains(token));

    if ua.contains("chrome") && !edge {
        Browser::Chrome
    } else if ua.contains("firefox") {
        Browser::Firefox
    } else if ua.contains("safari") && !ua.contains("chrome") {
        Browser::Safari
    } else if edge {
        Browser::Edge
    } else {
        Browser::Other
    }
}

pub fn detect_os(user_agent: &str) -> OperatingSystem {
    if user_agent.is_empty() {
        return OperatingSystem::Unknown;
    }
    let ua = user_agent.to_lowercase();

    if ua.contains("windows") {
        OperatingSystem::Windows
    } else if ua.contains("macintosh") || ua.contains("mac os") {
        OperatingSystem::Mac
    } else if ua.contains("linux") {
        OperatingSystem::Linux
    } else if ua.contains("iphone") || ua.contains("ipad") {
        OperatingSystem::Ios
    } else if ua.contains("android") {
        OperatingSystem::Android
    } else {
        OperatingSystem::Other
    }
}

pub fn detect_mobile(user_agent: &str) -> bool {
    if user_agent.is_empty() {
        return false;
    }
    let ua = user_agent.to_lowercase();
    MOBILE_KEYWORDS.iter().any(|keyword| ua.contains(keyword))
}
