//! Friendly page names for the statistics dashboard
//!
//! A request path is translated by walking an ordered rule list top to
//! bottom; the first matching rule produces the label. The builtin order is:
//!
//! 1. system/API prefixes, labelled `System: <path>`
//! 2. exact route table entries
//! 3. substring matches against every route table key except `/`, in table order
//! 4. the single gallery image prefix
//! 5. the menu category prefix, labelled from the trailing segment
//!
//! Anything left over gets `Page: <path>`. In this order the `/galerie` and
//! `/speisekarte` substrings catch their detail routes first;
//! [`PageNameResolver::detailed`] moves rules 4 and 5 ahead of rule 3.

use std::sync::LazyLock;

pub const UNKNOWN_PAGE: &str = "Unknown page";
pub const SYSTEM_LABEL_PREFIX: &str = "System: ";
pub const FALLBACK_LABEL_PREFIX: &str = "Page: ";

/// Endpoints that are plumbing rather than pages
pub const SYSTEM_PATH_PREFIXES: &[&str] = &[
    "/favicon.ico",
    "/get_visit_id",
    "/get_api_key_token",
    "/track_image_view",
    "/update_visit_duration",
    "/api/",
    "/static/",
];

/// Paths ignored when averaging how long visitors stay
pub const ENGAGEMENT_EXCLUDED_PREFIXES: &[&str] =
    &["/admin", "/static", "/update_visit_duration", "/api"];

/// Paths left out of the page breakdown in the report
pub const REPORT_EXCLUDED_PREFIXES: &[&str] = &["/admin", "/api/"];

const GALLERY_IMAGE_PREFIX: &str = "/galerie/bild/";
const MENU_CATEGORY_PREFIX: &str = "/speisekarte/kategorie/";

const ROUTE_TABLE: &[(&str, &str)] = &[
    ("/", "Home"),
    ("index", "Home"),
    ("/admin/statistiken", "Admin: Statistics"),
    ("/admin", "Admin: Dashboard"),
    ("/admin/galerie", "Admin: Gallery"),
    ("/admin/speisekarte", "Admin: Menu"),
    ("/admin/neuigkeiten", "Admin: News"),
    ("/admin/oeffnungszeiten", "Admin: Opening hours"),
    ("/admin-panel/statistics", "Admin: Statistics"),
    ("/admin-panel", "Admin: Dashboard"),
    ("/admin-panel/gallery", "Admin: Gallery"),
    ("/admin-panel/menu", "Admin: Menu"),
    ("/admin-panel/news", "Admin: News"),
    ("/admin-panel/opening-hours", "Admin: Opening hours"),
    ("/speisekarte", "Menu"),
    ("/galerie", "Gallery"),
    ("/salzgeschichte", "Salt story"),
    ("/familiengeschichte", "Family story"),
    ("/erfahrungsgeschichte", "Experience story"),
    ("/salz-geschichte", "Salt story"),
    ("/familien-geschichte", "Family story"),
    ("/erfahrungs-geschichte", "Experience story"),
    ("/salt-story", "Salt story"),
    ("/salt_story", "Salt story"),
    ("/family-story", "Family story"),
    ("/family_story", "Family story"),
    ("/experience-story", "Experience story"),
    ("/experience_story", "Experience story"),
    ("/impressum", "Imprint"),
    ("/datenschutz", "Privacy policy"),
    ("/kontakt", "Contact"),
    ("/reservierung", "Reservation"),
    ("/login", "Login page"),
    ("/logout", "Logout"),
];

static BUILTIN: LazyLock<PageNameResolver> = LazyLock::new(PageNameResolver::builtin);

/// How a rule decides whether it applies to a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Exact(String),
    Prefix(String),
    Contains(String),
}

impl Matcher {
    fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::Exact(key) => path == key,
            Matcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Matcher::Contains(needle) => path.contains(needle.as_str()),
        }
    }
}

/// What a matching rule turns the path into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Fixed(String),
    /// `System: <path>`
    System,
    /// `<section>: <Last segment>`
    TitledLastSegment(String),
}

impl Label {
    fn render(&self, path: &str) -> String {
        match self {
            Label::Fixed(label) => label.clone(),
            Label::System => format!("{SYSTEM_LABEL_PREFIX}{path}"),
            Label::TitledLastSegment(section) => {
                let segment = path.rsplit('/').next().unwrap_or_default();
                format!("{section}: {}", capitalize(segment))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRule {
    pub matcher: Matcher,
    pub label: Label,
}

impl PageRule {
    pub fn new(matcher: Matcher, label: Label) -> Self {
        Self { matcher, label }
    }
}

#[derive(Debug, Clone)]
pub struct PageNameResolver {
    rules: Vec<PageRule>,
}

impl PageNameResolver {
    pub fn new(rules: Vec<PageRule>) -> Self {
        Self { rules }
    }

    /// The site's route table in the documented evaluation order
    pub fn builtin() -> Self {
        let mut rules = system_rules();
        rules.extend(exact_rules());
        rules.extend(substring_rules());
        rules.extend(detail_route_rules());
        Self::new(rules)
    }

    /// Like [`builtin`](Self::builtin), but single gallery images and menu
    /// categories get their own labels instead of "Gallery" and "Menu"
    pub fn detailed() -> Self {
        let mut rules = system_rules();
        rules.extend(exact_rules());
        rules.extend(detail_route_rules());
        rules.extend(substring_rules());
        Self::new(rules)
    }

    pub fn rules(&self) -> &[PageRule] {
        &self.rules
    }

    /// Translate a request path into a dashboard label. Never fails.
    pub fn resolve(&self, path: Option<&str>) -> String {
        let Some(path) = path else {
            return UNKNOWN_PAGE.to_string();
        };

        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map(|rule| rule.label.render(path))
            .unwrap_or_else(|| format!("{FALLBACK_LABEL_PREFIX}{path}"))
    }
}

impl Default for PageNameResolver {
    fn default() -> Self {
        Self::builtin()
    }
}

fn system_rules() -> Vec<PageRule> {
    SYSTEM_PATH_PREFIXES
        .iter()
        .map(|prefix| PageRule::new(Matcher::Prefix(prefix.to_string()), Label::System))
        .collect()
}

fn exact_rules() -> impl Iterator<Item = PageRule> {
    ROUTE_TABLE.iter().map(|(path, label)| {
        PageRule::new(Matcher::Exact(path.to_string()), Label::Fixed(label.to_string()))
    })
}

/// "/" is a substring of every path and is left out
fn substring_rules() -> impl Iterator<Item = PageRule> {
    ROUTE_TABLE
        .iter()
        .filter(|(path, _)| *path != "/")
        .map(|(path, label)| {
            PageRule::new(Matcher::Contains(path.to_string()), Label::Fixed(label.to_string()))
        })
}

fn detail_route_rules() -> [PageRule; 2] {
    [
        PageRule::new(
            Matcher::Prefix(GALLERY_IMAGE_PREFIX.to_string()),
            Label::Fixed("Gallery: Single image".to_string()),
        ),
        PageRule::new(
            Matcher::Prefix(MENU_CATEGORY_PREFIX.to_string()),
            Label::TitledLastSegment("Menu".to_string()),
        ),
    ]
}

/// Resolve a path with the builtin route table
pub fn get_friendly_page_name(path: Option<&str>) -> String {
    BUILTIN.resolve(path)
}

/// Whether a path starts with any of the given prefixes
pub fn has_any_prefix(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
