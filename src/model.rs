use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const INITIAL_VERSION: u64 = 1;

pub const DEFAULT_HEADER_TEXT: &str = "在线服务";
pub const DEFAULT_FOOTER_TEXT: &str = "Powered by zero-nav-next";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomElements {
    pub header_text: String,
    pub footer_text: String,
}

impl Default for CustomElements {
    fn default() -> Self {
        CustomElements {
            header_text: DEFAULT_HEADER_TEXT.to_string(),
            footer_text: DEFAULT_FOOTER_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteMeta {
    #[serde(default)]
    pub custom_elements: CustomElements,
}

/// The single persisted record behind the navigation page.
///
/// Imported payloads are accepted leniently: everything except the bookmark
/// fields themselves falls back to a default when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteData {
    #[serde(default = "initial_version")]
    pub version: u64,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
    #[serde(default)]
    pub meta: SiteMeta,
}

fn initial_version() -> u64 {
    INITIAL_VERSION
}

impl SiteData {
    pub fn new(custom_elements: CustomElements) -> Self {
        SiteData {
            version: INITIAL_VERSION,
            updated_at: Utc::now(),
            bookmarks: vec![],
            meta: SiteMeta { custom_elements },
        }
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.bookmarks.iter().position(|b| b.id == id)
    }

    /// Returns the first id that appears more than once.
    pub fn duplicate_id(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.bookmarks
            .iter()
            .map(|b| b.id.as_str())
            .find(|id| !seen.insert(*id))
    }
}

impl Default for SiteData {
    fn default() -> Self {
        SiteData::new(CustomElements::default())
    }
}
