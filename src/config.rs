use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default endpoint of the RSS-to-JSON conversion API. The feed URL is
/// appended URL-encoded.
fn default_rss_api_url() -> String {
    "https://api.rss2json.com/v1/api.json?rss_url=".to_string()
}

/// Default relay endpoint the respin client posts to. Points back at the
/// relay route hosted by this server.
fn default_respin_endpoint() -> String {
    "http://127.0.0.1:3000/api/respin".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Herbal Remedies")]
    HerbalRemedies,
    #[serde(rename = "Natural Wellness")]
    NaturalWellness,
    #[serde(rename = "Gardening Tips")]
    GardeningTips,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::HerbalRemedies,
        Category::NaturalWellness,
        Category::GardeningTips,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::HerbalRemedies => "Herbal Remedies",
            Category::NaturalWellness => "Natural Wellness",
            Category::GardeningTips => "Gardening Tips",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_rss_api_url")]
    pub rss_api_url: String,
    #[serde(default = "default_respin_endpoint")]
    pub respin_endpoint: String,
    pub feeds: Vec<FeedSource>,
}

/// A statically configured feed. Every article inherits its category from
/// the source it came from, never from content.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub category: Category,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}
