use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

macro_rules! text_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

text_newtype!(ArticleId);
text_newtype!(FileLocator);

/// Words read per minute when estimating reading time.
pub const WORDS_PER_MINUTE: u64 = 200;

/// Minutes needed to read `words`, rounded up.
pub fn reading_minutes(words: u64) -> u64 {
    words.div_ceil(WORDS_PER_MINUTE)
}

/// A saved article as returned by the listing endpoint.
///
/// Optional text fields treat an empty string the same as a missing value,
/// since the listing service fills unknown fields with `""`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    #[serde(default = "untitled", deserialize_with = "title_or_untitled")]
    pub title: String,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub site_name: Option<String>,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub word_count: Option<u64>,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub location: String,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub category: Option<String>,
    #[serde(default, rename = "reading_time")]
    pub reading_progress: Option<f64>,
}

impl Article {
    pub fn words(&self) -> u64 {
        self.word_count.unwrap_or(0)
    }

    pub fn reading_minutes(&self) -> u64 {
        reading_minutes(self.words())
    }
}

fn untitled() -> String {
    "Untitled".to_string()
}

fn title_or_untitled<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty_text(deserializer)?.unwrap_or_else(untitled))
}

fn non_empty_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.trim().is_empty()))
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(parse_timestamp(&raw))
}

/// RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS` read as UTC. Anything else is
/// dropped so one odd row never fails the whole listing.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    warn!(created_at = raw, "ignoring unparseable article timestamp");
    None
}

/// Server-side artifact built from a set of selected articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRef {
    pub locator: FileLocator,
    pub filename: String,
    pub article_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_title: Option<String>,
}
