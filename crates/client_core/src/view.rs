//! Stateless search and sort projection over an article collection.

use std::{cmp::Ordering, fmt, str::FromStr};

use shared::domain::{Article, ArticleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Author,
    SiteName,
    WordCount,
    Location,
    CreatedAt,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::Title,
        SortKey::Author,
        SortKey::SiteName,
        SortKey::WordCount,
        SortKey::Location,
        SortKey::CreatedAt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Author => "author",
            SortKey::SiteName => "site_name",
            SortKey::WordCount => "word_count",
            SortKey::Location => "location",
            SortKey::CreatedAt => "created_at",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = SortKey::ALL.iter().map(|key| key.as_str()).collect();
                format!("unknown sort key '{value}' (expected one of: {})", known.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            key: SortKey::CreatedAt,
            direction: SortDirection::Descending,
        }
    }
}

impl SortState {
    /// Column-header click: same key flips direction, a new key sorts ascending.
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.direction = self.direction.flipped();
        } else {
            self.key = key;
            self.direction = SortDirection::Ascending;
        }
    }
}

pub fn matches_query(article: &Article, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    let hit = |text: Option<&str>| text.is_some_and(|text| text.to_lowercase().contains(&query));
    hit(Some(article.title.as_str()))
        || hit(article.author.as_deref())
        || hit(article.site_name.as_deref())
        || hit(article.summary.as_deref())
}

fn text_key(article: &Article, key: SortKey) -> String {
    let raw = match key {
        SortKey::Title => Some(article.title.as_str()),
        SortKey::Author => article.author.as_deref(),
        SortKey::SiteName => article.site_name.as_deref(),
        SortKey::Location => Some(article.location.as_str()),
        SortKey::WordCount | SortKey::CreatedAt => None,
    };
    raw.unwrap_or_default().to_lowercase()
}

fn compare(a: &Article, b: &Article, key: SortKey) -> Ordering {
    match key {
        SortKey::WordCount => a.words().cmp(&b.words()),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        _ => text_key(a, key).cmp(&text_key(b, key)),
    }
}

/// Articles matching `query`, ordered by `sort`. Ties keep collection order.
pub fn project<'a>(collection: &'a [Article], query: &str, sort: SortState) -> Vec<&'a Article> {
    let mut visible: Vec<&Article> = collection
        .iter()
        .filter(|article| matches_query(article, query))
        .collect();
    visible.sort_by(|a, b| {
        let ordering = compare(a, b, sort.key);
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
    visible
}

pub fn visible_ids(visible: &[&Article]) -> Vec<ArticleId> {
    visible.iter().map(|article| article.id.clone()).collect()
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
