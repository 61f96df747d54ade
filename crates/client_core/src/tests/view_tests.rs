use super::*;

fn article(id: &str, title: &str, words: Option<u64>, created_at: Option<&str>) -> Article {
    Article {
        id: ArticleId::from(id),
        title: title.to_string(),
        author: None,
        site_name: None,
        summary: None,
        source_url: None,
        word_count: words,
        location: "later".to_string(),
        created_at: created_at.map(|raw| raw.parse().expect("timestamp")),
        category: None,
        reading_progress: None,
    }
}

fn ids(visible: &[&Article]) -> Vec<String> {
    visible.iter().map(|article| article.id.to_string()).collect()
}

fn sample() -> Vec<Article> {
    let mut rust = article("1", "Rust ownership", Some(900), Some("2024-03-01T00:00:00Z"));
    rust.author = Some("Ferris".to_string());
    let mut garden = article("2", "gardening basics", None, Some("2024-03-03T00:00:00Z"));
    garden.summary = Some("Soil, water and RUST-resistant roses".to_string());
    let mut news = article("3", "Morning briefing", Some(120), None);
    news.site_name = Some("Daily Paper".to_string());
    vec![rust, garden, news]
}

#[test]
fn empty_query_keeps_everything_newest_first() {
    let collection = sample();
    let visible = project(&collection, "", SortState::default());
    assert_eq!(ids(&visible), vec!["2", "1", "3"]);
}

#[test]
fn query_matches_title_author_site_and_summary_case_insensitively() {
    let collection = sample();
    let sort = SortState::default();

    assert_eq!(ids(&project(&collection, "rust", sort)), vec!["2", "1"]);
    assert_eq!(ids(&project(&collection, "FERRIS", sort)), vec!["1"]);
    assert_eq!(ids(&project(&collection, "daily", sort)), vec!["3"]);
    assert!(project(&collection, "nothing like this", sort).is_empty());
}

#[test]
fn word_count_sorts_numerically_with_missing_as_zero() {
    let collection = sample();
    let sort = SortState {
        key: SortKey::WordCount,
        direction: SortDirection::Ascending,
    };
    assert_eq!(ids(&project(&collection, "", sort)), vec!["2", "3", "1"]);
}

#[test]
fn title_sort_ignores_case() {
    let collection = sample();
    let sort = SortState {
        key: SortKey::Title,
        direction: SortDirection::Ascending,
    };
    assert_eq!(ids(&project(&collection, "", sort)), vec!["2", "3", "1"]);
}

#[test]
fn toggle_flips_active_key_and_resets_new_key() {
    let mut sort = SortState::default();

    sort.toggle(SortKey::CreatedAt);
    assert_eq!(sort.direction, SortDirection::Ascending);

    sort.toggle(SortKey::Title);
    assert_eq!(
        sort,
        SortState {
            key: SortKey::Title,
            direction: SortDirection::Ascending,
        }
    );

    sort.toggle(SortKey::Title);
    assert_eq!(sort.direction, SortDirection::Descending);
}

#[test]
fn sort_keys_parse_from_column_names() {
    assert_eq!("word-count".parse::<SortKey>(), Ok(SortKey::WordCount));
    assert_eq!(" Site_Name ".parse::<SortKey>(), Ok(SortKey::SiteName));
    assert!("rating".parse::<SortKey>().is_err());
}

#[test]
fn visible_ids_follow_projection_order() {
    let collection = sample();
    let visible = project(&collection, "", SortState::default());
    assert_eq!(
        visible_ids(&visible),
        vec![ArticleId::from("2"), ArticleId::from("1"), ArticleId::from("3")]
    );
}
