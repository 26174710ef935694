use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported catalog content kinds. Persons and other multi-search result
/// types are filtered out before they reach consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

/// A normalized movie or TV show record. Built fresh on every remote fetch,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i32,
    pub title: String,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub release_date: Option<String>,
    pub year: Option<i32>,
    /// Upstream 0-10 average, rounded to one decimal.
    pub rating: f32,
    pub quality: String,
    pub description: String,
    pub genres: Vec<String>,
    pub genre_ids: Vec<i32>,
    pub media_type: MediaType,
    pub cast: Vec<String>,
    pub trailer_url: Option<String>,
}

/// One page of enriched results plus upstream pagination counters.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u32,
    pub results: Vec<T>,
}

/// Full detail view for a single title: the item itself plus the enriched
/// similar-titles list.
#[derive(Debug, Clone)]
pub struct TitleDetail {
    pub item: ContentItem,
    pub runtime_minutes: Option<f32>,
    pub similar: Vec<ContentItem>,
}

#[derive(Debug, Clone)]
pub struct PersonDetail {
    pub id: i32,
    pub name: String,
    pub profile_url: Option<String>,
    pub biography: String,
    pub known_for: Vec<ContentItem>,
}

/// Raw multi-search hit. `media_type` keeps the upstream vocabulary
/// ("movie", "tv", "person"); `is_supported` is the exposure filter.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: i32,
    pub title: String,
    pub media_type: String,
    pub poster_url: Option<String>,
    pub rating: f32,
    pub release_date: Option<String>,
    pub year: Option<i32>,
    pub description: String,
}

impl SearchResult {
    pub fn is_supported(&self) -> bool {
        (self.media_type == "movie" || self.media_type == "tv") && self.poster_url.is_some()
    }
}

/// One entry of a genre taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreEntry {
    pub id: i32,
    pub name: String,
}

/// Denormalized favorite, keyed by `{user_id}_{content_id}` in the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub user_id: String,
    pub content_id: i32,
    pub title: String,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub release_date: Option<String>,
    pub year: Option<i32>,
    pub rating: f32,
    pub quality: String,
    pub description: String,
    pub genres: Vec<String>,
    pub media_type: MediaType,
    pub created_at: DateTime<Utc>,
}

impl FavoriteRecord {
    pub fn new(user_id: &str, item: &ContentItem) -> Self {
        Self {
            user_id: user_id.to_string(),
            content_id: item.id,
            title: item.title.clone(),
            poster_url: item.poster_url.clone(),
            backdrop_url: item.backdrop_url.clone(),
            release_date: item.release_date.clone(),
            year: item.year,
            rating: item.rating,
            quality: item.quality.clone(),
            description: item.description.clone(),
            genres: item.genres.clone(),
            media_type: item.media_type,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}_{}", self.user_id, self.content_id)
    }
}

/// A per-browser star rating, 1 through 5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingRecord {
    pub content_id: i32,
    pub rating: u8,
    /// Unix milliseconds of the last change.
    pub timestamp: i64,
}
