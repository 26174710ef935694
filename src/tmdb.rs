use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Days, Months, NaiveDate, Utc};
use futures::future::{join_all, try_join_all};
use reqwest::Client;
use serde::Deserialize;
use std::env;
use tracing::debug;

use crate::models::{
    ContentItem, GenreEntry, MediaType, Page, PersonDetail, SearchResult, TitleDetail,
};

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const LANGUAGE: &str = "fr-FR";
const TOP_RATED_VOTE_FLOOR: u32 = 100;
const QUALITY_LABEL: &str = "HD";
const MAX_CAST: usize = 10;

/// Size token of the image CDN. Posters render at `W500`, backdrops at
/// `Original`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    W92,
    W154,
    W185,
    W342,
    W500,
    W780,
    Original,
}

impl ImageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::W92 => "w92",
            ImageSize::W154 => "w154",
            ImageSize::W185 => "w185",
            ImageSize::W342 => "w342",
            ImageSize::W500 => "w500",
            ImageSize::W780 => "w780",
            ImageSize::Original => "original",
        }
    }
}

/// Resolves a relative image path against the CDN base. `None` stays `None`;
/// there is no placeholder at this layer.
pub fn image_url(path: Option<&str>, size: ImageSize) -> Option<String> {
    path.map(|p| format!("{IMAGE_BASE}/{}{p}", size.as_str()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieFilter {
    Popular,
    TopRated,
    Upcoming,
    NowPlaying,
}

impl MovieFilter {
    fn endpoint(self) -> &'static str {
        match self {
            MovieFilter::Popular => "popular",
            MovieFilter::TopRated => "top_rated",
            MovieFilter::Upcoming => "upcoming",
            MovieFilter::NowPlaying => "now_playing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvFilter {
    Popular,
    TopRated,
    OnTheAir,
    AiringToday,
}

impl TvFilter {
    fn endpoint(self) -> &'static str {
        match self {
            TvFilter::Popular => "popular",
            TvFilter::TopRated => "top_rated",
            TvFilter::OnTheAir => "on_the_air",
            TvFilter::AiringToday => "airing_today",
        }
    }
}

/// Discovery parameters for a movie filter. Date bounds derive from the
/// supplied `today` so the mapping stays deterministic.
pub fn movie_filter_params(filter: MovieFilter, today: NaiveDate) -> Vec<(&'static str, String)> {
    match filter {
        MovieFilter::Popular => vec![("sort_by", "popularity.desc".to_string())],
        MovieFilter::TopRated => vec![
            ("sort_by", "vote_average.desc".to_string()),
            ("vote_count.gte", TOP_RATED_VOTE_FLOOR.to_string()),
        ],
        MovieFilter::Upcoming => vec![
            ("sort_by", "primary_release_date.asc".to_string()),
            ("primary_release_date.gte", today.to_string()),
        ],
        MovieFilter::NowPlaying => {
            let lower = today.checked_sub_months(Months::new(1)).unwrap_or(today);
            vec![
                ("sort_by", "primary_release_date.desc".to_string()),
                ("primary_release_date.gte", lower.to_string()),
                ("primary_release_date.lte", today.to_string()),
            ]
        }
    }
}

/// Trailing 30-day window used by the "latest" queries.
pub fn latest_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let lower = today.checked_sub_days(Days::new(30)).unwrap_or(today);
    (lower, today)
}

/// Catalog metadata boundary. Implemented by [`TmdbClient`]; tests inject
/// fakes.
#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn movie_genres(&self) -> Result<Vec<GenreEntry>>;
    async fn tv_genres(&self) -> Result<Vec<GenreEntry>>;
    async fn movies_by_filter(
        &self,
        filter: MovieFilter,
        genre_id: Option<i32>,
        page: u32,
    ) -> Result<Page<ContentItem>>;
    async fn tv_by_filter(
        &self,
        filter: TvFilter,
        genre_id: Option<i32>,
        page: u32,
    ) -> Result<Page<ContentItem>>;
    async fn latest_movies(&self, genre_id: Option<i32>, page: u32) -> Result<Page<ContentItem>>;
    async fn latest_tv(&self, genre_id: Option<i32>, page: u32) -> Result<Page<ContentItem>>;
    async fn movie_details(&self, id: i32) -> Result<TitleDetail>;
    async fn tv_details(&self, id: i32) -> Result<TitleDetail>;
    async fn person_details(&self, id: i32) -> Result<PersonDetail>;
    async fn search_multi(&self, query: &str) -> Result<Vec<SearchResult>>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        Ok(Self::new(api_key))
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut url = format!(
            "{TMDB_BASE}{path}?api_key={}&language={LANGUAGE}",
            self.api_key
        );
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", url, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }

    async fn fetch_movie_appended(&self, id: i32, with_similar: bool) -> Result<MovieAppended> {
        self.get_json(&self.url(&detail_path(MediaType::Movie, id), &append_params(with_similar)))
            .await
    }

    async fn fetch_show_appended(&self, id: i32, with_similar: bool) -> Result<ShowAppended> {
        self.get_json(&self.url(&detail_path(MediaType::Tv, id), &append_params(with_similar)))
            .await
    }

    /// One detail request per summary row, joined all-or-error. The fan-out
    /// is bounded by the page the upstream returned (at most one page of
    /// rows, typically 20).
    async fn enrich_movies(&self, rows: &[SummaryRow]) -> Result<Vec<ContentItem>> {
        let details =
            try_join_all(rows.iter().map(|r| self.fetch_movie_appended(r.id, false))).await?;
        Ok(details.iter().map(movie_item).collect())
    }

    async fn enrich_shows(&self, rows: &[SummaryRow]) -> Result<Vec<ContentItem>> {
        let details =
            try_join_all(rows.iter().map(|r| self.fetch_show_appended(r.id, false))).await?;
        Ok(details.iter().map(show_item).collect())
    }

    async fn movie_page(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Page<ContentItem>> {
        let envelope: PageEnvelope = self.get_json(&self.url(path, params)).await?;
        let results = self.enrich_movies(&envelope.results).await?;
        Ok(Page {
            page: envelope.page,
            total_pages: envelope.total_pages,
            total_results: envelope.total_results,
            results,
        })
    }

    async fn show_page(&self, path: &str, params: &[(&str, String)]) -> Result<Page<ContentItem>> {
        let envelope: PageEnvelope = self.get_json(&self.url(path, params)).await?;
        let results = self.enrich_shows(&envelope.results).await?;
        Ok(Page {
            page: envelope.page,
            total_pages: envelope.total_pages,
            total_results: envelope.total_results,
            results,
        })
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn movie_genres(&self) -> Result<Vec<GenreEntry>> {
        let data: GenreListResponse = self.get_json(&self.url("/genre/movie/list", &[])).await?;
        Ok(data.genres)
    }

    async fn tv_genres(&self) -> Result<Vec<GenreEntry>> {
        let data: GenreListResponse = self.get_json(&self.url("/genre/tv/list", &[])).await?;
        Ok(data.genres)
    }

    async fn movies_by_filter(
        &self,
        filter: MovieFilter,
        genre_id: Option<i32>,
        page: u32,
    ) -> Result<Page<ContentItem>> {
        let today = Utc::now().date_naive();
        let mut params = movie_filter_params(filter, today);
        params.push(("page", page.to_string()));
        // A genre id always routes to discovery; genre filtering and named
        // filter endpoints are mutually exclusive upstream.
        let path = match genre_id {
            Some(genre) => {
                params.push(("with_genres", genre.to_string()));
                "/discover/movie".to_string()
            }
            None => format!("/movie/{}", filter.endpoint()),
        };
        self.movie_page(&path, &params).await
    }

    async fn tv_by_filter(
        &self,
        filter: TvFilter,
        genre_id: Option<i32>,
        page: u32,
    ) -> Result<Page<ContentItem>> {
        let mut params = vec![("page", page.to_string())];
        let path = match genre_id {
            Some(genre) => {
                params.push(("with_genres", genre.to_string()));
                "/discover/tv".to_string()
            }
            None => format!("/tv/{}", filter.endpoint()),
        };
        self.show_page(&path, &params).await
    }

    async fn latest_movies(&self, genre_id: Option<i32>, page: u32) -> Result<Page<ContentItem>> {
        let (lower, upper) = latest_window(Utc::now().date_naive());
        let mut params = vec![
            ("sort_by", "primary_release_date.desc".to_string()),
            ("primary_release_date.gte", lower.to_string()),
            ("primary_release_date.lte", upper.to_string()),
            ("page", page.to_string()),
        ];
        let path = match genre_id {
            Some(genre) => {
                params.push(("with_genres", genre.to_string()));
                "/discover/movie"
            }
            None => "/movie/now_playing",
        };
        self.movie_page(path, &params).await
    }

    async fn latest_tv(&self, genre_id: Option<i32>, page: u32) -> Result<Page<ContentItem>> {
        let (lower, upper) = latest_window(Utc::now().date_naive());
        let mut params = vec![
            ("sort_by", "first_air_date.desc".to_string()),
            ("first_air_date.gte", lower.to_string()),
            ("first_air_date.lte", upper.to_string()),
            ("page", page.to_string()),
        ];
        let path = match genre_id {
            Some(genre) => {
                params.push(("with_genres", genre.to_string()));
                "/discover/tv"
            }
            None => "/tv/on_the_air",
        };
        self.show_page(path, &params).await
    }

    async fn movie_details(&self, id: i32) -> Result<TitleDetail> {
        let detail = self.fetch_movie_appended(id, true).await?;
        let similar_rows = detail
            .similar
            .as_ref()
            .map(|s| s.results.clone())
            .unwrap_or_default();
        let similar = self.enrich_movies(&similar_rows).await?;
        Ok(TitleDetail {
            runtime_minutes: detail.runtime,
            item: movie_item(&detail),
            similar,
        })
    }

    async fn tv_details(&self, id: i32) -> Result<TitleDetail> {
        let detail = self.fetch_show_appended(id, true).await?;
        let similar_rows = detail
            .similar
            .as_ref()
            .map(|s| s.results.clone())
            .unwrap_or_default();
        let similar = self.enrich_shows(&similar_rows).await?;
        Ok(TitleDetail {
            runtime_minutes: detail
                .episode_run_time
                .as_ref()
                .and_then(|r| r.first().copied())
                .map(|r| r as f32),
            item: show_item(&detail),
            similar,
        })
    }

    async fn person_details(&self, id: i32) -> Result<PersonDetail> {
        let params = [("append_to_response", "combined_credits".to_string())];
        let person: PersonAppended = self
            .get_json(&self.url(&format!("/person/{id}"), &params))
            .await?;
        let credits = person
            .combined_credits
            .map(|c| c.cast)
            .unwrap_or_default();

        // Per-item policy here is partial: a failed credit fetch keeps the
        // bare summary instead of failing the whole filmography.
        let known_for = join_all(credits.iter().map(|credit| async move {
            match credit.media_type.as_deref() {
                Some("movie") => match self.fetch_movie_appended(credit.id, false).await {
                    Ok(detail) => movie_item(&detail),
                    Err(err) => {
                        debug!("movie credit {} enrichment failed: {err:#}", credit.id);
                        credit_item(credit)
                    }
                },
                Some("tv") => match self.fetch_show_appended(credit.id, false).await {
                    Ok(detail) => show_item(&detail),
                    Err(err) => {
                        debug!("tv credit {} enrichment failed: {err:#}", credit.id);
                        credit_item(credit)
                    }
                },
                _ => credit_item(credit),
            }
        }))
        .await;

        Ok(PersonDetail {
            id: person.id,
            name: person.name,
            profile_url: image_url(person.profile_path.as_deref(), ImageSize::W500),
            biography: person.biography,
            known_for,
        })
    }

    async fn search_multi(&self, query: &str) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let params = [("query", query.to_string())];
        let data: MultiEnvelope = self.get_json(&self.url("/search/multi", &params)).await?;
        Ok(data.results.into_iter().map(search_result).collect())
    }
}

fn detail_path(kind: MediaType, id: i32) -> String {
    format!("/{}/{id}", kind.as_str())
}

fn append_params(with_similar: bool) -> Vec<(&'static str, String)> {
    let appends = if with_similar {
        "credits,videos,similar"
    } else {
        "credits,videos"
    };
    vec![("append_to_response", appends.to_string())]
}

#[derive(Debug, Deserialize)]
struct GenreListResponse {
    genres: Vec<GenreEntry>,
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    page: u32,
    total_pages: u32,
    total_results: u32,
    results: Vec<SummaryRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct SummaryRow {
    id: i32,
}

#[derive(Debug, Deserialize)]
struct Genre {
    id: i32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Credits {
    cast: Vec<CastMember>,
}

#[derive(Debug, Deserialize)]
struct CastMember {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Videos {
    results: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    site: String,
    #[serde(rename = "type")]
    video_type: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct Related {
    results: Vec<SummaryRow>,
}

#[derive(Debug, Deserialize)]
struct MovieAppended {
    id: i32,
    title: String,
    #[serde(default)]
    overview: String,
    release_date: Option<String>,
    runtime: Option<f32>,
    #[serde(default)]
    vote_average: f32,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    genres: Option<Vec<Genre>>,
    credits: Option<Credits>,
    videos: Option<Videos>,
    similar: Option<Related>,
}

#[derive(Debug, Deserialize)]
struct ShowAppended {
    id: i32,
    name: String,
    #[serde(default)]
    overview: String,
    first_air_date: Option<String>,
    episode_run_time: Option<Vec<i32>>,
    #[serde(default)]
    vote_average: f32,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    genres: Option<Vec<Genre>>,
    credits: Option<Credits>,
    videos: Option<Videos>,
    similar: Option<Related>,
}

#[derive(Debug, Deserialize)]
struct PersonAppended {
    id: i32,
    name: String,
    profile_path: Option<String>,
    #[serde(default)]
    biography: String,
    combined_credits: Option<CombinedCredits>,
}

#[derive(Debug, Deserialize)]
struct CombinedCredits {
    cast: Vec<CreditRow>,
}

#[derive(Debug, Deserialize)]
struct CreditRow {
    id: i32,
    media_type: Option<String>,
    title: Option<String>,
    name: Option<String>,
    #[serde(default)]
    overview: String,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f32>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    genre_ids: Option<Vec<i32>>,
}

#[derive(Debug, Deserialize)]
struct MultiEnvelope {
    results: Vec<MultiRow>,
}

#[derive(Debug, Deserialize)]
struct MultiRow {
    id: i32,
    media_type: Option<String>,
    title: Option<String>,
    name: Option<String>,
    #[serde(default)]
    overview: String,
    poster_path: Option<String>,
    vote_average: Option<f32>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

fn movie_item(detail: &MovieAppended) -> ContentItem {
    ContentItem {
        id: detail.id,
        title: detail.title.clone(),
        poster_url: image_url(detail.poster_path.as_deref(), ImageSize::W500),
        backdrop_url: image_url(detail.backdrop_path.as_deref(), ImageSize::Original),
        release_date: detail.release_date.clone(),
        year: detail.release_date.as_deref().and_then(extract_year),
        rating: round1(detail.vote_average),
        quality: QUALITY_LABEL.to_string(),
        description: detail.overview.clone(),
        genres: genre_names(detail.genres.as_ref()),
        genre_ids: genre_ids(detail.genres.as_ref()),
        media_type: MediaType::Movie,
        cast: top_names(detail.credits.as_ref(), MAX_CAST),
        trailer_url: select_trailer(detail.videos.as_ref()),
    }
}

fn show_item(detail: &ShowAppended) -> ContentItem {
    ContentItem {
        id: detail.id,
        title: detail.name.clone(),
        poster_url: image_url(detail.poster_path.as_deref(), ImageSize::W500),
        backdrop_url: image_url(detail.backdrop_path.as_deref(), ImageSize::Original),
        release_date: detail.first_air_date.clone(),
        year: detail.first_air_date.as_deref().and_then(extract_year),
        rating: round1(detail.vote_average),
        quality: QUALITY_LABEL.to_string(),
        description: detail.overview.clone(),
        genres: genre_names(detail.genres.as_ref()),
        genre_ids: genre_ids(detail.genres.as_ref()),
        media_type: MediaType::Tv,
        cast: top_names(detail.credits.as_ref(), MAX_CAST),
        trailer_url: select_trailer(detail.videos.as_ref()),
    }
}

fn credit_item(credit: &CreditRow) -> ContentItem {
    let media_type = if credit.media_type.as_deref() == Some("tv") {
        MediaType::Tv
    } else {
        MediaType::Movie
    };
    let release_date = credit
        .release_date
        .clone()
        .or_else(|| credit.first_air_date.clone());
    ContentItem {
        id: credit.id,
        title: credit
            .title
            .clone()
            .or_else(|| credit.name.clone())
            .unwrap_or_default(),
        poster_url: image_url(credit.poster_path.as_deref(), ImageSize::W500),
        backdrop_url: image_url(credit.backdrop_path.as_deref(), ImageSize::Original),
        year: release_date.as_deref().and_then(extract_year),
        release_date,
        rating: round1(credit.vote_average.unwrap_or(0.0)),
        quality: QUALITY_LABEL.to_string(),
        description: credit.overview.clone(),
        genres: Vec::new(),
        genre_ids: credit.genre_ids.clone().unwrap_or_default(),
        media_type,
        cast: Vec::new(),
        trailer_url: None,
    }
}

fn search_result(row: MultiRow) -> SearchResult {
    let release_date = row.release_date.or(row.first_air_date);
    SearchResult {
        id: row.id,
        title: row.title.or(row.name).unwrap_or_default(),
        media_type: row.media_type.unwrap_or_default(),
        poster_url: image_url(row.poster_path.as_deref(), ImageSize::W500),
        rating: round1(row.vote_average.unwrap_or(0.0)),
        year: release_date.as_deref().and_then(extract_year),
        release_date,
        description: row.overview,
    }
}

fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

fn extract_year(date: &str) -> Option<i32> {
    date.split('-').next().and_then(|y| y.parse().ok())
}

fn genre_names(genres: Option<&Vec<Genre>>) -> Vec<String> {
    genres
        .map(|g| g.iter().map(|x| x.name.clone()).collect())
        .unwrap_or_default()
}

fn genre_ids(genres: Option<&Vec<Genre>>) -> Vec<i32> {
    genres
        .map(|g| g.iter().map(|x| x.id).collect())
        .unwrap_or_default()
}

fn top_names(credits: Option<&Credits>, max: usize) -> Vec<String> {
    credits
        .map(|c| c.cast.iter().take(max).map(|m| m.name.clone()).collect())
        .unwrap_or_default()
}

fn select_trailer(videos: Option<&Videos>) -> Option<String> {
    let videos = videos?;
    videos
        .results
        .iter()
        .find(|v| v.site.eq_ignore_ascii_case("YouTube") && v.video_type == "Trailer")
        .or_else(|| {
            videos
                .results
                .iter()
                .find(|v| v.site.eq_ignore_ascii_case("YouTube") && v.video_type == "Teaser")
        })
        .map(|v| format!("https://www.youtube.com/watch?v={}", v.key))
}
