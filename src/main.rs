use anyhow::Result;
use cinefeed::genres::merge_genres;
use cinefeed::tmdb::{MovieFilter, TmdbApi, TmdbClient};
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    match dotenv() {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }

    let client = TmdbClient::from_env()?;

    let (movie_genres, tv_genres) = tokio::try_join!(client.movie_genres(), client.tv_genres())?;
    let genres = merge_genres(movie_genres, tv_genres);
    info!("Merged taxonomy has {} genres", genres.len());

    let page = client
        .movies_by_filter(MovieFilter::Popular, None, 1)
        .await?;
    info!(
        "Popular movies: page 1 of {} ({} titles total)",
        page.total_pages, page.total_results
    );
    for item in &page.results {
        let year = item
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "????".to_string());
        info!("  {} ({}) - {}/10", item.title, year, item.rating);
    }
    Ok(())
}
