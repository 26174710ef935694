use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use cinefeed::models::{ContentItem, GenreEntry, Page, PersonDetail, SearchResult, TitleDetail};
use cinefeed::search::{SearchAggregator, SearchPhase};
use cinefeed::tmdb::{MovieFilter, TmdbApi, TvFilter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{advance, Duration};

type SearchReply = oneshot::Sender<Result<Vec<SearchResult>>>;

/// Fake metadata API: every `search_multi` call parks on a gate the test
/// releases, so response ordering is fully controlled.
struct GatedSearch {
    calls: AtomicUsize,
    requests: mpsc::UnboundedSender<(String, SearchReply)>,
}

#[async_trait]
impl TmdbApi for GatedSearch {
    async fn movie_genres(&self) -> Result<Vec<GenreEntry>> {
        bail!("not exercised")
    }
    async fn tv_genres(&self) -> Result<Vec<GenreEntry>> {
        bail!("not exercised")
    }
    async fn movies_by_filter(
        &self,
        _filter: MovieFilter,
        _genre_id: Option<i32>,
        _page: u32,
    ) -> Result<Page<ContentItem>> {
        bail!("not exercised")
    }
    async fn tv_by_filter(
        &self,
        _filter: TvFilter,
        _genre_id: Option<i32>,
        _page: u32,
    ) -> Result<Page<ContentItem>> {
        bail!("not exercised")
    }
    async fn latest_movies(&self, _genre_id: Option<i32>, _page: u32) -> Result<Page<ContentItem>> {
        bail!("not exercised")
    }
    async fn latest_tv(&self, _genre_id: Option<i32>, _page: u32) -> Result<Page<ContentItem>> {
        bail!("not exercised")
    }
    async fn movie_details(&self, _id: i32) -> Result<TitleDetail> {
        bail!("not exercised")
    }
    async fn tv_details(&self, _id: i32) -> Result<TitleDetail> {
        bail!("not exercised")
    }
    async fn person_details(&self, _id: i32) -> Result<PersonDetail> {
        bail!("not exercised")
    }
    async fn search_multi(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.requests
            .send((query.to_string(), tx))
            .expect("test dropped request receiver");
        rx.await.expect("test dropped reply sender")
    }
}

struct Harness {
    api: Arc<GatedSearch>,
    aggregator: SearchAggregator,
    requests: mpsc::UnboundedReceiver<(String, SearchReply)>,
}

fn harness() -> Harness {
    let (request_tx, requests) = mpsc::unbounded_channel();
    let api = Arc::new(GatedSearch {
        calls: AtomicUsize::new(0),
        requests: request_tx,
    });
    let aggregator = SearchAggregator::with_debounce(api.clone(), Duration::from_millis(300));
    Harness {
        api,
        aggregator,
        requests,
    }
}

fn hit(id: i32, media_type: &str, poster: bool) -> SearchResult {
    SearchResult {
        id,
        title: format!("title-{id}"),
        media_type: media_type.to_string(),
        poster_url: poster.then(|| format!("https://image.tmdb.org/t/p/w500/{id}.jpg")),
        rating: 6.5,
        release_date: Some("2020-01-01".to_string()),
        year: Some(2020),
        description: String::new(),
    }
}

async fn settled(h: &Harness) {
    let mut state = h.aggregator.subscribe();
    loop {
        if h.aggregator.state().phase == SearchPhase::Settled {
            return;
        }
        state.changed().await.expect("aggregator gone");
    }
}

async fn drain() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn rapid_keystrokes_coalesce_into_one_request() {
    let mut h = harness();
    let mut state = h.aggregator.subscribe();

    for query in ["m", "ma", "mat"] {
        h.aggregator.set_query(query);
        state.changed().await.unwrap();
        assert_eq!(h.aggregator.state().phase, SearchPhase::Pending);
        advance(Duration::from_millis(100)).await;
    }
    advance(Duration::from_millis(300)).await;

    let (query, reply) = h.requests.recv().await.unwrap();
    assert_eq!(query, "mat");
    reply.send(Ok(vec![hit(1, "movie", true)])).unwrap();

    settled(&h).await;
    let final_state = h.aggregator.state();
    assert_eq!(final_state.query, "mat");
    assert_eq!(final_state.results.len(), 1);
    assert_eq!(h.api.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn superseded_response_is_discarded() {
    let mut h = harness();
    let mut state = h.aggregator.subscribe();

    h.aggregator.set_query("first");
    state.changed().await.unwrap();
    advance(Duration::from_millis(300)).await;
    let (query, first_reply) = h.requests.recv().await.unwrap();
    assert_eq!(query, "first");

    // Supersede while the first request is still in flight.
    h.aggregator.set_query("second");
    state.changed().await.unwrap();
    advance(Duration::from_millis(300)).await;
    let (query, second_reply) = h.requests.recv().await.unwrap();
    assert_eq!(query, "second");

    second_reply.send(Ok(vec![hit(2, "tv", true)])).unwrap();
    settled(&h).await;

    // The stale result lands afterwards and must change nothing.
    first_reply.send(Ok(vec![hit(1, "movie", true)])).unwrap();
    drain().await;

    let final_state = h.aggregator.state();
    assert_eq!(final_state.query, "second");
    assert_eq!(final_state.results.len(), 1);
    assert_eq!(final_state.results[0].id, 2);
}

#[tokio::test(start_paused = true)]
async fn clearing_query_resets_immediately() {
    let mut h = harness();
    let mut state = h.aggregator.subscribe();

    h.aggregator.set_query("abc");
    state.changed().await.unwrap();
    advance(Duration::from_millis(300)).await;
    let (_, reply) = h.requests.recv().await.unwrap();

    // Blank query: no debounce wait, straight to Idle.
    h.aggregator.set_query("   ");
    state.changed().await.unwrap();
    let cleared = h.aggregator.state();
    assert_eq!(cleared.phase, SearchPhase::Idle);
    assert!(cleared.results.is_empty());

    // The in-flight response for the old query is void.
    reply.send(Ok(vec![hit(1, "movie", true)])).unwrap();
    drain().await;
    assert_eq!(h.aggregator.state().phase, SearchPhase::Idle);
    assert!(h.aggregator.state().results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failure_settles_empty_with_flag() {
    let mut h = harness();
    let mut state = h.aggregator.subscribe();

    h.aggregator.set_query("broken");
    state.changed().await.unwrap();
    advance(Duration::from_millis(300)).await;
    let (_, reply) = h.requests.recv().await.unwrap();
    reply.send(Err(anyhow!("upstream 500"))).unwrap();

    settled(&h).await;
    let final_state = h.aggregator.state();
    assert!(final_state.failed);
    assert!(final_state.results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unsupported_results_are_filtered_out() {
    let mut h = harness();
    let mut state = h.aggregator.subscribe();

    h.aggregator.set_query("query");
    state.changed().await.unwrap();
    advance(Duration::from_millis(300)).await;
    let (_, reply) = h.requests.recv().await.unwrap();
    reply
        .send(Ok(vec![
            hit(1, "movie", true),
            hit(2, "person", true),
            hit(3, "tv", false),
            hit(4, "tv", true),
        ]))
        .unwrap();

    settled(&h).await;
    let ids: Vec<i32> = h.aggregator.state().results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 4]);
}
