//! Integration tests for multi-provider resolution.
//!
//! Both adapters talk to wiremock servers; the engine is built from a
//! [`Config`] exactly as the CLI builds it.

use assert_matches::assert_matches;
use crossid::config::{Config, ProviderConfig, ProviderKind};
use crossid::engine::Engine;
use crossid::resolver::{ResolveError, Strategy};
use crossid_common::{KnownIds, LookupRequest, MediaKind};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(kind: ProviderKind, server: &MockServer) -> ProviderConfig {
    let mut provider = ProviderConfig::new(kind, "test-key");
    provider.base_url = Some(server.uri());
    provider
}

fn engine(providers: Vec<ProviderConfig>, strict: bool) -> Engine {
    let mut config = Config {
        providers,
        ..Config::default()
    };
    config.web_search.enabled = false;
    config.resolver.strict = strict;
    Engine::from_config(&config).unwrap()
}

fn avatar() -> LookupRequest {
    LookupRequest::new("Avatar", MediaKind::Movie).with_year(2009)
}

async fn mount_omdb_avatar(server: &MockServer) {
    Mock::given(method("GET"))
        .and(query_param("s", "Avatar"))
        .and(query_param("type", "movie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Search": [
                {"Title": "Avatar", "Year": "2009", "imdbID": "tt0499549", "Type": "movie"}
            ],
            "totalResults": "1",
            "Response": "True"
        })))
        .mount(server)
        .await;
}

async fn mount_tmdb_find(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/find/tt0499549"))
        .and(query_param("external_source", "imdb_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "movie_results": [{"id": 19995}],
            "tv_results": []
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn imdb_result_lets_tmdb_cross_reference() {
    let omdb = MockServer::start().await;
    let tmdb = MockServer::start().await;
    mount_omdb_avatar(&omdb).await;
    mount_tmdb_find(&tmdb, 1).await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&tmdb)
        .await;

    let engine = engine(
        vec![
            provider(ProviderKind::Omdb, &omdb),
            provider(ProviderKind::Tmdb, &tmdb),
        ],
        false,
    );

    let mut known = KnownIds::new();
    let resolutions = engine
        .registry
        .resolve_all(&engine.gateway, &avatar(), &mut known)
        .await
        .unwrap();

    assert_eq!(resolutions.len(), 2);
    assert_eq!(resolutions[0].provider, "imdb");
    assert_eq!(resolutions[0].result.id.as_deref(), Some("tt0499549"));
    assert_eq!(resolutions[0].result.strategy, Some(Strategy::Title));
    assert!(resolutions[0].result.matched_exactly);

    assert_eq!(resolutions[1].provider, "tmdb");
    assert_eq!(resolutions[1].result.id.as_deref(), Some("19995"));
    assert_eq!(resolutions[1].result.strategy, Some(Strategy::CrossReference));

    assert_eq!(known.get("imdb"), Some("tt0499549"));
    assert_eq!(known.get("tmdb"), Some("19995"));
}

#[tokio::test]
async fn cross_reference_answers_are_cached() {
    let tmdb = MockServer::start().await;
    mount_tmdb_find(&tmdb, 1).await;

    let engine = engine(vec![provider(ProviderKind::Tmdb, &tmdb)], false);

    for _ in 0..3 {
        let mut known: KnownIds = [("imdb", "tt0499549")].into_iter().collect();
        let resolutions = engine
            .registry
            .resolve_all(&engine.gateway, &avatar(), &mut known)
            .await
            .unwrap();
        assert_eq!(resolutions[0].result.id.as_deref(), Some("19995"));
    }
}

#[tokio::test]
async fn known_id_short_circuits_every_lookup() {
    let tmdb = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&tmdb)
        .await;

    let engine = engine(vec![provider(ProviderKind::Tmdb, &tmdb)], false);
    let mut known: KnownIds = [("tmdb", "19995")].into_iter().collect();
    let resolutions = engine
        .registry
        .resolve_all(&engine.gateway, &avatar(), &mut known)
        .await
        .unwrap();

    assert_eq!(resolutions[0].result.strategy, Some(Strategy::KnownId));
    assert_eq!(resolutions[0].result.id.as_deref(), Some("19995"));
}

#[tokio::test]
async fn outage_is_a_miss_when_lenient() {
    let tmdb = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&tmdb)
        .await;

    let engine = engine(vec![provider(ProviderKind::Tmdb, &tmdb)], false);
    let mut known = KnownIds::new();
    let resolutions = engine
        .registry
        .resolve_all(&engine.gateway, &avatar(), &mut known)
        .await
        .unwrap();

    assert!(!resolutions[0].result.is_found());
    assert!(known.is_empty());
}

#[tokio::test]
async fn outage_is_an_error_when_strict() {
    let tmdb = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&tmdb)
        .await;

    let engine = engine(vec![provider(ProviderKind::Tmdb, &tmdb)], true);
    let mut known = KnownIds::new();
    let err = engine
        .registry
        .resolve_all(&engine.gateway, &avatar(), &mut known)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_matches!(err, ResolveError::Unavailable { provider, .. } if provider == "tmdb");
}

#[tokio::test]
async fn original_title_is_tried_after_title_misses() {
    let tmdb = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .and(query_param("query", "Le Fabuleux Destin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1, "total_pages": 1, "total_results": 0, "results": []
        })))
        .mount(&tmdb)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .and(query_param("query", "Amélie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1,
            "total_pages": 1,
            "total_results": 1,
            "results": [
                {"id": 194, "title": "Amélie", "original_title": "Le Fabuleux Destin d'Amélie Poulain", "release_date": "2001-04-25"}
            ]
        })))
        .mount(&tmdb)
        .await;

    let engine = engine(vec![provider(ProviderKind::Tmdb, &tmdb)], false);
    let request = LookupRequest::new("Le Fabuleux Destin", MediaKind::Movie)
        .with_original_title("Amélie")
        .with_year(2001);
    let mut known = KnownIds::new();
    let resolutions = engine
        .registry
        .resolve_all(&engine.gateway, &request, &mut known)
        .await
        .unwrap();

    assert_eq!(resolutions[0].result.id.as_deref(), Some("194"));
    assert_eq!(resolutions[0].result.strategy, Some(Strategy::OriginalTitle));
}

#[tokio::test]
async fn details_merge_reported_ids() {
    let tmdb = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/19995"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 19995,
            "title": "Avatar",
            "release_date": "2009-12-15",
            "genres": [],
            "imdb_id": "tt0499549"
        })))
        .expect(1)
        .mount(&tmdb)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie/19995/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posters": [], "backdrops": [], "logos": []
        })))
        .mount(&tmdb)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie/19995/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&tmdb)
        .await;

    let engine = engine(vec![provider(ProviderKind::Tmdb, &tmdb)], false);
    let tmdb_provider = engine.registry.get("tmdb").unwrap();

    let mut known = KnownIds::new();
    let details = engine
        .details
        .fetch_all(tmdb_provider, "19995", MediaKind::Movie, &mut known)
        .await
        .unwrap();
    assert_eq!(details.metadata.as_ref().map(|m| m.title.as_str()), Some("Avatar"));
    assert_eq!(known.get("imdb"), Some("tt0499549"));

    // Served from the cache the second time.
    let again = engine
        .details
        .metadata(tmdb_provider, "19995", MediaKind::Movie, &mut known)
        .await
        .unwrap();
    assert_eq!(again, details.metadata);
}
