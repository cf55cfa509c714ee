//! Search client and image transport against a local HTTP responder

use pretty_assertions::assert_eq;
use snapgrid_core::{DownloadError, ImageFetcher};
use snapgrid_search::{FlickrClient, HttpImageFetcher, PhotoSize, SearchClient, SearchConfig, SearchError};
use snapgrid_test_utils::{descriptors, png_bytes, serve_once, MockSearchClient};

const PAGE: &str = r#"{"photos":{"page":2,"pages":9,"perpage":2,"total":"18","photo":[
    {"id":"11","owner":"o","secret":"aa","server":"5","farm":1,"title":"first"},
    {"id":"12","owner":"o","secret":"bb","server":"5","farm":1,"title":"second"}
]},"stat":"ok"}"#;

fn client(endpoint: String) -> FlickrClient {
    FlickrClient::new(
        SearchConfig::new()
            .with_api_key("test-key")
            .with_endpoint(endpoint)
            .with_per_page(2)
            .with_photo_size(PhotoSize::Small320),
    )
    .unwrap()
}

#[tokio::test]
async fn flickr_search_maps_photos_to_descriptors() {
    let (base, request) = serve_once(200, "application/json", PAGE.as_bytes().to_vec()).await;

    let results = client(format!("{base}/services/rest/")).search("cats", 2).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "first");
    assert_eq!(results[0].url, "https://farm1.staticflickr.com/5/11_aa_n.jpg");
    assert_eq!(results[1].name, "second");

    let head = request.await.unwrap();
    assert!(head.starts_with("GET /services/rest/?"));
    for param in ["method=flickr.photos.search", "api_key=test-key", "tags=cats", "page=2", "per_page=2", "nojsoncallback=1"] {
        assert!(head.contains(param), "missing {param} in {head}");
    }
}

#[tokio::test]
async fn flickr_failure_envelope_is_api_error() {
    let body = br#"{"stat":"fail","code":100,"message":"Invalid API Key"}"#.to_vec();
    let (base, _request) = serve_once(200, "application/json", body).await;

    let err = client(base).search("cats", 1).await.unwrap_err();
    assert_eq!(
        err,
        SearchError::Api {
            code: 100,
            message: "Invalid API Key".into()
        }
    );
}

#[tokio::test]
async fn flickr_http_error_is_status() {
    let (base, _request) = serve_once(503, "text/plain", b"busy".to_vec()).await;
    let err = client(base).search("cats", 1).await.unwrap_err();
    assert_eq!(err, SearchError::Status { status: 503 });
}

#[tokio::test]
async fn flickr_unreachable_is_network_error() {
    let err = client("http://127.0.0.1:1/".into()).search("cats", 1).await.unwrap_err();
    assert!(matches!(err, SearchError::Network(_)));
}

#[tokio::test]
async fn http_fetcher_returns_body() {
    let png = png_bytes(2, 2);
    let (base, _request) = serve_once(200, "image/png", png.clone()).await;

    let bytes = HttpImageFetcher::new().fetch(&format!("{base}/a.png")).await.unwrap();
    assert_eq!(bytes, png);
}

#[tokio::test]
async fn http_fetcher_rejects_error_status() {
    let (base, _request) = serve_once(404, "text/plain", b"gone".to_vec()).await;

    let err = HttpImageFetcher::new().fetch(&format!("{base}/a.png")).await.unwrap_err();
    assert!(matches!(err, DownloadError::Fetch(msg) if msg.contains("404")));
}

#[tokio::test]
async fn mock_client_serves_pages_by_tag() {
    let client = MockSearchClient::new().with_page("cats", 1, descriptors(3));
    let search: &dyn SearchClient = &client;

    assert_eq!(search.search("cats", 1).await.unwrap().len(), 3);
    assert!(search.search("cats", 2).await.unwrap().is_empty());
    assert_eq!(client.requests(), vec![("cats".to_string(), 1), ("cats".to_string(), 2)]);
}
