//! Integration tests for library scraping and catalog persistence.

use packt_sync::{SessionClient, SiteConfig, catalog, fetch_library};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCOUNT_PAGE: &str = r#"
    <html><body>
    <div id="product-account-list">
        <div class="product-line" nid="1001" title="Rust Essentials">
            <div class="product-thumbnail">
                <a href="/application-development/rust-essentials">
                    <img class="imagecache-thumbview"
                         title="Rust Essentials"
                         src="https://images.example.com/1001.png">
                </a>
            </div>
            <a href="/ebook_download/1001/pdf"><div class="fake-button" format="pdf"></div></a>
            <a href="/ebook_download/1001/epub"><div class="fake-button" format="epub"></div></a>
        </div>
        <div class="product-line" nid="">
            <div class="product-thumbnail"><a href="/promo"><img class="imagecache-thumbview"></a></div>
        </div>
        <div class="product-line" nid="1002" title="Async in Depth">
            <div class="product-thumbnail">
                <a href="/web-development/async-in-depth">
                    <img class="imagecache-thumbview"
                         title="Async in Depth"
                         src="https://images.example.com/1002.png">
                </a>
            </div>
            <a href="/ebook_download/1002/pdf"><div class="fake-button" format="pdf"></div></a>
        </div>
    </div>
    </body></html>
"#;

fn config_for(server: &MockServer) -> SiteConfig {
    SiteConfig::with_base_url(Url::parse(&server.uri()).expect("mock server URI must parse"))
}

#[tokio::test]
async fn test_fetch_library_builds_catalog_from_account_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/account/my-ebooks"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ACCOUNT_PAGE))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let session = SessionClient::new(&config);
    let catalog = fetch_library(&session, &config).await.expect("fetch");

    assert_eq!(catalog.len(), 2, "entry without id must be skipped");
    assert_eq!(catalog[0].id, "1001");
    assert_eq!(catalog[0].title, "Rust Essentials");
    assert_eq!(
        catalog[0].pdf_url,
        format!("{}/ebook_download/1001/pdf", server.uri())
    );
    assert_eq!(
        catalog[0].code_url,
        format!("{}/code_download/1001", server.uri())
    );
    assert_eq!(catalog[1].id, "1002");
    assert!(catalog[1].epub_url.is_empty());
}

#[tokio::test]
async fn test_fetch_library_then_save_and_load_round_trips() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/account/my-ebooks"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ACCOUNT_PAGE))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let session = SessionClient::new(&config);
    let fetched = fetch_library(&session, &config).await.expect("fetch");

    let dir = TempDir::new().expect("temp dir");
    catalog::save(&fetched, dir.path()).await.expect("save");
    let loaded = catalog::load(dir.path()).await.expect("load");

    assert_eq!(loaded, fetched);
}

#[tokio::test]
async fn test_fetch_library_replaces_not_merges() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("temp dir");

    Mock::given(method("GET"))
        .and(path("/account/my-ebooks"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ACCOUNT_PAGE))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let session = SessionClient::new(&config);
    let first = fetch_library(&session, &config).await.expect("fetch");
    catalog::save(&first, dir.path()).await.expect("save");

    // Second sync sees an emptied library; the stored catalog must shrink.
    Mock::given(method("GET"))
        .and(path("/account/my-ebooks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<div id="product-account-list"></div>"#),
        )
        .mount(&server)
        .await;

    let second = fetch_library(&session, &config).await.expect("fetch");
    catalog::save(&second, dir.path()).await.expect("save");

    let loaded = catalog::load(dir.path()).await.expect("load");
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn test_fetch_library_propagates_http_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/account/my-ebooks"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let session = SessionClient::new(&config);
    let result = fetch_library(&session, &config).await;

    assert!(result.is_err());
}
