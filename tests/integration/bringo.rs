use grocery_harvest::config::Config;
use grocery_harvest::crawler::ProxyRotator;
use grocery_harvest::sites::bringo::{BringoAdapter, Market, ProductLink};
use grocery_harvest::sites::SiteContext;
use grocery_harvest::SiteAdapter;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn adapter(server: &MockServer) -> BringoAdapter {
    let source = format!(
        r#"
[retry]
status-delay-ms = 10
error-delay-ms = 10
max-attempts = 3

[output]
results-dir = "results"

[bringo]
base-url = "{}"
address = "Boulevard Anfa, Casablanca"
street-number = "12"
"#,
        server.uri()
    );
    let config: Config = toml::from_str(&source).expect("Failed to parse test config");
    let context = SiteContext::from_config(&config, Arc::new(ProxyRotator::direct()));
    let settings = config.bringo.as_ref().expect("bringo section");
    BringoAdapter::new(settings, &context)
        .expect("Failed to build adapter")
        .with_session("s3ss10n")
}

fn market(server: &MockServer) -> Market {
    Market {
        url: format!("{}/fr/market/carrefour", server.uri()),
        title: "Carrefour".to_string(),
        image: "https://cdn/carrefour.png".to_string(),
        closing_note: String::new(),
        schedule: Vec::new(),
    }
}

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("cookie", "PHPSESSID=s3ss10n"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_stores_pages_and_links_carry_session() {
    let server = MockServer::start().await;
    let adapter = adapter(&server).await;

    mount_html(
        &server,
        "/fr/market/carrefour",
        r#"<a class="box-inner" href="/fr/stores/maarif"><img src="https://cdn/m.png"><h4>Maarif</h4></a>"#,
    )
    .await;
    mount_html(
        &server,
        "/fr/stores/maarif",
        r#"<ul class="pagination">
             <a class="page-link" href="?page=1">1</a>
             <a class="page-link" href="?page=2">2</a>
             <a class="page-link" href="?page=2">»</a>
           </ul>
           <div class="box-product"><a href="/fr/product/lait">Lait</a></div>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/fr/stores/maarif"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="box-product"><a href="/fr/product/pain">Pain</a></div>
               <div class="box-product"><a href="/fr/product/the">Thé</a></div>"#,
        ))
        .with_priority(1)
        .mount(&server)
        .await;

    let stores = adapter.discover_stores(&market(&server)).await.unwrap();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].name, "Maarif");
    assert_eq!(stores[0].market, "Carrefour");
    assert_eq!(adapter.destination(&market(&server), &stores[0]), "Maarif");

    let pages = adapter.discover_listings(&stores[0]).await.unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages[1].url.ends_with("/fr/stores/maarif?page=2"));

    let first = adapter.extract_listing(pages[0].clone()).await.unwrap();
    let second = adapter.extract_listing(pages[1].clone()).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
    assert!(second[0].url.ends_with("/fr/product/pain"));
    assert_eq!(second[1].store.name, "Maarif");
}

#[tokio::test]
async fn test_product_detail_builds_record() {
    let server = MockServer::start().await;
    let adapter = adapter(&server).await;

    mount_html(
        &server,
        "/fr/product/lait",
        r#"<h1 class="product-name"> Lait entier 1L </h1>
           <div class="product-price-calculator"><p>9.50 MAD</p><p>~ 9.50 / L</p></div>
           <div id="details">
             <p>Marque : Centrale</p>
             <p>Numéro du produit : 12345</p>
             <p>Lait frais pasteurisé</p>
           </div>
           <img id="main-image" src="https://cdn/lait.png">
           <div class="thumbnail-image"><img src="https://cdn/lait-1.png"></div>
           <div class="thumbnail-image"><img src="https://cdn/lait-2.png"></div>"#,
    )
    .await;

    let stores = vec![grocery_harvest::sites::bringo::Store {
        market: "Carrefour".to_string(),
        market_image: "https://cdn/carrefour.png".to_string(),
        market_schedule: "Lundi 08:00 - 22:00".to_string(),
        url: format!("{}/fr/stores/maarif", server.uri()),
        image: "https://cdn/m.png".to_string(),
        name: "Maarif".to_string(),
    }];
    let link = ProductLink {
        store: stores[0].clone(),
        url: format!("{}/fr/product/lait", server.uri()),
    };

    let record = adapter.extract_detail(link).await.unwrap().expect("record");
    assert_eq!(record.name, "Lait entier 1L");
    assert_eq!(record.price, "9.50");
    assert_eq!(record.currency, "MAD");
    assert_eq!(record.brand, "Centrale");
    assert_eq!(record.number, "12345");
    assert_eq!(record.description, "Lait frais pasteurisé");
    assert_eq!(record.images, "https://cdn/lait-1.png,https://cdn/lait-2.png");
    assert_eq!(record.market_schedule, "Lundi 08:00 - 22:00");
    assert_eq!(
        record.product_id,
        grocery_harvest::product_id("Lait entier 1L", "https://cdn/lait.png")
    );
}

#[tokio::test]
async fn test_missing_product_yields_no_record() {
    let server = MockServer::start().await;
    let adapter = adapter(&server).await;

    Mock::given(method("GET"))
        .and(path("/fr/product/retired"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let link = ProductLink {
        store: grocery_harvest::sites::bringo::Store {
            market: String::new(),
            market_image: String::new(),
            market_schedule: String::new(),
            url: String::new(),
            image: String::new(),
            name: "Maarif".to_string(),
        },
        url: format!("{}/fr/product/retired", server.uri()),
    };

    assert!(adapter.extract_detail(link).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unavailable_site_has_no_markets() {
    let server = MockServer::start().await;
    let adapter = adapter(&server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(adapter.discover_roots().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_handshake_yields_no_markets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Bringo</body></html>"))
        .mount(&server)
        .await;

    let source = format!(
        r#"
[retry]
status-delay-ms = 10
error-delay-ms = 10
max-attempts = 1

[browser]
executable = "/nonexistent/chrome"

[output]
results-dir = "results"

[bringo]
base-url = "{}"
address = "Boulevard Anfa, Casablanca"
street-number = "12"
"#,
        server.uri()
    );
    let config: Config = toml::from_str(&source).expect("Failed to parse test config");
    let context = SiteContext::from_config(&config, Arc::new(ProxyRotator::direct()));
    let settings = config.bringo.as_ref().expect("bringo section");
    let adapter = BringoAdapter::new(settings, &context).expect("Failed to build adapter");

    let markets = adapter.discover_roots().await.expect("discovery should not fail");
    assert!(markets.is_empty());
}
