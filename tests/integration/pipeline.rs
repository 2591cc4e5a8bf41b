use async_trait::async_trait;
use grocery_harvest::crawler::{ScrapeOrchestrator, WorkerPool};
use grocery_harvest::storage::{existing_entities, CsvSink, SqliteSink};
use grocery_harvest::{product_id, ExtractResult, Record, SiteAdapter};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Market {
    name: String,
}

#[derive(Debug, Clone)]
struct Store {
    market: String,
    name: String,
    pages: usize,
}

#[derive(Debug, Clone)]
struct Page {
    store: Store,
    number: usize,
}

#[derive(Debug, Clone)]
struct Link {
    store: Store,
    name: String,
}

#[derive(Debug, Clone)]
struct Product {
    id: String,
    market: String,
    store: String,
    name: String,
}

impl Record for Product {
    const COLUMNS: &'static [&'static str] = &["product_id", "market", "store", "name"];

    fn id(&self) -> &str {
        &self.id
    }

    fn values(&self) -> Vec<&str> {
        vec![&self.id, &self.market, &self.store, &self.name]
    }
}

/// One market with two stores: "Maarif" (3 pages, 5 products) and
/// "Anfa" (1 page, 2 products)
struct Catalog {
    products_per_page: HashMap<(String, usize), usize>,
}

impl Catalog {
    fn new() -> Self {
        let mut products_per_page = HashMap::new();
        products_per_page.insert(("Maarif".to_string(), 1), 2);
        products_per_page.insert(("Maarif".to_string(), 2), 2);
        products_per_page.insert(("Maarif".to_string(), 3), 1);
        products_per_page.insert(("Anfa".to_string(), 1), 2);
        Self { products_per_page }
    }
}

#[async_trait]
impl SiteAdapter for Catalog {
    type Root = Market;
    type Store = Store;
    type Listing = Page;
    type Item = Link;
    type Record = Product;

    fn name(&self) -> &str {
        "catalog"
    }

    async fn discover_roots(&self) -> grocery_harvest::Result<Vec<Market>> {
        Ok(vec![Market {
            name: "Carrefour".to_string(),
        }])
    }

    fn destination(&self, _market: &Market, store: &Store) -> String {
        store.name.clone()
    }

    async fn discover_stores(&self, market: &Market) -> grocery_harvest::Result<Vec<Store>> {
        Ok(vec![
            Store {
                market: market.name.clone(),
                name: "Maarif".to_string(),
                pages: 3,
            },
            Store {
                market: market.name.clone(),
                name: "Anfa".to_string(),
                pages: 1,
            },
        ])
    }

    async fn discover_listings(&self, store: &Store) -> grocery_harvest::Result<Vec<Page>> {
        Ok((1..=store.pages)
            .map(|number| Page {
                store: store.clone(),
                number,
            })
            .collect())
    }

    async fn extract_listing(&self, page: Page) -> ExtractResult<Vec<Link>> {
        let count = self
            .products_per_page
            .get(&(page.store.name.clone(), page.number))
            .copied()
            .unwrap_or(0);
        Ok((0..count)
            .map(|i| Link {
                store: page.store.clone(),
                name: format!("{} p{} #{}", page.store.name, page.number, i),
            })
            .collect())
    }

    async fn extract_detail(&self, link: Link) -> ExtractResult<Option<Product>> {
        Ok(Some(Product {
            id: product_id(&link.name, "img.png"),
            market: link.store.market,
            store: link.store.name,
            name: link.name,
        }))
    }
}

fn read_rows(path: &std::path::Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(path).expect("Failed to open CSV");
    reader.records().map(|r| r.expect("Bad CSV row")).collect()
}

#[tokio::test]
async fn test_full_pipeline_writes_one_file_per_store() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("catalog");
    let db = dir.path().join("harvest.db");
    let table = Arc::new(SqliteSink::open(&db, "products").unwrap());

    let summary = ScrapeOrchestrator::new(Catalog::new(), WorkerPool::new(3))
        .with_sink(Arc::new(CsvSink::new(&results)))
        .with_sink(table.clone())
        .with_stamp("2024_05_01_10_30")
        .run()
        .await
        .unwrap();

    assert_eq!(summary.stores, 2);
    assert_eq!(summary.listings, 4);
    assert_eq!(summary.items, 7);
    assert_eq!(summary.records_written, 7);
    assert_eq!(summary.failed_items, 0);

    let maarif = read_rows(&results.join("Maarif_2024_05_01_10_30.csv"));
    let anfa = read_rows(&results.join("Anfa_2024_05_01_10_30.csv"));
    assert_eq!(maarif.len(), 5);
    assert_eq!(anfa.len(), 2);

    // Records inherit their ancestors' fields
    assert!(maarif.iter().all(|row| &row[1] == "Carrefour" && &row[2] == "Maarif"));
    assert!(anfa.iter().all(|row| &row[2] == "Anfa"));

    let headers = csv::Reader::from_path(results.join("Anfa_2024_05_01_10_30.csv"))
        .unwrap()
        .headers()
        .unwrap()
        .clone();
    assert_eq!(headers, csv::StringRecord::from(Product::COLUMNS.to_vec()));

    assert_eq!(table.count().unwrap(), 7);
}

fn run(results: &std::path::Path, stamp: &str) -> ScrapeOrchestrator<Catalog> {
    let exclusions = existing_entities(results).unwrap();
    ScrapeOrchestrator::new(Catalog::new(), WorkerPool::new(3))
        .with_sink(Arc::new(CsvSink::new(results)))
        .with_exclusions(exclusions)
        .with_stamp(stamp)
}

#[tokio::test]
async fn test_restart_resumes_with_the_same_stamp() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("catalog");

    run(&results, "2024_05_01_10_30").run().await.unwrap();

    // Simulate a crash before "Anfa" was written
    std::fs::remove_file(results.join("Anfa_2024_05_01_10_30.csv")).unwrap();

    let summary = run(&results, "2024_05_01_10_30").run().await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.records_written, 2);
    assert!(results.join("Anfa_2024_05_01_10_30.csv").exists());
    assert_eq!(read_rows(&results.join("Maarif_2024_05_01_10_30.csv")).len(), 5);
}

#[tokio::test]
async fn test_next_day_scrapes_every_store_again() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("catalog");

    run(&results, "2024_05_01_10_30").run().await.unwrap();
    let summary = run(&results, "2024_05_02_10_30").run().await.unwrap();

    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.records_written, 7);
    assert_eq!(read_rows(&results.join("Maarif_2024_05_02_10_30.csv")).len(), 5);
    assert_eq!(read_rows(&results.join("Anfa_2024_05_02_10_30.csv")).len(), 2);
    assert!(results.join("Maarif_2024_05_01_10_30.csv").exists());
}
