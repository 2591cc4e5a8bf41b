//! Glovo: city → category → store → collection → product
//!
//! Categories are only reachable through the bubble bar on a city page,
//! which needs a real browser. Everything below the category level is
//! plain HTML. Products are complete on the collection page, so the detail
//! step passes items through unchanged.

use crate::config::GlovoConfig;
use crate::crawler::browser::{requires_clickable, BrowserLauncher, BrowserSession};
use crate::crawler::retry::FailureKind;
use crate::crawler::{ResilientFetcher, RetryPolicy};
use crate::sites::markup::{
    absolutize, all, clean_text, first, paginate, select_attr, select_text, split_price,
    trailing_count,
};
use crate::sites::{product_id, utc_timestamp, SiteAdapter, SiteContext};
use crate::state::{dismiss_offset, BubbleExpansion, ExpansionPolicy, ExpansionState};
use crate::storage::{dedupe_by, Record};
use crate::{BrowserError, BrowserResult, ExtractResult};
use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;
use url::Url;

const BUBBLE_LINKS: &str = "section.desktop-bubbles a.category-bubble__link";
const BUBBLES: &str = "section.desktop-bubbles div.category-bubble__link";
const MODAL_LINKS: &str = "div.modal-wrapper.bubble-modal a.category-bubble__link";
const ERROR_PAGE: &str = "div.error-page";

/// Center of the modal overlay, or an empty array once it is gone or hidden
const OVERLAY_CENTER_JS: &str = r#"(() => {
    const overlay = document.querySelector('.modal-overlay');
    if (!overlay || getComputedStyle(overlay).display === 'none') return [];
    const r = overlay.getBoundingClientRect();
    return [r.x + r.width / 2, r.y + r.height / 2];
})()"#;

const OVERLAY_HIDDEN_JS: &str = r#"(() => {
    const overlay = document.querySelector('.modal-overlay');
    return !overlay || getComputedStyle(overlay).display === 'none';
})()"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct City {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub url: String,
}

impl Category {
    /// Whether the URL or the lower-cased name contains one of `keywords`
    pub fn matches(&self, keywords: &[String]) -> bool {
        let name = self.name.to_lowercase();
        keywords
            .iter()
            .any(|keyword| self.url.contains(keyword.as_str()) || name.contains(keyword.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    pub city: String,
    pub category: String,
    pub name: String,
    pub tag: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub store: Store,
    pub section: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlovoProduct {
    pub product_id: String,
    pub city: String,
    pub category: String,
    pub store: String,
    pub section: String,
    pub collection: String,
    pub group: String,
    pub name: String,
    pub image: String,
    pub price: String,
    pub currency: String,
    pub original_price: String,
    pub url: String,
    pub date: String,
}

impl Record for GlovoProduct {
    const COLUMNS: &'static [&'static str] = &[
        "product_id",
        "city",
        "category",
        "store",
        "section",
        "collection",
        "group",
        "name",
        "image",
        "price",
        "currency",
        "original_price",
        "url",
        "date",
    ];

    fn id(&self) -> &str {
        &self.product_id
    }

    fn values(&self) -> Vec<&str> {
        vec![
            &self.product_id,
            &self.city,
            &self.category,
            &self.store,
            &self.section,
            &self.collection,
            &self.group,
            &self.name,
            &self.image,
            &self.price,
            &self.currency,
            &self.original_price,
            &self.url,
            &self.date,
        ]
    }
}

pub struct GlovoAdapter {
    fetcher: ResilientFetcher,
    launcher: BrowserLauncher,
    provision: RetryPolicy,
    /// Whole-page retries of category discovery
    page_retry: RetryPolicy,
    expansion: ExpansionPolicy,
    cities_url: String,
    keywords: Vec<String>,
    excluded_bubbles: Vec<String>,
}

impl GlovoAdapter {
    pub fn new(settings: &GlovoConfig, context: &SiteContext) -> crate::Result<Self> {
        let fetcher = context.fetcher(
            &settings.base_url,
            Duration::from_secs(settings.request_timeout_secs),
        )?;
        let expansion = ExpansionPolicy::default();
        let page_retry = RetryPolicy {
            max_attempts: context.retry.max_attempts,
            max_elapsed: context.retry.max_elapsed,
            ..RetryPolicy::fixed(expansion.escalation_delay)
        };
        Ok(Self {
            fetcher,
            launcher: context.launcher(),
            provision: context.provision.clone(),
            page_retry,
            expansion,
            cities_url: settings.cities_url.clone(),
            keywords: settings.category_keywords.clone(),
            excluded_bubbles: settings.excluded_bubbles.clone(),
        })
    }

    pub fn with_expansion_policy(mut self, expansion: ExpansionPolicy) -> Self {
        self.page_retry.status_delay = expansion.escalation_delay;
        self.page_retry.error_delay = expansion.escalation_delay;
        self.expansion = expansion;
        self
    }

    async fn fetch_page(&self, url: &str) -> Option<String> {
        let result = self.fetcher.get(url).await;
        if result.is_empty() {
            tracing::debug!(url, status = ?result.status_code(), "No content");
        }
        result.into_content()
    }

    /// Categories of a city, after keyword filtering
    async fn discover_categories(&self, city: &City) -> crate::Result<Vec<Category>> {
        let landing = self.fetcher.get(&city.url).await;
        tracing::info!(url = %city.url, status = ?landing.status_code(), "Checked city page");
        if landing.is_empty() {
            return Ok(Vec::new());
        }

        let mut retry = self.page_retry.start();
        let categories = loop {
            let session = self
                .launcher
                .open_with_retry(&self.provision)
                .await
                .ok_or_else(|| BrowserError::Launch("provisioning attempts exhausted".to_string()))?;
            let outcome = self.expand_bubbles(&session, &city.url).await;
            session.close().await;

            match outcome {
                Ok(Some(categories)) => break categories,
                Ok(None) => tracing::warn!(city = %city.name, "Category discovery escalated, reloading"),
                Err(e) => tracing::warn!(city = %city.name, error = %e, "Category discovery failed"),
            }
            if !retry.backoff(FailureKind::Network).await {
                return Err(BrowserError::WaitTimeout {
                    condition: format!("categories of {}", city.name),
                    timeout_secs: self.page_retry.max_elapsed.map_or(0, |d| d.as_secs()),
                }
                .into());
            }
        };

        let total = categories.len();
        let selected: Vec<Category> = dedupe_by(categories, |c| c.url.clone())
            .into_iter()
            .filter(|c| c.matches(&self.keywords))
            .collect();
        tracing::info!(
            city = %city.name,
            "Selected {} of {} categories",
            selected.len(),
            total
        );
        Ok(selected)
    }

    /// One pass over the bubble bar; `None` when a modal got stuck
    async fn expand_bubbles(
        &self,
        session: &BrowserSession,
        url: &str,
    ) -> BrowserResult<Option<Vec<Category>>> {
        let mut categories = loop {
            session.goto(url).await?;
            let found = self.collect_links(session, BUBBLE_LINKS).await?;
            if !found.is_empty() || session.find_elements(ERROR_PAGE).await?.is_empty() {
                break found;
            }
            tracing::info!("Error page shown for {}, reloading", url);
            tokio::time::sleep(self.expansion.escalation_delay).await;
        };

        session
            .wait_for_all_clickable(BUBBLES, &self.excluded_bubbles)
            .await?;
        let mut bubbles = Vec::new();
        for bubble in session.find_elements(BUBBLES).await? {
            let label = bubble.inner_text().await?.unwrap_or_default();
            if requires_clickable(&label, &self.excluded_bubbles) {
                bubbles.push(bubble);
            }
        }
        tokio::time::sleep(self.expansion.render_delay).await;

        let mut expansion = BubbleExpansion::new(self.expansion.clone(), bubbles.len());
        loop {
            match expansion.state() {
                ExpansionState::Opening { bubble, attempt } => {
                    if let Err(e) = bubbles[bubble].click().await {
                        tracing::debug!(bubble, attempt, "Bubble click failed: {}", e);
                    }
                    tokio::time::sleep(expansion.delay()).await;
                    let links = self.collect_links(session, MODAL_LINKS).await?;
                    let found = !links.is_empty();
                    categories.extend(links);
                    expansion.record_open(found);
                }
                ExpansionState::Dismissing { attempt, .. } => {
                    let center: Vec<f64> = session.evaluate(OVERLAY_CENTER_JS).await?;
                    if let [x, y] = center[..] {
                        let (dx, dy) = dismiss_offset(attempt);
                        if let Err(e) = session.click_at(x + dx, y + dy).await {
                            tracing::debug!(attempt, "Overlay click failed: {}", e);
                        }
                        tokio::time::sleep(expansion.delay()).await;
                    }
                    let closed: bool = session.evaluate(OVERLAY_HIDDEN_JS).await?;
                    if closed {
                        tokio::time::sleep(self.expansion.settle_delay).await;
                    }
                    expansion.record_dismiss(closed);
                }
                ExpansionState::Done => return Ok(Some(categories)),
                ExpansionState::Escalated => return Ok(None),
            }
        }
    }

    async fn collect_links(
        &self,
        session: &BrowserSession,
        selector: &str,
    ) -> BrowserResult<Vec<Category>> {
        let mut links = Vec::new();
        for element in session.find_elements(selector).await? {
            let Some(href) = element.attribute("href").await? else {
                continue;
            };
            let name = element.inner_text().await?.unwrap_or_default();
            links.push(Category {
                name: name.split_whitespace().collect::<Vec<_>>().join(" "),
                url: absolutize(self.fetcher.base_url(), &href),
            });
        }
        Ok(links)
    }

    async fn stores_of_category(&self, city: &City, category: &Category) -> Vec<Store> {
        tracing::info!(category = %category.name, url = %category.url, "Scraping category");
        let Some(html) = self.fetch_page(&category.url).await else {
            return Vec::new();
        };

        let base = self.fetcher.base_url();
        let mut stores = parse_stores(&html, city, category, base).unwrap_or_else(|e| {
            tracing::warn!(url = %category.url, "Store parsing failed: {}", e);
            Vec::new()
        });

        let pages = parse_page_count(&html);
        for page_url in paginate(&category.url, pages).into_iter().skip(1) {
            let Some(html) = self.fetch_page(&page_url).await else {
                continue;
            };
            match parse_stores(&html, city, category, base) {
                Ok(found) => stores.extend(found),
                Err(e) => tracing::warn!(url = %page_url, "Store parsing failed: {}", e),
            }
        }
        stores
    }
}

#[async_trait]
impl SiteAdapter for GlovoAdapter {
    type Root = City;
    type Store = Store;
    type Listing = Collection;
    type Item = GlovoProduct;
    type Record = GlovoProduct;

    fn name(&self) -> &str {
        "glovo"
    }

    async fn discover_roots(&self) -> crate::Result<Vec<City>> {
        let Some(html) = self.fetch_page(&self.cities_url).await else {
            return Ok(Vec::new());
        };
        let cities = parse_cities(&html, self.fetcher.base_url())?;
        tracing::info!("Found {} cities", cities.len());
        Ok(cities)
    }

    async fn root_from_url(&self, url: &str) -> crate::Result<Option<City>> {
        let url = self.fetcher.absolute_url(url);
        Ok(Some(City {
            name: city_name_from_url(&url),
            url,
        }))
    }

    fn root_key(&self, city: &City) -> Option<String> {
        Some(city.name.clone())
    }

    fn destination(&self, city: &City, _store: &Store) -> String {
        city.name.clone()
    }

    async fn discover_stores(&self, city: &City) -> crate::Result<Vec<Store>> {
        let categories = self.discover_categories(city).await?;
        let mut stores = Vec::new();
        for category in &categories {
            stores.extend(self.stores_of_category(city, category).await);
        }
        Ok(dedupe_by(stores, |s| (s.category.clone(), s.url.clone())))
    }

    async fn discover_listings(&self, store: &Store) -> crate::Result<Vec<Collection>> {
        match self.fetch_page(&store.url).await {
            Some(html) => Ok(parse_collections(&html, store, self.fetcher.base_url())?),
            None => Ok(Vec::new()),
        }
    }

    async fn extract_listing(&self, collection: Collection) -> ExtractResult<Vec<GlovoProduct>> {
        match self.fetch_page(&collection.url).await {
            Some(html) => parse_products(&html, &collection),
            None => Ok(Vec::new()),
        }
    }

    async fn extract_detail(&self, product: GlovoProduct) -> ExtractResult<Option<GlovoProduct>> {
        Ok(Some(product))
    }
}

pub fn parse_cities(html: &str, base: &Url) -> ExtractResult<Vec<City>> {
    let document = Html::parse_document(html);
    Ok(all(document.root_element(), "a.city-list__city")?
        .into_iter()
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            Some(City {
                name: clean_text(element),
                url: absolutize(base, href),
            })
        })
        .collect())
}

/// City name for a page addressed directly, from its last path segment
pub fn city_name_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| "city".to_string())
}

/// Store count indicator "1 / N" on a category page
pub fn parse_page_count(html: &str) -> usize {
    let document = Html::parse_document(html);
    select_text(document.root_element(), "span.current-page-text")
        .ok()
        .flatten()
        .map(|text| trailing_count(&text))
        .unwrap_or(1)
}

/// Store cards of one category page; a page without cards is the store
pub fn parse_stores(
    html: &str,
    city: &City,
    category: &Category,
    base: &Url,
) -> ExtractResult<Vec<Store>> {
    let document = Html::parse_document(html);
    let cards = all(
        document.root_element(),
        "div.category-page__pagination-wrapper > div a",
    )?;

    if cards.is_empty() {
        return Ok(vec![Store {
            city: city.name.clone(),
            category: category.name.clone(),
            name: String::new(),
            tag: String::new(),
            url: category.url.clone(),
        }]);
    }

    let mut stores = Vec::new();
    for card in cards {
        let Some(href) = card.value().attr("href") else {
            continue;
        };
        stores.push(Store {
            city: city.name.clone(),
            category: category.name.clone(),
            name: select_text(card, ".store-card__footer__title")?.unwrap_or_default(),
            tag: select_text(card, ".store-card__footer__tag")?.unwrap_or_default(),
            url: absolutize(base, href),
        });
    }
    Ok(stores)
}

/// Collections of a store page; a store without any is one collection
pub fn parse_collections(html: &str, store: &Store, base: &Url) -> ExtractResult<Vec<Collection>> {
    let document = Html::parse_document(html);
    let mut sections = all(document.root_element(), "div.store__body__dynamic-content")?;
    // The first section is a promotional banner when there are several
    if sections.len() > 1 {
        sections.remove(0);
    }

    let mut collections = Vec::new();
    for section in sections {
        let title = match select_text(section, "h2.grid__title")? {
            Some(title) => title,
            None => select_text(section, "h2.carousel__title")?.unwrap_or_default(),
        };
        let mut tiles = all(section, "div.grid__content a")?;
        if tiles.is_empty() {
            tiles = all(section, "div.carousel__content a")?;
        }
        for tile in tiles {
            let Some(href) = tile.value().attr("href") else {
                continue;
            };
            collections.push(Collection {
                store: store.clone(),
                section: title.clone(),
                name: select_text(tile, "div.tile__description")?.unwrap_or_default(),
                url: absolutize(base, href),
            });
        }
    }

    if collections.is_empty() {
        collections.push(Collection {
            store: store.clone(),
            section: String::new(),
            name: String::new(),
            url: store.url.clone(),
        });
    }
    Ok(collections)
}

/// Products of a collection page, grouped by grid title
pub fn parse_products(html: &str, collection: &Collection) -> ExtractResult<Vec<GlovoProduct>> {
    let document = Html::parse_document(html);
    let mut products = Vec::new();

    for group in all(document.root_element(), "div.store__body__dynamic-content")? {
        let group_name = select_text(group, "h2.grid__title")?.unwrap_or_default();
        for tile in all(group, "div.grid__content > section")? {
            let name = select_text(tile, "span.tile__description")?.unwrap_or_default();
            let image = select_attr(tile, "img", "src")?.unwrap_or_default();
            let price_text = select_text(tile, "span.product-price__effective")?.unwrap_or_default();
            let (price, currency) = split_price(&price_text);
            let original_price = first(tile, "span.product-price-original")?
                .map(clean_text)
                .and_then(|text| text.split_whitespace().next().map(str::to_string))
                .unwrap_or_default();

            let store = &collection.store;
            products.push(GlovoProduct {
                product_id: product_id(&name, &image),
                city: store.city.clone(),
                category: store.category.clone(),
                store: store.name.clone(),
                section: collection.section.clone(),
                collection: collection.name.clone(),
                group: group_name.clone(),
                name,
                image,
                price,
                currency,
                original_price,
                url: collection.url.clone(),
                date: utc_timestamp(),
            });
        }
    }
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://glovoapp.com").unwrap()
    }

    fn city() -> City {
        City {
            name: "Rabat".to_string(),
            url: "https://glovoapp.com/ma/fr/rabat/".to_string(),
        }
    }

    fn category() -> Category {
        Category {
            name: "Supermarchés".to_string(),
            url: "https://glovoapp.com/ma/fr/rabat/supermarches_34/".to_string(),
        }
    }

    fn store() -> Store {
        Store {
            city: "Rabat".to_string(),
            category: "Supermarchés".to_string(),
            name: "Marjane Market".to_string(),
            tag: "Courses".to_string(),
            url: "https://glovoapp.com/ma/fr/rabat/marjane-market/".to_string(),
        }
    }

    #[test]
    fn test_parse_cities() {
        let html = r#"
            <a class="city-list__city" href="/ma/fr/rabat/">
              Rabat
            </a>
            <a class="city-list__city" href="https://glovoapp.com/ma/fr/fes/">Fès</a>
            <a class="city-list__city">No href</a>"#;
        let cities = parse_cities(html, &base()).unwrap();

        assert_eq!(cities, vec![
            city(),
            City {
                name: "Fès".to_string(),
                url: "https://glovoapp.com/ma/fr/fes/".to_string()
            }
        ]);
    }

    #[test]
    fn test_city_name_from_url() {
        assert_eq!(city_name_from_url("https://glovoapp.com/ma/fr/rabat/"), "rabat");
        assert_eq!(city_name_from_url("not a url"), "city");
    }

    #[test]
    fn test_category_keyword_filter() {
        let keywords: Vec<String> = ["super", "marjane", "march"]
            .iter()
            .map(|k| k.to_string())
            .collect();

        assert!(category().matches(&keywords));
        assert!(Category {
            name: "Épicerie".to_string(),
            url: "https://glovoapp.com/ma/fr/rabat/marjane_1/".to_string(),
        }
        .matches(&keywords));
        assert!(Category {
            name: "MARCHÉ frais".to_string(),
            url: "/x".to_string(),
        }
        .matches(&keywords));
        assert!(!Category {
            name: "Restaurants".to_string(),
            url: "https://glovoapp.com/ma/fr/rabat/restaurants_1/".to_string(),
        }
        .matches(&keywords));
    }

    #[test]
    fn test_parse_stores_and_page_count() {
        let html = r#"
            <span class="current-page-text">1 / 3</span>
            <div class="category-page__pagination-wrapper">
              <div>
                <a href="/ma/fr/rabat/marjane-market/">
                  <p class="store-card__footer__title">Marjane Market</p>
                  <p class="store-card__footer__tag">Courses</p>
                </a>
                <a href="/ma/fr/rabat/carrefour/">
                  <p class="store-card__footer__title">Carrefour</p>
                </a>
              </div>
            </div>"#;

        assert_eq!(parse_page_count(html), 3);
        let stores = parse_stores(html, &city(), &category(), &base()).unwrap();
        assert_eq!(stores.len(), 2);
        assert_eq!(stores[0], store());
        assert_eq!(stores[1].tag, "");
    }

    #[test]
    fn test_category_without_cards_is_a_store() {
        let stores = parse_stores("<p>single store</p>", &city(), &category(), &base()).unwrap();

        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].url, category().url);
        assert_eq!(stores[0].name, "");
        assert_eq!(parse_page_count("<p>single store</p>"), 1);
    }

    #[test]
    fn test_parse_collections_drops_banner_section() {
        let html = r#"
            <div class="store__body__dynamic-content">
              <h2 class="grid__title">Promotions</h2>
              <div class="grid__content"><a href="/promo"><div class="tile__description">Promo</div></a></div>
            </div>
            <div class="store__body__dynamic-content">
              <h2 class="grid__title">Frais</h2>
              <div class="grid__content">
                <a href="/ma/fr/rabat/marjane-market/?content=lait"><div class="tile__description">Lait</div></a>
              </div>
            </div>
            <div class="store__body__dynamic-content">
              <h2 class="carousel__title">Boissons</h2>
              <div class="carousel__content">
                <a href="/ma/fr/rabat/marjane-market/?content=eau"><div class="tile__description">Eau</div></a>
              </div>
            </div>"#;

        let collections = parse_collections(html, &store(), &base()).unwrap();
        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].section, "Frais");
        assert_eq!(collections[0].name, "Lait");
        assert_eq!(
            collections[0].url,
            "https://glovoapp.com/ma/fr/rabat/marjane-market/?content=lait"
        );
        assert_eq!(collections[1].section, "Boissons");
        assert_eq!(collections[1].name, "Eau");
    }

    #[test]
    fn test_store_without_collections() {
        let collections = parse_collections("<div></div>", &store(), &base()).unwrap();

        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].url, store().url);
        assert_eq!(collections[0].section, "");
    }

    #[test]
    fn test_parse_products() {
        let collection = Collection {
            store: store(),
            section: "Frais".to_string(),
            name: "Lait".to_string(),
            url: "https://glovoapp.com/ma/fr/rabat/marjane-market/?content=lait".to_string(),
        };
        let html = r#"
            <div class="store__body__dynamic-content">
              <h2 class="grid__title">Lait frais</h2>
              <div class="grid__content">
                <section>
                  <img src="https://cdn/centrale.png">
                  <span class="tile__description">Centrale 1L</span>
                  <span class="product-price__effective">9,50 MAD</span>
                  <span class="product-price-original">11,00 MAD</span>
                </section>
                <section>
                  <span class="tile__description">Jaouda 1L</span>
                  <span class="product-price__effective">8,90</span>
                </section>
              </div>
            </div>"#;

        let products = parse_products(html, &collection).unwrap();
        assert_eq!(products.len(), 2);

        let first = &products[0];
        assert_eq!(first.group, "Lait frais");
        assert_eq!(first.name, "Centrale 1L");
        assert_eq!(first.price, "9,50");
        assert_eq!(first.currency, "MAD");
        assert_eq!(first.original_price, "11,00");
        assert_eq!(first.city, "Rabat");
        assert_eq!(first.store, "Marjane Market");
        assert_eq!(first.collection, "Lait");
        assert_eq!(first.product_id, product_id("Centrale 1L", "https://cdn/centrale.png"));

        let second = &products[1];
        assert_eq!(second.image, "");
        assert_eq!(second.price, "8,90");
        assert_eq!(second.currency, "");
        assert_eq!(second.original_price, "");
    }

    #[test]
    fn test_columns_line_up_with_values() {
        let collection = Collection {
            store: store(),
            section: String::new(),
            name: String::new(),
            url: store().url,
        };
        let html = r#"<div class="store__body__dynamic-content"><div class="grid__content">
            <section><span class="tile__description">X</span></section></div></div>"#;
        let product = &parse_products(html, &collection).unwrap()[0];

        assert_eq!(product.values().len(), GlovoProduct::COLUMNS.len());
        assert_eq!(product.id(), product.values()[0]);
    }
}
