//! Bringo: market → store → page → product
//!
//! Markets are only listed after a location has been entered in the
//! browser. The handshake also yields the `PHPSESSID` cookie that every
//! later plain HTTP fetch must carry, otherwise the site answers with the
//! location form again.

use crate::config::BringoConfig;
use crate::crawler::browser::{BrowserLauncher, BrowserSession};
use crate::crawler::fetcher::FetchRequest;
use crate::crawler::{ResilientFetcher, RetryPolicy};
use crate::sites::markup::{
    absolutize, all, clean_text, first, paginate, require_attr, select_attr, select_text,
    selector, split_price,
};
use crate::sites::{product_id, utc_timestamp, SiteAdapter, SiteContext};
use crate::state::HandshakeState;
use crate::storage::Record;
use crate::{BrowserError, BrowserResult, ExtractError, ExtractResult};
use async_trait::async_trait;
use scraper::Html;
use std::sync::RwLock;
use std::time::Duration;
use url::Url;

/// Session cookie set once a location is chosen
pub const SESSION_COOKIE: &str = "PHPSESSID";

/// One opening-hours line of a market
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningHours {
    pub week_day: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    pub url: String,
    pub title: String,
    pub image: String,
    pub closing_note: String,
    pub schedule: Vec<OpeningHours>,
}

impl Market {
    /// Weekly schedule flattened to "Lundi 08:00 - 22:00; Mardi ..."
    pub fn schedule_text(&self) -> String {
        self.schedule
            .iter()
            .map(|line| format!("{} {}", line.week_day, line.time).trim().to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    pub market: String,
    pub market_image: String,
    pub market_schedule: String,
    pub url: String,
    pub image: String,
    pub name: String,
}

/// One paginated listing of a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub store: Store,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductLink {
    pub store: Store,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BringoProduct {
    pub product_id: String,
    pub market: String,
    pub market_image: String,
    pub market_schedule: String,
    pub store: String,
    pub store_image: String,
    pub name: String,
    pub price: String,
    pub currency: String,
    pub brand: String,
    pub description: String,
    pub number: String,
    pub image: String,
    pub images: String,
    pub url: String,
    pub date: String,
}

impl Record for BringoProduct {
    const COLUMNS: &'static [&'static str] = &[
        "product_id",
        "market",
        "market_image",
        "market_schedule",
        "store",
        "store_image",
        "name",
        "price",
        "currency",
        "brand",
        "description",
        "number",
        "image",
        "images",
        "url",
        "date",
    ];

    fn id(&self) -> &str {
        &self.product_id
    }

    fn values(&self) -> Vec<&str> {
        vec![
            &self.product_id,
            &self.market,
            &self.market_image,
            &self.market_schedule,
            &self.store,
            &self.store_image,
            &self.name,
            &self.price,
            &self.currency,
            &self.brand,
            &self.description,
            &self.number,
            &self.image,
            &self.images,
            &self.url,
            &self.date,
        ]
    }
}

pub struct BringoAdapter {
    fetcher: ResilientFetcher,
    launcher: BrowserLauncher,
    provision: RetryPolicy,
    address: String,
    street_number: String,
    cookies: RwLock<Vec<(String, String)>>,
}

impl BringoAdapter {
    pub fn new(settings: &BringoConfig, context: &SiteContext) -> crate::Result<Self> {
        let fetcher = context.fetcher(
            &settings.base_url,
            Duration::from_secs(settings.request_timeout_secs),
        )?;
        Ok(Self {
            fetcher,
            launcher: context.launcher(),
            provision: context.provision.clone(),
            address: settings.address.clone(),
            street_number: settings.street_number.clone(),
            cookies: RwLock::new(Vec::new()),
        })
    }

    /// Uses a known session cookie instead of running the handshake
    pub fn with_session(self, session_id: &str) -> Self {
        self.set_session(session_id.to_string());
        self
    }

    fn set_session(&self, session_id: String) {
        if let Ok(mut cookies) = self.cookies.write() {
            *cookies = vec![(SESSION_COOKIE.to_string(), session_id)];
        }
    }

    fn cookies(&self) -> Vec<(String, String)> {
        self.cookies
            .read()
            .map(|cookies| cookies.clone())
            .unwrap_or_default()
    }

    async fn fetch_page(&self, url: &str) -> Option<String> {
        let request = FetchRequest::get(url).with_cookies(&self.cookies());
        let result = self.fetcher.fetch(&request).await;
        if result.is_empty() {
            tracing::debug!(url, status = ?result.status_code(), "No content");
        }
        result.into_content()
    }

    /// Runs the location handshake and returns the rendered markets list
    async fn handshake(&self) -> crate::Result<String> {
        let mut state = HandshakeState::Idle;
        let session = self
            .launcher
            .open_with_retry(&self.provision)
            .await
            .ok_or_else(|| BrowserError::Launch("provisioning attempts exhausted".to_string()))?;
        state = state.advance()?;

        let outcome = self.drive_handshake(&session, &mut state).await;
        session.close().await;
        state.transition(HandshakeState::Closed)?;

        let (markets_html, session_id) = outcome?;
        self.set_session(session_id);
        Ok(markets_html)
    }

    async fn drive_handshake(
        &self,
        session: &BrowserSession,
        state: &mut HandshakeState,
    ) -> BrowserResult<(String, String)> {
        session.goto(self.fetcher.base_url().as_str()).await?;

        session.type_text("#street_number", &self.street_number).await?;
        session.type_text("#address", &self.address).await?;
        *state = state.advance()?;

        session.wait_for_clickable(".pac-item").await?.click().await?;
        session.click("#view_stores").await?;
        *state = state.advance()?;

        let stores_list = session.wait_for_element("#stores-list").await?;
        let markets_html = stores_list.outer_html().await?.unwrap_or_default();
        *state = state.advance()?;

        let session_id = session
            .cookie(SESSION_COOKIE)
            .await?
            .ok_or_else(|| BrowserError::MissingCookie(SESSION_COOKIE.to_string()))?;
        *state = state.advance()?;

        tracing::info!("Captured {} after location handshake", SESSION_COOKIE);
        Ok((markets_html, session_id))
    }
}

#[async_trait]
impl SiteAdapter for BringoAdapter {
    type Root = Market;
    type Store = Store;
    type Listing = Page;
    type Item = ProductLink;
    type Record = BringoProduct;

    fn name(&self) -> &str {
        "bringo"
    }

    async fn discover_roots(&self) -> crate::Result<Vec<Market>> {
        let base = self.fetcher.base_url().to_string();
        let landing = self.fetcher.get(&base).await;
        tracing::info!(url = %base, status = ?landing.status_code(), "Checked base URL");
        if landing.is_empty() || landing.status_code() == Some(500) {
            return Ok(Vec::new());
        }

        let markets_html = match self.handshake().await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Location handshake failed, no markets this run: {}", e);
                return Ok(Vec::new());
            }
        };
        let markets = parse_markets(&markets_html, self.fetcher.base_url())?;
        tracing::info!("Found {} markets", markets.len());
        Ok(markets)
    }

    fn destination(&self, _market: &Market, store: &Store) -> String {
        store.name.clone()
    }

    async fn discover_stores(&self, market: &Market) -> crate::Result<Vec<Store>> {
        match self.fetch_page(&market.url).await {
            Some(html) => Ok(parse_stores(&html, market, self.fetcher.base_url())?),
            None => Ok(Vec::new()),
        }
    }

    async fn discover_listings(&self, store: &Store) -> crate::Result<Vec<Page>> {
        let Some(html) = self.fetch_page(&store.url).await else {
            return Ok(Vec::new());
        };
        let count = parse_page_count(&html)?;
        tracing::info!("Page count of store {}: {}", store.name, count);
        Ok(paginate(&store.url, count)
            .into_iter()
            .map(|url| Page {
                store: store.clone(),
                url,
            })
            .collect())
    }

    async fn extract_listing(&self, page: Page) -> ExtractResult<Vec<ProductLink>> {
        match self.fetch_page(&page.url).await {
            Some(html) => parse_product_links(&html, &page.store, self.fetcher.base_url()),
            None => Ok(Vec::new()),
        }
    }

    async fn extract_detail(&self, link: ProductLink) -> ExtractResult<Option<BringoProduct>> {
        match self.fetch_page(&link.url).await {
            Some(html) => parse_product(&html, &link).map(Some),
            None => Ok(None),
        }
    }
}

/// Markets from the `#stores-list` block rendered after the handshake
pub fn parse_markets(html: &str, base: &Url) -> ExtractResult<Vec<Market>> {
    let document = Html::parse_fragment(html);
    let mut markets = Vec::new();

    for element in all(document.root_element(), ".box-store")? {
        let Some(href) = select_attr(element, "a", "href")? else {
            continue;
        };

        let mut schedule = Vec::new();
        for day in all(element, ".store-program-day")? {
            let week_day = select_text(day, ".store-program-week-day")?.unwrap_or_default();
            let text = clean_text(day);
            let time = text.replacen(&week_day, "", 1).trim().to_string();
            schedule.push(OpeningHours { week_day, time });
        }

        markets.push(Market {
            url: absolutize(base, &href),
            title: select_text(element, ".store-title")?.unwrap_or_default(),
            image: select_attr(element, ".store-image-thumbnail img", "src")?.unwrap_or_default(),
            closing_note: select_text(element, ".store-close-program")?.unwrap_or_default(),
            schedule,
        });
    }
    Ok(markets)
}

/// Stores on a market page, each inheriting the market's fields
pub fn parse_stores(html: &str, market: &Market, base: &Url) -> ExtractResult<Vec<Store>> {
    let document = Html::parse_document(html);
    let schedule = market.schedule_text();
    let mut stores = Vec::new();

    for element in all(document.root_element(), ".box-inner")? {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        stores.push(Store {
            market: market.title.clone(),
            market_image: market.image.clone(),
            market_schedule: schedule.clone(),
            url: absolutize(base, href),
            image: select_attr(element, "img", "src")?.unwrap_or_default(),
            name: select_text(element, "h4")?.unwrap_or_default(),
        });
    }
    Ok(stores)
}

/// Number of listing pages, read from the second-to-last pagination link
pub fn parse_page_count(html: &str) -> ExtractResult<usize> {
    let document = Html::parse_document(html);
    let links = all(document.root_element(), "ul.pagination a.page-link")?;
    if links.len() < 2 {
        return Ok(1);
    }
    Ok(clean_text(links[links.len() - 2])
        .parse::<usize>()
        .unwrap_or(1)
        .max(1))
}

pub fn parse_product_links(html: &str, store: &Store, base: &Url) -> ExtractResult<Vec<ProductLink>> {
    let document = Html::parse_document(html);
    Ok(all(document.root_element(), ".box-product a")?
        .into_iter()
        .filter_map(|element| element.value().attr("href"))
        .map(|href| ProductLink {
            store: store.clone(),
            url: absolutize(base, href),
        })
        .collect())
}

/// Builds the record for one product page
pub fn parse_product(html: &str, link: &ProductLink) -> ExtractResult<BringoProduct> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let name = first(root, "h1.product-name")?
        .map(clean_text)
        .ok_or_else(|| ExtractError::MissingElement {
            selector: "h1.product-name".to_string(),
            url: link.url.clone(),
        })?;

    let price_text = match select_text(root, "div.product-price-calculator p:first-child")? {
        Some(text) => text,
        None => select_text(root, ".product-price")?.unwrap_or_default(),
    };
    let (price, currency) = split_price(&price_text.replace(['~', '/'], " "));

    let mut brand = String::new();
    let mut number = String::new();
    let mut paragraphs = Vec::new();
    let details = all(root, "#details p")?;
    if details.is_empty() {
        if let Some(block) = first(root, "#details")? {
            paragraphs.push(multiline_text(block));
        }
    } else {
        for paragraph in details {
            let content = clean_text(paragraph);
            if content.contains("Numéro du produit") {
                number = labelled_value(&content);
            } else if content.contains("Marque") {
                brand = labelled_value(&content);
            } else {
                paragraphs.push(multiline_text(paragraph));
            }
        }
    }

    let image = require_attr(root, "#main-image", "src", &link.url)?;
    let images = root
        .select(&selector(".thumbnail-image img")?)
        .filter_map(|img| img.value().attr("src"))
        .collect::<Vec<_>>()
        .join(",");

    let store = &link.store;
    Ok(BringoProduct {
        product_id: product_id(&name, &image),
        market: store.market.clone(),
        market_image: store.market_image.clone(),
        market_schedule: store.market_schedule.clone(),
        store: store.name.clone(),
        store_image: store.image.clone(),
        name,
        price,
        currency,
        brand,
        description: paragraphs.join("\n"),
        number,
        image,
        images,
        url: link.url.clone(),
        date: utc_timestamp(),
    })
}

/// Value after the last colon of "Label : value"
fn labelled_value(content: &str) -> String {
    content.rsplit(':').next().unwrap_or_default().trim().to_string()
}

fn multiline_text(element: scraper::ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
