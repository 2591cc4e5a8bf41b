//! HTML helpers shared by the page extractors
//!
//! Thin wrappers over `scraper` that turn selector syntax errors into
//! `ExtractError` and normalize whitespace the same way for every site.

use crate::{ExtractError, ExtractResult};
use scraper::{ElementRef, Selector};
use url::Url;

/// Parses a CSS selector
pub fn selector(css: &str) -> ExtractResult<Selector> {
    Selector::parse(css).map_err(|e| ExtractError::Selector(format!("{}: {:?}", css, e)))
}

/// Visible text with runs of whitespace collapsed to one space
pub fn clean_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn first<'a>(scope: ElementRef<'a>, css: &str) -> ExtractResult<Option<ElementRef<'a>>> {
    Ok(scope.select(&selector(css)?).next())
}

pub fn all<'a>(scope: ElementRef<'a>, css: &str) -> ExtractResult<Vec<ElementRef<'a>>> {
    Ok(scope.select(&selector(css)?).collect())
}

/// Text of the first match, if any
pub fn select_text(scope: ElementRef<'_>, css: &str) -> ExtractResult<Option<String>> {
    Ok(first(scope, css)?.map(clean_text))
}

/// Attribute of the first match, if both exist
pub fn select_attr(scope: ElementRef<'_>, css: &str, attr: &str) -> ExtractResult<Option<String>> {
    Ok(first(scope, css)?
        .and_then(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string()))
}

/// Like `select_attr` but missing markup is an error
pub fn require_attr(
    scope: ElementRef<'_>,
    css: &str,
    attr: &str,
    url: &str,
) -> ExtractResult<String> {
    let element = first(scope, css)?.ok_or_else(|| ExtractError::MissingElement {
        selector: css.to_string(),
        url: url.to_string(),
    })?;
    element
        .value()
        .attr(attr)
        .map(|value| value.trim().to_string())
        .ok_or_else(|| ExtractError::MissingAttribute {
            selector: css.to_string(),
            attribute: attr.to_string(),
            url: url.to_string(),
        })
}

/// Resolves `href` against `base`; absolute links pass through
pub fn absolutize(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http") {
        return href.to_string();
    }
    base.join(href)
        .map(|joined| joined.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Splits "12,50 MAD" into price and currency
///
/// A single token is a bare price; extra tokens after the currency are
/// ignored.
pub fn split_price(text: &str) -> (String, String) {
    let mut tokens = text.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(price), Some(currency)) => (price.to_string(), currency.to_string()),
        (Some(price), None) => (price.to_string(), String::new()),
        _ => (String::new(), String::new()),
    }
}

/// Page count from an indicator such as "Page 1 / 7"; 1 when unreadable
pub fn trailing_count(text: &str) -> usize {
    text.split_whitespace()
        .last()
        .and_then(|token| token.parse::<usize>().ok())
        .filter(|count| *count > 0)
        .unwrap_or(1)
}

/// `url` followed by `url?page=2` ..= `url?page=pages`
pub fn paginate(url: &str, pages: usize) -> Vec<String> {
    let mut urls = vec![url.to_string()];
    for page in 2..=pages {
        let next = match Url::parse(url) {
            Ok(mut parsed) => {
                parsed
                    .query_pairs_mut()
                    .append_pair("page", &page.to_string());
                parsed.to_string()
            }
            Err(_) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{}{}page={}", url, separator, page)
            }
        };
        urls.push(next);
    }
    urls
}
