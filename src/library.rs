//! Paginated retrieval of the user's product catalog.
//!
//! One request learns the total count, then every page is fetched in order.
//! A failing page only loses that page; the count request failing loses the
//! whole fetch, which callers must treat as "could not determine catalog",
//! not as an empty catalog.

use std::collections::HashSet;

use log::{error, info, warn};
use serde::Deserialize;

use crate::api::{ApiClient, ApiError, Transport, PAGE_SIZE, PRODUCTS_URL};
use crate::model::Product;

#[derive(Debug, Deserialize)]
struct CountEnvelope {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    data: Vec<PageEntry>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    #[serde(rename = "productId")]
    product_id: String,
    #[serde(rename = "productName")]
    product_name: Option<String>,
}

fn page_count(total: u64) -> u64 {
    (total + PAGE_SIZE - 1) / PAGE_SIZE
}

/// Fetch the whole library, deduplicated by product id.
///
/// The same product can appear on two pages when items are added between
/// page fetches; later duplicates are dropped silently, first-seen order is
/// kept.
pub fn fetch_all<T: Transport>(client: &mut ApiClient<T>) -> Result<Vec<Product>, ApiError> {
    info!("Getting your books data...");
    let total = match fetch_count(client) {
        Ok(total) => total,
        Err(e) => {
            error!("Couldn't fetch your books data: {}", e);
            return Err(e);
        }
    };

    let mut seen = HashSet::new();
    let mut products = Vec::new();
    for page in 0..page_count(total) {
        match fetch_page(client, page) {
            Ok(entries) => {
                for product in entries {
                    if seen.insert(product.id.clone()) {
                        products.push(product);
                    }
                }
            }
            Err(e) => warn!("Couldn't fetch page {} of your books data: {}", page, e),
        }
    }
    info!("Books data has been successfully fetched.");
    Ok(products)
}

fn fetch_count<T: Transport>(client: &mut ApiClient<T>) -> Result<u64, ApiError> {
    let response = client.get(PRODUCTS_URL)?;
    if !response.is_success() {
        return Err(ApiError::HttpStatus {
            status: response.status(),
            url: PRODUCTS_URL.to_string(),
            context: Some("catalog count".to_string()),
        });
    }
    let envelope: CountEnvelope = response.json()?;
    Ok(envelope.count)
}

fn fetch_page<T: Transport>(
    client: &mut ApiClient<T>,
    page: u64,
) -> Result<Vec<Product>, ApiError> {
    let offset = (page * PAGE_SIZE).to_string();
    let limit = PAGE_SIZE.to_string();
    let response = client.get_with_query(
        PRODUCTS_URL,
        &[
            ("sort", "createdAt:DESC"),
            ("offset", &offset),
            ("limit", &limit),
        ],
    )?;
    if !response.is_success() {
        return Err(ApiError::HttpStatus {
            status: response.status(),
            url: PRODUCTS_URL.to_string(),
            context: Some(format!("catalog page {}", page)),
        });
    }
    let envelope: PageEnvelope = response.json()?;
    Ok(envelope
        .data
        .into_iter()
        .map(|entry| Product {
            id: entry.product_id,
            title: entry.product_name,
        })
        .collect())
}
