//! Claiming the Free Learning daily offer.
//!
//! The flow is strictly ordered: offer lookup for the current UTC day,
//! user lookup, best-effort title lookup, ownership short-circuit against
//! the library, then CAPTCHA solve and claim submission. Claiming an offer
//! the user already owns is success, not an error.

use chrono::{Days, NaiveDate, Utc};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::api::{
    claim_url, product_summary_url, ApiClient, ApiError, Transport, OFFERS_URL, USER_URL,
};
use crate::captcha::{CaptchaError, CaptchaSolver};
use crate::library;
use crate::model::Product;

pub const FREE_LEARNING_URL: &str = "https://www.packtpub.com/packt/offers/free-learning/";
pub const RECAPTCHA_SITE_KEY: &str = "6LeAHSgUAAAAAKsn5jo6RUSTLVxGNYyuvUcLMe0_";

/// Error raised while claiming the daily offer.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("There is no Free Learning offer available today.")]
    NoOfferAvailable,

    #[error("Claiming the Free Learning offer failed with HTTP {status}.")]
    Rejected { status: u16 },

    #[error(transparent)]
    Captcha(#[from] CaptchaError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Deserialize)]
struct OffersEnvelope {
    #[serde(default)]
    count: Option<u64>,
    data: Vec<OfferRecord>,
}

#[derive(Debug, Deserialize)]
struct OfferRecord {
    id: String,
    #[serde(rename = "productId")]
    product_id: String,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    data: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    title: String,
}

/// [dateFrom, dateTo) bounds for the offer valid on `today`, as the naive
/// UTC timestamps the offers endpoint expects.
fn offer_window(today: NaiveDate) -> (String, String) {
    let tomorrow = today
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX);
    (
        format!("{}T00:00:00", today),
        format!("{}T00:00:00", tomorrow),
    )
}

/// Claim today's Free Learning offer, returning the offered product so the
/// caller can chain a download.
pub fn claim_offer<T: Transport, U: Transport>(
    client: &mut ApiClient<T>,
    solver: &CaptchaSolver<U>,
) -> Result<Product, ClaimError> {
    info!("Start grabbing the Free Learning ebook...");

    let (offer_id, product_id) = fetch_todays_offer(client)?;
    let user_id = fetch_user_id(client)?;
    let title = fetch_title(client, &product_id);
    let product = Product {
        id: product_id,
        title,
    };

    let library = library::fetch_all(client)?;
    if library.iter().any(|owned| owned.id == product.id) {
        info!(
            "You have already claimed the \"{}\" Free Learning offer.",
            product.display_title()
        );
        return Ok(product);
    }

    info!("Started solving the ReCAPTCHA on the Free Learning page...");
    let solution = solver.solve(FREE_LEARNING_URL, RECAPTCHA_SITE_KEY)?;

    let response = client.put_json(
        claim_url(&user_id, &offer_id),
        json!({"recaptcha": solution}),
    )?;
    match response.status() {
        200 => {
            info!(
                "A new Free Learning ebook \"{}\" has been grabbed!",
                product.display_title()
            );
            Ok(product)
        }
        409 => {
            info!(
                "You have already claimed the \"{}\" Free Learning offer.",
                product.display_title()
            );
            Ok(product)
        }
        status => {
            error!("Claiming the Free Learning ebook failed (HTTP {}).", status);
            Err(ClaimError::Rejected { status })
        }
    }
}

/// Look up today's offer; exactly one record is expected when any exists.
fn fetch_todays_offer<T: Transport>(
    client: &mut ApiClient<T>,
) -> Result<(String, String), ClaimError> {
    let (date_from, date_to) = offer_window(Utc::now().date_naive());
    let response =
        client.get_with_query(OFFERS_URL, &[("dateFrom", &date_from), ("dateTo", &date_to)])?;
    if !response.is_success() {
        return Err(ClaimError::Api(ApiError::HttpStatus {
            status: response.status(),
            url: OFFERS_URL.to_string(),
            context: Some("daily offer".to_string()),
        }));
    }
    let envelope: OffersEnvelope = response.json()?;
    let reported = envelope.count.unwrap_or(envelope.data.len() as u64);
    if reported == 0 {
        return Err(ClaimError::NoOfferAvailable);
    }
    if envelope.data.len() != 1 {
        return Err(ClaimError::Api(ApiError::shape(
            OFFERS_URL,
            format!("expected exactly one offer record, got {}", envelope.data.len()),
        )));
    }
    let offer = &envelope.data[0];
    Ok((offer.id.clone(), offer.product_id.clone()))
}

fn fetch_user_id<T: Transport>(client: &mut ApiClient<T>) -> Result<String, ClaimError> {
    let response = client.get(USER_URL)?;
    if !response.is_success() {
        return Err(ClaimError::Api(ApiError::HttpStatus {
            status: response.status(),
            url: USER_URL.to_string(),
            context: Some("current user".to_string()),
        }));
    }
    let envelope: UserEnvelope = response.json()?;
    if envelope.data.len() != 1 {
        return Err(ClaimError::Api(ApiError::shape(
            USER_URL,
            format!("expected exactly one user record, got {}", envelope.data.len()),
        )));
    }
    Ok(envelope.data[0].id.clone())
}

/// Best-effort title lookup; any failure leaves the title unset and the
/// claim continues.
fn fetch_title<T: Transport>(client: &mut ApiClient<T>, product_id: &str) -> Option<String> {
    let url = product_summary_url(product_id);
    match client.get(&url) {
        Ok(response) if response.is_success() => match response.json::<SummaryBody>() {
            Ok(summary) => Some(summary.title),
            Err(e) => {
                warn!("Couldn't read the summary for product {}: {}", product_id, e);
                None
            }
        },
        Ok(response) => {
            warn!(
                "Couldn't fetch the summary for product {} (HTTP {}).",
                product_id,
                response.status()
            );
            None
        }
        Err(e) => {
            warn!("Couldn't fetch the summary for product {}: {}", product_id, e);
            None
        }
    }
}
