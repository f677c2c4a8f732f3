//! Platform API: endpoint constants, transport seam, and the authenticated client.

mod client;
mod error;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ApiClient;
pub use error::ApiError;
pub use transport::{ApiRequest, RawResponse, ReqwestTransport, Transport};

pub const LOGIN_URL: &str = "https://services.packtpub.com/auth-v1/users/tokens";
pub const PRODUCTS_URL: &str = "https://services.packtpub.com/entitlements-v1/users/me/products";
pub const OFFERS_URL: &str = "https://services.packtpub.com/free-learning-v1/offers";
pub const USER_URL: &str = "https://services.packtpub.com/users-v1/users/me";

/// Items per catalog pagination page.
pub const PAGE_SIZE: u64 = 25;

pub fn product_summary_url(product_id: &str) -> String {
    format!("https://static.packt-cdn.com/products/{}/summary", product_id)
}

pub fn product_file_types_url(product_id: &str) -> String {
    format!(
        "https://services.packtpub.com/products-v1/products/{}/types",
        product_id
    )
}

pub fn product_file_download_url(product_id: &str, file_type: &str) -> String {
    format!(
        "https://services.packtpub.com/products-v1/products/{}/files/{}",
        product_id, file_type
    )
}

pub fn claim_url(user_id: &str, offer_id: &str) -> String {
    format!(
        "https://services.packtpub.com/free-learning-v1/users/{}/claims/{}",
        user_id, offer_id
    )
}
