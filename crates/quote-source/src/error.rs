// In crates/quote-source/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to build the HTTP client: {0}")]
    ClientBuildError(String),
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Quote endpoint answered with HTTP {0}")]
    HttpStatus(u16),
    #[error("Failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(#[from] serde_json::Error),
    #[error("Invalid price {price} for {asset} on {exchange}")]
    InvalidPrice { asset: String, exchange: String, price: f64 },
    #[error("Quote source misconfigured: {0}")]
    Misconfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;
