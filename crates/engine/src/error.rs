// In crates/engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Simulation(#[from] simulator::Error),

    #[error("Quote source unavailable: {0}")]
    QuoteSourceUnavailable(#[from] quote_source::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
