use thiserror::Error;

use crate::orderbook::BookSide;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid orderbook JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("non-positive price or size on {side} level {index}")]
    NonPositiveLevel { side: BookSide, index: usize },
    #[error("{side} side out of order at level {index}")]
    Unsorted { side: BookSide, index: usize },
}

#[derive(Error, Debug, PartialEq)]
pub enum InputError {
    #[error("unsupported exchange: {0}")]
    UnsupportedExchange(String),
    #[error("asset symbol must not be empty")]
    EmptyAsset,
    #[error("quantity must be a positive amount, got {0}")]
    Quantity(f64),
    #[error("volatility must be in (0, 1], got {0}")]
    Volatility(f64),
}
