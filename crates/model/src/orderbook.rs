//! Level-2 order book snapshot
//!
//! A feed message decodes into one [`Orderbook`]. Snapshots are replaced
//! wholesale on every update and never patched, so consumers share them as
//! `Arc<Orderbook>`.
//!
//! Wire shape:
//! `{"timestamp":"...","exchange":"okx","symbol":"BTC-USDT-SWAP","asks":[["95000.1","0.5"]],"bids":[["95000.0","1.2"]]}`

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// One price level: `[price, size]`, both carried as decimal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level(
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
);

impl Level {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self(price, size)
    }

    #[inline]
    pub fn price(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn size(&self) -> Decimal {
        self.1
    }

    #[inline]
    pub fn price_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    #[inline]
    pub fn size_f64(&self) -> f64 {
        self.1.to_f64().unwrap_or(0.0)
    }

    /// Quote-currency value resting at this level (`price × size`).
    #[inline]
    pub fn notional(&self) -> f64 {
        self.price_f64() * self.size_f64()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Ask,
    Bid,
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Ask => f.write_str("ask"),
            BookSide::Bid => f.write_str("bid"),
        }
    }
}

/// Immutable order book snapshot for one exchange/instrument.
///
/// `asks` ascend by price and `bids` descend, so index 0 is the best level on
/// each side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orderbook {
    pub timestamp: String,
    pub exchange: String,
    pub symbol: String,
    pub asks: Vec<Level>,
    pub bids: Vec<Level>,
}

impl Orderbook {
    /// Decode and validate one feed message.
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        let book: Orderbook = serde_json::from_str(text)?;
        book.validate()?;
        Ok(book)
    }

    /// Check level positivity and side ordering.
    pub fn validate(&self) -> Result<(), DecodeError> {
        check_side(&self.asks, BookSide::Ask)?;
        check_side(&self.bids, BookSide::Bid)
    }

    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.first()
    }

    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.first()
    }

    /// True when both sides carry at least one level.
    pub fn has_two_sided_market(&self) -> bool {
        !self.asks.is_empty() && !self.bids.is_empty()
    }

    /// `(best ask + best bid) / 2`, or 0.0 when either side is empty.
    ///
    /// Callers must read 0.0 as "no market", never as a real mid.
    pub fn mid_price(&self) -> f64 {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => (ask.price_f64() + bid.price_f64()) / 2.0,
            _ => 0.0,
        }
    }

    /// Best ask minus best bid, exact.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => ask.price().checked_sub(bid.price()),
            _ => None,
        }
    }

    /// Levels available on the thinner side.
    pub fn depth(&self) -> usize {
        self.asks.len().min(self.bids.len())
    }

    /// Total notional resting in the visible book, both sides.
    pub fn liquidity(&self) -> f64 {
        self.asks
            .iter()
            .chain(self.bids.iter())
            .map(Level::notional)
            .sum()
    }

    /// Sum of displayed sizes (base units) over both sides.
    pub fn total_size(&self) -> f64 {
        self.asks
            .iter()
            .chain(self.bids.iter())
            .map(Level::size_f64)
            .sum()
    }

    /// Copy of this snapshot keeping only the best `levels` on each side.
    pub fn top_levels(&self, levels: usize) -> Orderbook {
        Orderbook {
            timestamp: self.timestamp.clone(),
            exchange: self.exchange.clone(),
            symbol: self.symbol.clone(),
            asks: self.asks.iter().take(levels).copied().collect(),
            bids: self.bids.iter().take(levels).copied().collect(),
        }
    }
}

fn check_side(levels: &[Level], side: BookSide) -> Result<(), DecodeError> {
    for (index, level) in levels.iter().enumerate() {
        if level.price() <= Decimal::ZERO || level.size() <= Decimal::ZERO {
            return Err(DecodeError::NonPositiveLevel { side, index });
        }
    }

    let out_of_order = levels.windows(2).position(|pair| match side {
        BookSide::Ask => pair[0].price() > pair[1].price(),
        BookSide::Bid => pair[0].price() < pair[1].price(),
    });

    match out_of_order {
        Some(i) => Err(DecodeError::Unsorted { side, index: i + 1 }),
        None => Ok(()),
    }
}

/// Mid price of `book`; 0.0 when one-sided.
pub fn mid_price(book: &Orderbook) -> f64 {
    book.mid_price()
}

/// `min(asks, bids)` level count.
pub fn depth(book: &Orderbook) -> usize {
    book.depth()
}

/// `Σ price × size` over both sides.
pub fn liquidity(book: &Orderbook) -> f64 {
    book.liquidity()
}
