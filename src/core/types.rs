//! Core types - Strong typing for products, sides, intents and fills

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::portfolio::PositionLimits;

/// Integer price tick.
pub type Price = i64;

/// Integer lot count. Signed where it carries a direction.
pub type Qty = i64;

/// Largest price accepted from market data or strategies.
pub const MAX_PRICE: Price = 1_000_000_000;

/// Largest absolute quantity accepted from market data, strategies or limits.
pub const MAX_QTY: Qty = 1_000_000_000;

/// Tradeable product (e.g., "Call", "bond1").
///
/// Case is preserved: product names come straight from the data feed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Product(String);

impl Product {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Product {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// One price level of a book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub quantity: Qty,
}

impl PriceLevel {
    pub fn new(price: Price, quantity: Qty) -> Self {
        Self { price, quantity }
    }
}

/// Why an intent was refused before matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("zero quantity")]
    ZeroQuantity,

    #[error("non-positive price {0}")]
    NonPositivePrice(Price),

    #[error("price {0} out of range")]
    PriceOutOfRange(Price),

    #[error("quantity {0} out of range")]
    QuantityOutOfRange(Qty),

    #[error("empty product")]
    EmptyProduct,

    #[error("unknown product {0}")]
    UnknownProduct(Product),
}

/// Price-limited order intent emitted by a strategy.
///
/// Positive quantity buys, negative quantity sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub product: Product,
    pub price: Price,
    pub quantity: Qty,
}

impl OrderIntent {
    pub fn new(product: impl Into<Product>, price: Price, quantity: Qty) -> Self {
        Self { product: product.into(), price, quantity }
    }

    pub fn buy(product: impl Into<Product>, price: Price, quantity: Qty) -> Self {
        Self::new(product, price, quantity.saturating_abs())
    }

    pub fn sell(product: impl Into<Product>, price: Price, quantity: Qty) -> Self {
        Self::new(product, price, -quantity.saturating_abs())
    }

    /// Direction of the intent. Meaningless for zero quantity.
    pub fn side(&self) -> Side {
        if self.quantity > 0 { Side::Buy } else { Side::Sell }
    }

    pub fn validate(&self, limits: &PositionLimits) -> Result<(), IntentError> {
        if self.product.is_empty() {
            return Err(IntentError::EmptyProduct);
        }
        if self.quantity == 0 {
            return Err(IntentError::ZeroQuantity);
        }
        if self.price <= 0 {
            return Err(IntentError::NonPositivePrice(self.price));
        }
        if self.price > MAX_PRICE {
            return Err(IntentError::PriceOutOfRange(self.price));
        }
        if !(-MAX_QTY..=MAX_QTY).contains(&self.quantity) {
            return Err(IntentError::QuantityOutOfRange(self.quantity));
        }
        if limits.get(&self.product).is_none() {
            return Err(IntentError::UnknownProduct(self.product.clone()));
        }
        Ok(())
    }
}

impl std::fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} @ {}", self.side(), self.quantity.abs(), self.product, self.price)
    }
}

/// Where a strategy fill came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillSource {
    /// Strategy intent took resting market liquidity.
    Market,
    /// Bot flow hit the strategy's resting order.
    Bot,
}

/// Executed strategy trade. `side` is the strategy's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub product: Product,
    pub side: Side,
    pub price: Price,
    pub quantity: Qty,
    pub source: FillSource,
}

impl Fill {
    /// Position change caused by this fill.
    pub fn signed_quantity(&self) -> Qty {
        match self.side {
            Side::Buy => self.quantity,
            Side::Sell => -self.quantity,
        }
    }

    /// Traded value, `quantity × price`, in exact decimal arithmetic.
    pub fn notional(&self) -> Decimal {
        Decimal::from(self.quantity) * Decimal::from(self.price)
    }
}
