use std::fmt;

use serde::Serialize;

/// Котировка из потока Quote.
///
/// Неизменяема после создания; `mid_price` всегда вычисляется
/// из bid/ask и никогда не берётся с провода.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    symbol: String,
    bid_price: f64,
    ask_price: f64,
    mid_price: f64,
    bid_size: f64,
    ask_size: f64,
}

impl QuoteRecord {
    /// Создаёт котировку, mid = (bid + ask) / 2
    pub fn new(
        symbol: impl Into<String>,
        bid_price: f64,
        ask_price: f64,
        bid_size: f64,
        ask_size: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            bid_price,
            ask_price,
            mid_price: (bid_price + ask_price) / 2.0,
            bid_size,
            ask_size,
        }
    }

    /// Символ инструмента (eventSymbol)
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Лучшая цена покупки
    pub fn bid_price(&self) -> f64 {
        self.bid_price
    }

    /// Лучшая цена продажи
    pub fn ask_price(&self) -> f64 {
        self.ask_price
    }

    /// Середина спреда
    pub fn mid_price(&self) -> f64 {
        self.mid_price
    }

    /// Объём на bid
    pub fn bid_size(&self) -> f64 {
        self.bid_size
    }

    /// Объём на ask
    pub fn ask_size(&self) -> f64 {
        self.ask_size
    }
}

impl fmt::Display for QuoteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | bid: {} | ask: {} | mid: {} | bidSize: {} | askSize: {}",
            self.symbol, self.bid_price, self.ask_price, self.mid_price, self.bid_size, self.ask_size
        )
    }
}
