//! Per-security market picture and the batch it is published in.

use serde::{Deserialize, Serialize};

use crate::order_list::{MarketData, DEPTH};

/// Most records carried by one published picture.
pub const MAX_RECORDS: usize = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depth {
    pub best_buy_px: i64,
    pub total_buy_qty: i64,
    pub best_sell_px: i64,
    pub total_sell_qty: i64,
}

/// Direction of the last trade against the one before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Flat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPictureRecord {
    pub scrip_code: String,
    pub open_px: i64,
    pub close_px: i64,
    pub high_px: i64,
    pub low_px: i64,
    pub no_of_trades: i64,
    pub volume: i64,
    pub value: i64,
    pub last_trade_qty: i64,
    pub last_trade_px: i64,
    pub total_buy_qty: i64,
    pub total_sell_qty: i64,
    pub trend: Trend,
    pub lower_ckt_limit: i64,
    pub upper_ckt_limit: i64,
    pub weighted_avg_px: i64,
    pub depth: [Depth; DEPTH],
}

impl MarketPictureRecord {
    pub fn new(scrip_code: impl Into<String>) -> Self {
        Self {
            scrip_code: scrip_code.into(),
            open_px: -1,
            close_px: -1,
            high_px: -1,
            low_px: -1,
            no_of_trades: 0,
            volume: 0,
            value: 0,
            last_trade_qty: 0,
            last_trade_px: 0,
            total_buy_qty: 0,
            total_sell_qty: 0,
            trend: Trend::Flat,
            lower_ckt_limit: 0,
            upper_ckt_limit: 0,
            weighted_avg_px: 0,
            depth: [Depth::default(); DEPTH],
        }
    }

    /// Seeds the reference prices and a ±10% circuit band from the first
    /// order seen for the security.
    pub fn seeded(scrip_code: impl Into<String>, px: i64) -> Self {
        let mut record = Self::new(scrip_code);
        record.open_px = px;
        record.close_px = px;
        record.high_px = px;
        record.low_px = px;
        record.lower_ckt_limit = px * 9 / 10;
        record.upper_ckt_limit = px * 11 / 10;
        record
    }

    pub fn has_traded(&self) -> bool {
        self.no_of_trades > 0
    }

    pub fn record_trade(&mut self, px: i64, qty: i64) {
        self.trend = if !self.has_traded() || px == self.last_trade_px {
            Trend::Flat
        } else if px > self.last_trade_px {
            Trend::Up
        } else {
            Trend::Down
        };

        self.no_of_trades += 1;
        // day totals saturate rather than wrap
        self.volume = self.volume.saturating_add(qty);
        self.value = self.value.saturating_add(qty * px);
        self.last_trade_px = px;
        self.last_trade_qty = qty;
        self.weighted_avg_px = self.value / self.volume;

        if self.high_px < px {
            self.high_px = px;
        }
        if self.low_px < 0 || self.low_px > px {
            self.low_px = px;
        }
    }

    pub fn set_depth(&mut self, buys: &MarketData, sells: &MarketData) {
        for (i, level) in self.depth.iter_mut().enumerate() {
            level.best_buy_px = buys.price[i];
            level.total_buy_qty = buys.qty[i];
            level.best_sell_px = sells.price[i];
            level.total_sell_qty = sells.qty[i];
        }
        self.total_buy_qty = buys.qty.iter().sum();
        self.total_sell_qty = sells.qty.iter().sum();
    }
}

/// A batch of records flushed together to the snapshot sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPicture {
    pub sequence_no: u64,
    pub records: Vec<MarketPictureRecord>,
    #[serde(skip)]
    capacity: usize,
}

impl MarketPicture {
    pub fn new() -> Self {
        Self::with_capacity(MAX_RECORDS)
    }

    /// Capacity is clamped to `1..=MAX_RECORDS`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_RECORDS);
        Self {
            sequence_no: 0,
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn push(&mut self, record: MarketPictureRecord) {
        debug_assert!(!self.is_full());
        self.records.push(record);
    }

    /// Empties the batch and advances the sequence for the next flush.
    pub fn reset(&mut self) {
        self.records.clear();
        self.sequence_no += 1;
    }
}

impl Default for MarketPicture {
    fn default() -> Self {
        Self::new()
    }
}
