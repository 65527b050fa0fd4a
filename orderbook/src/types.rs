use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TranslateError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
    SellShort,
}

impl Side {
    /// Short sells rest and match on the sell side.
    pub fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    pub fn is_stop(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    #[default]
    Day,
    ImmediateOrCancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(OrderId)
    }
}

// Names and FIX 4.2 tag values are both accepted on the way in.

impl FromStr for Side {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "bid" | "1" => Ok(Side::Buy),
            "sell" | "ask" | "2" => Ok(Side::Sell),
            "sell_short" | "sellshort" | "5" => Ok(Side::SellShort),
            _ => Err(TranslateError::SideNotHandled(s.to_string())),
        }
    }
}

impl FromStr for OrderType {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "market" | "1" => Ok(OrderType::Market),
            "limit" | "2" => Ok(OrderType::Limit),
            "stop" | "3" => Ok(OrderType::Stop),
            "stop_limit" | "stoplimit" | "4" => Ok(OrderType::StopLimit),
            _ => Err(TranslateError::OrderTypeNotHandled(s.to_string())),
        }
    }
}

impl FromStr for TimeInForce {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "0" => Ok(TimeInForce::Day),
            "ioc" | "immediate_or_cancel" | "3" => Ok(TimeInForce::ImmediateOrCancel),
            _ => Err(TranslateError::TimeInForceNotHandled(s.to_string())),
        }
    }
}
