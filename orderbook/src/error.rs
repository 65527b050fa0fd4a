//! Error taxonomy for the order book.
//!
//! Conditions that only steer control flow (an empty list, a replace that
//! costs the order its queue position) are modelled with `Option` and
//! `ReplaceOutcome` instead of living here.

use thiserror::Error;

use crate::types::OrderId;

/// Failures raised by book and market operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("Cannot find order : {0}")]
    OrderIdNotFound(OrderId),

    #[error("Reject Replace : {0}")]
    RejectReplace(String),

    #[error("Cannot find securityId : {0}")]
    SecurityIdNotFound(String),
}

/// Failures while translating an inbound request into a native order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Side not handled : {0}")]
    SideNotHandled(String),

    #[error("Order Type Not Handled : {0}")]
    OrderTypeNotHandled(String),

    #[error("TimeInForce Not Handled : {0}")]
    TimeInForceNotHandled(String),

    #[error("Missing field : {0}")]
    MissingField(&'static str),

    #[error("Price out of range : {field} {value}")]
    PriceOutOfRange { field: &'static str, value: i64 },

    #[error("Qty out of range : {0}")]
    QtyOutOfRange(i64),
}
