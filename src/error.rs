use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::market_clearing::types::{CurveSide, PeriodStatus};

pub type Result<T> = std::result::Result<T, AuctionError>;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Bid validation errors (1xxx)
    #[serde(rename = "BID_1001")]
    InvalidQuantity,
    #[serde(rename = "BID_1002")]
    InvalidPrice,

    // Clearing errors (2xxx)
    #[serde(rename = "CLR_2001")]
    InvalidOrderingPrecondition,
    #[serde(rename = "CLR_2002")]
    OutOfOrder,

    // Accounting errors (3xxx)
    #[serde(rename = "ACC_3001")]
    DataInconsistency,

    // Input/output errors (8xxx)
    #[serde(rename = "IO_8001")]
    InputUnreadable,
    #[serde(rename = "IO_8002")]
    MalformedInput,

    // Internal errors (9xxx)
    #[serde(rename = "INT_9998")]
    ConfigurationError,
}

impl ErrorCode {
    /// Get numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::InvalidQuantity => 1001,
            ErrorCode::InvalidPrice => 1002,

            ErrorCode::InvalidOrderingPrecondition => 2001,
            ErrorCode::OutOfOrder => 2002,

            ErrorCode::DataInconsistency => 3001,

            ErrorCode::InputUnreadable => 8001,
            ErrorCode::MalformedInput => 8002,

            ErrorCode::ConfigurationError => 9998,
        }
    }

    /// Get user-friendly message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidQuantity => "Bid quantity must be a finite, non-negative number",
            ErrorCode::InvalidPrice => "Bid price must lie within the price cap band",

            ErrorCode::InvalidOrderingPrecondition => "Bid curve is not sorted for clearing",
            ErrorCode::OutOfOrder => "Market operation called out of order for this period",

            ErrorCode::DataInconsistency => "Granted demand exceeds accepted supply",

            ErrorCode::InputUnreadable => "Input file could not be read",
            ErrorCode::MalformedInput => "Input could not be parsed",

            ErrorCode::ConfigurationError => "Market configuration error",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuctionError {
    #[error("Invalid bid quantity: {0}")]
    InvalidQuantity(f64),

    #[error("Invalid bid price: {0}")]
    InvalidPrice(f64),

    #[error("{side} curve is not sorted for clearing")]
    InvalidOrderingPrecondition { side: CurveSide },

    #[error("Cannot {operation} while period is {status}")]
    OutOfOrder {
        operation: &'static str,
        status: PeriodStatus,
    },

    #[error("Data inconsistency: {0}")]
    DataInconsistency(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuctionError {
    /// Create an out-of-order lifecycle error
    pub fn out_of_order(operation: &'static str, status: PeriodStatus) -> Self {
        AuctionError::OutOfOrder { operation, status }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AuctionError::InvalidQuantity(_) => ErrorCode::InvalidQuantity,
            AuctionError::InvalidPrice(_) => ErrorCode::InvalidPrice,
            AuctionError::InvalidOrderingPrecondition { .. } => {
                ErrorCode::InvalidOrderingPrecondition
            }
            AuctionError::OutOfOrder { .. } => ErrorCode::OutOfOrder,
            AuctionError::DataInconsistency(_) => ErrorCode::DataInconsistency,
            AuctionError::Configuration(_) => ErrorCode::ConfigurationError,
            AuctionError::Io(_) => ErrorCode::InputUnreadable,
            AuctionError::Json(_) => ErrorCode::MalformedInput,
        }
    }

    /// Bid-level rejections leave the period intact
    pub fn is_bid_rejection(&self) -> bool {
        matches!(
            self,
            AuctionError::InvalidQuantity(_) | AuctionError::InvalidPrice(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AuctionError::InvalidQuantity(-1.0).code().code(), 1001);
        assert_eq!(
            AuctionError::out_of_order("clear market", PeriodStatus::Active)
                .code()
                .code(),
            2002
        );
        assert_eq!(
            AuctionError::Configuration("bad".into()).code(),
            ErrorCode::ConfigurationError
        );
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::InvalidQuantity).expect("serialize");
        assert_eq!(json, "\"BID_1001\"");
    }

    #[test]
    fn test_error_display() {
        let err = AuctionError::out_of_order("compute surplus", PeriodStatus::Aggregated);
        assert_eq!(
            err.to_string(),
            "Cannot compute surplus while period is aggregated"
        );
        assert!(AuctionError::InvalidPrice(f64::NAN).is_bid_rejection());
        assert_eq!(
            AuctionError::InvalidPrice(2.0).code().message(),
            "Bid price must lie within the price cap band"
        );
        assert!(!err.is_bid_rejection());
    }
}
