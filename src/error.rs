//! Error types for tradesim_rs
//!
//! This module defines domain-specific error types that provide clear,
//! actionable error messages to users.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading a price table.
///
/// Any of these stops rendering: the dashboard never works on partial data.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("Price file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Price file has no header row")]
    MissingHeader,

    #[error("Price file has no group columns after the period column")]
    NoGroups,

    #[error("Price file has no periods")]
    NoPeriods,

    #[error("Group name in column {column} is empty")]
    EmptyGroupName { column: usize },

    #[error("Group '{0}' appears more than once in the header")]
    DuplicateGroup(String),

    #[error("Line {line}: period label is empty")]
    EmptyPeriod { line: u64 },

    #[error("Period '{0}' appears more than once")]
    DuplicatePeriod(String),

    #[error("Line {line}: expected {expected} cells, found {found}")]
    RowLength {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: price for '{group}' is not a number: '{value}'")]
    InvalidPrice {
        line: u64,
        group: String,
        value: String,
    },

    #[error("Line {line}: price for '{group}' cannot be negative, got {price}")]
    NegativePrice { line: u64, group: String, price: f64 },
}

/// Errors raised by the ledger. None of them change ledger state.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Unknown group: '{0}'")]
    UnknownGroup(String),

    #[error("Insufficient funds: cost {cost:.2} exceeds balance {balance:.2}")]
    InsufficientFunds { cost: f64, balance: f64 },

    #[error("Quantity must be positive")]
    NonPositiveQuantity,

    #[error("Balance must be a non-negative number, got {0}")]
    InvalidBalance(f64),

    #[error("Price must be a non-negative number, got {0}")]
    InvalidPrice(f64),

    #[error("Holding of '{group}' cannot exceed {max} shares", max = u64::MAX)]
    HoldingOverflow { group: String },
}

/// Validation errors for user input in the TUI and on the command line.
///
/// These errors are shown directly to users and should be clear and actionable.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Quantity is required")]
    QuantityRequired,

    #[error("Invalid quantity format: {0}")]
    InvalidQuantity(String),

    #[error("Quantity must be positive, got {0}")]
    NonPositiveQuantity(u64),

    #[error("Invalid order '{0}', expected GROUP:QUANTITY")]
    InvalidOrder(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
