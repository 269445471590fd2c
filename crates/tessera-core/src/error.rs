use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codespace for errors raised by the node itself rather than a module
pub const ROOT_CODESPACE: &str = "root";

pub const CODE_OK: u32 = 0;
pub const CODE_INTERNAL: u32 = 1;
pub const CODE_TX_DECODE: u32 = 2;
pub const CODE_INVALID_SEQUENCE: u32 = 3;
pub const CODE_UNAUTHORIZED: u32 = 4;
pub const CODE_INSUFFICIENT_FUNDS: u32 = 5;
pub const CODE_UNKNOWN_REQUEST: u32 = 6;
pub const CODE_INVALID_ADDRESS: u32 = 7;
pub const CODE_INVALID_COINS: u32 = 10;
pub const CODE_INSUFFICIENT_FEE: u32 = 13;
pub const CODE_INVALID_REQUEST: u32 = 18;

/// Ledger error returned to clients in transaction and query responses
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("codespace: {codespace}, code: {code}, message: {message}")]
pub struct AppError {
    pub codespace: String,
    pub code: u32,
    pub message: String,
}

impl AppError {
    pub fn new(codespace: impl Into<String>, code: u32, message: impl Into<String>) -> Self {
        AppError {
            codespace: codespace.into(),
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl fmt::Display) -> Self {
        Self::new(ROOT_CODESPACE, CODE_INTERNAL, message.to_string())
    }

    pub fn tx_decode(message: impl fmt::Display) -> Self {
        Self::new(ROOT_CODESPACE, CODE_TX_DECODE, message.to_string())
    }

    pub fn invalid_sequence(message: impl fmt::Display) -> Self {
        Self::new(ROOT_CODESPACE, CODE_INVALID_SEQUENCE, message.to_string())
    }

    pub fn unauthorized(message: impl fmt::Display) -> Self {
        Self::new(ROOT_CODESPACE, CODE_UNAUTHORIZED, message.to_string())
    }

    pub fn insufficient_funds(message: impl fmt::Display) -> Self {
        Self::new(ROOT_CODESPACE, CODE_INSUFFICIENT_FUNDS, message.to_string())
    }

    pub fn unknown_request(message: impl fmt::Display) -> Self {
        Self::new(ROOT_CODESPACE, CODE_UNKNOWN_REQUEST, message.to_string())
    }

    pub fn invalid_address(message: impl fmt::Display) -> Self {
        Self::new(ROOT_CODESPACE, CODE_INVALID_ADDRESS, message.to_string())
    }

    pub fn invalid_coins(message: impl fmt::Display) -> Self {
        Self::new(ROOT_CODESPACE, CODE_INVALID_COINS, message.to_string())
    }

    pub fn insufficient_fee(message: impl fmt::Display) -> Self {
        Self::new(ROOT_CODESPACE, CODE_INSUFFICIENT_FEE, message.to_string())
    }

    pub fn invalid_request(message: impl fmt::Display) -> Self {
        Self::new(ROOT_CODESPACE, CODE_INVALID_REQUEST, message.to_string())
    }

    pub fn is_codespace(&self, codespace: &str, code: u32) -> bool {
        self.codespace == codespace && self.code == code
    }
}

impl From<crate::store::StoreError> for AppError {
    fn from(err: crate::store::StoreError) -> Self {
        AppError::internal(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::internal(format!("json: {}", err))
    }
}
