use bigdecimal::BigDecimal;

use tessera_core::coins::canonical;
use tessera_core::AppError;

pub const DEFAULT_CODESPACE: &str = "upgrade";

pub const CODE_UNSUPPORTED_MSG_TYPE: u32 = 101;
pub const CODE_NOT_VALIDATOR: u32 = 103;
pub const CODE_NO_UPGRADE_CONFIG: u32 = 105;
pub const CODE_INVALID_UPGRADE_PARAMS: u32 = 107;
pub const CODE_INVALID_SOFTWARE_DESCRIPTOR: u32 = 108;
pub const CODE_INVALID_VERSION: u32 = 109;
pub const CODE_SWITCH_PERIOD_IN_PROCESS: u32 = 110;
pub const CODE_INVALID_HEIGHT: u32 = 111;
pub const CODE_INSUFFICIENT_COINS: u32 = 112;

pub fn err_unsupported_content(kind: &str) -> AppError {
    AppError::new(
        DEFAULT_CODESPACE,
        CODE_UNSUPPORTED_MSG_TYPE,
        format!("unrecognized upgrade proposal content type: {}", kind),
    )
}

pub fn err_not_validator() -> AppError {
    AppError::new(
        DEFAULT_CODESPACE,
        CODE_NOT_VALIDATOR,
        "failed. proposer of AppUpgradeProposal must be validator",
    )
}

pub fn err_insufficient_coins(reason: impl std::fmt::Display) -> AppError {
    AppError::new(DEFAULT_CODESPACE, CODE_INSUFFICIENT_COINS, reason.to_string())
}

pub fn err_no_upgrade_config() -> AppError {
    AppError::new(DEFAULT_CODESPACE, CODE_NO_UPGRADE_CONFIG, "app upgrade config not found")
}

pub fn err_invalid_params(reason: impl std::fmt::Display) -> AppError {
    AppError::new(DEFAULT_CODESPACE, CODE_INVALID_UPGRADE_PARAMS, reason.to_string())
}

pub fn err_invalid_version(version: u64) -> AppError {
    AppError::new(
        DEFAULT_CODESPACE,
        CODE_INVALID_VERSION,
        format!("failed. version [{}] in AppUpgradeProposal is invalid", version),
    )
}

pub fn err_invalid_switch_height(block_height: u64, switch_height: u64) -> AppError {
    AppError::new(
        DEFAULT_CODESPACE,
        CODE_INVALID_HEIGHT,
        format!(
            "failed. protocol switch height [{}] in AppUpgradeProposal isn't larger than current block height [{}]",
            switch_height, block_height
        ),
    )
}

pub fn err_zero_switch_height() -> AppError {
    AppError::new(
        DEFAULT_CODESPACE,
        CODE_INVALID_HEIGHT,
        "failed. protocol switch height in AppUpgradeProposal isn't allowed to be 0",
    )
}

pub fn err_switch_period_in_process() -> AppError {
    AppError::new(
        DEFAULT_CODESPACE,
        CODE_SWITCH_PERIOD_IN_PROCESS,
        "failed. app upgrade switch period is in process",
    )
}

pub fn err_invalid_upgrade_threshold(threshold: &BigDecimal) -> AppError {
    AppError::new(
        DEFAULT_CODESPACE,
        CODE_INVALID_UPGRADE_PARAMS,
        format!("failed. invalid upgrade threshold ({}) should be [0.75, 1)", canonical(threshold)),
    )
}

pub fn err_invalid_length(descriptor: &str, got: usize, max: usize) -> AppError {
    AppError::new(
        DEFAULT_CODESPACE,
        CODE_INVALID_SOFTWARE_DESCRIPTOR,
        format!("failed. bad length for {}, got length {}, max is {}", descriptor, got, max),
    )
}
