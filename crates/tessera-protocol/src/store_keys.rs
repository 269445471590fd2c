// Key-spaces used by the bundled protocol versions

use tessera_core::StoreKey;

pub const MAIN: &str = "main";
pub const PARAMS: &str = "params";
pub const BANK: &str = "bank";
pub const STAKING: &str = "staking";
pub const GOV: &str = "gov";
pub const UPGRADE: &str = tessera_upgrade::STORE_KEY;
/// Account sequences
pub const AUTH: &str = "auth";

/// Key-spaces shared by every version
pub const BASE_KEYS: [&str; 7] = [MAIN, PARAMS, AUTH, BANK, STAKING, GOV, UPGRADE];

pub fn main_store_key() -> StoreKey {
    StoreKey::new(MAIN)
}

pub fn upgrade_store_key() -> StoreKey {
    StoreKey::new(UPGRADE)
}

pub fn params_store_key() -> StoreKey {
    StoreKey::new(PARAMS)
}

pub fn base_store_keys() -> Vec<StoreKey> {
    BASE_KEYS.iter().map(|name| StoreKey::new(*name)).collect()
}

/// Every key-space any bundled version may touch
pub fn kv_store_keys() -> Vec<StoreKey> {
    base_store_keys()
}
