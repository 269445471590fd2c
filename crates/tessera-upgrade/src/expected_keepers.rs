// Keepers the upgrade module reads from but does not own

use tessera_core::{Address, AppError, Context, DecCoins};

pub trait StakingKeeper: Send + Sync {
    fn is_validator(&self, ctx: &Context<'_>, address: &Address) -> Result<bool, AppError>;
}

pub trait BankKeeper: Send + Sync {
    fn get_all_balances(&self, ctx: &Context<'_>, address: &Address) -> Result<DecCoins, AppError>;
}
