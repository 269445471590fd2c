use std::sync::Arc;

use tessera_core::{AppError, Context, Querier};

use crate::errors;
use crate::keeper::Keeper;
use crate::types::QueryVersion;

pub const QUERY_UPGRADE_CONFIG: &str = "config";
pub const QUERY_UPGRADE_VERSION: &str = "version";
pub const QUERY_UPGRADE_FAILED_VERSION: &str = "failed_version";

/// Module-level router for upgrade queries; responses are indented JSON
pub fn new_querier(keeper: Arc<Keeper>) -> Querier {
    Arc::new(move |ctx: &Context<'_>, path: &[&str], _data: &[u8]| match path.first().copied() {
        Some(QUERY_UPGRADE_CONFIG) => query_upgrade_config(ctx, &keeper),
        Some(QUERY_UPGRADE_VERSION) => query_upgrade_version(ctx, &keeper),
        Some(QUERY_UPGRADE_FAILED_VERSION) => query_last_failed_version(ctx, &keeper),
        _ => Err(AppError::unknown_request("unknown upgrade query endpoint")),
    })
}

fn query_upgrade_config(ctx: &Context<'_>, keeper: &Keeper) -> Result<Vec<u8>, AppError> {
    let config = keeper.upgrade_config(ctx)?.ok_or_else(errors::err_no_upgrade_config)?;
    Ok(serde_json::to_vec_pretty(&config)?)
}

fn query_upgrade_version(ctx: &Context<'_>, keeper: &Keeper) -> Result<Vec<u8>, AppError> {
    let version = keeper.protocol_keeper().current_version(ctx.store())?;
    Ok(serde_json::to_vec_pretty(&QueryVersion::new(version))?)
}

fn query_last_failed_version(ctx: &Context<'_>, keeper: &Keeper) -> Result<Vec<u8>, AppError> {
    let version = keeper.protocol_keeper().last_failed_version(ctx.store())?;
    Ok(serde_json::to_vec_pretty(&QueryVersion::new(version))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CODE_NO_UPGRADE_CONFIG;
    use crate::test_common::*;
    use tessera_core::UpgradeConfig;

    #[test]
    fn test_config_query() {
        let mut env = TestEnv::new(&[0, 1]);
        let querier = new_querier(env.keeper());

        let ctx = env.ctx(5);
        let err = querier(&ctx, &["config"], &[]).unwrap_err();
        assert_eq!(err.code, CODE_NO_UPGRADE_CONFIG);
        drop(ctx);

        env.schedule(9, 1, 100);
        let ctx = env.ctx(5);
        let body = querier(&ctx, &["config"], &[]).unwrap();
        let config: UpgradeConfig = serde_json::from_slice(&body).unwrap();
        assert_eq!(config.proposal_id, 9);
    }

    #[test]
    fn test_version_queries() {
        let mut env = TestEnv::new(&[0, 1]);
        let querier = new_querier(env.keeper());
        let keeper = env.protocol_keeper().clone();
        keeper.set_last_failed_version(env.store(), 1);

        let ctx = env.ctx(5);
        let current: QueryVersion = serde_json::from_slice(&querier(&ctx, &["version"], &[]).unwrap()).unwrap();
        let failed: QueryVersion = serde_json::from_slice(&querier(&ctx, &["failed_version"], &[]).unwrap()).unwrap();
        assert_eq!(current, QueryVersion::new(0));
        assert_eq!(failed, QueryVersion::new(1));
        assert!(querier(&ctx, &["nope"], &[]).is_err());
    }
}
