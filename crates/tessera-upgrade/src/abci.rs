use log::{error, info, warn};

use tessera_core::{Context, Event};

use crate::keeper::Keeper;
use crate::types::{ATTRIBUTE_KEY_APP_VERSION, EVENT_TYPE_UPGRADE_APP_VERSION};

/// Emits the app-version signal once the pending upgrade's switch height is reached.
///
/// The signal repeats every block until the host activates the version and
/// removes the config, so a node that restarts on the right binary picks it up.
pub fn end_blocker(ctx: &mut Context<'_>, keeper: &Keeper) {
    let config = match keeper.upgrade_config(ctx) {
        Ok(Some(config)) => config,
        Ok(None) => return,
        Err(err) => {
            error!("Cannot read pending upgrade config: {}", err);
            return;
        }
    };

    let protocol_keeper = keeper.protocol_keeper();
    let current = match protocol_keeper.current_version(ctx.store()) {
        Ok(current) => current,
        Err(err) => {
            error!("Cannot read current protocol version: {}", err);
            return;
        }
    };

    let target = config.protocol_def.version;
    if target <= current {
        warn!(
            "Removing stale upgrade config of proposal {}: version {} is not above current version {}",
            config.proposal_id, target, current
        );
        protocol_keeper.clear_upgrade_config(ctx.multi_store());
        return;
    }

    if ctx.block_height() >= config.protocol_def.height {
        info!(
            "Switch height {} reached, signalling protocol version {}",
            config.protocol_def.height, target
        );
        ctx.emit_event(Event::new(EVENT_TYPE_UPGRADE_APP_VERSION).with_attribute(ATTRIBUTE_KEY_APP_VERSION, target));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_common::*;

    #[test]
    fn test_no_signal_before_switch_height() {
        let mut env = TestEnv::new(&[0, 1]);
        env.schedule(1, 1, 100);
        let keeper = env.keeper();
        let mut ctx = env.ctx(99);
        end_blocker(&mut ctx, &keeper);
        assert!(ctx.events().is_empty());
    }

    #[test]
    fn test_signal_at_switch_height() {
        let mut env = TestEnv::new(&[0, 1]);
        env.schedule(1, 1, 100);
        let keeper = env.keeper();
        let mut ctx = env.ctx(100);
        end_blocker(&mut ctx, &keeper);

        let events = ctx.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EVENT_TYPE_UPGRADE_APP_VERSION);
        assert_eq!(events[0].attribute(ATTRIBUTE_KEY_APP_VERSION), Some("1"));
    }

    #[test]
    fn test_stale_config_removed() {
        let mut env = TestEnv::new(&[0, 1]);
        env.schedule(1, 1, 100);
        let protocol_keeper = env.protocol_keeper().clone();
        protocol_keeper.set_current_version(env.store(), 1);

        let keeper = env.keeper();
        let mut ctx = env.ctx(120);
        end_blocker(&mut ctx, &keeper);
        assert!(ctx.events().is_empty());
        drop(ctx);
        assert!(env.pending_config().is_none());
    }
}
