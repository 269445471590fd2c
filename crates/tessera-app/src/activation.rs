// Post-end-block activation hook
// Owned by the host, never by a protocol version: it is the code that moves
// the node from one version to the next.
//
// SAFETY INVARIANTS:
// 1. Runs after the installed end blocker of every block
// 2. Stale or duplicate signals (target <= current) are ignored
// 3. Failure is reported as a ledger event; the block still commits
// 4. A pending upgrade config is cleared only by activating the version it names

use std::sync::Arc;

use log::{debug, error, info, warn};

use tessera_core::{Context, Event, TxCodec};
use tessera_protocol::Engine;
use tessera_upgrade::{
    ATTRIBUTE_KEY_APP_VERSION, ATTRIBUTE_KEY_UPGRADE_FAILURE, EVENT_TYPE_UPGRADE_APP_VERSION,
    EVENT_TYPE_UPGRADE_FAILURE,
};

use crate::hooks::HookSlots;

const INSTALL_MESSAGE: &str = "Please install the right application version";

/// Target version carried by the first app-version signal of the block
fn signalled_version(ctx: &Context<'_>) -> Option<Result<u64, String>> {
    ctx.events()
        .iter()
        .filter(|e| e.kind == EVENT_TYPE_UPGRADE_APP_VERSION)
        .find_map(|e| e.attribute(ATTRIBUTE_KEY_APP_VERSION))
        .map(|raw| raw.parse::<u64>().map_err(|_| raw.to_string()))
}

pub fn post_end_blocker(
    engine: &mut Engine,
    hooks: &mut HookSlots,
    tx_decoder: &mut Arc<dyn TxCodec>,
    ctx: &mut Context<'_>,
) {
    let target = match signalled_version(ctx) {
        None => return,
        Some(Ok(target)) => target,
        Some(Err(raw)) => {
            error!("Ignoring app version signal with malformed version {:?}", raw);
            return;
        }
    };

    let current = engine.current_version();
    if target <= current {
        debug!(
            "Ignoring app version signal for {}: version {} is already active",
            target, current
        );
        return;
    }

    if engine.activate(target, ctx.multi_store(), hooks) {
        if let Some(protocol) = engine.current_protocol() {
            *tx_decoder = protocol.codec();
        }
        let keeper = engine.protocol_keeper();
        match keeper.upgrade_config(ctx.store()) {
            Ok(Some(config)) if config.protocol_def.version == target => {
                keeper.clear_upgrade_config(ctx.multi_store());
            }
            Ok(Some(config)) => warn!(
                "Keeping pending upgrade config for version {}: version {} was activated",
                config.protocol_def.version, target
            ),
            Ok(None) => {}
            Err(err) => error!("Cannot read pending upgrade config: {}", err),
        }
        info!(
            "Application upgraded to protocol version {} at height {} (tx codec: {})",
            target,
            ctx.block_height(),
            tx_decoder.name()
        );
        return;
    }

    let keeper = engine.protocol_keeper();
    keeper.set_last_failed_version(ctx.multi_store(), target);
    let message = match keeper.upgrade_config(ctx.store()) {
        Ok(Some(config)) => format!("{} from {}", INSTALL_MESSAGE, config.protocol_def.software),
        Ok(None) => INSTALL_MESSAGE.to_string(),
        Err(err) => {
            error!("Cannot read pending upgrade config: {}", err);
            INSTALL_MESSAGE.to_string()
        }
    };
    error!(
        "Activation of protocol version {} failed at height {}: {}",
        target,
        ctx.block_height(),
        message
    );
    ctx.emit_event(Event::new(EVENT_TYPE_UPGRADE_FAILURE).with_attribute(ATTRIBUTE_KEY_UPGRADE_FAILURE, message));
}
