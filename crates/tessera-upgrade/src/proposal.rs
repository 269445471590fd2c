// Execution of a passed upgrade proposal
//
// The proposal has already passed governance when this runs. A failed
// re-check only skips the upgrade: the outcome of the vote is ledger
// history and the enclosing block must not fail because of it.

use std::sync::Arc;

use log::{error, info};

use tessera_core::{AppError, AppUpgradeProposal, Context, GovHandler, Proposal, ProposalContent, UpgradeConfig};

use crate::errors;
use crate::keeper::Keeper;

pub fn new_app_upgrade_proposal_handler(keeper: Arc<Keeper>) -> GovHandler {
    Arc::new(move |ctx: &mut Context<'_>, proposal: &Proposal| match &proposal.content {
        ProposalContent::AppUpgrade(content) => handle_app_upgrade_proposal(ctx, &keeper, proposal.id, content),
        other => Err(errors::err_unsupported_content(other.proposal_type())),
    })
}

pub fn handle_app_upgrade_proposal(
    ctx: &mut Context<'_>,
    keeper: &Keeper,
    proposal_id: u64,
    content: &AppUpgradeProposal,
) -> Result<(), AppError> {
    info!("Executing AppUpgradeProposal {}", proposal_id);
    let def = &content.protocol_definition;
    let protocol_keeper = keeper.protocol_keeper();

    if let Some(pending) = protocol_keeper.upgrade_config(ctx.store())? {
        error!(
            "AppUpgradeProposal {} passed but upgrade skipped: switch period of proposal {} is in process",
            proposal_id, pending.proposal_id
        );
        return Ok(());
    }

    if !protocol_keeper.is_valid_version(ctx.store(), def.version)? {
        error!(
            "AppUpgradeProposal {} passed but upgrade skipped: version {} is not valid",
            proposal_id, def.version
        );
        return Ok(());
    }

    if ctx.block_height() + 1 >= def.height {
        error!(
            "AppUpgradeProposal {} passed but upgrade skipped: switch height {} must be more than one block past current height {}",
            proposal_id,
            def.height,
            ctx.block_height()
        );
        return Ok(());
    }

    protocol_keeper.set_upgrade_config(ctx.multi_store(), &UpgradeConfig::new(proposal_id, def.clone()))?;
    info!("AppUpgradeProposal {} executed: {}", proposal_id, def);
    Ok(())
}
