use crate::context::Context;
use crate::error::AppError;
use crate::tx::Tx;

/// Pre-execution checks run before any message of a transaction.
///
/// Writes made here (fee deduction, sequence bumps) survive a failing
/// message but are discarded together with the transaction if `ante` fails.
pub trait AnteHandler: Send + Sync {
    /// Protocol version that installed this handler
    fn version(&self) -> u64;

    fn ante(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool) -> Result<(), AppError>;
}
