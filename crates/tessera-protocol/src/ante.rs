// Ante handlers
// Signature, fee and sequence checks run before a transaction's messages.
//
// SAFETY INVARIANTS:
// 1. Every message must be signed by the transaction signer
// 2. Fees are deducted before any message runs
// 3. Every version checks and bumps the signer's account sequence
// 4. Simulation skips the signature check and nothing else

use std::sync::Arc;

use log::debug;

use tessera_core::{Address, AnteHandler, AppError, Context, DecCoins, Tx};

use crate::modules::{AccountKeeper, BankKeeper};

/// Module account receiving transaction fees
pub const FEE_COLLECTOR: &str = "fee_collector";

pub fn fee_collector_address() -> Address {
    Address::module(FEE_COLLECTOR)
}

/// Stateless checks shared by every version. Returns the signer.
fn verify_tx(ctx: &Context<'_>, tx: &Tx, simulate: bool) -> Result<Address, AppError> {
    if tx.body.msgs.is_empty() {
        return Err(AppError::invalid_request("transaction must contain at least one message"));
    }
    let signer = if simulate {
        tx.signer()?
    } else {
        tx.verify(ctx.chain_id())?
    };
    for msg in &tx.body.msgs {
        msg.validate_basic()?;
        if let Some(other) = msg.signers().into_iter().find(|s| **s != signer) {
            return Err(AppError::unauthorized(format!(
                "{} message must be signed by {}, got {}",
                msg.kind(),
                other,
                signer
            )));
        }
    }
    Ok(signer)
}

fn deduct_fee(ctx: &mut Context<'_>, bank: &BankKeeper, payer: &Address, fee: &DecCoins) -> Result<(), AppError> {
    if fee.is_empty() {
        return Ok(());
    }
    bank.send_coins(ctx, payer, &fee_collector_address(), fee)
        .map_err(|e| AppError::insufficient_fee(format!("cannot pay fee {}: {}", fee, e.message)))
}

/// Returns the signer's current sequence if the transaction carries it
fn check_sequence(ctx: &Context<'_>, accounts: &AccountKeeper, signer: &Address, tx: &Tx) -> Result<u64, AppError> {
    let expected = accounts.sequence(ctx, signer)?;
    if tx.body.sequence != expected {
        return Err(AppError::invalid_sequence(format!(
            "expected sequence {} for {}, got {}",
            expected, signer, tx.body.sequence
        )));
    }
    Ok(expected)
}

/// Version 0: signatures, account sequences and fee deduction
pub struct AnteV0 {
    bank: Arc<BankKeeper>,
    accounts: Arc<AccountKeeper>,
}

impl AnteV0 {
    pub fn new(bank: Arc<BankKeeper>, accounts: Arc<AccountKeeper>) -> Self {
        AnteV0 { bank, accounts }
    }
}

impl AnteHandler for AnteV0 {
    fn version(&self) -> u64 {
        0
    }

    fn ante(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool) -> Result<(), AppError> {
        let signer = verify_tx(ctx, tx, simulate)?;
        let sequence = check_sequence(ctx, &self.accounts, &signer, tx)?;
        deduct_fee(ctx, &self.bank, &signer, &tx.body.fee)?;
        self.accounts.set_sequence(ctx, &signer, sequence + 1);
        Ok(())
    }
}

/// Version 1: adds a minimum fee
pub struct AnteV1 {
    bank: Arc<BankKeeper>,
    accounts: Arc<AccountKeeper>,
    min_fee: DecCoins,
}

impl AnteV1 {
    pub fn new(bank: Arc<BankKeeper>, accounts: Arc<AccountKeeper>, min_fee: DecCoins) -> Self {
        AnteV1 { bank, accounts, min_fee }
    }
}

impl AnteHandler for AnteV1 {
    fn version(&self) -> u64 {
        1
    }

    fn ante(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool) -> Result<(), AppError> {
        let signer = verify_tx(ctx, tx, simulate)?;

        if !tx.body.fee.is_all_gte(&self.min_fee) {
            return Err(AppError::insufficient_fee(format!(
                "fee {} is below the minimum {}",
                tx.body.fee, self.min_fee
            )));
        }

        let expected = check_sequence(ctx, &self.accounts, &signer, tx)?;
        deduct_fee(ctx, &self.bank, &signer, &tx.body.fee)?;
        self.accounts.set_sequence(ctx, &signer, expected + 1);
        debug!("Ante passed for {} at sequence {}", signer, expected);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use tessera_core::error::{CODE_INSUFFICIENT_FEE, CODE_INVALID_SEQUENCE, CODE_UNAUTHORIZED};
    use tessera_core::{BankMsg, BlockHeader, MemDb, Msg, MultiStore, StoreKey, TxBody};

    const CHAIN_ID: &str = "ante-test";

    fn setup() -> (MultiStore, Arc<BankKeeper>, Arc<AccountKeeper>) {
        let mut store = MultiStore::new(Arc::new(MemDb::new()));
        store.mount(&StoreKey::new("bank")).unwrap();
        store.mount(&StoreKey::new("auth")).unwrap();
        store.load_latest().unwrap();
        (
            store,
            Arc::new(BankKeeper::new(StoreKey::new("bank"))),
            Arc::new(AccountKeeper::new(StoreKey::new("auth"))),
        )
    }

    fn header() -> BlockHeader {
        BlockHeader {
            chain_id: CHAIN_ID.into(),
            height: 1,
            time: 0,
        }
    }

    fn send_tx(key: &SigningKey, from: Address, fee: &str, sequence: u64) -> Tx {
        let body = TxBody {
            msgs: vec![Msg::Bank(BankMsg::Send {
                from,
                to: Address::from_raw("bob"),
                amount: DecCoins::parse("1tsr").unwrap(),
            })],
            fee: DecCoins::parse(fee).unwrap(),
            memo: String::new(),
            sequence,
        };
        Tx::sign(body, CHAIN_ID, key).unwrap()
    }

    #[test]
    fn test_v0_deducts_fee() {
        let (mut store, bank, accounts) = setup();
        let mut ctx = Context::new(&mut store, header(), false);
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let alice = Address::from_pubkey(&key.verifying_key());
        bank.add_coins(&mut ctx, &alice, &DecCoins::parse("10tsr").unwrap()).unwrap();

        let ante = AnteV0::new(bank.clone(), accounts);
        ante.ante(&mut ctx, &send_tx(&key, alice.clone(), "3tsr", 0), false).unwrap();
        assert_eq!(bank.get_balance(&ctx, &alice).unwrap(), DecCoins::parse("7tsr").unwrap());
        assert_eq!(
            bank.get_balance(&ctx, &fee_collector_address()).unwrap(),
            DecCoins::parse("3tsr").unwrap()
        );

        let err = ante.ante(&mut ctx, &send_tx(&key, alice, "30tsr", 1), false).unwrap_err();
        assert_eq!(err.code, CODE_INSUFFICIENT_FEE);
    }

    #[test]
    fn test_v0_rejects_replayed_tx() {
        let (mut store, bank, accounts) = setup();
        let mut ctx = Context::new(&mut store, header(), false);
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let alice = Address::from_pubkey(&key.verifying_key());
        bank.add_coins(&mut ctx, &alice, &DecCoins::parse("10tsr").unwrap()).unwrap();

        let ante = AnteV0::new(bank.clone(), accounts.clone());
        let tx = send_tx(&key, alice.clone(), "1tsr", 0);
        ante.ante(&mut ctx, &tx, false).unwrap();
        assert_eq!(accounts.sequence(&ctx, &alice).unwrap(), 1);

        for _ in 0..2 {
            let err = ante.ante(&mut ctx, &tx, false).unwrap_err();
            assert_eq!(err.code, CODE_INVALID_SEQUENCE);
        }
        assert_eq!(bank.get_balance(&ctx, &alice).unwrap(), DecCoins::parse("9tsr").unwrap());

        ante.ante(&mut ctx, &send_tx(&key, alice.clone(), "1tsr", 1), false).unwrap();
        assert_eq!(accounts.sequence(&ctx, &alice).unwrap(), 2);
    }

    #[test]
    fn test_foreign_signer_rejected() {
        let (mut store, bank, accounts) = setup();
        let mut ctx = Context::new(&mut store, header(), false);
        let key = SigningKey::from_bytes(&[1u8; 32]);

        let tx = send_tx(&key, Address::from_raw("someone-else"), "", 0);
        let err = AnteV0::new(bank, accounts).ante(&mut ctx, &tx, false).unwrap_err();
        assert_eq!(err.code, CODE_UNAUTHORIZED);
    }

    #[test]
    fn test_tampered_signature_rejected_unless_simulating() {
        let (mut store, bank, accounts) = setup();
        let mut ctx = Context::new(&mut store, header(), false);
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let alice = Address::from_pubkey(&key.verifying_key());

        let mut tx = send_tx(&key, alice, "", 0);
        tx.body.memo = "changed after signing".into();
        let ante = AnteV0::new(bank, accounts);
        assert_eq!(ante.ante(&mut ctx, &tx, false).unwrap_err().code, CODE_UNAUTHORIZED);
        ante.ante(&mut ctx, &tx, true).unwrap();
    }

    #[test]
    fn test_v1_sequence_and_min_fee() {
        let (mut store, bank, accounts) = setup();
        let mut ctx = Context::new(&mut store, header(), false);
        let key = SigningKey::from_bytes(&[2u8; 32]);
        let alice = Address::from_pubkey(&key.verifying_key());
        bank.add_coins(&mut ctx, &alice, &DecCoins::parse("10tsr").unwrap()).unwrap();

        let ante = AnteV1::new(bank, accounts.clone(), DecCoins::parse("1tsr").unwrap());
        let err = ante.ante(&mut ctx, &send_tx(&key, alice.clone(), "", 0), false).unwrap_err();
        assert_eq!(err.code, CODE_INSUFFICIENT_FEE);

        ante.ante(&mut ctx, &send_tx(&key, alice.clone(), "1tsr", 0), false).unwrap();
        assert_eq!(accounts.sequence(&ctx, &alice).unwrap(), 1);

        let err = ante.ante(&mut ctx, &send_tx(&key, alice.clone(), "1tsr", 0), false).unwrap_err();
        assert_eq!(err.code, CODE_INVALID_SEQUENCE);
        ante.ante(&mut ctx, &send_tx(&key, alice, "1tsr", 1), false).unwrap();
    }
}
