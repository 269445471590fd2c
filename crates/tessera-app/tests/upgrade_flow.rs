use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use ed25519_dalek::SigningKey;

use tessera_app::{NodeError, TesseraApp, QUERY_APP_VERSION};
use tessera_core::error::{CODE_INSUFFICIENT_FEE, CODE_INVALID_SEQUENCE, CODE_TX_DECODE};
use tessera_core::{
    Address, AppUpgradeProposal, BankMsg, BlockHeader, DecCoins, GovMsg, MemDb, Msg, MsgSubmitProposal,
    ProposalContent, ProtocolDefinition, RequestBeginBlock, RequestEndBlock, RequestInitChain, RequestQuery,
    ResponseDeliverTx, ResponseEndBlock, Tx, TxBody, TxCodec, VoteOption,
};
use tessera_protocol::{new_protocol_keeper, BincodeTxCodec, JsonTxCodec, ProtocolV0};
use tessera_upgrade::errors::{CODE_INVALID_VERSION, CODE_SWITCH_PERIOD_IN_PROCESS};
use tessera_upgrade::{ATTRIBUTE_KEY_UPGRADE_FAILURE, EVENT_TYPE_UPGRADE_APP_VERSION, EVENT_TYPE_UPGRADE_FAILURE};

const CHAIN_ID: &str = "tessera-upgrade-test";
const SOFTWARE: &str = "https://example.org/tessera/v1";
const SWITCH_HEIGHT: u64 = 100;

fn validator_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

fn validator() -> Address {
    Address::from_pubkey(&validator_key().verifying_key())
}

fn start(db: &Arc<MemDb>) -> TesseraApp {
    let _ = env_logger::builder().is_test(true).try_init();
    TesseraApp::new(CHAIN_ID, db.clone()).unwrap()
}

/// A node whose binary only ships version 0
fn start_v0_only(db: &Arc<MemDb>) -> Result<TesseraApp, NodeError> {
    let keeper = new_protocol_keeper();
    TesseraApp::with_protocols(CHAIN_ID, db.clone(), keeper.clone(), vec![Box::new(ProtocolV0::new(keeper))])
}

fn init(app: &mut TesseraApp) {
    let genesis = serde_json::json!({
        "staking": { "validators": [{ "address": validator().as_str(), "power": 10 }] },
        "bank": { "balances": [{ "address": validator().as_str(), "coins": [{ "denom": "tsr", "amount": "5000" }] }] }
    });
    let res = app
        .init_chain(RequestInitChain {
            chain_id: CHAIN_ID.into(),
            app_state: serde_json::from_value(genesis).unwrap(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(res.validators.len(), 1);
}

fn run_block(app: &mut TesseraApp, txs: &[Vec<u8>]) -> (Vec<ResponseDeliverTx>, ResponseEndBlock) {
    let height = app.last_block_height() + 1;
    let header = BlockHeader {
        chain_id: CHAIN_ID.into(),
        height,
        time: height * 5,
    };
    app.begin_block(RequestBeginBlock { header }).unwrap();
    let results = txs.iter().map(|tx| app.deliver_tx(tx).unwrap()).collect();
    let end = app.end_block(RequestEndBlock { height }).unwrap();
    let commit = app.commit().unwrap();
    assert_eq!(commit.height, height);
    (results, end)
}

fn run_until(app: &mut TesseraApp, height: u64) {
    while app.last_block_height() < height {
        let (_, end) = run_block(app, &[]);
        assert!(end.find_event(EVENT_TYPE_UPGRADE_FAILURE).is_none());
    }
}

fn signed(msgs: Vec<Msg>, fee: &str, sequence: u64) -> Tx {
    let body = TxBody {
        msgs,
        fee: if fee.is_empty() { DecCoins::default() } else { DecCoins::parse(fee).unwrap() },
        memo: String::new(),
        sequence,
    };
    Tx::sign(body, CHAIN_ID, &validator_key()).unwrap()
}

fn upgrade_proposal(version: u64) -> Msg {
    Msg::Gov(GovMsg::SubmitProposal(MsgSubmitProposal {
        content: ProposalContent::AppUpgrade(AppUpgradeProposal::new(
            format!("Upgrade to v{}", version),
            "switch to json transactions and sequences",
            ProtocolDefinition::new(version, SOFTWARE, SWITCH_HEIGHT, BigDecimal::from_str("0.8").unwrap()),
        )),
        initial_deposit: DecCoins::parse("1000tsr").unwrap(),
        proposer: validator(),
    }))
}

fn yes_vote(proposal_id: u64) -> Msg {
    Msg::Gov(GovMsg::Vote {
        proposal_id,
        voter: validator(),
        option: VoteOption::Yes,
    })
}

fn send(amount: &str) -> Msg {
    Msg::Bank(BankMsg::Send {
        from: validator(),
        to: Address::from_raw("bob"),
        amount: DecCoins::parse(amount).unwrap(),
    })
}

fn v0_bytes(tx: &Tx) -> Vec<u8> {
    BincodeTxCodec.encode_tx(tx).unwrap()
}

fn balance(app: &mut TesseraApp, address: &Address) -> BigDecimal {
    let res = app.query(&RequestQuery {
        path: format!("custom/bank/balances/{}", address),
        data: Vec::new(),
    });
    assert!(res.is_ok(), "{}", res.log);
    let coins: DecCoins = serde_json::from_slice(&res.value).unwrap();
    coins.amount_of("tsr")
}

/// Genesis, proposal at height 10 and its vote, tally at 30
fn schedule_upgrade(app: &mut TesseraApp) {
    init(app);
    run_until(app, 9);
    let (results, _) = run_block(
        app,
        &[
            v0_bytes(&signed(vec![upgrade_proposal(1)], "", 0)),
            v0_bytes(&signed(vec![yes_vote(1)], "", 1)),
        ],
    );
    assert!(results.iter().all(|r| r.is_ok()), "{:?}", results);
    assert_eq!(results[0].data, 1u64.to_be_bytes().to_vec());

    run_until(app, 30);
    let config = app.upgrade_config().unwrap().expect("upgrade scheduled");
    assert_eq!(config.proposal_id, 1);
    assert_eq!(config.protocol_def.height, SWITCH_HEIGHT);
}

#[test]
fn test_upgrade_activates_at_switch_height() {
    let db = Arc::new(MemDb::new());
    let mut app = start(&db);
    schedule_upgrade(&mut app);

    // further proposals are refused while the first is pending; their sequences are still spent
    let (results, _) = run_block(
        &mut app,
        &[
            v0_bytes(&signed(vec![upgrade_proposal(2)], "", 2)),
            v0_bytes(&signed(vec![upgrade_proposal(1)], "", 3)),
        ],
    );
    assert_eq!(results[0].code, CODE_INVALID_VERSION);
    assert_eq!(results[1].code, CODE_SWITCH_PERIOD_IN_PROCESS);
    assert_eq!(app.upgrade_config().unwrap().map(|c| c.proposal_id), Some(1));

    run_until(&mut app, SWITCH_HEIGHT - 1);
    assert_eq!(app.current_version(), 0);
    assert_eq!(app.tx_codec().name(), "bincode");

    let (_, end) = run_block(&mut app, &[]);
    assert!(end.find_event(EVENT_TYPE_UPGRADE_APP_VERSION).is_some());
    assert!(end.find_event(EVENT_TYPE_UPGRADE_FAILURE).is_none());
    assert_eq!(app.current_version(), 1);
    assert_eq!(app.tx_codec().name(), "json");
    assert_eq!(app.hooks().ante_handler().unwrap().version(), 1);
    assert!(app.upgrade_config().unwrap().is_none());

    let res = app.query(&RequestQuery {
        path: QUERY_APP_VERSION.into(),
        data: Vec::new(),
    });
    let version: serde_json::Value = serde_json::from_slice(&res.value).unwrap();
    assert_eq!(version["version"], 1);

    // version 1 decodes json, checks fees and keeps the sequences counted under version 0
    let bincode_tx = v0_bytes(&signed(vec![send("1tsr")], "1tsr", 4));
    let no_fee = JsonTxCodec.encode_tx(&signed(vec![send("1tsr")], "", 4)).unwrap();
    let good = JsonTxCodec.encode_tx(&signed(vec![send("1tsr")], "1tsr", 4)).unwrap();
    let replay = good.clone();
    let (results, end) = run_block(&mut app, &[bincode_tx, no_fee, good, replay]);
    assert_eq!(results[0].code, CODE_TX_DECODE);
    assert_eq!(results[1].code, CODE_INSUFFICIENT_FEE);
    assert!(results[2].is_ok(), "{}", results[2].log);
    assert_eq!(results[3].code, CODE_INVALID_SEQUENCE);
    assert!(end.find_event(EVENT_TYPE_UPGRADE_APP_VERSION).is_none());
    assert_eq!(balance(&mut app, &Address::from_raw("bob")), BigDecimal::from(1));
}

#[test]
fn test_restart_restores_activated_version() {
    let db = Arc::new(MemDb::new());
    let mut app = start(&db);
    schedule_upgrade(&mut app);
    run_until(&mut app, SWITCH_HEIGHT);
    assert_eq!(app.current_version(), 1);
    let height = app.last_block_height();
    drop(app);

    let app = start(&db);
    assert_eq!(app.current_version(), 1);
    assert_eq!(app.last_block_height(), height);
    assert_eq!(app.tx_codec().name(), "json");
    assert_eq!(app.hooks().router().unwrap().version(), 1);
}

#[test]
fn test_missing_binary_reports_failure_until_upgraded() {
    let db = Arc::new(MemDb::new());
    let mut app = start(&db);
    schedule_upgrade(&mut app);
    drop(app);

    let mut old = start_v0_only(&db).unwrap();
    run_until(&mut old, SWITCH_HEIGHT - 1);
    for _ in 0..2 {
        let (_, end) = run_block(&mut old, &[]);
        let failure = end.find_event(EVENT_TYPE_UPGRADE_FAILURE).expect("failure event");
        assert_eq!(
            failure.attribute(ATTRIBUTE_KEY_UPGRADE_FAILURE),
            Some(format!("Please install the right application version from {}", SOFTWARE).as_str())
        );
        assert_eq!(old.current_version(), 0);
        assert_eq!(old.last_failed_version().unwrap(), 1);
        assert!(old.upgrade_config().unwrap().is_some());
    }
    drop(old);

    let mut app = start(&db);
    assert_eq!(app.current_version(), 0);
    let (_, end) = run_block(&mut app, &[]);
    assert!(end.find_event(EVENT_TYPE_UPGRADE_FAILURE).is_none());
    assert_eq!(app.current_version(), 1);
    assert!(app.upgrade_config().unwrap().is_none());
}

#[test]
fn test_unsupported_persisted_version_refuses_to_start() {
    let db = Arc::new(MemDb::new());
    let mut app = start(&db);
    schedule_upgrade(&mut app);
    run_until(&mut app, SWITCH_HEIGHT);
    drop(app);

    match start_v0_only(&db) {
        Err(NodeError::UnsupportedProtocol { version, known }) => {
            assert_eq!(version, 1);
            assert_eq!(known, vec![0]);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("node started on a version it does not ship"),
    }
}

#[test]
fn test_check_tx_leaves_state_untouched() {
    let db = Arc::new(MemDb::new());
    let mut app = start(&db);
    init(&mut app);
    run_until(&mut app, 1);

    let before = balance(&mut app, &validator());
    let res = app.check_tx(&v0_bytes(&signed(vec![send("10tsr")], "5tsr", 0))).unwrap();
    assert!(res.is_ok(), "{}", res.log);
    assert_eq!(balance(&mut app, &validator()), before);

    let res = app.check_tx(b"not a transaction").unwrap();
    assert_eq!(res.code, CODE_TX_DECODE);
}

#[test]
fn test_failed_message_keeps_fee() {
    let db = Arc::new(MemDb::new());
    let mut app = start(&db);
    init(&mut app);

    let (results, _) = run_block(&mut app, &[v0_bytes(&signed(vec![send("100000tsr")], "5tsr", 0))]);
    assert!(!results[0].is_ok());
    assert_eq!(balance(&mut app, &validator()), BigDecimal::from(4995));
    assert_eq!(balance(&mut app, &Address::from_raw("bob")), BigDecimal::from(0));
}

#[test]
fn test_v0_replayed_tx_is_rejected() {
    let db = Arc::new(MemDb::new());
    let mut app = start(&db);
    init(&mut app);

    let tx = v0_bytes(&signed(vec![send("10tsr")], "", 0));
    let (results, _) = run_block(&mut app, &[tx.clone(), tx.clone(), tx.clone()]);
    assert!(results[0].is_ok(), "{}", results[0].log);
    assert_eq!(results[1].code, CODE_INVALID_SEQUENCE);
    assert_eq!(results[2].code, CODE_INVALID_SEQUENCE);

    let (results, _) = run_block(&mut app, &[tx]);
    assert_eq!(results[0].code, CODE_INVALID_SEQUENCE);
    assert_eq!(balance(&mut app, &Address::from_raw("bob")), BigDecimal::from(10));

    let res = app.query(&RequestQuery {
        path: format!("custom/auth/sequence/{}", validator()),
        data: Vec::new(),
    });
    assert!(res.is_ok(), "{}", res.log);
    assert_eq!(serde_json::from_slice::<u64>(&res.value).unwrap(), 1);
}

#[test]
fn test_deliver_outside_block_is_rejected() {
    let db = Arc::new(MemDb::new());
    let mut app = start(&db);
    init(&mut app);
    let tx = v0_bytes(&signed(vec![send("1tsr")], "", 0));
    assert!(matches!(app.deliver_tx(&tx), Err(NodeError::NotInBlock(_))));
}

#[test]
fn test_export_genesis_reflects_state() {
    let db = Arc::new(MemDb::new());
    let mut app = start(&db);
    init(&mut app);
    run_until(&mut app, 2);

    let genesis = app.export_genesis().unwrap();
    assert!(genesis.contains_key("bank"));
    assert!(genesis.contains_key("staking"));
    assert!(genesis.contains_key("auth"));
}
