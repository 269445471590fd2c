// Shared fixtures for the upgrade module's unit tests

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;

use tessera_core::{
    Address, AppError, AppUpgradeProposal, BlockHeader, Context, DecCoins, KnownVersions, MemDb,
    MsgSubmitProposal, MultiStore, ParamsKeeper, ProposalContent, ProtocolDefinition, ProtocolKeeper,
    StoreKey, UpgradeConfig,
};

use crate::expected_keepers::{BankKeeper, StakingKeeper};
use crate::keeper::Keeper;
use crate::types::DEFAULT_PARAMSPACE;

pub struct FakeStaking {
    validators: BTreeSet<Address>,
}

impl StakingKeeper for FakeStaking {
    fn is_validator(&self, _ctx: &Context<'_>, address: &Address) -> Result<bool, AppError> {
        Ok(self.validators.contains(address))
    }
}

pub struct FakeBank {
    balances: BTreeMap<Address, DecCoins>,
}

impl BankKeeper for FakeBank {
    fn get_all_balances(&self, _ctx: &Context<'_>, address: &Address) -> Result<DecCoins, AppError> {
        Ok(self.balances.get(address).cloned().unwrap_or_default())
    }
}

pub fn validator() -> Address {
    Address::from_raw("validator")
}

pub fn outsider() -> Address {
    Address::from_raw("outsider")
}

pub fn upgrade_content(version: u64, height: u64) -> ProposalContent {
    ProposalContent::AppUpgrade(AppUpgradeProposal::new(
        format!("Upgrade to v{}", version),
        "protocol switch",
        ProtocolDefinition::new(
            version,
            format!("https://example.org/tessera/v{}", version),
            height,
            BigDecimal::from_str("0.8").unwrap(),
        ),
    ))
}

pub fn submit_msg(proposer: &Address, deposit: &str, version: u64, height: u64) -> MsgSubmitProposal {
    MsgSubmitProposal {
        content: upgrade_content(version, height),
        initial_deposit: DecCoins::parse(deposit).unwrap(),
        proposer: proposer.clone(),
    }
}

pub struct TestEnv {
    store: MultiStore,
    protocol_keeper: ProtocolKeeper,
    params_keeper: ParamsKeeper,
}

impl TestEnv {
    pub fn new(known: &[u64]) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let main = StoreKey::new("main");
        let upgrade = StoreKey::new("upgrade");
        let params = StoreKey::new("params");
        let mut store = MultiStore::new(Arc::new(MemDb::new()));
        store.mount_all([&main, &upgrade, &params]).unwrap();
        store.load_latest().unwrap();

        let versions = KnownVersions::default();
        for v in known {
            versions.insert(*v);
        }
        TestEnv {
            store,
            protocol_keeper: ProtocolKeeper::new(main, upgrade, versions),
            params_keeper: ParamsKeeper::new(params),
        }
    }

    pub fn keeper(&self) -> Arc<Keeper> {
        let staking = FakeStaking {
            validators: [validator()].into_iter().collect(),
        };
        let rich = DecCoins::parse("5000tsr").unwrap();
        let bank = FakeBank {
            balances: [(validator(), rich.clone()), (outsider(), rich)].into_iter().collect(),
        };
        Arc::new(Keeper::new(
            self.params_keeper.subspace(DEFAULT_PARAMSPACE),
            self.protocol_keeper.clone(),
            Arc::new(staking),
            Arc::new(bank),
        ))
    }

    pub fn protocol_keeper(&self) -> &ProtocolKeeper {
        &self.protocol_keeper
    }

    pub fn store(&mut self) -> &mut MultiStore {
        &mut self.store
    }

    pub fn pending_config(&self) -> Option<UpgradeConfig> {
        self.protocol_keeper.upgrade_config(&self.store).unwrap()
    }

    pub fn ctx(&mut self, height: u64) -> Context<'_> {
        let header = BlockHeader {
            chain_id: "tessera-test".to_string(),
            height,
            time: 0,
        };
        Context::new(&mut self.store, header, false)
    }

    pub fn schedule(&mut self, proposal_id: u64, version: u64, height: u64) {
        let def = ProtocolDefinition::new(version, "https://example.org/tessera", height, BigDecimal::from_str("0.8").unwrap());
        self.protocol_keeper
            .set_upgrade_config(&mut self.store, &UpgradeConfig::new(proposal_id, def))
            .unwrap();
    }
}
