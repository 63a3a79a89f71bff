use fxhash::FxHashMap;
use std::collections::BTreeSet;
use stx_blockstore::{BlockStore, Compression};
use stx_chain::{Chain, GenesisState, INITMINER, INITMINER_KEY_SEED};
use stx_event_bus::EventBus;
use stx_protocol::{AccountName, PrivateKey, TimePointSec};
use stx_witness::{BlockProductionCondition, ProductionParams, maybe_produce_block};
use tempfile::TempDir;

fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

async fn open_chain(dir: &TempDir, genesis: GenesisState) -> Chain {
    let store = BlockStore::builder()
        .root(dir.path().join("blocks"))
        .compression(Compression::None)
        .connect()
        .await
        .unwrap();
    Chain::open(genesis, store, EventBus::new(), 16).await.unwrap()
}

fn initminer_params() -> ProductionParams {
    let key = PrivateKey::regenerate(INITMINER_KEY_SEED);
    let mut keys = FxHashMap::default();
    keys.insert(key.public_key(), key);
    ProductionParams {
        witnesses: BTreeSet::from([name(INITMINER)]),
        keys,
        required_participation: 33,
        enable_stale_production: true,
    }
}

#[tokio::test]
async fn stale_chain_blocks_production_until_opted_in() {
    // The default genesis lies years in the past, so the chain looks stale.
    let dir = TempDir::new().unwrap();
    let chain = open_chain(&dir, GenesisState::default()).await;

    let params = ProductionParams { enable_stale_production: false, ..initminer_params() };
    let mut enabled = false;

    let condition = maybe_produce_block(&chain, &params, &mut enabled).await;
    assert_eq!(condition, BlockProductionCondition::NotSynced);
    assert!(!enabled);
}

#[tokio::test]
async fn foreign_slots_are_not_produced() {
    let dir = TempDir::new().unwrap();
    let chain = open_chain(&dir, GenesisState::default()).await;

    // This node only controls "alice", but initminer owns every slot.
    let params = ProductionParams {
        witnesses: BTreeSet::from([name("alice")]),
        ..initminer_params()
    };
    let mut enabled = true;

    let condition = maybe_produce_block(&chain, &params, &mut enabled).await;
    assert_eq!(condition, BlockProductionCondition::NotMyTurn);
}

#[tokio::test]
async fn missing_signing_key_is_reported() {
    let dir = TempDir::new().unwrap();
    let chain = open_chain(&dir, GenesisState::default()).await;

    let params = ProductionParams { keys: FxHashMap::default(), ..initminer_params() };
    let mut enabled = true;

    let condition = maybe_produce_block(&chain, &params, &mut enabled).await;
    assert_eq!(condition, BlockProductionCondition::NoPrivateKey);
}

#[tokio::test]
async fn future_genesis_waits() {
    let dir = TempDir::new().unwrap();
    let genesis = GenesisState {
        genesis_time: TimePointSec::now().saturating_add_secs(3600),
        ..GenesisState::default()
    };
    let chain = open_chain(&dir, genesis).await;

    let params = initminer_params();
    let mut enabled = true;

    let condition = maybe_produce_block(&chain, &params, &mut enabled).await;
    assert_eq!(condition, BlockProductionCondition::WaitForGenesis);
}

#[tokio::test]
async fn production_happens_at_a_live_slot_boundary() {
    // Anchor genesis so the next slot boundary is close to the wall clock,
    // then tick until the loop catches a boundary inside its lag window.
    let dir = TempDir::new().unwrap();
    let genesis = GenesisState {
        genesis_time: TimePointSec::now().saturating_sub_secs(2),
        ..GenesisState::default()
    };
    let chain = open_chain(&dir, genesis).await;

    let params = initminer_params();
    let mut enabled = true;
    let mut produced = false;

    for _ in 0..40 {
        match maybe_produce_block(&chain, &params, &mut enabled).await {
            BlockProductionCondition::Produced => {
                produced = true;
                break;
            },
            BlockProductionCondition::NotTimeYet | BlockProductionCondition::Lag => {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            },
            other => panic!("Unexpected production condition: {other:?}"),
        }
    }

    assert!(produced, "The loop should produce within two slot intervals");
    assert_eq!(chain.head_block_num(), 1);
}
