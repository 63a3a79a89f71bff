use std::sync::Arc;
use stx_account_history::HistoryIndex;
use stx_blockstore::{BlockStore, Compression};
use stx_chain::{Chain, GenesisState, INITMINER, INITMINER_KEY_SEED, InitialAccount, SkipFlags};
use stx_event_bus::EventBus;
use stx_kernel::rpc::ApiRegistry;
use stx_protocol::operations::TransferOperation;
use stx_protocol::{
    AccountName, Asset, Operation, PrivateKey, SignedTransaction, Transaction,
};
use tempfile::TempDir;

fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

fn alice_key() -> PrivateKey {
    PrivateKey::regenerate("alice")
}

async fn open_chain(dir: &TempDir) -> (Chain, Arc<HistoryIndex>) {
    let mut genesis = GenesisState::default();
    genesis.initial_accounts.push(InitialAccount {
        name: name("alice"),
        key: alice_key().public_key(),
        balance: Asset::sphtx(1000),
    });

    let store = BlockStore::builder()
        .root(dir.path().join("blocks"))
        .compression(Compression::None)
        .connect()
        .await
        .unwrap();
    let chain = Chain::open(genesis, store, EventBus::new(), 64).await.unwrap();

    let index = Arc::new(HistoryIndex::new());
    chain.add_observer(index.clone());
    (chain, index)
}

async fn transfer(chain: &Chain, amount: i64) {
    let mut trx = Transaction {
        operations: vec![Operation::Transfer(TransferOperation {
            from: name("alice"),
            to: name(INITMINER),
            amount: Asset::sphtx(amount),
            memo: String::new(),
        })],
        ..Default::default()
    };
    chain.with_state(|s| trx.set_reference_block(&s.head_block_id()));
    trx.set_expiration(chain.head_block_time().saturating_add_secs(120));
    let mut signed = SignedTransaction::new(trx);
    signed.sign(&alice_key(), &chain.chain_id()).unwrap();
    chain.push_transaction(signed, SkipFlags::empty()).unwrap();

    let when = chain.with_state(|s| s.get_slot_time(1));
    chain
        .generate_block(
            when,
            name(INITMINER),
            &PrivateKey::regenerate(INITMINER_KEY_SEED),
            SkipFlags::empty(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn both_sides_of_a_transfer_get_history() {
    let dir = TempDir::new().unwrap();
    let (chain, index) = open_chain(&dir).await;

    transfer(&chain, 10).await;

    assert_eq!(index.account_length(&name("alice")), 1);
    assert_eq!(index.account_length(&name(INITMINER)), 1);

    let window = index.account_window(&name("alice"), -1, 10);
    assert_eq!(window.len(), 1);
    let (seq, entry) = &window[0];
    assert_eq!(*seq, 0);
    assert_eq!(entry.block, 1);
    assert_eq!(entry.timestamp, chain.head_block_time());
    assert!(matches!(entry.op, Operation::Transfer(_)));
}

#[tokio::test]
async fn windows_page_backwards_from_the_newest_entry() {
    let dir = TempDir::new().unwrap();
    let (chain, index) = open_chain(&dir).await;

    for n in 1..=5 {
        transfer(&chain, n).await;
    }

    assert_eq!(index.account_length(&name("alice")), 5);

    let newest_two = index.account_window(&name("alice"), -1, 2);
    let seqs: Vec<u64> = newest_two.iter().map(|(seq, _)| *seq).collect();
    assert_eq!(seqs, vec![3, 4]);

    let middle = index.account_window(&name("alice"), 2, 2);
    let seqs: Vec<u64> = middle.iter().map(|(seq, _)| *seq).collect();
    assert_eq!(seqs, vec![1, 2]);

    // Clamped at the oldest entry.
    let oldest = index.account_window(&name("alice"), 0, 10);
    assert_eq!(oldest.len(), 1);

    // Unknown accounts have empty history.
    assert!(index.account_window(&name("nobody"), -1, 10).is_empty());
}

#[tokio::test]
async fn popped_blocks_disappear_from_history() {
    let dir = TempDir::new().unwrap();
    let (chain, index) = open_chain(&dir).await;

    transfer(&chain, 1).await;
    transfer(&chain, 2).await;
    assert_eq!(index.account_length(&name("alice")), 2);

    chain.pop_block().await.unwrap();
    assert_eq!(index.account_length(&name("alice")), 1);
}

#[tokio::test]
async fn transactions_resolve_by_id_over_the_api() {
    let dir = TempDir::new().unwrap();
    let (chain, index) = open_chain(&dir).await;

    let registry = ApiRegistry::new();
    stx_account_history::api::register_api(&registry, &index, &chain);

    transfer(&chain, 7).await;

    let id = chain.with_state(|s| *s.transaction_index.keys().next().unwrap());
    let body = format!(
        r#"{{"jsonrpc":"2.0","method":"account_history_api.get_transaction","params":{{"id":"{id}"}},"id":1}}"#
    );
    let response = registry.call(&body).await;
    let parsed: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(parsed["result"]["block_num"], 1);
    assert_eq!(parsed["result"]["transaction_num"], 0);

    let body = r#"{"jsonrpc":"2.0","method":"account_history_api.get_transaction","params":{"id":"0000000000000000000000000000000000000000000000000000000000000000"},"id":2}"#;
    let response = registry.call(body).await;
    let parsed: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert!(parsed["error"]["message"].as_str().unwrap().contains("Unknown transaction"));
}

#[tokio::test]
async fn history_limit_is_capped() {
    let dir = TempDir::new().unwrap();
    let (chain, index) = open_chain(&dir).await;

    let registry = ApiRegistry::new();
    stx_account_history::api::register_api(&registry, &index, &chain);

    let body = r#"{"jsonrpc":"2.0","method":"account_history_api.get_account_history","params":{"account":"alice","limit":20000},"id":1}"#;
    let response = registry.call(body).await;
    let parsed: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(parsed["error"]["code"], -32602);
}
