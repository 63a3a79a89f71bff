use std::sync::Arc;
use stx_blockstore::{BlockStore, Compression};
use stx_chain::{Chain, GenesisState, INITMINER, INITMINER_KEY_SEED, InitialAccount, SkipFlags};
use stx_custom_tokens::TokenIndex;
use stx_event_bus::EventBus;
use stx_protocol::operations::CustomJsonOperation;
use stx_protocol::{
    AccountName, Asset, AssetSymbol, Operation, PrivateKey, SignedTransaction, Transaction,
};
use tempfile::TempDir;

const APP_ID: u64 = 2;

fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

fn symbol(s: &str) -> AssetSymbol {
    s.parse().unwrap()
}

fn alice_key() -> PrivateKey {
    PrivateKey::regenerate("alice")
}

fn bob_key() -> PrivateKey {
    PrivateKey::regenerate("bobby")
}

async fn open_chain(dir: &TempDir) -> (Chain, Arc<TokenIndex>) {
    let mut genesis = GenesisState::default();
    genesis.initial_accounts.push(InitialAccount {
        name: name("alice"),
        key: alice_key().public_key(),
        balance: Asset::sphtx(100),
    });
    genesis.initial_accounts.push(InitialAccount {
        name: name("bobby"),
        key: bob_key().public_key(),
        balance: Asset::sphtx(100),
    });

    let store = BlockStore::builder()
        .root(dir.path().join("blocks"))
        .compression(Compression::None)
        .connect()
        .await
        .unwrap();
    let chain = Chain::open(genesis, store, EventBus::new(), 64).await.unwrap();

    let index = Arc::new(TokenIndex::new(APP_ID));
    chain.add_observer(index.clone());
    (chain, index)
}

async fn send_action(chain: &Chain, sender: &str, key: &PrivateKey, json: &str) {
    let mut trx = Transaction {
        operations: vec![Operation::CustomJson(CustomJsonOperation {
            app_id: APP_ID,
            sender: name(sender),
            recipients: vec![],
            json: json.to_owned(),
        })],
        ..Default::default()
    };
    chain.with_state(|s| trx.set_reference_block(&s.head_block_id()));
    trx.set_expiration(chain.head_block_time().saturating_add_secs(120));

    let mut signed = SignedTransaction::new(trx);
    signed.sign(key, &chain.chain_id()).unwrap();
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
async fn create_issue_and_transfer() {
    let dir = TempDir::new().unwrap();
    let (chain, index) = open_chain(&dir).await;

    send_action(
        &chain,
        "alice",
        &alice_key(),
        r#"{"action":"create_token","token_symbol":"ALICE","total_supply":1000,"max_supply":5000}"#,
    )
    .await;

    let token = index.get_token(symbol("ALICE")).unwrap();
    assert_eq!(token.owner_name, name("alice"));
    assert_eq!(token.total_supply, 1000);
    assert_eq!(token.max_supply, 5000);
    assert!(!token.paused);

    send_action(
        &chain,
        "alice",
        &alice_key(),
        r#"{"action":"issue_token","token_symbol":"ALICE","additional_amount":500}"#,
    )
    .await;
    assert_eq!(index.get_token(symbol("ALICE")).unwrap().total_supply, 1500);

    send_action(
        &chain,
        "alice",
        &alice_key(),
        r#"{"action":"transfer_token","token_symbol":"ALICE","to":"bobby","amount":300}"#,
    )
    .await;

    let balances = index.get_balances(symbol("ALICE"));
    assert_eq!(balances.len(), 2);
    let of = |who: &str| balances.iter().find(|b| b.account == name(who)).unwrap().amount;
    assert_eq!(of("alice"), 1200);
    assert_eq!(of("bobby"), 300);
}

#[tokio::test]
async fn rejected_actions_become_token_errors() {
    let dir = TempDir::new().unwrap();
    let (chain, index) = open_chain(&dir).await;

    send_action(
        &chain,
        "alice",
        &alice_key(),
        r#"{"action":"create_token","token_symbol":"ALICE","total_supply":100}"#,
    )
    .await;

    // Not the owner.
    send_action(
        &chain,
        "bobby",
        &bob_key(),
        r#"{"action":"issue_token","token_symbol":"ALICE","additional_amount":1}"#,
    )
    .await;

    // Unknown token.
    send_action(
        &chain,
        "alice",
        &alice_key(),
        r#"{"action":"pause_token","token_symbol":"GHOST"}"#,
    )
    .await;

    // Unparsable action.
    send_action(&chain, "alice", &alice_key(), r#"{"action":"explode"}"#).await;

    let errors = index.get_errors(None);
    assert_eq!(errors.len(), 3);
    assert!(index.get_errors(Some(symbol("ALICE"))).len() == 1);

    // The token itself is untouched.
    assert_eq!(index.get_token(symbol("ALICE")).unwrap().total_supply, 100);
}

#[tokio::test]
async fn paused_tokens_refuse_transfers() {
    let dir = TempDir::new().unwrap();
    let (chain, index) = open_chain(&dir).await;

    send_action(
        &chain,
        "alice",
        &alice_key(),
        r#"{"action":"create_token","token_symbol":"ALICE","total_supply":100}"#,
    )
    .await;
    send_action(
        &chain,
        "alice",
        &alice_key(),
        r#"{"action":"pause_token","token_symbol":"ALICE"}"#,
    )
    .await;
    send_action(
        &chain,
        "alice",
        &alice_key(),
        r#"{"action":"transfer_token","token_symbol":"ALICE","to":"bobby","amount":10}"#,
    )
    .await;

    assert!(index.get_token(symbol("ALICE")).unwrap().paused);
    assert_eq!(index.get_errors(Some(symbol("ALICE"))).len(), 1);
    assert!(index.get_balances(symbol("ALICE")).iter().all(|b| b.account != name("bobby")));
}

#[tokio::test]
async fn foreign_app_ids_are_ignored() {
    let dir = TempDir::new().unwrap();
    let (chain, index) = open_chain(&dir).await;

    let mut trx = Transaction {
        operations: vec![Operation::CustomJson(CustomJsonOperation {
            app_id: APP_ID + 1,
            sender: name("alice"),
            recipients: vec![],
            json: r#"{"action":"create_token","token_symbol":"ALICE","total_supply":1}"#.to_owned(),
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

    assert!(index.get_token(symbol("ALICE")).is_none());
    assert!(index.get_errors(None).is_empty());
}

#[tokio::test]
async fn popped_blocks_roll_the_index_back() {
    let dir = TempDir::new().unwrap();
    let (chain, index) = open_chain(&dir).await;

    send_action(
        &chain,
        "alice",
        &alice_key(),
        r#"{"action":"create_token","token_symbol":"ALICE","total_supply":100}"#,
    )
    .await;
    send_action(
        &chain,
        "alice",
        &alice_key(),
        r#"{"action":"issue_token","token_symbol":"ALICE","additional_amount":50}"#,
    )
    .await;

    assert_eq!(index.get_token(symbol("ALICE")).unwrap().total_supply, 150);

    // Pop the issue block: the index rewinds to the created state.
    chain.pop_block().await.unwrap();
    assert_eq!(index.get_token(symbol("ALICE")).unwrap().total_supply, 100);

    // Pop the creation too: the token is gone.
    chain.pop_block().await.unwrap();
    assert!(index.get_token(symbol("ALICE")).is_none());
    assert_eq!(index.get_history(symbol("ALICE"), 10).len(), 0);
}
