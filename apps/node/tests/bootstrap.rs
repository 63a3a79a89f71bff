use stx::kernel::config::NodeConfig;
use stx_node::Node;
use tempfile::TempDir;

async fn build_node(dir: &TempDir) -> Node {
    let mut cfg = NodeConfig::default();
    cfg.chain.data_dir = dir.path().to_path_buf();
    Node::builder().config(cfg).build().await.unwrap()
}

#[tokio::test]
async fn bootstrap_registers_every_api() {
    let dir = TempDir::new().unwrap();
    let node = build_node(&dir).await;

    let methods = node.state().registry.method_names();
    for expected in [
        "block_api.get_block",
        "block_api.get_block_header",
        "block_api.get_average_block_size",
        "database_api.get_dynamic_global_properties",
        "database_api.get_accounts",
        "database_api.get_witnesses",
        "database_api.get_witness_schedule",
        "database_api.get_hardfork_properties",
        "network_broadcast_api.broadcast_transaction",
        "network_broadcast_api.broadcast_transaction_synchronous",
        "debug_node_api.debug_generate_blocks",
        "debug_node_api.debug_generate_blocks_until",
        "debug_node_api.debug_push_block",
        "debug_node_api.debug_pop_block",
        "debug_node_api.debug_get_witness_schedule",
        "debug_node_api.debug_get_hardfork_property_object",
        "debug_node_api.debug_set_hardfork",
        "debug_node_api.debug_has_hardfork",
        "custom_tokens_api.get_token",
        "custom_tokens_api.get_token_balances",
        "custom_tokens_api.get_token_errors",
        "custom_tokens_api.get_token_history",
        "account_history_api.get_account_history",
        "account_history_api.get_transaction",
    ] {
        assert!(methods.contains(&expected.to_owned()), "missing method {expected}");
    }
}

#[tokio::test]
async fn the_debug_flow_works_end_to_end_in_process() {
    let dir = TempDir::new().unwrap();
    let node = build_node(&dir).await;
    let registry = &node.state().registry;

    // Drive the chain through the same surface a wrapper would use.
    let body = r#"{"jsonrpc":"2.0","method":"debug_node_api.debug_generate_blocks","params":{"count":3},"id":1}"#;
    let response = registry.call(body).await;
    let parsed: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(parsed["result"]["blocks"], 3);

    let body = r#"{"jsonrpc":"2.0","method":"database_api.get_dynamic_global_properties","id":2}"#;
    let response = registry.call(body).await;
    let parsed: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(parsed["result"]["head_block_number"], 3);
    assert_eq!(parsed["result"]["current_witness"], "initminer");

    let body = r#"{"jsonrpc":"2.0","method":"block_api.get_block_header","params":{"block_num":3},"id":3}"#;
    let response = registry.call(body).await;
    let parsed: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(parsed["result"]["header"]["witness"], "initminer");
}

#[tokio::test]
async fn disabling_the_debug_api_removes_it() {
    let dir = TempDir::new().unwrap();
    let mut cfg = NodeConfig::default();
    cfg.chain.data_dir = dir.path().to_path_buf();
    cfg.debug.enabled = false;

    let node = Node::builder().config(cfg).build().await.unwrap();
    let methods = node.state().registry.method_names();
    assert!(methods.iter().all(|m| !m.starts_with("debug_node_api.")));
    assert!(methods.iter().any(|m| m.starts_with("block_api.")));
}

#[tokio::test]
async fn chain_state_survives_a_node_restart() {
    let dir = TempDir::new().unwrap();

    {
        let node = build_node(&dir).await;
        let body = r#"{"jsonrpc":"2.0","method":"debug_node_api.debug_generate_blocks","params":{"count":5},"id":1}"#;
        node.state().registry.call(body).await;
    }

    let node = build_node(&dir).await;
    let body = r#"{"jsonrpc":"2.0","method":"database_api.get_dynamic_global_properties","id":1}"#;
    let response = node.state().registry.call(body).await;
    let parsed: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(parsed["result"]["head_block_number"], 5);
}
