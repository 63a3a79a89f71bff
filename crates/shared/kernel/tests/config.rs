use std::net::{IpAddr, Ipv4Addr};
use stx_kernel::config::{NodeConfig, load_config};
use tempfile::tempdir;

#[test]
fn defaults_describe_a_private_debug_net() {
    let cfg = NodeConfig::default();

    assert_eq!(cfg.server.address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    assert_eq!(cfg.server.port, 9193);
    assert!(cfg.server.ssl.is_none());

    assert!(cfg.chain.genesis.is_none());
    assert!(cfg.chain.compression);
    assert_eq!(cfg.chain.undo_limit, 64);

    assert!(!cfg.witness.enabled);
    assert!(cfg.debug.enabled);
    assert_eq!(cfg.tokens.app_id, 2);
}

#[test]
fn layered_file_loading() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("node.toml");
    std::fs::write(
        &path,
        r#"
[server]
port = 9999

[chain]
data_dir = "/tmp/chain-data"
compression = false

[witness]
enabled = true
witnesses = ["initminer"]

[debug]
enabled = false
"#,
    )
    .unwrap();

    let cfg: NodeConfig = load_config(Some(&path)).unwrap();

    assert_eq!(cfg.server.port, 9999);
    assert_eq!(cfg.chain.data_dir, std::path::PathBuf::from("/tmp/chain-data"));
    assert!(!cfg.chain.compression);
    assert!(cfg.witness.enabled);
    assert_eq!(cfg.witness.witnesses, vec!["initminer".to_owned()]);
    assert!(!cfg.debug.enabled);

    // Unspecified sections keep their defaults.
    assert_eq!(cfg.tokens.app_id, 2);
    assert_eq!(cfg.chain.undo_limit, 64);
}

#[test]
fn missing_config_file_is_an_error() {
    let result: Result<NodeConfig, _> = load_config(Some("definitely/not/here"));
    assert!(result.is_err());
}
