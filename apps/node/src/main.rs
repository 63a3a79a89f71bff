use anyhow::Context;
use stx::kernel::config::load_config;
use stx_logger::Logger;
use stx_node::Node;

#[stx_runtime::main(high_performance)]
async fn main() -> anyhow::Result<()> {
    let _log = Logger::builder().name(env!("CARGO_PKG_NAME")).init()?;

    let cfg = load_config(Some("node")).context("Critical: Configuration is malformed")?;

    Node::builder().config(cfg).build().await?.run().await
}
