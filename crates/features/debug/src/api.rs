//! The `debug_node_api`: the RPC surface wrappers and tooling talk to.

use crate::node::DebugNode;
use serde::{Deserialize, Serialize};
use stx_chain::SkipFlags;
use stx_chain::objects::{HardforkState, WitnessSchedule};
use stx_kernel::rpc::{ApiError, ApiRegistry, VoidArgs};
use stx_protocol::{SignedBlock, TimePointSec};

fn execution_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::Execution { message: e.to_string().into(), context: None }
}

fn skip_from_bits(bits: Option<u32>) -> SkipFlags {
    bits.map_or_else(SkipFlags::empty, SkipFlags::from_bits_truncate)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugGenerateBlocksArgs {
    pub count: u32,
    /// Raw [`SkipFlags`] bits to waive additional checks.
    pub skip: Option<u32>,
    pub miss_blocks: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DebugGenerateBlocksReturn {
    pub blocks: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DebugGenerateBlocksUntilArgs {
    pub head_block_time: TimePointSec,
    #[serde(default = "default_sparse")]
    pub generate_sparsely: bool,
    #[serde(default)]
    pub skip: Option<u32>,
}

const fn default_sparse() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugPushBlockArgs {
    pub block: SignedBlock,
    #[serde(default)]
    pub skip: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DebugPushBlockReturn {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugPopBlockReturn {
    pub block: Option<SignedBlock>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DebugSetHardforkArgs {
    pub hardfork_id: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DebugHasHardforkReturn {
    pub has_hardfork: bool,
}

/// Registers the `debug_node_api` methods.
pub fn register_api(registry: &ApiRegistry, node: &DebugNode) {
    let api = "debug_node_api";

    let for_generate = node.clone();
    registry.register_async(api, "debug_generate_blocks", move |args: DebugGenerateBlocksArgs| {
        let node = for_generate.clone();
        async move {
            let blocks = node
                .generate_blocks(args.count, skip_from_bits(args.skip), args.miss_blocks)
                .await
                .map_err(execution_error)?;
            Ok(DebugGenerateBlocksReturn { blocks })
        }
    });

    let for_until = node.clone();
    registry.register_async(
        api,
        "debug_generate_blocks_until",
        move |args: DebugGenerateBlocksUntilArgs| {
            let node = for_until.clone();
            async move {
                let blocks = node
                    .generate_blocks_until(
                        args.head_block_time,
                        args.generate_sparsely,
                        skip_from_bits(args.skip),
                    )
                    .await
                    .map_err(execution_error)?;
                Ok(DebugGenerateBlocksReturn { blocks })
            }
        },
    );

    let for_push = node.clone();
    registry.register_async(api, "debug_push_block", move |args: DebugPushBlockArgs| {
        let node = for_push.clone();
        async move {
            node.push_block(args.block, skip_from_bits(args.skip))
                .await
                .map_err(execution_error)?;
            Ok(DebugPushBlockReturn {})
        }
    });

    let for_pop = node.clone();
    registry.register_async(api, "debug_pop_block", move |_: VoidArgs| {
        let node = for_pop.clone();
        async move {
            let block = node.pop_block().await.map_err(execution_error)?;
            Ok(DebugPopBlockReturn { block })
        }
    });

    let for_schedule = node.clone();
    registry.register(api, "debug_get_witness_schedule", move |_: VoidArgs| {
        Ok::<WitnessSchedule, ApiError>(
            for_schedule.chain().with_state(|state| state.schedule.clone()),
        )
    });

    let for_hardforks = node.clone();
    registry.register(api, "debug_get_hardfork_property_object", move |_: VoidArgs| {
        Ok::<HardforkState, ApiError>(
            for_hardforks.chain().with_state(|state| state.hardforks.clone()),
        )
    });

    let for_set = node.clone();
    registry.register(api, "debug_set_hardfork", move |args: DebugSetHardforkArgs| {
        for_set.set_hardfork(args.hardfork_id).map_err(execution_error)?;
        Ok(serde_json::Value::Object(serde_json::Map::new()))
    });

    let for_has = node.clone();
    registry.register(api, "debug_has_hardfork", move |args: DebugSetHardforkArgs| {
        Ok::<DebugHasHardforkReturn, ApiError>(DebugHasHardforkReturn {
            has_hardfork: for_has.has_hardfork(args.hardfork_id),
        })
    });
}
