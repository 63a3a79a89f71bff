//! The `custom_tokens_api` query surface.

use crate::index::{CustomTokenObject, TokenBalance, TokenError, TokenIndex, TokenOperationRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stx_kernel::rpc::{ApiError, ApiRegistry};
use stx_protocol::AssetSymbol;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetTokenArgs {
    pub token_symbol: AssetSymbol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTokenReturn {
    pub token: Option<CustomTokenObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTokenBalancesReturn {
    pub balances: Vec<TokenBalance>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GetTokenErrorsArgs {
    pub token_symbol: Option<AssetSymbol>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTokenErrorsReturn {
    pub errors: Vec<TokenError>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetTokenHistoryArgs {
    pub token_symbol: AssetSymbol,
    #[serde(default = "default_history_limit")]
    pub limit: u32,
}

const fn default_history_limit() -> u32 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTokenHistoryReturn {
    pub history: Vec<TokenOperationRecord>,
}

/// Registers the `custom_tokens_api` methods.
pub fn register_api(registry: &ApiRegistry, index: &Arc<TokenIndex>) {
    let api = "custom_tokens_api";

    let for_token = index.clone();
    registry.register(api, "get_token", move |args: GetTokenArgs| {
        Ok::<_, ApiError>(GetTokenReturn { token: for_token.get_token(args.token_symbol) })
    });

    let for_balances = index.clone();
    registry.register(api, "get_token_balances", move |args: GetTokenArgs| {
        Ok::<_, ApiError>(GetTokenBalancesReturn {
            balances: for_balances.get_balances(args.token_symbol),
        })
    });

    let for_errors = index.clone();
    registry.register(api, "get_token_errors", move |args: GetTokenErrorsArgs| {
        Ok::<_, ApiError>(GetTokenErrorsReturn { errors: for_errors.get_errors(args.token_symbol) })
    });

    let for_history = index.clone();
    registry.register(api, "get_token_history", move |args: GetTokenHistoryArgs| {
        Ok::<_, ApiError>(GetTokenHistoryReturn {
            history: for_history.get_history(args.token_symbol, args.limit as usize),
        })
    });
}
