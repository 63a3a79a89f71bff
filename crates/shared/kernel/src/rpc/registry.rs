use super::{
    ApiError, JSON_RPC_INVALID_REQUEST, JSON_RPC_METHOD_NOT_FOUND, JSON_RPC_PARSE_ERROR,
    JSONRPC_VERSION, RpcRequest, RpcResponse,
};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

type MethodFuture = Pin<Box<dyn Future<Output = Result<Value, ApiError>> + Send>>;
type Handler = Arc<dyn Fn(Value) -> MethodFuture + Send + Sync>;

/// The method table behind the JSON-RPC endpoint.
///
/// Features register their methods under `api.method` keys during
/// initialization; the registry dispatches incoming requests (single or
/// batch) and shapes all failures into the standard error codes.
#[derive(Clone, Default)]
pub struct ApiRegistry {
    methods: Arc<RwLock<FxHashMap<String, Handler>>>,
}

impl std::fmt::Debug for ApiRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRegistry").field("methods", &self.methods.read().len()).finish()
    }
}

impl ApiRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a synchronous handler under `api.method`.
    ///
    /// The handler's argument type deserializes from the request params;
    /// absent params deserialize from an empty object.
    pub fn register<Args, Ret, F>(&self, api: &str, method: &str, handler: F)
    where
        Args: DeserializeOwned + Send + 'static,
        Ret: Serialize + 'static,
        F: Fn(Args) -> Result<Ret, ApiError> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register_raw(api, method, move |params| {
            let handler = handler.clone();
            Box::pin(async move {
                let args: Args = parse_params(params)?;
                serialize_result(handler(args)?)
            })
        });
    }

    /// Registers an asynchronous handler under `api.method`.
    pub fn register_async<Args, Ret, F, Fut>(&self, api: &str, method: &str, handler: F)
    where
        Args: DeserializeOwned + Send + 'static,
        Ret: Serialize + 'static,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Ret, ApiError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.register_raw(api, method, move |params| {
            let handler = handler.clone();
            Box::pin(async move {
                let args: Args = parse_params(params)?;
                serialize_result(handler(args).await?)
            })
        });
    }

    fn register_raw(
        &self,
        api: &str,
        method: &str,
        handler: impl Fn(Value) -> MethodFuture + Send + Sync + 'static,
    ) {
        let name = format!("{api}.{method}");
        info!(method = %name, "Registering api method");
        self.methods.write().insert(name, Arc::new(handler));
    }

    /// Removes every method of the given api. Returns how many were dropped.
    pub fn deregister_api(&self, api: &str) -> usize {
        let prefix = format!("{api}.");
        let mut methods = self.methods.write();
        let before = methods.len();
        methods.retain(|name, _| !name.starts_with(&prefix));
        before - methods.len()
    }

    /// All registered method names, sorted.
    #[must_use]
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Invokes a method in-process, bypassing the HTTP envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown method, or whatever the
    /// handler fails with.
    pub async fn call_api_method(
        &self,
        api: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, ApiError> {
        let name = format!("{api}.{method}");
        let handler = self.methods.read().get(&name).cloned();
        let Some(handler) = handler else {
            return Err(ApiError::NotFound {
                message: format!("Method '{name}' is not registered").into(),
                context: None,
            });
        };
        handler(params).await
    }

    /// Handles a raw JSON-RPC body (single request or batch) and returns the
    /// serialized response body.
    pub async fn call(&self, body: &str) -> String {
        let parsed: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                let response = RpcResponse::failure(
                    Value::Null,
                    JSON_RPC_PARSE_ERROR,
                    format!("Parse error: {e}"),
                );
                return serialize_response(&response);
            },
        };

        match parsed {
            Value::Array(batch) => {
                if batch.is_empty() {
                    let response = RpcResponse::failure(
                        Value::Null,
                        JSON_RPC_INVALID_REQUEST,
                        "Empty batch",
                    );
                    return serialize_response(&response);
                }
                let mut responses = Vec::with_capacity(batch.len());
                for entry in batch {
                    responses.push(self.dispatch_value(entry).await);
                }
                serialize_response(&responses)
            },
            single => serialize_response(&self.dispatch_value(single).await),
        }
    }

    async fn dispatch_value(&self, value: Value) -> RpcResponse {
        match serde_json::from_value::<RpcRequest>(value) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => RpcResponse::failure(
                Value::Null,
                JSON_RPC_INVALID_REQUEST,
                format!("Invalid request: {e}"),
            ),
        }
    }

    /// Dispatches one parsed request.
    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);

        if let Some(version) = &request.jsonrpc
            && version != JSONRPC_VERSION
        {
            return RpcResponse::failure(
                id,
                JSON_RPC_INVALID_REQUEST,
                format!("Unsupported jsonrpc version '{version}'"),
            );
        }

        let (name, params) = match resolve_target(&request) {
            Ok(target) => target,
            Err(response_for) => return response_for(id),
        };

        debug!(method = %name, "Dispatching rpc call");

        let handler = self.methods.read().get(&name).cloned();
        let Some(handler) = handler else {
            return RpcResponse::failure(
                id,
                JSON_RPC_METHOD_NOT_FOUND,
                format!("Method '{name}' not found"),
            );
        };

        match handler(params).await {
            Ok(result) => RpcResponse::success(id, result),
            Err(err) => RpcResponse::failure(id, err.code(), err.to_string()),
        }
    }
}

type FailureFor = Box<dyn FnOnce(Value) -> RpcResponse + Send>;

/// Resolves the two supported method forms into `(api.method, params)`.
fn resolve_target(request: &RpcRequest) -> Result<(String, Value), FailureFor> {
    let params = request.params.clone().unwrap_or(Value::Null);

    if request.method == "call" {
        // Generic form: params = [api, method, args?]
        let Value::Array(mut parts) = params else {
            return Err(Box::new(|id| {
                RpcResponse::failure(
                    id,
                    JSON_RPC_INVALID_REQUEST,
                    "The 'call' form takes [api, method, params]",
                )
            }));
        };
        if parts.len() < 2 || parts.len() > 3 {
            return Err(Box::new(|id| {
                RpcResponse::failure(
                    id,
                    JSON_RPC_INVALID_REQUEST,
                    "The 'call' form takes [api, method, params]",
                )
            }));
        }
        let args = if parts.len() == 3 { parts.remove(2) } else { Value::Null };
        let (Some(api), Some(method)) = (parts[0].as_str(), parts[1].as_str()) else {
            return Err(Box::new(|id| {
                RpcResponse::failure(
                    id,
                    JSON_RPC_INVALID_REQUEST,
                    "Api and method names must be strings",
                )
            }));
        };
        return Ok((format!("{api}.{method}"), args));
    }

    if request.method.contains('.') {
        return Ok((request.method.clone(), params));
    }

    let method = request.method.clone();
    Err(Box::new(move |id| {
        RpcResponse::failure(
            id,
            JSON_RPC_METHOD_NOT_FOUND,
            format!("Method '{method}' not found"),
        )
    }))
}

fn parse_params<Args: DeserializeOwned>(params: Value) -> Result<Args, ApiError> {
    // Absent params behave like an empty object so void-arg methods
    // can be called without a params member.
    let params = match params {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| ApiError::ParseParams {
        message: e.to_string().into(),
        context: None,
    })
}

fn serialize_result<Ret: Serialize>(ret: Ret) -> Result<Value, ApiError> {
    serde_json::to_value(ret).map_err(|e| ApiError::Internal {
        message: format!("Result serialization failed: {e}").into(),
        context: None,
    })
}

fn serialize_response<T: Serialize>(response: &T) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| {
        // Responses are plain data; serialization cannot realistically fail.
        format!(
            r#"{{"jsonrpc":"{JSONRPC_VERSION}","error":{{"code":{JSON_RPC_PARSE_ERROR},"message":"Response serialization failed"}},"id":null}}"#
        )
    })
}

/// Argument type for methods that take no parameters.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize, Serialize)]
pub struct VoidArgs {}
