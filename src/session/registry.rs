//! Client-side function registry.
//!
//! Functions are advertised to the model in `session.update` and dispatched
//! when a completed response carries `function_call` output items.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use schemars::JsonSchema;
use schemars::schema::RootSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Result;
use crate::protocol::models::Tool;

pub type BoxFuture<T> = futures::future::BoxFuture<'static, T>;

type FunctionHandler = Box<dyn Fn(Value) -> BoxFuture<Result<Value>> + Send + Sync>;

/// Schema source for one registered function.
#[derive(Clone, Debug)]
enum Schema {
    Derived(Box<RootSchema>),
    Raw(Value),
}

#[derive(Clone, Debug)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: Option<String>,
    schema: Schema,
}

/// A `function_call` output item lifted out of a completed response.
#[derive(Clone, Debug)]
pub struct FunctionCall {
    pub name: String,
    pub call_id: String,
    pub arguments: Value,
}

#[derive(Clone, Debug)]
pub struct FunctionOutput {
    pub call_id: String,
    pub output: Value,
}

/// Holds function descriptors plus their async handlers. Registration order
/// is preserved in the advertised tool list.
#[derive(Default)]
pub struct FunctionRegistry {
    defs: Vec<FunctionDescriptor>,
    handlers: HashMap<String, FunctionHandler>,
}

impl FunctionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.defs.iter().map(|d| d.name.as_str()).collect()
    }

    /// Register a typed handler; the parameter schema is derived from
    /// `TArgs`.
    pub fn register<TArgs, TResp, F, Fut>(
        &mut self,
        name: &str,
        description: impl Into<String>,
        handler: F,
    ) where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        let schema = schemars::schema_for!(TArgs);
        let name = name.to_string();
        self.defs.push(FunctionDescriptor {
            name: name.clone(),
            description: Some(description.into()),
            schema: Schema::Derived(Box::new(schema)),
        });

        let user_handler = Arc::new(handler);
        let erased = move |value: Value| -> BoxFuture<Result<Value>> {
            let user_handler = Arc::clone(&user_handler);
            Box::pin(async move {
                let args: TArgs = serde_json::from_value(value)
                    .map_err(|e| crate::Error::Handler(format!("invalid arguments: {e}")))?;
                let resp = user_handler(args).await?;
                serde_json::to_value(resp).map_err(crate::Error::from)
            })
        };
        self.handlers.insert(name, Box::new(erased));
    }

    /// Register a handler with a handwritten JSON Schema for its parameters.
    /// The handler receives the raw arguments object.
    pub fn register_json<F, Fut>(
        &mut self,
        name: &str,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let name = name.to_string();
        self.defs.push(FunctionDescriptor {
            name: name.clone(),
            description: Some(description.into()),
            schema: Schema::Raw(parameters),
        });

        let user_handler = Arc::new(handler);
        let erased = move |value: Value| -> BoxFuture<Result<Value>> {
            let user_handler = Arc::clone(&user_handler);
            Box::pin(async move { user_handler(value).await })
        };
        self.handlers.insert(name, Box::new(erased));
    }

    /// Protocol-level tool definitions for `session.update`.
    ///
    /// # Errors
    /// Returns an error if a derived schema fails to serialize.
    // Keep a single public error type for the crate surface.
    #[allow(clippy::result_large_err)]
    pub fn tools(&self) -> Result<Vec<Tool>> {
        let mut tools = Vec::with_capacity(self.defs.len());
        for def in &self.defs {
            let parameters = match &def.schema {
                Schema::Derived(schema) => serde_json::to_value(schema)?,
                Schema::Raw(value) => value.clone(),
            };
            tools.push(Tool::Function {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters,
            });
        }
        Ok(tools)
    }

    /// Run the handler registered for `call.name`.
    ///
    /// # Errors
    /// `Error::UnregisteredFunction` if no handler matches; `Error::Handler`
    /// (or the handler's own error) if execution fails.
    pub async fn dispatch(&self, call: FunctionCall) -> Result<FunctionOutput> {
        let handler = self
            .handlers
            .get(&call.name)
            .ok_or_else(|| crate::Error::UnregisteredFunction(call.name.clone()))?;
        let output = handler(call.arguments).await?;
        Ok(FunctionOutput {
            call_id: call.call_id,
            output,
        })
    }
}
