//! Dynamically defined ("temporary") tools. The original describes Python
//! source "compiled once and executed in a restricted namespace where
//! `parameters` is bound and `result` is returned". Rust has no safe
//! `exec()` equivalent, so the source is a
//! [Rhai](https://rhai.rs) script compiled once into an `AST` and run
//! against a scoped `Engine` with no filesystem/network API registered —
//! the idiomatic sandboxed-eval analogue.

use crate::tool::Tool;
use async_trait::async_trait;
use conflux_types::Result;
use rhai::{AST, Dynamic, Engine, Scope};
use serde_json::Value;

pub struct TemporaryTool {
    name: String,
    description: String,
    parameters_schema: Value,
    engine: Engine,
    ast: AST,
}

impl TemporaryTool {
    /// Compiles `source` once at registration time. `source` is expected to
    /// assign to a variable called `result`, reading `parameters` as a Rhai
    /// map built from the caller's JSON params.
    pub fn compile(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        source: &str,
    ) -> Result<Self> {
        let engine = restricted_engine();
        let ast = engine
            .compile(source)
            .map_err(|e| conflux_types::Error::config(format!("temporary tool script: {e}")))?;
        Ok(Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            engine,
            ast,
        })
    }
}

/// An engine with no filesystem, process, or network operators registered —
/// scripts can only manipulate the `parameters` map and plain Rhai values.
fn restricted_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(200_000);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(1 << 20);
    engine.set_max_array_size(10_000);
    engine.disable_symbol("eval");
    engine
}

#[async_trait]
impl Tool for TemporaryTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn call(&self, params: Value) -> Result<Value> {
        let mut scope = Scope::new();
        scope.push("parameters", json_to_dynamic(&params));
        let result: Dynamic = self
            .engine
            .eval_ast_with_scope(&mut scope, &self.ast)
            .map_err(|e| conflux_types::Error::execution(format!("temporary tool `{}`: {e}", self.name)))?;
        let result = scope
            .get_value::<Dynamic>("result")
            .unwrap_or(result);
        dynamic_to_json(&result)
            .ok_or_else(|| conflux_types::Error::data_shape("temporary tool returned non-JSON value"))
    }
}

fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => n
            .as_i64()
            .map(Dynamic::from)
            .unwrap_or_else(|| Dynamic::from(n.as_f64().unwrap_or(0.0))),
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(arr) => Dynamic::from(arr.iter().map(json_to_dynamic).collect::<Vec<_>>()),
        Value::Object(map) => {
            let mut rmap = rhai::Map::new();
            for (k, v) in map {
                rmap.insert(k.as_str().into(), json_to_dynamic(v));
            }
            Dynamic::from_map(rmap)
        }
    }
}

fn dynamic_to_json(value: &Dynamic) -> Option<Value> {
    if value.is_unit() {
        return Some(Value::Null);
    }
    if let Some(b) = value.clone().try_cast::<bool>() {
        return Some(Value::Bool(b));
    }
    if let Some(i) = value.clone().try_cast::<i64>() {
        return Some(Value::from(i));
    }
    if let Some(f) = value.clone().try_cast::<f64>() {
        return Some(serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null));
    }
    if let Some(s) = value.clone().try_cast::<String>() {
        return Some(Value::String(s));
    }
    if let Some(arr) = value.clone().try_cast::<rhai::Array>() {
        return Some(Value::Array(
            arr.iter().filter_map(dynamic_to_json).collect(),
        ));
    }
    if let Some(map) = value.clone().try_cast::<rhai::Map>() {
        let mut out = serde_json::Map::new();
        for (k, v) in map {
            if let Some(json) = dynamic_to_json(&v) {
                out.insert(k.to_string(), json);
            }
        }
        return Some(Value::Object(out));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_doubles_a_parameter() {
        let tool = TemporaryTool::compile(
            "doubler",
            "doubles the `n` parameter",
            serde_json::json!({"type": "object"}),
            "let result = #{ doubled: parameters.n * 2 };",
        )
        .unwrap();
        let out = tool.call(serde_json::json!({"n": 21})).await.unwrap();
        assert_eq!(out, serde_json::json!({"doubled": 42}));
    }

    #[tokio::test]
    async fn compile_error_surfaces_as_config_error() {
        let err = TemporaryTool::compile(
            "broken",
            "",
            serde_json::json!({}),
            "this is not valid rhai {{{",
        );
        assert!(err.is_err());
    }
}
