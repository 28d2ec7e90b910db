//! Static built-in tool registration, following the pattern of
//! `NodeConstructor` + `inventory::collect!` pattern
//! (`packages/catalog/core/src/lib.rs`): Rust has no idiomatic equivalent of
//! scanning a directory of `tool.py` modules at startup, so built-ins are
//! statically linked and self-register via `inventory::submit!` instead.

use crate::tool::Tool;
use std::sync::Arc;

pub struct ToolConstructor {
    constructor: fn() -> Arc<dyn Tool>,
}

impl ToolConstructor {
    pub const fn new(constructor: fn() -> Arc<dyn Tool>) -> Self {
        Self { constructor }
    }

    pub fn construct(&self) -> Arc<dyn Tool> {
        (self.constructor)()
    }
}

inventory::collect!(ToolConstructor);

/// Every statically-linked built-in tool, discovered once at startup
/// (analogous to the directory scan, ).
pub fn discover_builtins() -> Vec<Arc<dyn Tool>> {
    inventory::iter::<ToolConstructor>()
        .map(|c| c.construct())
        .collect()
}

#[macro_export]
macro_rules! register_builtin_tool {
    ($ctor:expr) => {
        ::inventory::submit! {
            $crate::builtin::ToolConstructor::new($ctor)
        }
    };
}
