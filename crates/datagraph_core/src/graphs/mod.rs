// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in graph flavors.

pub mod rig;
pub mod shader;

use crate::registry::GraphClassRegistry;

pub use rig::create_rig_class;
pub use shader::create_shader_class;

/// Registry holding every built-in flavor
pub fn builtin_registry<C>() -> GraphClassRegistry<C> {
    let mut registry = GraphClassRegistry::new();
    registry.register_class(create_shader_class());
    registry.register_class(create_rig_class());
    registry
}
