// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use crate::error::{GraphError, Result};
use crate::flags::SocketFlags;
use crate::id::GraphId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketDirection {
    /// Input socket
    Input,
    /// Output socket
    Output,
}

impl SocketDirection {
    /// The other direction
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

/// Kind of value a socket carries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketType {
    /// Dependency-only link, value is a boolean "changed" marker
    Depend,
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color (RGBA)
    Color,
    /// Shading closure
    Closure,
    /// Generic socket without value semantics of its own
    Any,
    /// Socket type defined outside the engine, no value semantics
    Custom(String),
}

impl SocketType {
    /// Whether values of this type can be read and written
    pub fn has_value(&self) -> bool {
        !matches!(self, Self::Any | Self::Custom(_))
    }

    /// Initial value of a fresh socket
    pub fn default_value(&self) -> Option<SocketValue> {
        Some(match self {
            Self::Depend | Self::Bool => SocketValue::Bool(false),
            Self::Int => SocketValue::Int(0),
            Self::Float => SocketValue::Float(0.0),
            Self::Vector2 => SocketValue::Vector2([0.0; 2]),
            Self::Vector3 => SocketValue::Vector3([0.0; 3]),
            Self::Vector4 => SocketValue::Vector4([0.0; 4]),
            Self::Color => SocketValue::Color([0.0, 0.0, 0.0, 1.0]),
            Self::Closure => SocketValue::Closure(Closure::default()),
            Self::Any | Self::Custom(_) => return None,
        })
    }

    /// Check if an output of this type can feed an input of `other`
    pub fn can_connect_to(&self, other: &SocketType) -> bool {
        // Any and dependency links connect to anything
        if matches!(self, Self::Any | Self::Depend) || matches!(other, Self::Any | Self::Depend) {
            return true;
        }

        if self == other {
            return true;
        }

        match (self, other) {
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            (
                Self::Int | Self::Float,
                Self::Vector2 | Self::Vector3 | Self::Vector4 | Self::Color,
            ) => true,
            (Self::Vector2, Self::Vector3 | Self::Vector4) => true,
            (Self::Vector3, Self::Vector4 | Self::Color) => true,
            (Self::Color, Self::Vector4 | Self::Vector3) | (Self::Vector4, Self::Color) => true,
            (Self::Vector3 | Self::Vector4 | Self::Color, Self::Closure) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Depend => f.write_str("depend"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Vector2 => f.write_str("vec2"),
            Self::Vector3 => f.write_str("vec3"),
            Self::Vector4 => f.write_str("vec4"),
            Self::Color => f.write_str("color"),
            Self::Closure => f.write_str("closure"),
            Self::Any => f.write_str("any"),
            Self::Custom(name) => write!(f, "custom({name})"),
        }
    }
}

/// Shading closure passed between shader nodes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    /// Diffuse color
    pub diffuse: [f32; 3],
    /// Emitted radiance
    pub emission: [f32; 3],
    /// Coverage
    pub alpha: f32,
}

impl Closure {
    /// Pure diffuse closure
    pub fn diffuse(color: [f32; 3]) -> Self {
        Self { diffuse: color, ..Self::default() }
    }

    /// Pure emission closure
    pub fn emission(color: [f32; 3], strength: f32) -> Self {
        Self {
            diffuse: [0.0; 3],
            emission: color.map(|c| c * strength),
            alpha: 1.0,
        }
    }

    /// Linear blend towards `other`
    pub fn mix(&self, other: &Closure, fac: f32) -> Self {
        Self {
            diffuse: lerp3(self.diffuse, other.diffuse, fac),
            emission: lerp3(self.emission, other.emission, fac),
            alpha: self.alpha + (other.alpha - self.alpha) * fac,
        }
    }

    fn distance(&self, other: &Closure) -> f32 {
        distance(&self.diffuse, &other.diffuse)
            + distance(&self.emission, &other.emission)
            + (self.alpha - other.alpha).abs()
    }
}

impl Default for Closure {
    fn default() -> Self {
        Self {
            diffuse: [0.0; 3],
            emission: [0.0; 3],
            alpha: 1.0,
        }
    }
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [0, 1, 2].map(|i| a[i] + (b[i] - a[i]) * t)
}

fn distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// Value that can be stored in a socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SocketValue {
    /// Boolean (also used by dependency sockets)
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// Color
    Color([f32; 4]),
    /// Shading closure
    Closure(Closure),
}

impl SocketValue {
    /// The socket type matching this value
    pub fn socket_type(&self) -> SocketType {
        match self {
            Self::Bool(_) => SocketType::Bool,
            Self::Int(_) => SocketType::Int,
            Self::Float(_) => SocketType::Float,
            Self::Vector2(_) => SocketType::Vector2,
            Self::Vector3(_) => SocketType::Vector3,
            Self::Vector4(_) => SocketType::Vector4,
            Self::Color(_) => SocketType::Color,
            Self::Closure(_) => SocketType::Closure,
        }
    }

    /// Whether the value counts as "set" for dependency sockets
    pub fn truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Vector2(v) => v.iter().any(|c| *c != 0.0),
            Self::Vector3(v) => v.iter().any(|c| *c != 0.0),
            Self::Vector4(v) | Self::Color(v) => v.iter().any(|c| *c != 0.0),
            Self::Closure(_) => true,
        }
    }

    /// Numeric components padded to four, plus the real component count
    fn components(&self) -> Option<([f32; 4], usize)> {
        match self {
            Self::Int(i) => Some(([*i as f32, 0.0, 0.0, 0.0], 1)),
            Self::Float(f) => Some(([*f, 0.0, 0.0, 0.0], 1)),
            Self::Vector2([x, y]) => Some(([*x, *y, 0.0, 0.0], 2)),
            Self::Vector3([x, y, z]) => Some(([*x, *y, *z, 0.0], 3)),
            Self::Vector4(v) | Self::Color(v) => Some((*v, 4)),
            Self::Bool(_) | Self::Closure(_) => None,
        }
    }

    fn mismatch(&self, target: &SocketType) -> GraphError {
        GraphError::TypeMismatch {
            expected: target.to_string(),
            found: self.socket_type().to_string(),
        }
    }

    /// Convert to a value of the given socket type
    pub fn convert(&self, target: &SocketType) -> Result<SocketValue> {
        if self.socket_type() == *target {
            return Ok(self.clone());
        }

        let converted = match (target, self) {
            (SocketType::Any | SocketType::Custom(_), _) => {
                return Err(GraphError::NotImplemented(target.to_string()))
            }
            (SocketType::Depend, v) => Self::Bool(v.truthy()),
            (SocketType::Bool, Self::Int(_) | Self::Float(_)) => Self::Bool(self.truthy()),
            (SocketType::Int, Self::Bool(b)) => Self::Int(i32::from(*b)),
            (SocketType::Int, Self::Float(f)) => Self::Int(*f as i32),
            (SocketType::Float, Self::Bool(b)) => Self::Float(if *b { 1.0 } else { 0.0 }),
            (SocketType::Float, Self::Int(i)) => Self::Float(*i as f32),
            (SocketType::Closure, Self::Vector3([r, g, b])) => {
                Self::Closure(Closure::diffuse([*r, *g, *b]))
            }
            (SocketType::Closure, Self::Vector4(v) | Self::Color(v)) => {
                Self::Closure(Closure {
                    diffuse: [v[0], v[1], v[2]],
                    emission: [0.0; 3],
                    alpha: v[3],
                })
            }
            (
                SocketType::Vector2 | SocketType::Vector3 | SocketType::Vector4 | SocketType::Color,
                v,
            ) => {
                let Some((c, count)) = v.components() else {
                    return Err(self.mismatch(target));
                };
                match target {
                    SocketType::Vector2 if count == 1 => Self::Vector2([c[0]; 2]),
                    SocketType::Vector2 => Self::Vector2([c[0], c[1]]),
                    SocketType::Vector3 if count == 1 => Self::Vector3([c[0]; 3]),
                    SocketType::Vector3 => Self::Vector3([c[0], c[1], c[2]]),
                    SocketType::Vector4 if count == 1 => Self::Vector4([c[0]; 4]),
                    SocketType::Color if count == 1 => Self::Color([c[0], c[0], c[0], 1.0]),
                    _ => {
                        let w = if count == 3 { 1.0 } else { c[3] };
                        let v = [c[0], c[1], c[2], w];
                        if *target == SocketType::Color {
                            Self::Color(v)
                        } else {
                            Self::Vector4(v)
                        }
                    }
                }
            }
            _ => return Err(self.mismatch(target)),
        };

        Ok(converted)
    }

    /// Scalar distance used by the relaxation solver
    pub fn diff(&self, other: &SocketValue) -> Result<f32> {
        Ok(match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => {
                if a != b {
                    0.001
                } else {
                    0.0
                }
            }
            (Self::Int(a), Self::Int(b)) => a.abs_diff(*b) as f32,
            (Self::Float(a), Self::Float(b)) => (a - b).abs(),
            (Self::Vector2(a), Self::Vector2(b)) => distance(a, b),
            (Self::Vector3(a), Self::Vector3(b)) => distance(a, b),
            (Self::Vector4(a), Self::Vector4(b)) | (Self::Color(a), Self::Color(b)) => {
                distance(a, b)
            }
            (Self::Closure(a), Self::Closure(b)) => a.distance(b),
            _ => return Err(other.mismatch(&self.socket_type())),
        })
    }

    /// Read as a float
    pub fn as_float(&self) -> Result<f32> {
        match self.convert(&SocketType::Float)? {
            Self::Float(f) => Ok(f),
            _ => Err(self.mismatch(&SocketType::Float)),
        }
    }

    /// Read as an integer
    pub fn as_int(&self) -> Result<i32> {
        match self.convert(&SocketType::Int)? {
            Self::Int(i) => Ok(i),
            _ => Err(self.mismatch(&SocketType::Int)),
        }
    }

    /// Read as a boolean
    pub fn as_bool(&self) -> Result<bool> {
        match self.convert(&SocketType::Bool)? {
            Self::Bool(b) => Ok(b),
            _ => Err(self.mismatch(&SocketType::Bool)),
        }
    }

    /// Read as a 3D vector
    pub fn as_vector3(&self) -> Result<[f32; 3]> {
        match self.convert(&SocketType::Vector3)? {
            Self::Vector3(v) => Ok(v),
            _ => Err(self.mismatch(&SocketType::Vector3)),
        }
    }

    /// Read as a color
    pub fn as_color(&self) -> Result<[f32; 4]> {
        match self.convert(&SocketType::Color)? {
            Self::Color(v) => Ok(v),
            _ => Err(self.mismatch(&SocketType::Color)),
        }
    }

    /// Read as a shading closure
    pub fn as_closure(&self) -> Result<Closure> {
        match self.convert(&SocketType::Closure)? {
            Self::Closure(c) => Ok(c),
            _ => Err(self.mismatch(&SocketType::Closure)),
        }
    }
}

/// A socket on a node
///
/// Sockets are declared as prototypes in a [`NodeDef`](crate::node::NodeDef)
/// and cloned into every node instance. The graph assigns ids on insertion;
/// edges are stored as the ids of the sockets on the other end.
#[derive(Debug, Clone)]
pub struct Socket {
    pub(crate) graph_id: GraphId,
    pub(crate) owner: GraphId,
    pub(crate) name: String,
    /// Display name
    pub ui_name: String,
    pub(crate) direction: SocketDirection,
    socket_type: SocketType,
    /// Socket flags
    pub flags: SocketFlags,
    value: Option<SocketValue>,
    pub(crate) edges: Vec<GraphId>,
}

impl Socket {
    /// Create a socket prototype of the given type with its default value
    pub fn new(socket_type: SocketType) -> Self {
        Self {
            graph_id: GraphId::NONE,
            owner: GraphId::NONE,
            name: String::new(),
            ui_name: String::new(),
            direction: SocketDirection::Input,
            value: socket_type.default_value(),
            socket_type,
            flags: SocketFlags::empty(),
            edges: Vec::new(),
        }
    }

    /// Float socket
    pub fn float(value: f32) -> Self {
        Self::new(SocketType::Float).with_value(SocketValue::Float(value))
    }

    /// Integer socket
    pub fn int(value: i32) -> Self {
        Self::new(SocketType::Int).with_value(SocketValue::Int(value))
    }

    /// Color socket
    pub fn color(value: [f32; 4]) -> Self {
        Self::new(SocketType::Color).with_value(SocketValue::Color(value))
    }

    /// Shading closure socket
    pub fn closure() -> Self {
        Self::new(SocketType::Closure)
    }

    /// Dependency-only socket
    pub fn depend() -> Self {
        Self::new(SocketType::Depend)
    }

    /// Set the initial value, converted to the socket type
    pub fn with_value(mut self, value: SocketValue) -> Self {
        if let Err(err) = self.set_value(value) {
            tracing::warn!("Ignoring initial value for {} socket: {err}", self.socket_type);
        }
        self
    }

    /// Set the display name
    pub fn with_ui_name(mut self, ui_name: impl Into<String>) -> Self {
        self.ui_name = ui_name.into();
        self
    }

    /// Add socket flags
    pub fn with_flags(mut self, flags: SocketFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Allow more than one edge
    pub fn multi(self) -> Self {
        self.with_flags(SocketFlags::MULTI)
    }

    /// Graph id, [`GraphId::NONE`] when the owning node isn't in a graph
    pub fn graph_id(&self) -> GraphId {
        self.graph_id
    }

    /// Id of the owning node
    pub fn owner(&self) -> GraphId {
        self.owner
    }

    /// Key of this socket in its node's socket map
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input or output
    pub fn direction(&self) -> SocketDirection {
        self.direction
    }

    /// Value type
    pub fn socket_type(&self) -> &SocketType {
        &self.socket_type
    }

    /// Ids of connected sockets
    pub fn edges(&self) -> &[GraphId] {
        &self.edges
    }

    /// Whether any edge is attached
    pub fn has_edges(&self) -> bool {
        !self.edges.is_empty()
    }

    /// Whether an edge to `socket` exists
    pub fn is_connected_to(&self, socket: GraphId) -> bool {
        self.edges.contains(&socket)
    }

    /// Whether more than one edge may be attached
    pub fn is_multi(&self) -> bool {
        self.flags.contains(SocketFlags::MULTI)
    }

    fn not_implemented(&self) -> GraphError {
        GraphError::NotImplemented(self.socket_type.to_string())
    }

    /// Current value
    pub fn get_value(&self) -> Result<&SocketValue> {
        self.value.as_ref().ok_or_else(|| self.not_implemented())
    }

    /// Replace the value without propagating it
    pub fn set_value(&mut self, value: SocketValue) -> Result<()> {
        if !self.socket_type.has_value() {
            return Err(self.not_implemented());
        }
        self.value = Some(value.convert(&self.socket_type)?);
        Ok(())
    }

    /// Deep copy of the current value
    pub fn copy_value(&self) -> Result<SocketValue> {
        self.get_value().cloned()
    }

    /// Whether the current value equals `other`
    pub fn cmp_value(&self, other: &SocketValue) -> Result<bool> {
        let value = self.get_value()?;
        Ok(*value == other.convert(&self.socket_type)?)
    }

    /// Distance between the current value and `other`
    pub fn diff_value(&self, other: &SocketValue) -> Result<f32> {
        self.get_value()?.diff(other)
    }

    /// Structural clone with no id, owner or edges
    pub fn copy(&self) -> Socket {
        Socket {
            graph_id: GraphId::NONE,
            owner: GraphId::NONE,
            edges: Vec::new(),
            ..self.clone()
        }
    }

    pub(crate) fn raw_value(&self) -> Option<&SocketValue> {
        self.value.as_ref()
    }
}
