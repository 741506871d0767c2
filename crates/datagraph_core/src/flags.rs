// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed flag sets for nodes, sockets and graphs.
//!
//! Each set is a `u32` newtype with named single-bit constants. The bits of
//! every set are checked at compile time to be distinct powers of two.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                const $flag:ident = $bit:expr;
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            $(
                $(#[$fmeta])*
                pub const $flag: Self = Self($bit);
            )+

            const NAMED: &'static [(&'static str, u32)] = &[$((stringify!($flag), $bit)),+];

            /// Union of every named flag
            pub const ALL: Self = Self(0 $(| $bit)+);

            /// The empty set
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Raw bits
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Build from raw bits, dropping unknown bits
            pub const fn from_bits_truncate(bits: u32) -> Self {
                Self(bits & Self::ALL.0)
            }

            /// Whether no flag is set
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Whether every flag of `other` is set
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Whether any flag of `other` is set
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// Set the flags of `other`
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            /// Clear the flags of `other`
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            /// Set or clear the flags of `other`
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }
        }

        const _: () = {
            let bits = $name::NAMED;
            let mut seen = 0u32;
            let mut i = 0;
            while i < bits.len() {
                assert!(bits[i].1.count_ones() == 1, "flag must be a single bit");
                assert!(seen & bits[i].1 == 0, "flag bits overlap");
                seen |= bits[i].1;
                i += 1;
            }
        };

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl Not for $name {
            type Output = Self;

            fn not(self) -> Self {
                Self(!self.0 & Self::ALL.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                let mut first = true;
                for (name, bit) in Self::NAMED {
                    if self.0 & bit != 0 {
                        if !first {
                            f.write_str(" | ")?;
                        }
                        f.write_str(name)?;
                        first = false;
                    }
                }
                f.write_str(")")
            }
        }
    };
}

flag_set! {
    /// Per-node state flags
    pub struct NodeFlags {
        /// Selected in the editor
        const SELECT = 1 << 0;
        /// Node needs execution
        const UPDATE = 1 << 1;
        /// Visited by the topological sort (engine-private)
        const SORT_TAG = 1 << 2;
        /// On the sort recursion stack (engine-private)
        const CYCLE_TAG = 1 << 3;
        /// Skipped during evaluation
        const DISABLED = 1 << 4;
        /// Transient node, never persisted and pruned on load
        const ZOMBIE = 1 << 5;
        /// Persisted as a proxy by an external owner
        const SAVE_PROXY = 1 << 6;
    }
}

flag_set! {
    /// Per-socket flags
    pub struct SocketFlags {
        /// Selected in the editor
        const SELECT = 1 << 0;
        /// Socket value changed since the last pass
        const UPDATE = 1 << 1;
        /// Socket may carry more than one edge
        const MULTI = 1 << 2;
        /// Don't make this output socket MULTI by default
        const NO_MULTI_OUTPUTS = 1 << 3;
        /// Hidden from the editor
        const PRIVATE = 1 << 4;
        /// Value can't be edited from the editor
        const NO_UI_EDITING = 1 << 5;
    }
}

flag_set! {
    /// Graph-wide flags
    pub struct GraphFlags {
        /// Selected in the editor
        const SELECT = 1 << 0;
        /// Topology changed, sort before the next pass
        const RESORT = 1 << 1;
        /// Cycles are permitted (policy, set by the owner)
        const CYCLIC_ALLOWED = 1 << 2;
        /// Cycles were found by the last sort
        const CYCLIC = 1 << 3;
    }
}

/// Engine-private node marks
pub(crate) const SORT_MARKS: NodeFlags = NodeFlags(NodeFlags::SORT_TAG.0 | NodeFlags::CYCLE_TAG.0);
