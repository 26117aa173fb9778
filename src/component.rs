// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Component trait, the per-world type registry, and Bundle.
//!
//! Components are data attached to entities. Each world assigns every
//! component type a stable bit in a 64-bit mask; bundles group multiple
//! components for spawning.

use std::any::TypeId;

use ahash::AHashMap;
use smallvec::{smallvec, SmallVec};

/// Maximum number of distinct component types per world.
pub const MAX_COMPONENTS: usize = 64;

/// Maximum number of components supported by Bundle implementations
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Marker trait for components
///
/// Components must be 'static (no borrowed data)
pub trait Component: 'static + Send + Sync {}

/// Automatically implement Component for all valid types
impl<T: 'static + Send + Sync> Component for T {}

/// Layout and identity of one registered component type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub size: usize,
    pub align: usize,
    pub drop_fn: Option<unsafe fn(*mut u8)>,
}

impl TypeInfo {
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            drop_fn: if std::mem::needs_drop::<T>() {
                Some(|ptr| unsafe {
                    std::ptr::drop_in_place(ptr as *mut T);
                })
            } else {
                None
            },
        }
    }
}

/// Maps component types to mask bits and records their layout.
///
/// The first registered type receives bit 0 (value 1). A bit, once
/// assigned, never changes for the lifetime of the world.
pub struct ComponentRegistry {
    bits: AHashMap<TypeId, u64>,
    types: Vec<TypeInfo>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            bits: AHashMap::with_capacity(MAX_COMPONENTS),
            types: Vec::with_capacity(MAX_COMPONENTS),
        }
    }

    /// Register a component type and return its mask bit.
    ///
    /// Idempotent: re-registering a type returns the bit it already holds.
    ///
    /// # Panics
    /// Registering a 65th distinct type is a contract violation and aborts.
    pub fn register<T: Component>(&mut self) -> u64 {
        let type_id = TypeId::of::<T>();
        if let Some(&bit) = self.bits.get(&type_id) {
            return bit;
        }

        let index = self.types.len();
        assert!(
            index < MAX_COMPONENTS,
            "component type capacity exceeded ({MAX_COMPONENTS})"
        );

        let bit = 1u64 << index;
        self.bits.insert(type_id, bit);
        self.types.push(TypeInfo::of::<T>());
        bit
    }

    /// Mask bit of a registered type, or `None`.
    pub fn bit_of<T: Component>(&self) -> Option<u64> {
        self.bit_of_id(TypeId::of::<T>())
    }

    pub fn bit_of_id(&self, type_id: TypeId) -> Option<u64> {
        self.bits.get(&type_id).copied()
    }

    /// Layout info for a bit index (`bit.trailing_zeros()`).
    pub fn info(&self, bit_index: usize) -> Option<&TypeInfo> {
        self.types.get(bit_index)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Mask covering every bit assigned so far.
    pub fn known_mask(&self) -> u64 {
        if self.types.len() == MAX_COMPONENTS {
            u64::MAX
        } else {
            (1u64 << self.types.len()) - 1
        }
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Bundle of components
///
/// Allows spawning entities with multiple components at once.
pub trait Bundle: 'static {
    /// Get type IDs of all components in bundle
    fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Write components to raw pointers, one per bundle member in
    /// `type_ids` order. A null pointer means the member has no storage
    /// (its type is unregistered); the value is dropped instead.
    ///
    /// # Safety
    /// Non-null pointers must be valid for a write of the member's size
    /// and point at storage that holds no live value of the type.
    unsafe fn write(self, ptrs: &[*mut u8]);
}

// DO NOT implement Bundle for T: Component
// This conflicts with tuple implementations
// Instead, implement only for tuples

// Macro for tuple Bundle implementations
macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(TypeId::of::<$T>()),*]
            }

            #[allow(non_snake_case)]
            unsafe fn write(self, ptrs: &[*mut u8]) {
                let ($($T,)*) = self;
                let mut i = 0;
                $(
                    if ptrs[i].is_null() {
                        drop($T);
                    } else {
                        std::ptr::write(ptrs[i] as *mut $T, $T);
                    }
                    i += 1;
                )*
                let _ = i; // Suppress unused warning
            }
        }
    };
}

// Implement for tuples of 1-8 components
impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
