//! Object storage backends
//!
//! The object store ([`crate::areas::database::Database`]) keeps an ordered list of
//! backends. Each backend answers lookups for the objects it holds and may accept
//! writes.
//!
//! - `loose`: one zlib-compressed file per object under `objects/xx/yyyy...`
//! - `pack`: read-only access to `objects/pack/*.pack` through their `.idx`
//! - `memory`: a map held in memory, for tests and throwaway stores

pub mod backend;
pub mod loose;
pub mod memory;
pub mod pack;
pub mod raw_object;
pub mod stream;

/// Priority of the loose backend in a freshly opened store
pub const LOOSE_PRIORITY: i32 = 1;

/// Priority of the pack backend in a freshly opened store
pub const PACKED_PRIORITY: i32 = 2;
