//! Pure-Rust HDF5 datatype message model.
//!
//! Decodes and encodes the datatype message (0x0003) so that compound
//! layouts can be discovered at run time. Supports `no_std` environments
//! with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod datatype;
pub mod error;
pub mod type_builders;

pub use datatype::{CompoundMember, Datatype, DatatypeClass};
pub use error::FormatError;
pub use type_builders::CompoundTypeBuilder;
