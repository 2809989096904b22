// # Mapping Store Implementations
//
// This module provides implementations of the MappingStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileMappingStore, FileMappingStoreFactory};
pub use memory::{MemoryMappingStore, MemoryMappingStoreFactory};
