//! The flint object model, bytecode container, and garbage-collected heap.
//!
//! This crate is the shared substrate of the compiler and the virtual
//! machine: [`value::Value`] and the heap object variants in [`object`], the
//! [`chunk::Chunk`] bytecode container with its constant pool and line
//! table, the [`opcode::OpCode`] instruction set, and the [`heap::Heap`]
//! that owns every object and reclaims the unreachable ones with a tri-color
//! mark-and-sweep collector.

pub mod chunk;
pub mod error;
pub mod heap;
pub mod native;
pub mod object;
pub mod opcode;
pub mod value;

pub use heap::{Handle, Heap, MarkRoots, Object};
pub use value::Value;
