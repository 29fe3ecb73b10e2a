//! Container facades over the tree engine.
//!
//! Each container fixes a schema and maps its operations onto walkers and
//! cursor mutations. They run on any [`BlockStore`](crate::store::BlockStore);
//! `new` uses an in-memory store.

mod bit_vector;
mod ordered_map;
mod symbol_sequence;

pub use bit_vector::BitVector;
pub use ordered_map::OrderedMap;
pub use symbol_sequence::SymbolSequence;
