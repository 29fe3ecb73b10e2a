//! Packed node memory: fixed-size blocks, the sub-block allocator that carves
//! them into slots, and the stream kinds stored in those slots.

pub mod allocator;
pub mod array;
pub mod bitmap;
pub mod block;
pub mod sequence;
pub mod stream;
pub mod sum_tree;
mod symbols;

pub use allocator::{AllocError, PackedAllocator};
pub use array::ArrayStream;
pub use bitmap::BitmapStream;
pub use block::Block;
pub use sequence::SequenceStream;
pub use stream::{
    AnyStream, FindResult, PackedStream, SearchType, StreamError, StreamKind, StreamSpec,
};
pub use sum_tree::SumTreeStream;
