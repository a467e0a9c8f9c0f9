pub mod shard;
pub mod stream;

pub use shard::{Shard, StartPosition};
pub use stream::{Stream, StreamSet};
