//! Vector database adapter implementations.

pub mod fixed;
pub mod milvus;
pub mod pool;
