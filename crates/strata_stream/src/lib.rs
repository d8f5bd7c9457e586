pub mod chunk;
pub mod config;
pub mod lod;
pub mod mesh;
pub mod realize;
pub mod streamer;
pub mod worker;

pub use streamer::{ChunkStreamer, StreamEvent, StreamerError};
