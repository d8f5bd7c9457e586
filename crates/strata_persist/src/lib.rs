pub mod codec;
pub mod compression;
