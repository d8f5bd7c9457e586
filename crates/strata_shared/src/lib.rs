pub mod blend;
pub mod chunk;
pub mod coords;
pub mod error;
pub mod heightfield;
pub mod items;
pub mod noise_field;
pub mod placement;
pub mod poisson;
pub mod settings;
pub mod worldgen;

pub use error::GenerationError;
