use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("terrain has no noise passes configured")]
    NoPasses,

    #[error("pass {pass} mask has {actual} cells, expected {expected}")]
    MaskSizeMismatch {
        pass: usize,
        expected: usize,
        actual: usize,
    },

    #[error("pass {pass} produced a non-finite height at ({x}, {y})")]
    NonFinite { pass: usize, x: usize, y: usize },

    #[error("unsupported chunk size {0}")]
    UnsupportedChunkSize(u32),

    #[error("mesh scale must be positive and finite, got {0}")]
    InvalidMeshScale(f32),
}
