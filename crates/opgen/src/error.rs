use crate::instruction::MAX_COMPONENTS;

/// Recoverable, input-dependent failures.
///
/// Invariant violations inside the combining engine (mismatched opcode
/// widths, out-of-range component positions or letters) indicate a corrupted
/// collection and panic instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid opcode literal {literal:?}: {reason}")]
    InvalidOpcode {
        literal: String,
        reason: &'static str,
    },

    #[error("duplicate opcode {0}")]
    DuplicateOpcode(String),

    #[error("instruction must have an opcode and at least one component")]
    EmptyInstruction,

    #[error("instruction has {0} components, the limit is {MAX_COMPONENTS}")]
    TooManyComponents(usize),

    #[error("failed to build the combining worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
