// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Two vectors of different lengths were compared.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A query asked for zero results.
    #[error("Invalid result count k={0}: must be greater than zero")]
    InvalidK(usize),
}

pub type Result<T> = std::result::Result<T, KernelError>;
