// SPDX-License-Identifier: Apache-2.0

//! Error types for invariant violations detected inside the core.
//!
//! Tool outcomes (synthesis failure, simulator timeout, ...) are *values*
//! carried by the driver result types, not errors; these types cover actual
//! bugs and environment problems that abort the current iteration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifuzzError {
    #[error("malformed source: {0}")]
    Validate(#[from] ValidateError),

    #[error("filesystem error at {path}: {source}")]
    Fs {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A well-formedness violation in a module under test.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidateError {
    #[error("top module `{0}` is not declared")]
    MissingTop(String),

    #[error("identifier `{0}` declared more than once in module `{1}`")]
    DuplicateDecl(String, String),

    #[error("`{0}` referenced before declaration in module `{1}`")]
    Undeclared(String, String),

    #[error("assignment target `{0}` is not an assignable wire in module `{1}`")]
    BadAssignTarget(String, String),

    #[error("`{0}` is driven by more than one assignment in module `{1}`")]
    MultipleDrivers(String, String),

    #[error("`{0}` is part of a combinational dependency cycle in module `{1}`")]
    CombinationalLoop(String, String),

    #[error("width mismatch assigning `{target}`: declared {declared}, expression {actual}")]
    WidthMismatch {
        target: String,
        declared: u32,
        actual: u32,
    },

    #[error("expression has no derivable width in module `{0}`")]
    NoWidth(String),

    #[error("statically-zero divisor in module `{0}`")]
    ZeroDivisor(String),

    #[error("shift amount is not a bounded literal in module `{0}`")]
    UnboundedShift(String),

    #[error("empty source: no modules declared")]
    EmptySource,
}

impl VerifuzzError {
    pub fn fs(path: impl Into<String>, source: std::io::Error) -> Self {
        VerifuzzError::Fs {
            path: path.into(),
            source,
        }
    }
}
