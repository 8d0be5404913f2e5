//! Error taxonomy for the transformation stages.
//!
//! Fatal conditions are [`PrepError`] variants and abort the session run.
//! Recoverable conditions (an empty trial window, a region with no matching
//! channels) are reported as [`Notice`]s on the result instead.
use thiserror::Error;

/// Fatal errors raised by the filter, windowing, aggregation and assembly stages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrepError {
    /// Two row-aligned columns disagree in length.
    #[error("data shape mismatch: {column} has {got} rows, expected {expected}")]
    DataShapeMismatch {
        /// Column that failed the check
        column: &'static str,
        /// Row count of the reference column
        expected: usize,
        /// Row count found
        got: usize,
    },

    /// A unit or component index falls outside its declared axis.
    #[error("invalid unit identity {id}: axis has {axis_len} entries")]
    InvalidUnitIdentity {
        /// Offending identity (may be negative)
        id: i64,
        /// Declared axis length
        axis_len: usize,
    },

    /// An upstream id column holds a value that is not a whole number.
    #[error("{column}: {value} is not an integral id")]
    NonIntegralId {
        /// Column that failed the check
        column: &'static str,
        /// Offending value (NaN, infinite, fractional or out of `i64` range)
        value: f64,
    },

    /// Per-trial arrays handed to the assembler are ragged.
    #[error("trial {trial} has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        /// Trial index
        trial: usize,
        /// `(units, bins)` every trial must have
        expected: (usize, usize),
        /// `(units, bins)` found
        got: (usize, usize),
    },

    /// An `idxKeep` entry points past the `lowPtpFilter`-ed set.
    #[error("{mask} index {index} out of range for {len} rows")]
    MaskIndexOutOfRange {
        /// Mask name
        mask: &'static str,
        /// Offending index
        index: usize,
        /// Rows available when the mask was applied
        len: usize,
    },

    /// An active-trial id points past the onset list.
    #[error("active trial {index} out of range for {n_trials} trials")]
    TrialIndexOutOfRange {
        /// Offending trial id
        index: usize,
        /// Number of onsets in the session
        n_trials: usize,
    },

    /// A column needed by the selected representation is absent.
    #[error("missing column: {0}")]
    MissingColumn(&'static str),

    /// Configuration cannot produce a valid tensor.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Recoverable conditions collected while a session is transformed.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Trial window held no spikes; its tensor row is all zeros.
    EmptyTrialWindow {
        /// Trial index in the output tensor
        trial: usize,
    },
    /// Region substring matched no channel or cluster; the unit axis is empty.
    RegionNotFound {
        /// Requested region
        region: String,
    },
}

pub type Result<T> = std::result::Result<T, PrepError>;
