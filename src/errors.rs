use crate::variables::DesignVariable;
use std::path::PathBuf;
use thiserror::Error;

/// A result type for design generation errors
pub type Result<T> = std::result::Result<T, DesignError>;

/// An error raised while generating or evaluating a design
#[derive(Error, Debug)]
pub enum DesignError {
    /// When the requested number of design points cannot be reached
    #[error(
        "infeasible target size: requested {requested} design points \
         but only {reached} partitions can be formed from a pool of {pool_size} rows"
    )]
    InfeasibleTargetSize {
        /// Requested number of design points
        requested: usize,
        /// Number of partitions formed before the process stalled
        reached: usize,
        /// Number of rows in the candidate pool
        pool_size: usize,
    },
    /// When no feasible row is found in a partition within the retry budget
    #[error("no feasible row found in partition {partition} after {retries} retries")]
    NoFeasibleRow {
        /// Index of the offending partition
        partition: usize,
        /// Number of draws attempted
        retries: usize,
    },
    /// When an operation is called out of order
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// When a look-up table cache file is absent
    #[error("missing look-up table for variable {variable}: {path}")]
    MissingLookUpTable {
        /// Variable whose table is missing
        variable: DesignVariable,
        /// Expected cache file location
        path: PathBuf,
    },
    /// When a required variable is absent from a collection or table set
    #[error("variable {0} not present")]
    MissingVariable(DesignVariable),
    /// When a value is invalid
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// When IO fails
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    /// When CSV reading or writing fails
    #[error("CSV error")]
    CsvError(#[from] csv::Error),
    /// When an ndarray reshape fails
    #[error("shape error")]
    ShapeError(#[from] ndarray::ShapeError),
}
