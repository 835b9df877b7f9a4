//! Quantile look-up tables mapping between physical values and unit
//! hypercube ranks.
//!
//! Per variable, the table is the sorted column of all observed values and
//! doubles as an empirical CDF. Upscaling (rank to value) is nearest-rank
//! quantile inversion; downscaling (value to rank) brackets the query
//! between two table indices and estimates a fractional rank from the
//! bracket. Tables are built once per source dataset and cached as
//! single-column CSV files; a build run that finds an existing cache file
//! skips recomputation entirely.

use crate::collection::Collection;
use crate::errors::{DesignError, Result};
use crate::variables::{DesignVariable, EPSILON};
use log::{debug, info};
use ndarray::{Array2, ArrayBase, Data, Ix2};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Bracketing index search strategy used when downscaling.
///
/// Both strategies return the same `(lower, upper)` bracket on any monotonic
/// table: `upper` is the first index holding a value strictly greater than
/// the query (the last index if none does), `lower` backs off one position.
/// A query at or beyond the last table value collapses the bracket to
/// `(last, last)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexSearch {
    /// Left-to-right scan, O(n)
    LinearScan,
    /// Bisection with `bisect_right` semantics, O(log n)
    #[default]
    Bisect,
}

impl IndexSearch {
    fn bracket(&self, values: &[f64], query: f64) -> (usize, usize) {
        let last = values.len() - 1;
        let upper = match self {
            IndexSearch::LinearScan => {
                values.iter().position(|v| *v > query).unwrap_or(last)
            }
            IndexSearch::Bisect => values.partition_point(|v| *v <= query).min(last),
        };
        let lower = if query >= values[last] {
            last
        } else {
            upper.saturating_sub(1)
        };
        (lower, upper)
    }
}

/// Fractional-rank estimator applied to a bracketed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Estimator {
    /// Average of the bracketing indices, divided by the table length
    #[default]
    Midpoint,
    /// Linear fit through the two bracketing (value, index) points,
    /// evaluated at the query and divided by the table length
    LocalLinearFit,
}

impl Estimator {
    fn rank(&self, values: &[f64], lower: usize, upper: usize, query: f64) -> f64 {
        let n = values.len() as f64;
        match self {
            Estimator::Midpoint => (lower + upper) as f64 / 2. / n,
            Estimator::LocalLinearFit => {
                let x_lo = values[lower];
                let x_hi = values[upper];
                // a least-squares line through two coincident points has
                // zero slope and intercept at the mean index, which is the
                // midpoint estimate
                if (x_hi - x_lo).abs() <= f64::EPSILON {
                    return Estimator::Midpoint.rank(values, lower, upper, query);
                }
                let slope = (upper - lower) as f64 / (x_hi - x_lo);
                let index = lower as f64 + slope * (query - x_lo);
                index / n
            }
        }
    }
}

/// A sorted reference column for one variable.
#[derive(Debug, Clone)]
pub struct VariableTable {
    values: Vec<f64>,
}

impl VariableTable {
    /// Wraps an already sorted column.
    ///
    /// Fails if the column is empty or not non-decreasing.
    pub fn new(values: Vec<f64>) -> Result<VariableTable> {
        if values.is_empty() {
            return Err(DesignError::InvalidValue(
                "look-up table cannot be empty".to_string(),
            ));
        }
        if values.windows(2).any(|w| w[0] > w[1]) {
            return Err(DesignError::InvalidValue(
                "look-up table values must be non-decreasing".to_string(),
            ));
        }
        Ok(VariableTable { values })
    }

    /// Sorts a raw column and wraps it.
    pub fn from_unsorted(mut values: Vec<f64>) -> Result<VariableTable> {
        values.sort_by(f64::total_cmp);
        VariableTable::new(values)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table is empty (never true for a constructed table).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The sorted values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Converts a unit hypercube rank into a physical value.
    ///
    /// Nearest-rank quantile inversion: the rank is multiplied by the table
    /// length, rounded to the nearest integer with ties going to the even
    /// neighbor (banker's rounding) and clamped to the valid index range.
    pub fn upscale(&self, rank: f64) -> f64 {
        let position = (rank * self.values.len() as f64).round_ties_even() as i64;
        let index = position.clamp(0, self.values.len() as i64 - 1) as usize;
        self.values[index]
    }

    /// Converts a physical value into a unit hypercube rank, using the given
    /// search strategy and estimator. Any combination is valid.
    pub fn downscale(&self, value: f64, search: IndexSearch, estimator: Estimator) -> f64 {
        let (lower, upper) = search.bracket(&self.values, value);
        estimator.rank(&self.values, lower, upper, value)
    }
}

/// Per-variable look-up tables for a source dataset.
#[derive(Debug, Clone)]
pub struct LookUpTable {
    tables: HashMap<DesignVariable, VariableTable>,
}

/// Cache file location for one variable's table: sits next to the source
/// file, named from the source stem and the variable.
pub fn table_path(source: &Path, variable: DesignVariable) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            DesignError::InvalidValue(format!("bad source file name: {}", source.display()))
        })?;
    let folder = source.parent().unwrap_or_else(|| Path::new("."));
    Ok(folder.join(format!("{stem}_look_up_table_{variable}.csv")))
}

impl LookUpTable {
    /// Builds a look-up table set from in-memory tables.
    pub fn from_tables(tables: HashMap<DesignVariable, VariableTable>) -> LookUpTable {
        LookUpTable { tables }
    }

    /// Creates the cached table files for the given variables, reading the
    /// source dataset only if at least one table is missing.
    ///
    /// Idempotent: existing cache files are detected and left untouched, so
    /// a second build run performs no filtering or sorting.
    pub fn create_look_up_tables(source: &Path, variables: &[DesignVariable]) -> Result<()> {
        let mut collection: Option<Collection> = None;
        for &variable in variables {
            let path = table_path(source, variable)?;
            if path.is_file() {
                debug!("look-up table for {variable} already cached: {}", path.display());
                continue;
            }
            if collection.is_none() {
                collection = Some(Collection::read_csv(source, variables)?);
            }
            let pool = collection.as_ref().unwrap();

            let column = pool.column(variable)?;
            let raw: Vec<f64> = if variable.filters_epsilon() {
                column.iter().copied().filter(|v| *v > EPSILON).collect()
            } else {
                column.iter().copied().collect()
            };
            let table = VariableTable::from_unsorted(raw)?;

            write_table_csv(&path, variable, table.values())?;
            info!(
                "created look-up table for {variable} ({} entries): {}",
                table.len(),
                path.display()
            );
        }
        Ok(())
    }

    /// Loads the cached tables for the given variables.
    ///
    /// Fails with [`DesignError::MissingLookUpTable`] when a cache file is
    /// absent; tables are never regenerated here.
    pub fn load(source: &Path, variables: &[DesignVariable]) -> Result<LookUpTable> {
        let mut tables = HashMap::new();
        for &variable in variables {
            let path = table_path(source, variable)?;
            if !path.is_file() {
                return Err(DesignError::MissingLookUpTable { variable, path });
            }
            let values = read_table_csv(&path)?;
            tables.insert(variable, VariableTable::new(values)?);
        }
        Ok(LookUpTable { tables })
    }

    /// The table of one variable.
    pub fn table(&self, variable: DesignVariable) -> Result<&VariableTable> {
        self.tables
            .get(&variable)
            .ok_or(DesignError::MissingVariable(variable))
    }

    /// Rank to physical value, see [`VariableTable::upscale`].
    pub fn upscale(&self, variable: DesignVariable, rank: f64) -> Result<f64> {
        Ok(self.table(variable)?.upscale(rank))
    }

    /// Physical value to rank, see [`VariableTable::downscale`].
    pub fn downscale(
        &self,
        variable: DesignVariable,
        value: f64,
        search: IndexSearch,
        estimator: Estimator,
    ) -> Result<f64> {
        Ok(self.table(variable)?.downscale(value, search, estimator))
    }

    /// Upscales a whole unit-hypercube matrix into physical units, column by
    /// column. Pure: the input is left untouched.
    pub fn upscale_matrix(
        &self,
        hypercube: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        variables: &[DesignVariable],
    ) -> Result<Array2<f64>> {
        self.map_matrix(hypercube, variables, |table, rank| table.upscale(rank))
    }

    /// Downscales a whole physical-unit matrix into the unit hypercube,
    /// column by column. Pure: the input is left untouched.
    pub fn downscale_matrix(
        &self,
        upscaled: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        variables: &[DesignVariable],
        search: IndexSearch,
        estimator: Estimator,
    ) -> Result<Array2<f64>> {
        self.map_matrix(upscaled, variables, |table, value| {
            table.downscale(value, search, estimator)
        })
    }

    fn map_matrix<F>(
        &self,
        data: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        variables: &[DesignVariable],
        f: F,
    ) -> Result<Array2<f64>>
    where
        F: Fn(&VariableTable, f64) -> f64,
    {
        if variables.len() != data.ncols() {
            return Err(DesignError::InvalidValue(format!(
                "matrix has {} columns but {} variables were given",
                data.ncols(),
                variables.len()
            )));
        }
        let mut out = data.to_owned();
        for (col, &variable) in variables.iter().enumerate() {
            let table = self.table(variable)?;
            for value in out.column_mut(col).iter_mut() {
                *value = f(table, *value);
            }
        }
        Ok(out)
    }
}

/// Writes a table as a single-column CSV headed by the variable name.
///
/// Values that repeat (within floating-point equality) are disambiguated
/// with a stable ordinal suffix `_1<k>`, in insertion order, so later
/// exact-match lookups on the persisted file stay well defined.
fn write_table_csv(path: &Path, variable: DesignVariable, values: &[f64]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([variable.as_str()])?;
    for field in suffix_duplicates(values) {
        writer.write_record([field])?;
    }
    writer.flush()?;
    Ok(())
}

/// Renders sorted values as strings, suffixing duplicate runs with ordinals.
fn suffix_duplicates(values: &[f64]) -> Vec<String> {
    let mut out = Vec::with_capacity(values.len());
    let mut i = 0;
    while i < values.len() {
        let mut run = 1;
        while i + run < values.len() && values[i + run] == values[i] {
            run += 1;
        }
        if run == 1 {
            out.push(values[i].to_string());
        } else {
            for ordinal in 1..=run {
                out.push(format!("{}_1{}", values[i], ordinal));
            }
        }
        i += run;
    }
    out
}

/// Reads back a single-column table CSV, stripping duplicate suffixes.
fn read_table_csv(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = record
            .get(0)
            .ok_or_else(|| DesignError::InvalidValue(format!("empty record in {}", path.display())))?;
        values.push(parse_table_value(field)?);
    }
    Ok(values)
}

fn parse_table_value(field: &str) -> Result<f64> {
    if let Ok(value) = field.parse::<f64>() {
        return Ok(value);
    }
    if let Some((prefix, _)) = field.rsplit_once('_') {
        if let Ok(value) = prefix.parse::<f64>() {
            return Ok(value);
        }
    }
    Err(DesignError::InvalidValue(format!(
        "bad look-up table entry: {field}"
    )))
}
