//! Candidate pool loading and design persistence.
//!
//! The pool is a CSV table with a leading index column and one column per
//! design variable. It is loaded once and immutable afterwards; row
//! filtering produces a new collection.

use crate::errors::{DesignError, Result};
use crate::variables::{DesignVariable, EPSILON};
use log::info;
use ndarray::{Array2, ArrayView1, Axis};
use std::fs::{self, File};
use std::path::Path;

/// An immutable candidate pool: one row per candidate, one column per
/// design variable.
#[derive(Debug, Clone)]
pub struct Collection {
    variables: Vec<DesignVariable>,
    data: Array2<f64>,
    /// Original index-column labels, kept so written designs carry the
    /// source row identifiers.
    row_labels: Vec<String>,
}

impl Collection {
    /// Builds a collection from an in-memory matrix; rows are labeled by
    /// their position.
    pub fn from_array(variables: Vec<DesignVariable>, data: Array2<f64>) -> Result<Collection> {
        if variables.len() != data.ncols() {
            return Err(DesignError::InvalidValue(format!(
                "collection has {} columns but {} variables were given",
                data.ncols(),
                variables.len()
            )));
        }
        let row_labels = (0..data.nrows()).map(|i| i.to_string()).collect();
        Ok(Collection {
            variables,
            data,
            row_labels,
        })
    }

    /// Reads the given design variables from a CSV file with a leading index
    /// column.
    ///
    /// Column headers are matched against the canonical variable names; the
    /// legacy `pblh` header is accepted for the boundary-layer variable.
    /// No row filtering happens here; design-time callers drop near-zero
    /// `cos_mu` rows through [`Collection::filter_above_epsilon`].
    pub fn read_csv(path: &Path, variables: &[DesignVariable]) -> Result<Collection> {
        let file = File::open(path)?;
        let mut reader = csv::Reader::from_reader(file);

        let headers = reader.headers()?.clone();
        let mut positions = Vec::with_capacity(variables.len());
        for var in variables {
            let pos = headers
                .iter()
                .position(|name| DesignVariable::from_column_name(name) == Some(*var))
                .ok_or(DesignError::MissingVariable(*var))?;
            positions.push(pos);
        }

        let mut values = Vec::new();
        let mut row_labels = Vec::new();
        for record in reader.records() {
            let record = record?;
            for &pos in &positions {
                let field = record.get(pos).ok_or_else(|| {
                    DesignError::InvalidValue(format!("short record in {}", path.display()))
                })?;
                let value: f64 = field.parse().map_err(|_| {
                    DesignError::InvalidValue(format!("non-numeric value: {field}"))
                })?;
                values.push(value);
            }
            row_labels.push(record.get(0).unwrap_or_default().to_string());
        }

        let nrows = row_labels.len();
        let data = Array2::from_shape_vec((nrows, variables.len()), values)?;
        let collection = Collection {
            variables: variables.to_vec(),
            data,
            row_labels,
        };
        info!(
            "loaded collection {} ({} rows, {} variables)",
            path.display(),
            collection.nrows(),
            collection.variables.len()
        );
        Ok(collection)
    }

    /// Keeps only the rows where `variable` exceeds [`EPSILON`].
    pub fn filter_above_epsilon(&self, variable: DesignVariable) -> Result<Collection> {
        let col = self.column(variable)?;
        let keep: Vec<usize> = col
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > EPSILON)
            .map(|(i, _)| i)
            .collect();
        Ok(Collection {
            variables: self.variables.clone(),
            data: self.data.select(Axis(0), &keep),
            row_labels: keep.iter().map(|&i| self.row_labels[i].clone()).collect(),
        })
    }

    /// Number of candidate rows.
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    /// Variables, in column order.
    pub fn variables(&self) -> &[DesignVariable] {
        &self.variables
    }

    /// The full pool as a matrix.
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// One candidate row.
    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.data.row(index)
    }

    /// Column index of a variable.
    pub fn column_index(&self, variable: DesignVariable) -> Result<usize> {
        self.variables
            .iter()
            .position(|v| *v == variable)
            .ok_or(DesignError::MissingVariable(variable))
    }

    /// One variable across all rows.
    pub fn column(&self, variable: DesignVariable) -> Result<ArrayView1<'_, f64>> {
        Ok(self.data.column(self.column_index(variable)?))
    }

    /// Value of a variable in one row.
    pub fn value(&self, row: usize, variable: DesignVariable) -> Result<f64> {
        Ok(self.data[[row, self.column_index(variable)?]])
    }

    /// Copies the given rows into a dense matrix, preserving order.
    pub fn select_rows(&self, rows: &[usize]) -> Array2<f64> {
        self.data.select(Axis(0), rows)
    }

    /// Writes the given rows as a design CSV, with the original column
    /// layout and the original index labels.
    pub fn write_design_csv(&self, path: &Path, rows: &[usize]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec![String::new()];
        header.extend(self.variables.iter().map(|v| v.as_str().to_string()));
        writer.write_record(&header)?;

        for &row in rows {
            let mut record = vec![self.row_labels[row].clone()];
            record.extend(self.data.row(row).iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        info!("wrote design ({} rows) to {}", rows.len(), path.display());
        Ok(())
    }
}

/// A summary statistics row written next to each best-of-repetitions design.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct DesignStats {
    /// Target number of design points
    pub design_points: usize,
    /// Criterion value of the best design found
    pub criterion_value: f64,
    /// Wall-clock duration of the whole repetition loop, in seconds
    pub duration_s: f64,
}

/// Writes design statistics as a CSV table indexed by design size.
pub fn write_stats_csv(path: &Path, stats: &[DesignStats]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in stats {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads back a design statistics table.
pub fn read_stats_csv(path: &Path) -> Result<Vec<DesignStats>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut stats = Vec::new();
    for record in reader.deserialize() {
        stats.push(record?);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use std::io::Write;

    fn test_dir() -> std::path::PathBuf {
        let dir = std::path::PathBuf::from("target/tests/collection");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_read_csv_with_index_column() {
        let path = test_dir().join("pool.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, ",q_inv,lwp,cos_mu").unwrap();
        writeln!(file, "7,1.0,30.0,0.5").unwrap();
        writeln!(file, "9,2.0,40.0,0.0").unwrap();
        writeln!(file, "11,3.0,50.0,0.9").unwrap();
        drop(file);

        let vars = vec![
            DesignVariable::QInv,
            DesignVariable::Lwp,
            DesignVariable::CosMu,
        ];
        let collection = Collection::read_csv(&path, &vars).unwrap();
        assert_eq!(collection.nrows(), 3);
        let collection = collection
            .filter_above_epsilon(DesignVariable::CosMu)
            .unwrap();
        // the cos_mu == 0 row is filtered out
        assert_eq!(collection.nrows(), 2);
        assert_abs_diff_eq!(
            collection.value(1, DesignVariable::QInv).unwrap(),
            3.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_read_csv_pblh_alias() {
        let path = test_dir().join("pool_pblh.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, ",tpot_pbl,pblh").unwrap();
        writeln!(file, "0,280.0,400.0").unwrap();
        drop(file);

        let collection =
            Collection::read_csv(&path, &[DesignVariable::TpotPbl, DesignVariable::Pbl]).unwrap();
        assert_abs_diff_eq!(
            collection.value(0, DesignVariable::Pbl).unwrap(),
            400.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_read_csv_missing_variable() {
        let path = test_dir().join("pool_missing.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, ",q_inv").unwrap();
        writeln!(file, "0,1.0").unwrap();
        drop(file);

        let result = Collection::read_csv(&path, &[DesignVariable::Cdnc]);
        assert!(matches!(
            result,
            Err(DesignError::MissingVariable(DesignVariable::Cdnc))
        ));
    }

    #[test]
    fn test_design_csv_round_trip() {
        let vars = vec![DesignVariable::QInv, DesignVariable::Lwp];
        let collection = Collection::from_array(
            vars.clone(),
            arr2(&[[1., 10.], [2., 20.], [3., 30.], [4., 40.]]),
        )
        .unwrap();
        let path = test_dir().join("design.csv");
        collection.write_design_csv(&path, &[2, 0]).unwrap();

        let read_back = Collection::read_csv(&path, &vars).unwrap();
        assert_eq!(read_back.nrows(), 2);
        assert_abs_diff_eq!(
            read_back.value(0, DesignVariable::Lwp).unwrap(),
            30.0,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            read_back.value(1, DesignVariable::QInv).unwrap(),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_stats_csv_round_trip() {
        let path = test_dir().join("stats.csv");
        let stats = vec![
            DesignStats {
                design_points: 53,
                criterion_value: 0.25,
                duration_s: 1.5,
            },
            DesignStats {
                design_points: 101,
                criterion_value: 0.125,
                duration_s: 3.0,
            },
        ];
        write_stats_csv(&path, &stats).unwrap();
        let read_back = read_stats_csv(&path).unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[1].design_points, 101);
        assert_abs_diff_eq!(read_back[0].criterion_value, 0.25, epsilon = 1e-12);
    }
}
