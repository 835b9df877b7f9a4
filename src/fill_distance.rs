//! Fill-distance analysis against a low-discrepancy reference of the
//! feasible region.
//!
//! A Sobol sequence (unscrambled, hence reproducible) is drawn over the unit
//! hypercube, mapped to physical units through the look-up tables and
//! filtered by the feasibility predicate. The surviving points stand in for
//! the feasible region; the fill distance of a design is the worst-case
//! distance from any reference point to its nearest design point.

use crate::errors::{DesignError, Result};
use crate::feasibility::{Feasibility, FeasibilityInput};
use crate::lut::LookUpTable;
use crate::metrics::cdist;
use crate::variables::DesignVariable;
use log::info;
use ndarray::{Array2, ArrayBase, Data, Ix2};
use sobol::params::JoeKuoD6;
use sobol::Sobol;

/// The feasible subset of a Sobol hypercube sample.
#[derive(Debug, Clone)]
pub struct SobolReference {
    /// Feasible points, in unit hypercube coordinates
    pub points: Array2<f64>,
    /// Fraction of the drawn points that passed the feasibility predicate;
    /// a diagnostic of how much of the nominal hypercube is physically
    /// attainable
    pub feasibility_ratio: f64,
}

/// Draws `2^exponent_of_two` Sobol points in `[0, 1]^d`, upscales them to
/// physical units and keeps the ones accepted by the feasibility predicate.
///
/// The variable list must contain the four constraint variables
/// (`tpot_pbl`, `lwp`, `pbl`, `q_inv`).
pub fn sobol_hypercube(
    variables: &[DesignVariable],
    exponent_of_two: u32,
    lut: &LookUpTable,
    feasibility: &dyn Feasibility,
) -> Result<SobolReference> {
    let dims = variables.len();
    let total = 1usize << exponent_of_two;

    let position = |variable: DesignVariable| -> Result<usize> {
        variables
            .iter()
            .position(|v| *v == variable)
            .ok_or(DesignError::MissingVariable(variable))
    };
    let i_tpot_pbl = position(DesignVariable::TpotPbl)?;
    let i_lwp = position(DesignVariable::Lwp)?;
    let i_pbl = position(DesignVariable::Pbl)?;
    let i_q_inv = position(DesignVariable::QInv)?;

    let params = JoeKuoD6::minimal();
    let dim_count = dims
        .try_into()
        .map_err(|_| DesignError::InvalidValue(format!("too many dimensions: {dims}")))?;
    let sequence = Sobol::<f64>::new(dim_count, &params);

    let mut kept = Vec::new();
    let mut accepted = 0usize;
    for point in sequence.take(total) {
        let mut physical = Vec::with_capacity(dims);
        for (&variable, &rank) in variables.iter().zip(point.iter()) {
            physical.push(lut.upscale(variable, rank)?);
        }
        let input = FeasibilityInput {
            tpot_pbl: physical[i_tpot_pbl],
            lwp: physical[i_lwp],
            pbl: physical[i_pbl],
            q_inv: physical[i_q_inv],
        };
        if feasibility.is_feasible(&input) {
            kept.extend_from_slice(&point);
            accepted += 1;
        }
    }

    let feasibility_ratio = accepted as f64 / total as f64;
    info!(
        "sobol reference: kept {accepted} of {total} points (feasibility ratio {feasibility_ratio:.3})"
    );
    Ok(SobolReference {
        points: Array2::from_shape_vec((accepted, dims), kept)?,
        feasibility_ratio,
    })
}

/// The fill distance of a design with respect to a reference point set: the
/// largest distance from any reference point to its nearest design point.
///
/// Lower is better; zero means every reference point coincides with a design
/// point. The full pairwise distance table is enumerated, an
/// O(|design| * |reference|) double loop. Returns NaN when either set is
/// empty, as no worst-covered point exists.
pub fn fill_distance(
    design: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    reference: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) -> f64 {
    if design.nrows() == 0 || reference.nrows() == 0 {
        return f64::NAN;
    }
    let distances = cdist(reference, design);
    let mut fill = f64::NEG_INFINITY;
    for row in distances.rows() {
        let nearest = row.iter().copied().fold(f64::INFINITY, f64::min);
        fill = fill.max(nearest);
    }
    fill
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::VariableTable;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use std::collections::HashMap;

    fn unit_lut(variables: &[DesignVariable]) -> LookUpTable {
        // a fine linear table makes upscaling approximately the identity
        let n = 1000;
        let mut tables = HashMap::new();
        for &variable in variables {
            tables.insert(
                variable,
                VariableTable::new((0..n).map(|i| i as f64 / n as f64).collect()).unwrap(),
            );
        }
        LookUpTable::from_tables(tables)
    }

    const VARS: [DesignVariable; 4] = [
        DesignVariable::TpotPbl,
        DesignVariable::Lwp,
        DesignVariable::Pbl,
        DesignVariable::QInv,
    ];

    #[test]
    fn test_fill_distance_of_reference_itself_is_zero() {
        let reference = arr2(&[[0.1, 0.2], [0.5, 0.5], [0.9, 0.1]]);
        assert_abs_diff_eq!(fill_distance(&reference, &reference), 0., epsilon = 1e-12);
    }

    #[test]
    fn test_fill_distance_single_design_point() {
        let design = arr2(&[[0., 0.]]);
        let reference = arr2(&[[1., 0.], [0., 2.]]);
        assert_abs_diff_eq!(fill_distance(&design, &reference), 2., epsilon = 1e-12);
    }

    #[test]
    fn test_fill_distance_uses_nearest_design_point() {
        let design = arr2(&[[0., 0.], [1., 0.]]);
        // both reference points sit next to one of the design points
        let reference = arr2(&[[0.1, 0.], [0.9, 0.]]);
        assert_abs_diff_eq!(fill_distance(&design, &reference), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_fill_distance_empty_is_nan() {
        let design = Array2::<f64>::zeros((0, 2));
        let reference = arr2(&[[0.1, 0.2]]);
        assert!(fill_distance(&design, &reference).is_nan());
        assert!(fill_distance(&reference, &design).is_nan());
    }

    #[test]
    fn test_sobol_all_feasible() {
        let lut = unit_lut(&VARS);
        let always = |_: &FeasibilityInput| true;
        let reference = sobol_hypercube(&VARS, 5, &lut, &always).unwrap();
        assert_eq!(reference.points.nrows(), 32);
        assert_abs_diff_eq!(reference.feasibility_ratio, 1., epsilon = 1e-12);
        for value in reference.points.iter() {
            assert!((0. ..=1.).contains(value));
        }
    }

    #[test]
    fn test_sobol_half_space_ratio() {
        let lut = unit_lut(&VARS);
        // reject points whose first coordinate is below one half
        let half = |input: &FeasibilityInput| input.tpot_pbl >= 0.5;
        let reference = sobol_hypercube(&VARS, 6, &lut, &half).unwrap();
        assert!(
            (reference.feasibility_ratio - 0.5).abs() < 0.1,
            "ratio {} too far from 0.5",
            reference.feasibility_ratio
        );
        for row in reference.points.rows() {
            assert!(row[0] >= 0.5 - 1e-3);
        }
    }

    #[test]
    fn test_sobol_missing_constraint_variable() {
        let vars = [DesignVariable::TpotPbl, DesignVariable::Lwp];
        let lut = unit_lut(&vars);
        let always = |_: &FeasibilityInput| true;
        let result = sobol_hypercube(&vars, 3, &lut, &always);
        assert!(matches!(
            result,
            Err(DesignError::MissingVariable(DesignVariable::Pbl))
        ));
    }
}
