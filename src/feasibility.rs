//! Physical feasibility of candidate design points.

use crate::collection::Collection;
use crate::errors::Result;
use crate::meteo;
use crate::variables::DesignVariable;

/// The row values a feasibility check operates on: the minimum required
/// variable set shared by all simulation sets.
#[derive(Debug, Clone, Copy)]
pub struct FeasibilityInput {
    /// Boundary layer potential temperature (K)
    pub tpot_pbl: f64,
    /// Liquid water path (g/m2)
    pub lwp: f64,
    /// Boundary layer height (hPa)
    pub pbl: f64,
    /// Humidity inversion strength (g/kg)
    pub q_inv: f64,
}

impl FeasibilityInput {
    /// Extracts the input values from one collection row.
    pub fn from_collection_row(collection: &Collection, row: usize) -> Result<FeasibilityInput> {
        Ok(FeasibilityInput {
            tpot_pbl: collection.value(row, DesignVariable::TpotPbl)?,
            lwp: collection.value(row, DesignVariable::Lwp)?,
            pbl: collection.value(row, DesignVariable::Pbl)?,
            q_inv: collection.value(row, DesignVariable::QInv)?,
        })
    }
}

/// A deterministic predicate distinguishing physically valid combinations of
/// design variables from invalid ones.
///
/// Implemented by any `Fn(&FeasibilityInput) -> bool`, which keeps tests and
/// ad-hoc constraints cheap to write.
pub trait Feasibility {
    /// Whether the given combination of values is physically attainable.
    fn is_feasible(&self, input: &FeasibilityInput) -> bool;
}

impl<F: Fn(&FeasibilityInput) -> bool> Feasibility for F {
    fn is_feasible(&self, input: &FeasibilityInput) -> bool {
        self(input)
    }
}

/// The production constraint: the boundary layer must hold enough total
/// water for the requested cloud, with a margin over the inversion
/// humidity.
///
/// The total water mixing ratio is solved from the adiabatic cloud model
/// ([`meteo::solve_rw_lwp`]); a row passes when the solved boundary-layer
/// humidity exceeds the inversion humidity by more than `margin` g/kg. Rows
/// for which the solver finds no solution are infeasible.
#[derive(Debug, Clone, Copy)]
pub struct AdiabaticCloudConstraint {
    /// Surface pressure, Pa
    pub surface_pressure: f64,
    /// Required humidity margin, g/kg
    pub margin: f64,
}

impl Default for AdiabaticCloudConstraint {
    fn default() -> Self {
        AdiabaticCloudConstraint {
            surface_pressure: 101780.,
            margin: 1.,
        }
    }
}

impl Feasibility for AdiabaticCloudConstraint {
    fn is_feasible(&self, input: &FeasibilityInput) -> bool {
        // lwp comes in g/m2 and pbl in hPa; the solver wants kg/m2 and Pa
        match meteo::solve_rw_lwp(
            self.surface_pressure,
            input.tpot_pbl,
            input.lwp * 1e-3,
            input.pbl * 100.,
        ) {
            Some(q_pbl) => q_pbl * 1e3 - input.q_inv > self.margin,
            None => false,
        }
    }
}
