use crate::errors::{DesignError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Threshold below which `cos_mu` and `rdry_AS_eff` values are treated as zero
/// and dropped from the candidate pool and the look-up tables.
pub const EPSILON: f64 = f64::EPSILON;

/// A design variable of the LES emulator dataset.
///
/// The vocabulary is closed: a candidate pool column either maps to one of
/// these or is rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DesignVariable {
    /// Humidity inversion strength (g/kg)
    QInv,
    /// Potential temperature inversion strength (K)
    TpotInv,
    /// Liquid water path (g/m2)
    Lwp,
    /// Boundary layer potential temperature (K)
    TpotPbl,
    /// Boundary layer height (hPa)
    Pbl,
    /// Cloud droplet number concentration
    Cdnc,
    /// Aitken mode number concentration
    Ks,
    /// Accumulation mode number concentration
    As,
    /// Coarse mode number concentration
    Cs,
    /// Effective dry radius of the accumulation mode
    RdryAsEff,
    /// Cosine of the solar zenith angle
    CosMu,
}

impl DesignVariable {
    /// All design variables, in canonical dataset column order.
    pub const ALL: [DesignVariable; 11] = [
        DesignVariable::QInv,
        DesignVariable::TpotInv,
        DesignVariable::Lwp,
        DesignVariable::TpotPbl,
        DesignVariable::Pbl,
        DesignVariable::Cdnc,
        DesignVariable::Ks,
        DesignVariable::As,
        DesignVariable::Cs,
        DesignVariable::RdryAsEff,
        DesignVariable::CosMu,
    ];

    /// Canonical column name as it appears in the source dataset.
    pub fn as_str(&self) -> &'static str {
        match self {
            DesignVariable::QInv => "q_inv",
            DesignVariable::TpotInv => "tpot_inv",
            DesignVariable::Lwp => "lwp",
            DesignVariable::TpotPbl => "tpot_pbl",
            DesignVariable::Pbl => "pbl",
            DesignVariable::Cdnc => "cdnc",
            DesignVariable::Ks => "ks",
            DesignVariable::As => "as",
            DesignVariable::Cs => "cs",
            DesignVariable::RdryAsEff => "rdry_AS_eff",
            DesignVariable::CosMu => "cos_mu",
        }
    }

    /// Whether rows at or below [`EPSILON`] are dropped when building the
    /// look-up table for this variable. Physical values of exactly zero are
    /// not meaningful for these two.
    pub fn filters_epsilon(&self) -> bool {
        matches!(self, DesignVariable::CosMu | DesignVariable::RdryAsEff)
    }

    /// Resolves a CSV column header to a design variable.
    ///
    /// Accepts the legacy `pblh` name (boundary layer height in meters, from
    /// an alternate data source) as an alias of [`DesignVariable::Pbl`].
    pub fn from_column_name(name: &str) -> Option<DesignVariable> {
        if name == "pblh" {
            return Some(DesignVariable::Pbl);
        }
        DesignVariable::ALL.iter().find(|v| v.as_str() == name).copied()
    }
}

impl fmt::Display for DesignVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DesignVariable {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self> {
        DesignVariable::from_column_name(s)
            .ok_or_else(|| DesignError::InvalidValue(format!("unknown design variable: {s}")))
    }
}

/// One of the four simulated variable groups: two microphysics schemes
/// (SB, SALSA) crossed with day/night (day adds the solar angle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationSet {
    /// Seifert-Beheng microphysics, nighttime
    SbNight,
    /// Seifert-Beheng microphysics, daytime
    SbDay,
    /// SALSA microphysics, nighttime
    SalsaNight,
    /// SALSA microphysics, daytime
    SalsaDay,
}

const METEOROLOGICAL: [DesignVariable; 5] = [
    DesignVariable::QInv,
    DesignVariable::TpotInv,
    DesignVariable::Lwp,
    DesignVariable::TpotPbl,
    DesignVariable::Pbl,
];

impl SimulationSet {
    /// All simulation sets.
    pub const ALL: [SimulationSet; 4] = [
        SimulationSet::SbNight,
        SimulationSet::SbDay,
        SimulationSet::SalsaNight,
        SimulationSet::SalsaDay,
    ];

    /// Name used in file paths and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationSet::SbNight => "SBnight",
            SimulationSet::SbDay => "SBday",
            SimulationSet::SalsaNight => "SALSAnight",
            SimulationSet::SalsaDay => "SALSAday",
        }
    }

    /// Design variables of this set: the five meteorological variables plus
    /// the scheme-specific ones, plus `cos_mu` for the day sets.
    pub fn variables(&self) -> Vec<DesignVariable> {
        let mut vars = METEOROLOGICAL.to_vec();
        match self {
            SimulationSet::SbNight | SimulationSet::SbDay => {
                vars.push(DesignVariable::Cdnc);
            }
            SimulationSet::SalsaNight | SimulationSet::SalsaDay => {
                vars.extend([
                    DesignVariable::Ks,
                    DesignVariable::As,
                    DesignVariable::Cs,
                    DesignVariable::RdryAsEff,
                ]);
            }
        }
        if matches!(self, SimulationSet::SbDay | SimulationSet::SalsaDay) {
            vars.push(DesignVariable::CosMu);
        }
        vars
    }
}

impl fmt::Display for SimulationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SimulationSet {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self> {
        SimulationSet::ALL
            .iter()
            .find(|set| set.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| DesignError::InvalidValue(format!("unknown simulation set: {s}")))
    }
}
