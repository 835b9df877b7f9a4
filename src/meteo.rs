//! Adiabatic-cloud thermodynamics used by the feasibility constraint.
//!
//! Ports the LES input-generation chain: saturation vapor pressure,
//! saturation mixing ratio, relative humidity, liquid water path of an
//! adiabatic boundary layer, and the bisection solver recovering the total
//! water mixing ratio from a target liquid water path.
//!
//! Profiles are integrated at a fixed 1 m vertical resolution; all failure
//! modes return `None` rather than sentinel values.

use log::debug;

/// Specific gas constant for dry air, J/kg/K
const R: f64 = 287.04;
/// Specific gas constant for water vapor, J/kg/K
const RM: f64 = 461.5;
/// M_air/M_water - 1
const EP2: f64 = RM / R - 1.0;
/// Specific heat at constant pressure, J/kg/K
const CP: f64 = 1005.0;
const RCP: f64 = R / CP;
/// Gravitational acceleration, m/s^2
const G: f64 = 9.8;
/// Reference pressure, Pa
const P00: f64 = 1.0e5;
/// Latent heat of vaporization, J/kg
const ALVL: f64 = 2.5e6;

/// Saturation vapor pressure (Pa) of liquid water at temperature `t` (K).
///
/// Eighth-order polynomial fit from the LES model thermodynamics.
pub fn calc_psat_w(t: f64) -> f64 {
    const C: [f64; 9] = [
        0.6105851e+03,
        0.4440316e+02,
        0.1430341e+01,
        0.2641412e-01,
        0.2995057e-03,
        0.2031998e-05,
        0.6936113e-08,
        0.2564861e-11,
        -0.3704404e-13,
    ];
    let x = (t - 273.16).max(-80.);
    C.iter().rev().fold(0., |acc, c| acc * x + c)
}

/// Saturation mixing ratio for water (kg/kg) at pressure `p` (Pa) and
/// temperature `t` (K).
pub fn calc_sat_mixr(p: f64, t: f64) -> f64 {
    let esl = calc_psat_w(t);
    0.622 * esl / (p - esl)
}

/// Relative humidity (%) from the water vapor mixing ratio `rw` (kg/kg),
/// temperature `t` (K) and pressure `press` (Pa).
pub fn calc_rh(rw: f64, t: f64, press: f64) -> f64 {
    let ep = R / RM;
    let psat = calc_psat_w(t);
    press * rw / (ep + rw) / psat * 100.
}

/// Vertical profile summary of an adiabatic cloud layer.
#[derive(Debug, Clone, Copy)]
pub struct LwpProfile {
    /// Liquid water path, kg/m^2
    pub lwp: f64,
    /// Cloud base height (m), if a cloud forms
    pub cloud_base: Option<f64>,
    /// Cloud top height (m), if a cloud forms
    pub cloud_top: Option<f64>,
    /// Maximum (cloud top) liquid water mixing ratio, kg/kg
    pub max_cloud_water: f64,
}

/// Liquid water path of a boundary layer with constant liquid water
/// potential temperature `theta` (K) and total water mixing ratio `rt`
/// (kg/kg), integrated from the surface (`p_surf`, Pa) to the boundary
/// layer top.
///
/// A `pblh` below 10 is interpreted as a height in kilometers, anything
/// larger as a pressure distance in Pa above the surface.
pub fn calc_lwp(p_surf: f64, theta: f64, pblh: f64, rt: f64) -> LwpProfile {
    let (z_top, p_top) = if pblh < 10.0 {
        (pblh * 1000., 0.)
    } else {
        (10e3, p_surf - pblh)
    };

    let dz = 1.;
    let mut z = 0.;
    let mut press = p_surf;
    let mut rh = 0.;
    let mut tavg = theta;

    // integrate dry air up to the lifting condensation level
    while press > p_top && z <= z_top {
        tavg = theta * (press / P00).powf(RCP);
        rh = calc_rh(rt, tavg, press);
        if rh > 100. {
            break;
        }
        z += dz;
        let xsi = 1. + EP2 * rt;
        press -= G * dz * press / (R * tavg * xsi);
    }

    if rh <= 100. {
        // no cloud within the layer
        return LwpProfile {
            lwp: 0.,
            cloud_base: None,
            cloud_top: None,
            max_cloud_water: 0.,
        };
    }
    let cloud_base = z;

    // moist adiabatic ascent through the cloud
    let mut lwp = 0.;
    let mut rc = 0.;
    while press > p_top && z <= z_top {
        z += dz;
        let q_sat = calc_sat_mixr(press, tavg);
        tavg -= G * (1. + ALVL * q_sat / (R * tavg))
            / (CP + ALVL * ALVL * q_sat / (RM * tavg * tavg))
            * dz;
        let xsi = 1. + EP2 * q_sat;
        press -= G * dz * press / (R * tavg * xsi);
        rc = (rt - q_sat).max(0.);
        lwp += rc * dz * press / (R * tavg * xsi);
    }

    LwpProfile {
        lwp,
        cloud_base: Some(cloud_base),
        cloud_top: Some(z),
        max_cloud_water: rc,
    }
}

/// Solves the boundary layer total water mixing ratio (kg/kg) producing the
/// target liquid water path `lwp` (kg/m^2) for an adiabatic cloud, given the
/// liquid water potential temperature `theta` (K) and the boundary layer
/// height `pblh` (Pa or km, see [`calc_lwp`]).
///
/// For example, `solve_rw_lwp(101780., 293., 100e-3, 20000.)` returns
/// approximately `0.00723684` kg/kg. Returns `None` when the target is
/// outside the attainable range or the bisection fails to converge.
pub fn solve_rw_lwp(p_surf: f64, theta: f64, lwp: f64, pblh: f64) -> Option<f64> {
    // LWP tolerance: 0.1 %, bounded to [0.1e-3, 1e-3] kg/m^2
    let tol = (0.001 * lwp).max(0.1e-3).min(1e-3);

    let t_surf = theta * (p_surf / P00).powf(RCP);

    // highest attainable LWP: RH = 100 % at the surface (no fog)
    let mut rw_max = calc_sat_mixr(p_surf, t_surf);
    let lwp_max = calc_lwp(p_surf, theta, pblh, rw_max).lwp;
    if lwp_max < lwp {
        debug!(
            "too high LWP: {:.1} g/m2, the maximum is {:.1} g/m2 (theta={:.2} K, pblh={:.0} hPa)",
            lwp * 1e3,
            lwp_max * 1e3,
            theta,
            pblh / 100.
        );
        return None;
    }

    // lowest attainable LWP: completely dry layer
    let mut rw_min = 0.;
    let lwp_min = calc_lwp(p_surf, theta, pblh, rw_min).lwp;
    if lwp_min > lwp {
        debug!(
            "too low LWP: {:.1} g/m2, the minimum is {:.1} g/m2 (theta={:.2} K, pblh={:.0} hPa)",
            lwp * 1e3,
            lwp_min * 1e3,
            theta,
            pblh / 100.
        );
        return None;
    }

    for _ in 0..100 {
        let rw_new = 0.5 * (rw_min + rw_max);
        let lwp_new = calc_lwp(p_surf, theta, pblh, rw_new).lwp;
        if (lwp - lwp_new).abs() < tol || (rw_max - rw_min).abs() < 0.001e-3 {
            return Some(rw_new);
        }
        if lwp < lwp_new {
            rw_max = rw_new;
        } else {
            rw_min = rw_new;
        }
    }
    debug!("LWP bisection failed to converge (target {:.1} g/m2)", lwp * 1e3);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_psat_at_freezing_point() {
        // ~611 Pa at 0 degrees C
        assert_abs_diff_eq!(calc_psat_w(273.16), 610.5851, epsilon = 1e-3);
    }

    #[test]
    fn test_rh_saturation_consistency() {
        let p = 101780.;
        let t = 288.;
        let rw = calc_sat_mixr(p, t);
        assert_abs_diff_eq!(calc_rh(rw, t, p), 100., epsilon = 0.5);
    }

    #[test]
    fn test_solve_rw_lwp_reference_value() {
        let rw = solve_rw_lwp(101780., 293., 100e-3, 20000.).unwrap();
        assert_abs_diff_eq!(rw, 0.00723684088331, epsilon = 1e-5);
    }

    #[test]
    fn test_solve_rw_lwp_unattainable_lwp() {
        // an absurdly high LWP target cannot be met
        assert!(solve_rw_lwp(101780., 293., 50., 20000.).is_none());
    }

    #[test]
    fn test_calc_lwp_dry_layer_has_no_cloud() {
        let profile = calc_lwp(101780., 293., 20000., 1e-6);
        assert_abs_diff_eq!(profile.lwp, 0.);
        assert!(profile.cloud_base.is_none());
    }
}
