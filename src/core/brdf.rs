//! Ross-Thick / Li-Sparse-Reciprocal semi-empirical BRDF model.
//!
//! Lucht, W., Schaaf, C. B., & Strahler, A. H. (2000). An algorithm for the
//! retrieval of albedo from space using semiempirical BRDF models. IEEE TGRS,
//! 38(2), 977-998.
//!
//! All angles are in radians. Nothing here guards against degenerate geometry
//! except the `cos_t` clamp: NaN and infinities propagate to the caller.

use crate::core::bands::BrdfCoefficients;
use crate::types::NbarImage;
use ndarray::{ArrayView2, Zip};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// b/r crown shape parameter
pub const BR_RATIO: f64 = 1.0;
/// h/b crown relative height
pub const HB_RATIO: f64 = 2.0;

#[inline]
pub fn sec(angle: f64) -> f64 {
    1.0 / angle.cos()
}

/// Zenith angle corrected for crown shape: `atan(b/r * tan(theta))`
#[inline]
pub fn corrected_angle(angle: f64) -> f64 {
    (BR_RATIO * angle.tan()).atan()
}

/// Overlap angle `t` from `cos_t`, clamped into the arccos domain
#[inline]
pub fn overlap_angle(cos_t: f64) -> f64 {
    cos_t.clamp(-1.0, 1.0).acos()
}

/// Li-Sparse-Reciprocal geometric-optical kernel
pub fn li_sparse_kernel(view_zenith: f64, solar_zenith: f64, relative_azimuth: f64) -> f64 {
    let theta_s = corrected_angle(solar_zenith);
    let theta_v = corrected_angle(view_zenith);

    let (tan_s, tan_v) = (theta_s.tan(), theta_v.tan());
    let (sec_s, sec_v) = (sec(theta_s), sec(theta_v));
    let cos_phi = relative_azimuth.cos();

    let d = (tan_s * tan_s + tan_v * tan_v - 2.0 * tan_s * tan_v * cos_phi).sqrt();
    let cross = tan_s * tan_v * relative_azimuth.sin();
    let cos_t = HB_RATIO * (d * d + cross * cross).sqrt() / (sec_s + sec_v);

    let t = overlap_angle(cos_t);
    let overlap = (1.0 / PI) * (t - t.sin() * cos_t) * (sec_v * sec_s);
    let cos_xi = theta_s.cos() * theta_v.cos() + theta_s.sin() * theta_v.sin() * cos_phi;

    overlap - sec_s - sec_v + 0.5 * (1.0 + cos_xi) * sec_v * sec_s
}

/// Ross-Thick volumetric scattering kernel (uncorrected angles)
pub fn ross_thick_kernel(view_zenith: f64, solar_zenith: f64, relative_azimuth: f64) -> f64 {
    let cos_xi = solar_zenith.cos() * view_zenith.cos()
        + solar_zenith.sin() * view_zenith.sin() * relative_azimuth.cos();
    let xi = cos_xi.acos();

    (((FRAC_PI_2 - xi) * cos_xi + xi.sin()) / (solar_zenith.cos() + view_zenith.cos())) - FRAC_PI_4
}

/// Bidirectional reflectance factor for one geometry
#[inline]
pub fn brf(
    view_zenith: f64,
    solar_zenith: f64,
    relative_azimuth: f64,
    coefficients: &BrdfCoefficients,
) -> f64 {
    let li = li_sparse_kernel(view_zenith, solar_zenith, relative_azimuth);
    let ross = ross_thick_kernel(view_zenith, solar_zenith, relative_azimuth);

    coefficients.fiso + coefficients.fvol * ross + coefficients.fgeo * li
}

/// Element-wise BRF over same-shape angle arrays
pub fn brf_array(
    view_zenith: ArrayView2<f64>,
    solar_zenith: ArrayView2<f64>,
    relative_azimuth: ArrayView2<f64>,
    coefficients: &BrdfCoefficients,
) -> NbarImage {
    log::debug!("Calculating Li-Sparse and Ross-Thick kernels over {:?}", view_zenith.dim());

    let zip = Zip::from(view_zenith).and(solar_zenith).and(relative_azimuth);

    #[cfg(feature = "parallel")]
    let out = zip.par_map_collect(|&vz, &sz, &ra| brf(vz, sz, ra, coefficients));
    #[cfg(not(feature = "parallel"))]
    let out = zip.map_collect(|&vz, &sz, &ra| brf(vz, sz, ra, coefficients));

    out
}

/// BRF at nadir view and zero relative azimuth for the given solar zenith
pub fn reference_brf_array(
    solar_zenith: ArrayView2<f64>,
    coefficients: &BrdfCoefficients,
) -> NbarImage {
    let zeros = NbarImage::zeros(solar_zenith.dim());
    brf_array(zeros.view(), solar_zenith, zeros.view(), coefficients)
}
