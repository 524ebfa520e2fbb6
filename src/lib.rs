//! nbar-harm: Nadir BRDF-Adjusted Reflectance and bandpass harmonization
//!
//! Normalizes Landsat-5/7/8 and Sentinel-2A/2B surface reflectance to a nadir
//! view with the Ross-Thick / Li-Sparse-Reciprocal BRDF model, and optionally
//! applies the HLS bandpass adjustment to Sentinel-2 bands.

pub mod types;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    Platform, Collection, SensorDescriptor, DnRescale, Window,
    NbarError, NbarResult, NbarImage, NbarPixel,
};

pub use crate::core::{
    BandRegistry, CommonBand, NbarProcessor, NbarParams, TileFailurePolicy,
    BandInput, BandOutput, HarmonizationReport,
};

pub use io::{AngleRasterSet, Geometry};
