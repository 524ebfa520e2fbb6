//! Core NBAR harmonization modules

pub mod bands;
pub mod brdf;
pub mod bandpass;
pub mod window;
pub mod nbar;

// Re-export main types
pub use bands::{
    resolve_common_name, native_resolution, resolution_ratio, default_bands,
    BandRegistry, BrdfCoefficients, BandpassCoefficients, CommonBand,
};
pub use brdf::{brf, brf_array, li_sparse_kernel, ross_thick_kernel};
pub use bandpass::BandpassModel;
pub use window::WindowIterator;
pub use nbar::{
    correction_factor, apply_correction, NbarProcessor, NbarParams, TileFailurePolicy,
    BandInput, BandOutput, BandFailure, SkippedTile, HarmonizationReport,
};
