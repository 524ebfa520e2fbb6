//! Raster I/O: reflectance and angle reads, GeoTIFF output, scene naming

pub mod raster;
pub mod angles;
pub mod writer;
pub mod scene;

pub use raster::{RasterProfile, RasterSource};
pub use angles::{AngleRasterSet, AngleReader, Geometry};
pub use writer::{quantize, NbarWriter};
pub use scene::{locate_band_file, nbar_output_name};
