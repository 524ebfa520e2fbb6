use crate::io::raster::RasterProfile;
use crate::types::{NbarImage, NbarPixel, NbarResult};
use gdal::raster::{Buffer, RasterCreationOption};
use gdal::DriverManager;
use ndarray::Array2;
use num_traits::NumCast;
use std::path::Path;

/// Cast the corrected buffer to the output pixel type.
///
/// Values are truncated toward zero. NaN, infinities and values outside the
/// `i32` range become `nodata`.
pub fn quantize(image: &NbarImage, nodata: NbarPixel) -> Array2<NbarPixel> {
    image.mapv(|v| <NbarPixel as NumCast>::from(v).unwrap_or(nodata))
}

/// GeoTIFF encoder for NBAR bands
#[derive(Debug, Clone)]
pub struct NbarWriter {
    compression: String,
}

impl Default for NbarWriter {
    fn default() -> Self {
        Self::new("DEFLATE")
    }
}

impl NbarWriter {
    pub fn new(compression: &str) -> Self {
        Self { compression: compression.to_string() }
    }

    /// Write a quantized band with the georeferencing of `profile`
    pub fn write<P: AsRef<Path>>(
        &self,
        output_path: P,
        image: &Array2<NbarPixel>,
        profile: &RasterProfile,
        nodata: NbarPixel,
    ) -> NbarResult<()> {
        log::info!("Saving NBAR band as GeoTIFF: {}", output_path.as_ref().display());

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let (height, width) = image.dim();

        let options = [RasterCreationOption {
            key: "COMPRESS",
            value: &self.compression,
        }];
        let mut dataset = driver.create_with_band_type_with_options::<NbarPixel, _>(
            output_path.as_ref(),
            width as isize,
            height as isize,
            1,
            &options,
        )?;

        if let Some(transform) = profile.geo_transform {
            dataset.set_geo_transform(&transform)?;
        }
        if !profile.projection.is_empty() {
            dataset.set_projection(&profile.projection)?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        rasterband.set_no_data_value(Some(nodata as f64))?;

        let flat_data: Vec<NbarPixel> = image.iter().copied().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;

        log::debug!("Wrote {}x{} band with nodata {}", width, height, nodata);
        Ok(())
    }
}
