use crate::types::{NbarError, NbarImage, NbarResult, Window};
use gdal::raster::ResampleAlg;
use gdal::Dataset;
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Georeferencing and layout of an input reflectance raster
#[derive(Debug, Clone)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    /// Native block size as (rows, cols)
    pub block_size: (usize, usize),
    pub geo_transform: Option<[f64; 6]>,
    /// WKT, empty when the source carries no coordinate system
    pub projection: String,
    pub nodata: Option<f64>,
}

impl RasterProfile {
    pub fn from_path<P: AsRef<Path>>(path: P) -> NbarResult<Self> {
        let dataset = Dataset::open(path.as_ref())?;
        Self::from_dataset(&dataset)
    }

    pub fn from_dataset(dataset: &Dataset) -> NbarResult<Self> {
        let (width, height) = dataset.raster_size();
        let rasterband = dataset.rasterband(1)?;
        let (block_x, block_y) = rasterband.block_size();

        Ok(Self {
            width,
            height,
            block_size: (block_y, block_x),
            geo_transform: dataset.geo_transform().ok(),
            projection: dataset.projection(),
            nodata: rasterband.no_data_value(),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

/// Single-band raster opened for windowed, nodata-masked reads.
///
/// Pixels equal to the band nodata value are returned as NaN.
pub struct RasterSource {
    path: PathBuf,
    dataset: Dataset,
    nodata: Option<f64>,
}

impl RasterSource {
    pub fn open<P: AsRef<Path>>(path: P) -> NbarResult<Self> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Loading {} ...", path.display());

        let dataset = Dataset::open(&path)?;
        let nodata = dataset.rasterband(1)?.no_data_value();

        Ok(Self { path, dataset, nodata })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raster shape as (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        let (width, height) = self.dataset.raster_size();
        (height, width)
    }

    /// Read a window at native resolution
    pub fn read(&self, window: Window) -> NbarResult<NbarImage> {
        self.read_into(window, window.shape(), None)
    }

    /// Read `source` and resample it to `out_shape` (rows, cols)
    pub fn read_resampled(
        &self,
        source: Window,
        out_shape: (usize, usize),
        resampling: ResampleAlg,
    ) -> NbarResult<NbarImage> {
        self.read_into(source, out_shape, Some(resampling))
    }

    fn read_into(
        &self,
        source: Window,
        out_shape: (usize, usize),
        resampling: Option<ResampleAlg>,
    ) -> NbarResult<NbarImage> {
        let (rows, cols) = self.dim();
        if !source.fits_within(rows, cols) {
            return Err(NbarError::InvalidFormat(format!(
                "window {} outside {}x{} raster {}",
                source,
                rows,
                cols,
                self.path.display()
            )));
        }

        let rasterband = self.dataset.rasterband(1)?;
        let (out_rows, out_cols) = out_shape;
        let buffer = rasterband.read_as::<f64>(
            (source.col_off as isize, source.row_off as isize),
            (source.width, source.height),
            (out_cols, out_rows),
            resampling,
        )?;

        let mut image = Array2::from_shape_vec((out_rows, out_cols), buffer.data)
            .map_err(|e| NbarError::Processing(format!("Failed to reshape window data: {}", e)))?;

        if let Some(nodata) = self.nodata {
            mask_nodata(&mut image, nodata);
        }

        Ok(image)
    }
}

/// Replace every pixel equal to `nodata` by NaN
pub fn mask_nodata(image: &mut NbarImage, nodata: f64) {
    image.mapv_inplace(|v| if v == nodata { f64::NAN } else { v });
}
