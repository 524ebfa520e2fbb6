//! Nadir BRDF-Adjusted Reflectance driver.
//!
//! For every band the input raster is walked window by window. Each window is
//! corrected independently by `c = BRF(0, sz, 0) / BRF(vz, sz, ra)` and written
//! into a disjoint region of the full-scene buffer, which is then bandpass
//! adjusted and encoded.

use crate::core::bandpass::BandpassModel;
use crate::core::bands::{
    resolution_ratio, resolve_common_name, BandRegistry, BrdfCoefficients, CommonBand,
};
use crate::core::brdf::{brf_array, reference_brf_array};
use crate::core::window::WindowIterator;
use crate::io::angles::{AngleRasterSet, AngleReader, Geometry};
use crate::io::raster::{RasterProfile, RasterSource};
use crate::io::scene::{locate_band_file, nbar_output_name};
use crate::io::writer::{quantize, NbarWriter};
use crate::types::{
    DnRescale, NbarError, NbarImage, NbarPixel, NbarResult, SensorDescriptor, Window,
};
use ndarray::{s, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do with a window whose geometry cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileFailurePolicy {
    /// Fail the whole band
    Abort,
    /// Leave the window as nodata and record it in the band output
    Skip,
}

/// Parameters for NBAR processing
#[derive(Debug, Clone)]
pub struct NbarParams {
    /// Apply the Sentinel-2 bandpass adjustment after BRDF correction
    pub apply_bandpass: bool,
    /// Policy for recoverable per-window geometry failures
    pub tile_policy: TileFailurePolicy,
    /// Window size as (rows, cols); `None` follows the input's native blocks
    pub tile_size: Option<(usize, usize)>,
    /// GeoTIFF COMPRESS creation option
    pub compression: String,
}

impl Default for NbarParams {
    fn default() -> Self {
        Self {
            apply_bandpass: true,
            tile_policy: TileFailurePolicy::Abort,
            tile_size: None,
            compression: "DEFLATE".to_string(),
        }
    }
}

/// A band to harmonize and the file holding it
#[derive(Debug, Clone)]
pub struct BandInput {
    pub raw_band: String,
    pub path: PathBuf,
}

impl BandInput {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(raw_band: S, path: P) -> Self {
        Self { raw_band: raw_band.into(), path: path.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedTile {
    pub window: Window,
    pub reason: String,
}

/// Result of harmonizing one band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandOutput {
    pub raw_band: String,
    pub common_band: CommonBand,
    pub path: PathBuf,
    pub nodata: NbarPixel,
    pub bandpass_applied: bool,
    pub skipped_tiles: Vec<SkippedTile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandFailure {
    pub raw_band: String,
    pub error: String,
}

/// Per-band outcome of a multi-band run. Partial success is allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonizationReport {
    pub sensor: SensorDescriptor,
    pub outputs: Vec<BandOutput>,
    pub failures: Vec<BandFailure>,
}

impl HarmonizationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn output_for(&self, raw_band: &str) -> Option<&BandOutput> {
        self.outputs.iter().find(|o| o.raw_band == raw_band)
    }

    pub fn to_json(&self) -> NbarResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Per-pixel correction factor `BRF_reference / BRF_sensor`
pub fn correction_factor(geometry: &Geometry, coefficients: &BrdfCoefficients) -> NbarImage {
    let brf_sensor = brf_array(
        geometry.view_zenith.view(),
        geometry.solar_zenith.view(),
        geometry.relative_azimuth.view(),
        coefficients,
    );
    let brf_reference = reference_brf_array(geometry.solar_zenith.view(), coefficients);

    brf_reference / brf_sensor
}

/// Rescale (when required) and correct a reflectance window
pub fn apply_correction(
    mut reflectance: NbarImage,
    c_factor: &NbarImage,
    rescale: Option<DnRescale>,
) -> NbarImage {
    if let Some(rescale) = rescale {
        reflectance.mapv_inplace(|v| rescale.apply(v));
    }
    reflectance * c_factor
}

/// GDAL handles owned by one worker
struct TileReader {
    reflectance: RasterSource,
    angles: AngleReader,
}

impl TileReader {
    fn open(input: &Path, angles: &AngleRasterSet) -> NbarResult<Self> {
        Ok(Self {
            reflectance: RasterSource::open(input)?,
            angles: AngleReader::open(angles)?,
        })
    }

    fn correct(
        &self,
        window: Window,
        coefficients: &BrdfCoefficients,
        ratio: usize,
        rescale: Option<DnRescale>,
    ) -> NbarResult<NbarImage> {
        let geometry = self.angles.prepare(window, ratio)?;
        let c_factor = correction_factor(&geometry, coefficients);
        let reflectance = self.reflectance.read(window)?;

        Ok(apply_correction(reflectance, &c_factor, rescale))
    }
}

/// Correct `nbar` window by window, in place.
///
/// The buffer is split into strips of `block_rows` rows; each strip is owned
/// by one worker, which walks its windows left to right and writes every tile
/// into its own disjoint region. `init` builds the per-worker reader state.
/// Under [`TileFailurePolicy::Abort`] the first failing window ends its strip
/// and the remaining strips are abandoned.
fn fill_windows<T, I, F>(
    nbar: &mut NbarImage,
    (block_rows, block_cols): (usize, usize),
    policy: TileFailurePolicy,
    init: I,
    correct: F,
) -> NbarResult<Vec<SkippedTile>>
where
    I: Fn() -> NbarResult<T> + Sync + Send,
    F: Fn(&T, Window) -> NbarResult<NbarImage> + Sync + Send,
{
    let block_rows = block_rows.max(1);
    let cols = nbar.ncols();

    let run_strip = |state: &mut NbarResult<T>,
                     (index, mut strip): (usize, ArrayViewMut2<f64>)|
     -> NbarResult<Vec<SkippedTile>> {
        let reader = state.as_ref().map_err(|e| {
            NbarError::Processing(format!("Failed to open rasters for strip {}: {}", index, e))
        })?;

        let row_off = index * block_rows;
        let mut skipped = Vec::new();
        for local in WindowIterator::new(strip.nrows(), cols, strip.nrows(), block_cols) {
            let window = Window::new(row_off, local.col_off, local.height, local.width);
            log::debug!("Harmonizing window {}", window);

            match correct(reader, window) {
                Ok(tile) => strip.slice_mut(s![.., local.col_off..local.col_end()]).assign(&tile),
                Err(e) if e.is_tile_recoverable() && policy == TileFailurePolicy::Skip => {
                    log::warn!("Skipping window {}: {}", window, e);
                    skipped.push(SkippedTile { window, reason: e.to_string() });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(skipped)
    };

    #[cfg(feature = "parallel")]
    let per_strip: Vec<Vec<SkippedTile>> = {
        use rayon::prelude::*;
        nbar.axis_chunks_iter_mut(Axis(0), block_rows)
            .into_par_iter()
            .enumerate()
            .map_init(init, run_strip)
            .collect::<NbarResult<_>>()?
    };
    #[cfg(not(feature = "parallel"))]
    let per_strip: Vec<Vec<SkippedTile>> = {
        let mut state = init();
        nbar.axis_chunks_iter_mut(Axis(0), block_rows)
            .enumerate()
            .map(|strip| run_strip(&mut state, strip))
            .collect::<NbarResult<_>>()?
    };

    Ok(per_strip.into_iter().flatten().collect())
}

/// NBAR processor for one scene
pub struct NbarProcessor {
    sensor: SensorDescriptor,
    angles: AngleRasterSet,
    registry: BandRegistry,
    params: NbarParams,
}

impl NbarProcessor {
    pub fn new(sensor: SensorDescriptor, angles: AngleRasterSet, params: NbarParams) -> Self {
        Self::with_registry(sensor, angles, BandRegistry::default(), params)
    }

    pub fn with_registry(
        sensor: SensorDescriptor,
        angles: AngleRasterSet,
        registry: BandRegistry,
        params: NbarParams,
    ) -> Self {
        Self { sensor, angles, registry, params }
    }

    pub fn sensor(&self) -> &SensorDescriptor {
        &self.sensor
    }

    pub fn params(&self) -> &NbarParams {
        &self.params
    }

    /// Harmonize one band into `output_dir`, naming the file after the input
    pub fn process_band<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        raw_band: &str,
        input: P,
        output_dir: Q,
    ) -> NbarResult<BandOutput> {
        let output_path = output_dir.as_ref().join(nbar_output_name(input.as_ref(), &self.sensor)?);
        self.process_band_to(raw_band, input, output_path)
    }

    /// Harmonize one band into an explicit output path
    pub fn process_band_to<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        raw_band: &str,
        input: P,
        output_path: Q,
    ) -> NbarResult<BandOutput> {
        let input = input.as_ref();
        log::info!("Harmonizing band {} of {} ...", raw_band, self.sensor);

        let common_band = resolve_common_name(raw_band, &self.sensor)?;
        let coefficients = self.registry.brdf_coefficients(common_band)?;
        let ratio = resolution_ratio(raw_band, &self.sensor)?;
        let bandpass = if self.params.apply_bandpass {
            BandpassModel::for_band(&self.registry, self.sensor.platform, common_band)?
        } else {
            None
        };

        let profile = RasterProfile::from_path(input)?;
        let (block_rows, block_cols) = self.params.tile_size.unwrap_or(profile.block_size);
        let windows = WindowIterator::new(profile.height, profile.width, block_rows, block_cols);
        log::debug!(
            "Band {} is {}x{}, {} windows of {}x{}",
            raw_band,
            profile.height,
            profile.width,
            windows.window_count(),
            block_rows,
            block_cols
        );

        // Surface unreadable inputs once, before fanning out
        TileReader::open(input, &self.angles)?;

        let rescale = self.sensor.dn_rescale();
        let mut nbar = NbarImage::from_elem(profile.shape(), f64::NAN);
        let skipped_tiles = fill_windows(
            &mut nbar,
            (block_rows, block_cols),
            self.params.tile_policy,
            || TileReader::open(input, &self.angles),
            |reader, window| reader.correct(window, &coefficients, ratio, rescale),
        )?;
        if !skipped_tiles.is_empty() {
            log::warn!("Band {}: {} windows left as nodata", raw_band, skipped_tiles.len());
        }

        if let Some(model) = &bandpass {
            log::info!("Performing bandpass ...");
            model.apply(&mut nbar);
        }

        let nodata = self.sensor.nodata();
        let output_path = output_path.as_ref().to_path_buf();
        NbarWriter::new(&self.params.compression).write(
            &output_path,
            &quantize(&nbar, nodata),
            &profile,
            nodata,
        )?;

        Ok(BandOutput {
            raw_band: raw_band.to_string(),
            common_band,
            path: output_path,
            nodata,
            bandpass_applied: bandpass.is_some(),
            skipped_tiles,
        })
    }

    /// Harmonize several bands. Bands are independent; a failing band is
    /// reported without affecting the others.
    pub fn process_bands<P: AsRef<Path>>(
        &self,
        bands: &[BandInput],
        output_dir: P,
    ) -> NbarResult<HarmonizationReport> {
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)?;

        let run = |band: &BandInput| {
            let result = self.process_band(&band.raw_band, &band.path, output_dir);
            (band.raw_band.clone(), result)
        };

        #[cfg(feature = "parallel")]
        let results: Vec<(String, NbarResult<BandOutput>)> = {
            use rayon::prelude::*;
            bands.par_iter().map(run).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let results: Vec<(String, NbarResult<BandOutput>)> = bands.iter().map(run).collect();

        Ok(self.collect_report(results))
    }

    /// Locate each band inside `img_dir` and harmonize it
    pub fn process_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        img_dir: P,
        scene_id: &str,
        bands: &[&str],
        output_dir: Q,
    ) -> NbarResult<HarmonizationReport> {
        let mut inputs = Vec::new();
        let mut missing = Vec::new();

        for band in bands {
            match locate_band_file(img_dir.as_ref(), scene_id, band, &self.sensor) {
                Ok(path) => inputs.push(BandInput::new(*band, path)),
                Err(e) => {
                    log::error!("Cannot locate band {}: {}", band, e);
                    missing.push(BandFailure { raw_band: band.to_string(), error: e.to_string() });
                }
            }
        }

        let mut report = self.process_bands(&inputs, output_dir)?;
        report.failures.extend(missing);
        Ok(report)
    }

    fn collect_report(
        &self,
        results: Vec<(String, NbarResult<BandOutput>)>,
    ) -> HarmonizationReport {
        let mut outputs = Vec::new();
        let mut failures = Vec::new();

        for (raw_band, result) in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    log::error!("Band {} failed: {}", raw_band, e);
                    failures.push(BandFailure { raw_band, error: e.to_string() });
                }
            }
        }

        HarmonizationReport { sensor: self.sensor, outputs, failures }
    }
}
