//! Sun and view geometry rasters.
//!
//! Angle rasters hold degrees scaled by 100. They are read per window and
//! converted to radians; relative azimuth is derived, never stored.

use crate::io::raster::RasterSource;
use crate::types::{NbarError, NbarImage, NbarResult, Window};
use gdal::raster::ResampleAlg;
use ndarray::{ArrayView2, Zip};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Degree to radian proportion
pub const DE2RA: f64 = 0.0174532925199432956;

/// Scale factor of the stored angle values
pub const ANGLE_SCALE: f64 = 100.0;

/// Paths to the four per-pixel geometry rasters of a scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AngleRasterSet {
    pub solar_zenith: PathBuf,
    pub solar_azimuth: PathBuf,
    pub view_zenith: PathBuf,
    pub view_azimuth: PathBuf,
}

impl AngleRasterSet {
    pub fn new<P: Into<PathBuf>>(
        solar_zenith: P,
        solar_azimuth: P,
        view_zenith: P,
        view_azimuth: P,
    ) -> Self {
        Self {
            solar_zenith: solar_zenith.into(),
            solar_azimuth: solar_azimuth.into(),
            view_zenith: view_zenith.into(),
            view_azimuth: view_azimuth.into(),
        }
    }

    /// Find `{scene_id}*_solar_zenith_*.tif` and friends anywhere below `dir`
    pub fn discover<P: AsRef<Path>>(dir: P, scene_id: &str) -> NbarResult<Self> {
        log::info!("Load angles for {} from {}", scene_id, dir.as_ref().display());

        let mut files = Vec::new();
        collect_files(dir.as_ref(), &mut files)?;
        files.retain(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(scene_id) && n.to_ascii_lowercase().ends_with(".tif"))
                .unwrap_or(false)
        });
        files.sort();

        let find = |marker: &str| -> NbarResult<PathBuf> {
            let pattern = Regex::new(&format!(".*_{}_.*", marker))
                .map_err(|e| NbarError::Processing(format!("Invalid angle pattern: {}", e)))?;
            files
                .iter()
                .find(|p| pattern.is_match(&p.to_string_lossy()))
                .cloned()
                .ok_or_else(|| {
                    NbarError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!(
                            "No {} raster for {} in {}",
                            marker,
                            scene_id,
                            dir.as_ref().display()
                        ),
                    ))
                })
        };

        Ok(Self {
            solar_zenith: find("solar_zenith")?,
            solar_azimuth: find("solar_azimuth")?,
            view_zenith: find("sensor_zenith")?,
            view_azimuth: find("sensor_azimuth")?,
        })
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> NbarResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Per-window sun/view geometry in radians
#[derive(Debug, Clone)]
pub struct Geometry {
    pub view_zenith: NbarImage,
    pub solar_zenith: NbarImage,
    pub relative_azimuth: NbarImage,
}

impl Geometry {
    /// Convert raw scaled-degree arrays. Relative azimuth is
    /// `((view_az / 100) - (solar_az / 100)) * DE2RA`.
    pub fn from_scaled_degrees(
        solar_zenith: ArrayView2<f64>,
        solar_azimuth: ArrayView2<f64>,
        view_zenith: ArrayView2<f64>,
        view_azimuth: ArrayView2<f64>,
    ) -> Self {
        let to_radians = |raw: f64| raw / ANGLE_SCALE * DE2RA;

        let relative_azimuth = Zip::from(view_azimuth)
            .and(solar_azimuth)
            .map_collect(|&va, &sa| ((va / ANGLE_SCALE) - (sa / ANGLE_SCALE)) * DE2RA);

        Self {
            view_zenith: view_zenith.mapv(to_radians),
            solar_zenith: solar_zenith.mapv(to_radians),
            relative_azimuth,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.view_zenith.dim()
    }
}

/// Open handles on the four angle rasters
pub struct AngleReader {
    solar_zenith: RasterSource,
    solar_azimuth: RasterSource,
    view_zenith: RasterSource,
    view_azimuth: RasterSource,
}

impl AngleReader {
    pub fn open(angles: &AngleRasterSet) -> NbarResult<Self> {
        Ok(Self {
            solar_zenith: RasterSource::open(&angles.solar_zenith)?,
            solar_azimuth: RasterSource::open(&angles.solar_azimuth)?,
            view_zenith: RasterSource::open(&angles.view_zenith)?,
            view_azimuth: RasterSource::open(&angles.view_azimuth)?,
        })
    }

    /// Geometry for a band window.
    ///
    /// `ratio` is the number of angle-grid pixels per band pixel. When it is
    /// above 1 the angle window is scaled by `ratio` and area-averaged down to
    /// the band window shape. Any read failure is reported as a
    /// [`NbarError::Geometry`] for this window.
    pub fn prepare(&self, window: Window, ratio: usize) -> NbarResult<Geometry> {
        let read = |source: &RasterSource, name: &str| -> NbarResult<NbarImage> {
            let result = if ratio <= 1 {
                source.read(window)
            } else {
                source.read_resampled(window.scaled(ratio), window.shape(), ResampleAlg::Average)
            };

            result.map_err(|e| NbarError::Geometry {
                window,
                reason: format!("{} ({}): {}", name, source.path().display(), e),
            })
        };

        let solar_zenith = read(&self.solar_zenith, "solar zenith")?;
        let solar_azimuth = read(&self.solar_azimuth, "solar azimuth")?;
        let view_zenith = read(&self.view_zenith, "view zenith")?;
        let view_azimuth = read(&self.view_azimuth, "view azimuth")?;

        Ok(Geometry::from_scaled_degrees(
            solar_zenith.view(),
            solar_azimuth.view(),
            view_zenith.view(),
            view_azimuth.view(),
        ))
    }
}
