//! Band registry: raw band names, common names and per-band coefficients.
//!
//! BRDF coefficients from Roy, D. P., Zhang, H. K., Ju, J., Gomez-Dans, J. L.,
//! Lewis, P. E., Schaaf, C. B., Sun Q., Li J., Huang H., & Kovalskyy, V. (2016).
//! A general method to normalize Landsat reflectance data to nadir BRDF adjusted
//! reflectance. Remote Sensing of Environment, 176, 255-271.
//!
//! Bandpass coefficients from Claverie et al. (2018), The Harmonized Landsat and
//! Sentinel-2 surface reflectance data set (HLS v1.4).

use crate::types::{NbarError, NbarResult, Platform, SensorDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sensor-independent spectral channel label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommonBand {
    Coastal,
    Blue,
    Green,
    Red,
    RedEdge1,
    RedEdge2,
    RedEdge3,
    Nir,
    Swir1,
    Swir2,
}

impl CommonBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommonBand::Coastal => "coastal",
            CommonBand::Blue => "blue",
            CommonBand::Green => "green",
            CommonBand::Red => "red",
            CommonBand::RedEdge1 => "rededge1",
            CommonBand::RedEdge2 => "rededge2",
            CommonBand::RedEdge3 => "rededge3",
            CommonBand::Nir => "nir",
            CommonBand::Swir1 => "swir1",
            CommonBand::Swir2 => "swir2",
        }
    }
}

impl std::fmt::Display for CommonBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ross-Thick / Li-Sparse kernel weights for one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrdfCoefficients {
    pub fiso: f64,
    pub fgeo: f64,
    pub fvol: f64,
}

/// Linear bandpass adjustment for one (platform, band) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandpassCoefficients {
    pub slope: f64,
    pub offset: f64,
}

impl BandpassCoefficients {
    pub const IDENTITY: BandpassCoefficients = BandpassCoefficients { slope: 1.0, offset: 0.0 };

    pub fn is_identity(&self) -> bool {
        self.slope == 1.0 && self.offset == 0.0
    }
}

struct BandEntry {
    raw: &'static str,
    common: CommonBand,
    /// Native pixel size in metres
    resolution: u32,
}

const fn entry(raw: &'static str, common: CommonBand, resolution: u32) -> BandEntry {
    BandEntry { raw, common, resolution }
}

// TM / ETM+ (Landsat-5, Landsat-7)
const LANDSAT_TM_ETM_BANDS: &[BandEntry] = &[
    entry("sr_band1", CommonBand::Blue, 30),
    entry("sr_band2", CommonBand::Green, 30),
    entry("sr_band3", CommonBand::Red, 30),
    entry("sr_band4", CommonBand::Nir, 30),
    entry("sr_band5", CommonBand::Swir1, 30),
    entry("sr_band7", CommonBand::Swir2, 30),
    entry("SR_B1", CommonBand::Blue, 30),
    entry("SR_B2", CommonBand::Green, 30),
    entry("SR_B3", CommonBand::Red, 30),
    entry("SR_B4", CommonBand::Nir, 30),
    entry("SR_B5", CommonBand::Swir1, 30),
    entry("SR_B7", CommonBand::Swir2, 30),
];

// OLI (Landsat-8)
const LANDSAT_OLI_BANDS: &[BandEntry] = &[
    entry("sr_band1", CommonBand::Coastal, 30),
    entry("sr_band2", CommonBand::Blue, 30),
    entry("sr_band3", CommonBand::Green, 30),
    entry("sr_band4", CommonBand::Red, 30),
    entry("sr_band5", CommonBand::Nir, 30),
    entry("sr_band6", CommonBand::Swir1, 30),
    entry("sr_band7", CommonBand::Swir2, 30),
    entry("SR_B1", CommonBand::Coastal, 30),
    entry("SR_B2", CommonBand::Blue, 30),
    entry("SR_B3", CommonBand::Green, 30),
    entry("SR_B4", CommonBand::Red, 30),
    entry("SR_B5", CommonBand::Nir, 30),
    entry("SR_B6", CommonBand::Swir1, 30),
    entry("SR_B7", CommonBand::Swir2, 30),
];

// MSI (Sentinel-2A, Sentinel-2B), LaSRC and Sen2Cor naming
const SENTINEL2_MSI_BANDS: &[BandEntry] = &[
    entry("sr_band1", CommonBand::Coastal, 60),
    entry("sr_band2", CommonBand::Blue, 10),
    entry("sr_band3", CommonBand::Green, 10),
    entry("sr_band4", CommonBand::Red, 10),
    entry("sr_band5", CommonBand::RedEdge1, 20),
    entry("sr_band6", CommonBand::RedEdge2, 20),
    entry("sr_band7", CommonBand::RedEdge3, 20),
    entry("sr_band8", CommonBand::Nir, 10),
    entry("sr_band8a", CommonBand::Nir, 20),
    entry("sr_band11", CommonBand::Swir1, 20),
    entry("sr_band12", CommonBand::Swir2, 20),
    entry("B01", CommonBand::Coastal, 60),
    entry("B02", CommonBand::Blue, 10),
    entry("B03", CommonBand::Green, 10),
    entry("B04", CommonBand::Red, 10),
    entry("B05", CommonBand::RedEdge1, 20),
    entry("B06", CommonBand::RedEdge2, 20),
    entry("B07", CommonBand::RedEdge3, 20),
    entry("B08", CommonBand::Nir, 10),
    entry("B8A", CommonBand::Nir, 20),
    entry("B11", CommonBand::Swir1, 20),
    entry("B12", CommonBand::Swir2, 20),
];

fn band_table(platform: Platform) -> &'static [BandEntry] {
    match platform {
        Platform::Landsat5 | Platform::Landsat7 => LANDSAT_TM_ETM_BANDS,
        Platform::Landsat8 => LANDSAT_OLI_BANDS,
        Platform::Sentinel2A | Platform::Sentinel2B => SENTINEL2_MSI_BANDS,
    }
}

fn lookup(raw_band: &str, sensor: &SensorDescriptor) -> NbarResult<&'static BandEntry> {
    band_table(sensor.platform)
        .iter()
        .find(|e| e.raw == raw_band)
        .ok_or_else(|| NbarError::UnknownBand {
            band: raw_band.to_string(),
            sensor: sensor.platform.to_string(),
        })
}

/// Resolve a sensor-specific raw band name to its common name
pub fn resolve_common_name(raw_band: &str, sensor: &SensorDescriptor) -> NbarResult<CommonBand> {
    lookup(raw_band, sensor).map(|e| e.common)
}

/// Native pixel size (metres) of a raw band
pub fn native_resolution(raw_band: &str, sensor: &SensorDescriptor) -> NbarResult<u32> {
    lookup(raw_band, sensor).map(|e| e.resolution)
}

/// Pixel size (metres) the angle rasters are generated at
pub fn angle_grid_resolution(platform: Platform) -> u32 {
    if platform.is_sentinel2() {
        10
    } else {
        30
    }
}

/// How many angle-grid pixels span one band pixel along each axis
pub fn resolution_ratio(raw_band: &str, sensor: &SensorDescriptor) -> NbarResult<usize> {
    let band_res = native_resolution(raw_band, sensor)?;
    let angle_res = angle_grid_resolution(sensor.platform);

    if band_res % angle_res != 0 {
        return Err(NbarError::InvalidFormat(format!(
            "band {} resolution {} m is not a multiple of the {} m angle grid",
            raw_band, band_res, angle_res
        )));
    }

    Ok((band_res / angle_res) as usize)
}

/// Bands harmonized by default for a sensor
pub fn default_bands(sensor: &SensorDescriptor) -> &'static [&'static str] {
    use crate::types::Collection;

    match (sensor.platform, sensor.collection) {
        (Platform::Landsat5 | Platform::Landsat7, Collection::Landsat1) => {
            &["sr_band1", "sr_band2", "sr_band3", "sr_band4", "sr_band5", "sr_band7"]
        }
        (Platform::Landsat5 | Platform::Landsat7, _) => {
            &["SR_B1", "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B7"]
        }
        (Platform::Landsat8, Collection::Landsat1) => {
            &["sr_band2", "sr_band3", "sr_band4", "sr_band5", "sr_band6", "sr_band7"]
        }
        (Platform::Landsat8, _) => &["SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B6", "SR_B7"],
        (Platform::Sentinel2A | Platform::Sentinel2B, _) => {
            &["B02", "B03", "B04", "B08", "B8A", "B11", "B12"]
        }
    }
}

/// Coefficient tables used by the kernel and bandpass models.
///
/// Built once (normally via `Default`) and shared by reference; never mutated
/// while processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandRegistry {
    brdf: BTreeMap<CommonBand, BrdfCoefficients>,
    bandpass: BTreeMap<Platform, BTreeMap<CommonBand, BandpassCoefficients>>,
}

impl Default for BandRegistry {
    fn default() -> Self {
        let brdf = [
            (CommonBand::Blue, 774.0, 79.0, 372.0),
            (CommonBand::Green, 1306.0, 178.0, 580.0),
            (CommonBand::Red, 1690.0, 227.0, 574.0),
            (CommonBand::Nir, 3093.0, 330.0, 1535.0),
            (CommonBand::Swir1, 3430.0, 453.0, 1154.0),
            (CommonBand::Swir2, 2658.0, 387.0, 639.0),
        ]
        .into_iter()
        .map(|(band, fiso, fgeo, fvol)| (band, BrdfCoefficients { fiso, fgeo, fvol }))
        .collect();

        let s2a = [
            (CommonBand::Coastal, 0.9959, -0.0002),
            (CommonBand::Blue, 0.9778, -0.004),
            (CommonBand::Green, 1.0053, -0.0009),
            (CommonBand::Red, 0.9765, 0.0009),
            (CommonBand::Nir, 0.9983, -0.0001),
            (CommonBand::Swir1, 0.9987, -0.0011),
            (CommonBand::Swir2, 1.003, -0.0012),
        ];
        let s2b = [
            (CommonBand::Coastal, 0.9959, -0.0002),
            (CommonBand::Blue, 0.9778, -0.004),
            (CommonBand::Green, 1.0075, -0.0008),
            (CommonBand::Red, 0.9761, 0.001),
            (CommonBand::Nir, 0.9966, 0.000),
            (CommonBand::Swir1, 1.000, -0.0003),
            (CommonBand::Swir2, 0.9867, -0.0004),
        ];

        let to_table = |rows: &[(CommonBand, f64, f64)]| {
            rows.iter()
                .map(|&(band, slope, offset)| (band, BandpassCoefficients { slope, offset }))
                .collect::<BTreeMap<_, _>>()
        };

        let mut bandpass = BTreeMap::new();
        bandpass.insert(Platform::Sentinel2A, to_table(&s2a));
        bandpass.insert(Platform::Sentinel2B, to_table(&s2b));

        Self { brdf, bandpass }
    }
}

impl BandRegistry {
    pub fn new(
        brdf: BTreeMap<CommonBand, BrdfCoefficients>,
        bandpass: BTreeMap<Platform, BTreeMap<CommonBand, BandpassCoefficients>>,
    ) -> Self {
        Self { brdf, bandpass }
    }

    /// Kernel weights for a band. Bands without published weights (coastal,
    /// red-edge) are rejected.
    pub fn brdf_coefficients(&self, band: CommonBand) -> NbarResult<BrdfCoefficients> {
        self.brdf.get(&band).copied().ok_or_else(|| NbarError::UnknownBand {
            band: band.to_string(),
            sensor: "BRDF coefficient table".to_string(),
        })
    }

    /// Bandpass adjustment for a band. Identity for every platform without a
    /// table.
    pub fn bandpass_coefficients(
        &self,
        platform: Platform,
        band: CommonBand,
    ) -> NbarResult<BandpassCoefficients> {
        match self.bandpass.get(&platform) {
            None => Ok(BandpassCoefficients::IDENTITY),
            Some(table) => table.get(&band).copied().ok_or_else(|| NbarError::UnknownBand {
                band: band.to_string(),
                sensor: platform.to_string(),
            }),
        }
    }
}
