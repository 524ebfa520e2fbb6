use serde::{Deserialize, Serialize};

/// Reflectance / geometry pixel type used throughout the model
pub type NbarReal = f64;

/// 2D reflectance or angle array (rows x cols)
pub type NbarImage = ndarray::Array2<NbarReal>;

/// Output pixel type written to disk
pub type NbarPixel = i32;

/// Satellite platform carrying the multispectral instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    Landsat5,   // TM
    Landsat7,   // ETM+
    Landsat8,   // OLI
    Sentinel2A, // MSI
    Sentinel2B, // MSI
}

impl Platform {
    pub fn is_landsat(&self) -> bool {
        matches!(self, Platform::Landsat5 | Platform::Landsat7 | Platform::Landsat8)
    }

    pub fn is_sentinel2(&self) -> bool {
        matches!(self, Platform::Sentinel2A | Platform::Sentinel2B)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Landsat5 => write!(f, "LT05"),
            Platform::Landsat7 => write!(f, "LE07"),
            Platform::Landsat8 => write!(f, "LC08"),
            Platform::Sentinel2A => write!(f, "S2A"),
            Platform::Sentinel2B => write!(f, "S2B"),
        }
    }
}

/// Processing collection / product family of the surface reflectance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    /// Landsat Collection-1 (LEDAPS/LaSRC, `sr_bandN`)
    Landsat1,
    /// Landsat Collection-2 (`SR_BN`, scaled DN)
    Landsat2,
    /// Sentinel-2 MSI surface reflectance
    Sentinel2,
}

/// Linear digital-number rescale applied before BRDF correction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DnRescale {
    pub gain: f64,
    pub offset: f64,
}

impl DnRescale {
    /// Collection-2 DN to the 0-10000 reflectance scale: `dn * 0.275 - 2000`
    pub const LANDSAT_C2: DnRescale = DnRescale { gain: 0.275, offset: -2000.0 };

    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        value * self.gain + self.offset
    }
}

/// Immutable description of the sensor that acquired a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorDescriptor {
    pub platform: Platform,
    pub collection: Collection,
}

impl SensorDescriptor {
    /// Build a descriptor, rejecting platform/collection pairs that do not exist
    pub fn new(platform: Platform, collection: Collection) -> NbarResult<Self> {
        let valid = match collection {
            Collection::Landsat1 | Collection::Landsat2 => platform.is_landsat(),
            Collection::Sentinel2 => platform.is_sentinel2(),
        };

        if !valid {
            return Err(NbarError::UnsupportedSensor(format!(
                "{} cannot be paired with collection {:?}",
                platform, collection
            )));
        }

        Ok(Self { platform, collection })
    }

    /// Output nodata value fixed by the sensor/collection
    pub fn nodata(&self) -> NbarPixel {
        match self.collection {
            Collection::Landsat1 => -9999,
            Collection::Landsat2 | Collection::Sentinel2 => 0,
        }
    }

    /// DN rescale required before correction, if any
    pub fn dn_rescale(&self) -> Option<DnRescale> {
        match self.collection {
            Collection::Landsat2 => Some(DnRescale::LANDSAT_C2),
            _ => None,
        }
    }
}

impl std::fmt::Display for SensorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.platform, self.collection)
    }
}

/// Rectangular sub-region of a raster, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub row_off: usize,
    pub col_off: usize,
    pub height: usize,
    pub width: usize,
}

impl Window {
    pub fn new(row_off: usize, col_off: usize, height: usize, width: usize) -> Self {
        Self { row_off, col_off, height, width }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn row_end(&self) -> usize {
        self.row_off + self.height
    }

    pub fn col_end(&self) -> usize {
        self.col_off + self.width
    }

    /// Same window expressed on a grid `ratio` times finer
    pub fn scaled(&self, ratio: usize) -> Self {
        Self {
            row_off: self.row_off * ratio,
            col_off: self.col_off * ratio,
            height: self.height * ratio,
            width: self.width * ratio,
        }
    }

    /// Whether the window lies inside a raster of `(height, width)`
    pub fn fits_within(&self, height: usize, width: usize) -> bool {
        self.row_end() <= height && self.col_end() <= width
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[row {}..{}, col {}..{}]",
            self.row_off,
            self.row_end(),
            self.col_off,
            self.col_end()
        )
    }
}

/// Error types for NBAR processing
#[derive(Debug, thiserror::Error)]
pub enum NbarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Unknown band '{band}' for sensor {sensor}")]
    UnknownBand { band: String, sensor: String },

    #[error("Unsupported sensor: {0}")]
    UnsupportedSensor(String),

    #[error("Invalid scene id: {0}")]
    SceneId(String),

    #[error("Geometry unavailable for window {window}: {reason}")]
    Geometry { window: Window, reason: String },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NbarError {
    /// Failures scoped to a single tile, which the caller may choose to skip
    pub fn is_tile_recoverable(&self) -> bool {
        matches!(self, NbarError::Geometry { .. })
    }
}

/// Result type for NBAR operations
pub type NbarResult<T> = Result<T, NbarError>;
