use crate::core::bands::{BandRegistry, BandpassCoefficients, CommonBand};
use crate::types::{NbarImage, NbarResult, Platform};

/// Linear spectral bandpass adjustment (HLS 1.4) for one band
#[derive(Debug, Clone, Copy)]
pub struct BandpassModel {
    platform: Platform,
    band: CommonBand,
    coefficients: BandpassCoefficients,
}

impl BandpassModel {
    /// Resolve the adjustment for a platform and band.
    ///
    /// Returns `None` for platforms without a bandpass table (Landsat), where
    /// the adjustment is undefined and never applied.
    pub fn for_band(
        registry: &BandRegistry,
        platform: Platform,
        band: CommonBand,
    ) -> NbarResult<Option<Self>> {
        if !platform.is_sentinel2() {
            return Ok(None);
        }

        let coefficients = registry.bandpass_coefficients(platform, band)?;
        Ok(Some(Self { platform, band, coefficients }))
    }

    pub fn coefficients(&self) -> BandpassCoefficients {
        self.coefficients
    }

    #[inline]
    pub fn apply_value(&self, value: f64) -> f64 {
        value * self.coefficients.slope + self.coefficients.offset
    }

    /// `out = in * slope + offset` over the whole band; NaN (nodata) stays NaN
    pub fn apply(&self, image: &mut NbarImage) {
        log::info!(
            "Applying bandpass band {} satsen {} (slope {}, offset {})",
            self.band,
            self.platform,
            self.coefficients.slope,
            self.coefficients.offset
        );

        #[cfg(feature = "parallel")]
        image.par_mapv_inplace(|v| self.apply_value(v));
        #[cfg(not(feature = "parallel"))]
        image.mapv_inplace(|v| self.apply_value(v));
    }
}
