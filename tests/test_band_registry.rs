use nbar_harm::core::bands::{
    angle_grid_resolution, default_bands, resolution_ratio, resolve_common_name,
};
use nbar_harm::core::brdf::{brf, li_sparse_kernel, ross_thick_kernel};
use nbar_harm::core::BandpassModel;
use nbar_harm::{BandRegistry, Collection, CommonBand, Platform, SensorDescriptor};

const PLATFORMS: [Platform; 5] = [
    Platform::Landsat5,
    Platform::Landsat7,
    Platform::Landsat8,
    Platform::Sentinel2A,
    Platform::Sentinel2B,
];

const COLLECTIONS: [Collection; 3] =
    [Collection::Landsat1, Collection::Landsat2, Collection::Sentinel2];

fn supported_sensors() -> Vec<SensorDescriptor> {
    PLATFORMS
        .iter()
        .flat_map(|&p| COLLECTIONS.iter().map(move |&c| SensorDescriptor::new(p, c)))
        .filter_map(Result::ok)
        .collect()
}

#[test]
fn test_supported_sensor_pairs() {
    let sensors = supported_sensors();
    assert_eq!(sensors.len(), 8);
    assert!(SensorDescriptor::new(Platform::Landsat8, Collection::Sentinel2).is_err());
    assert!(SensorDescriptor::new(Platform::Sentinel2A, Collection::Landsat2).is_err());
}

#[test]
fn test_default_bands_are_fully_tabulated() {
    let registry = BandRegistry::default();

    for sensor in supported_sensors() {
        for band in default_bands(&sensor) {
            let common = resolve_common_name(band, &sensor)
                .unwrap_or_else(|e| panic!("{} on {}: {}", band, sensor, e));
            let coefficients = registry.brdf_coefficients(common).unwrap();
            assert!(coefficients.fiso > 0.0);

            let ratio = resolution_ratio(band, &sensor).unwrap();
            assert!(ratio == 1 || ratio == 2, "{} on {} has ratio {}", band, sensor, ratio);

            let bandpass = BandpassModel::for_band(&registry, sensor.platform, common).unwrap();
            assert_eq!(bandpass.is_some(), sensor.platform.is_sentinel2());
        }
    }
}

#[test]
fn test_angle_grid_follows_platform() {
    assert_eq!(angle_grid_resolution(Platform::Sentinel2B), 10);
    assert_eq!(angle_grid_resolution(Platform::Landsat5), 30);
}

#[test]
fn test_red_edge_has_no_kernel_weights() {
    let registry = BandRegistry::default();
    let s2 = SensorDescriptor::new(Platform::Sentinel2A, Collection::Sentinel2).unwrap();

    let common = resolve_common_name("B06", &s2).unwrap();
    assert!(registry.brdf_coefficients(common).is_err());
    assert!(registry.brdf_coefficients(CommonBand::Coastal).is_err());
}

#[test]
fn test_kernels_are_reciprocal() {
    let registry = BandRegistry::default();
    let nir = registry.brdf_coefficients(CommonBand::Nir).unwrap();

    for (a, b, phi) in [(0.1, 0.6, 0.0), (0.3, 0.9, 1.2), (0.05, 0.5, 3.0)] {
        assert!((li_sparse_kernel(a, b, phi) - li_sparse_kernel(b, a, phi)).abs() < 1e-12);
        assert!((ross_thick_kernel(a, b, phi) - ross_thick_kernel(b, a, phi)).abs() < 1e-12);
        assert!((brf(a, b, phi, &nir) - brf(b, a, phi, &nir)).abs() < 1e-9);
    }
}
