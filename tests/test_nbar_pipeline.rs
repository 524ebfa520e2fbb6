use gdal::raster::{Buffer, GdalType, RasterCreationOption};
use gdal::{Dataset, DriverManager, Metadata};
use nbar_harm::core::bands::resolve_common_name;
use nbar_harm::types::{Collection, NbarError, Platform, SensorDescriptor};
use nbar_harm::{AngleRasterSet, BandInput, NbarParams, NbarProcessor, TileFailurePolicy};
use ndarray::Array2;
use std::path::{Path, PathBuf};

const GEO_TRANSFORM: [f64; 6] = [300000.0, 10.0, 0.0, 7500000.0, 0.0, -10.0];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_raster<T: GdalType + Copy>(
    path: &Path,
    data: &Array2<T>,
    nodata: Option<f64>,
    tiled: bool,
) {
    let driver = DriverManager::get_driver_by_name("GTiff").expect("GTiff driver");
    let (height, width) = data.dim();

    let options: Vec<RasterCreationOption> = if tiled {
        vec![
            RasterCreationOption { key: "TILED", value: "YES" },
            RasterCreationOption { key: "BLOCKXSIZE", value: "16" },
            RasterCreationOption { key: "BLOCKYSIZE", value: "16" },
        ]
    } else {
        Vec::new()
    };

    let mut dataset = driver
        .create_with_band_type_with_options::<T, _>(
            path,
            width as isize,
            height as isize,
            1,
            &options,
        )
        .expect("Failed to create test raster");
    dataset.set_geo_transform(&GEO_TRANSFORM).expect("geotransform");

    let mut rasterband = dataset.rasterband(1).expect("band 1");
    if let Some(nodata) = nodata {
        rasterband.set_no_data_value(Some(nodata)).expect("nodata");
    }
    let buffer = Buffer::new((width, height), data.iter().copied().collect());
    rasterband.write((0, 0), (width, height), &buffer).expect("write");
}

fn read_output(path: &Path) -> (Array2<i32>, Option<f64>, Dataset) {
    let dataset = Dataset::open(path).expect("Failed to open NBAR output");
    let (width, height) = dataset.raster_size();
    let rasterband = dataset.rasterband(1).expect("band 1");
    let nodata = rasterband.no_data_value();
    let buffer = rasterband
        .read_as::<i32>((0, 0), (width, height), (width, height), None)
        .expect("read");
    drop(rasterband);

    let data = Array2::from_shape_vec((height, width), buffer.data).expect("shape");
    (data, nodata, dataset)
}

/// Constant angle rasters (values in degrees * 100)
fn write_angles(
    dir: &Path,
    shape: (usize, usize),
    sz: i32,
    sa: i32,
    vz: i32,
    va: i32,
) -> AngleRasterSet {
    let paths: Vec<PathBuf> = ["solar_zenith", "solar_azimuth", "view_zenith", "view_azimuth"]
        .iter()
        .map(|name| dir.join(format!("angle_{}.tif", name)))
        .collect();

    for (path, value) in paths.iter().zip([sz, sa, vz, va]) {
        write_raster(path, &Array2::from_elem(shape, value), None, false);
    }

    AngleRasterSet::new(paths[0].clone(), paths[1].clone(), paths[2].clone(), paths[3].clone())
}

fn no_bandpass() -> NbarParams {
    NbarParams { apply_bandpass: false, ..NbarParams::default() }
}

#[test]
fn test_reference_geometry_end_to_end() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let input = dir.path().join("T23LLF_20190105T132231_B04_10m.tif");
    write_raster(&input, &Array2::from_elem((4, 4), 2000i16), None, false);
    let angles = write_angles(dir.path(), (4, 4), 3000, 13500, 0, 13500);

    let sensor = SensorDescriptor::new(Platform::Sentinel2A, Collection::Sentinel2).unwrap();
    assert_eq!(resolve_common_name("B04", &sensor).unwrap().as_str(), "red");

    let processor = NbarProcessor::new(sensor, angles, no_bandpass());
    let output = processor
        .process_band("B04", &input, dir.path())
        .expect("NBAR processing failed");

    assert!(output.path.ends_with("T23LLF_20190105T132231_B04_10m_NBAR.tif"));
    assert_eq!(output.nodata, 0);
    assert!(!output.bandpass_applied);
    assert!(output.skipped_tiles.is_empty());

    let (data, nodata, dataset) = read_output(&output.path);
    assert_eq!(data.dim(), (4, 4));
    assert!(data.iter().all(|&v| v == 2000), "got {:?}", data);
    assert_eq!(nodata, Some(0.0));
    assert_eq!(dataset.geo_transform().unwrap(), GEO_TRANSFORM);
    assert_eq!(
        dataset.metadata_item("COMPRESSION", "IMAGE_STRUCTURE").as_deref(),
        Some("DEFLATE")
    );
}

#[test]
fn test_off_nadir_geometry_changes_reflectance() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let input = dir.path().join("LE07_L1TP_220069_20000101_20170101_01_T1_sr_band4.tif");
    write_raster(&input, &Array2::from_elem((4, 4), 3000i16), Some(-9999.0), false);
    // 7.5 degree view zenith, opposite azimuths
    let angles = write_angles(dir.path(), (4, 4), 3500, 4500, 750, 22500);

    let sensor = SensorDescriptor::new(Platform::Landsat7, Collection::Landsat1).unwrap();
    let processor = NbarProcessor::new(sensor, angles, NbarParams::default());
    let output = processor.process_band("sr_band4", &input, dir.path()).unwrap();

    assert!(output.path.ends_with("LE07_L1TP_220069_20000101_20170101_01_T1_NBAR_band4.tif"));
    assert!(!output.bandpass_applied);

    let (data, nodata, _) = read_output(&output.path);
    assert_eq!(nodata, Some(-9999.0));
    let first = data[[0, 0]];
    assert!(data.iter().all(|&v| v == first));
    assert_ne!(first, 3000);
    assert!((first - 3000).abs() < 600, "correction out of range: {}", first);
}

#[test]
fn test_source_nodata_is_preserved() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let mut reflectance = Array2::from_elem((4, 4), 1800i16);
    reflectance[[0, 0]] = -9999;
    reflectance[[2, 3]] = -9999;
    let input = dir.path().join("LC08_L1TP_220069_20160101_20170101_01_T1_sr_band5.tif");
    write_raster(&input, &reflectance, Some(-9999.0), false);
    let angles = write_angles(dir.path(), (4, 4), 4000, 5000, 0, 5000);

    let sensor = SensorDescriptor::new(Platform::Landsat8, Collection::Landsat1).unwrap();
    let processor = NbarProcessor::new(sensor, angles, NbarParams::default());
    let output = processor.process_band("sr_band5", &input, dir.path()).unwrap();

    let (data, _, _) = read_output(&output.path);
    assert_eq!(data[[0, 0]], -9999);
    assert_eq!(data[[2, 3]], -9999);
    assert_eq!(data[[1, 1]], 1800);
    assert_eq!(data.iter().filter(|&&v| v == -9999).count(), 2);
}

#[test]
fn test_angle_nodata_becomes_output_nodata() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let input = dir.path().join("T23LLF_20190105T132231_B02_10m.tif");
    write_raster(&input, &Array2::from_elem((4, 4), 2000i16), None, false);
    let angles = write_angles(dir.path(), (4, 4), 3000, 13500, 0, 13500);

    // Replace the view zenith raster by one with a tagged pixel
    let mut view_zenith = Array2::from_elem((4, 4), 0i32);
    view_zenith[[1, 2]] = -32768;
    std::fs::remove_file(&angles.view_zenith).unwrap();
    write_raster(&angles.view_zenith, &view_zenith, Some(-32768.0), false);

    let sensor = SensorDescriptor::new(Platform::Sentinel2A, Collection::Sentinel2).unwrap();
    let processor = NbarProcessor::new(sensor, angles, no_bandpass());
    let output = processor.process_band("B02", &input, dir.path()).unwrap();

    let (data, _, _) = read_output(&output.path);
    assert_eq!(data[[1, 2]], 0);
    assert_eq!(data.iter().filter(|&&v| v == 2000).count(), 15);
}

#[test]
fn test_landsat_collection2_rescale() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let scene = "LC08_L2SP_220069_20210101_20210308_02_T1";
    let input = dir.path().join(format!("{}_SR_B4.TIF", scene));
    write_raster(&input, &Array2::from_elem((4, 4), 10000u16), Some(0.0), false);
    let angles = write_angles(dir.path(), (4, 4), 2500, 9000, 0, 9000);

    let sensor = SensorDescriptor::from_scene_id(scene).unwrap();
    let processor = NbarProcessor::new(sensor, angles, NbarParams::default());
    let output = processor.process_band("SR_B4", &input, dir.path()).unwrap();

    assert!(output.path.ends_with(format!("{}_NBAR_B4.tif", scene)));
    let (data, nodata, _) = read_output(&output.path);
    assert_eq!(nodata, Some(0.0));
    assert!(data.iter().all(|&v| v == 750), "got {:?}", data);
}

#[test]
fn test_sentinel2_bandpass() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let input = dir.path().join("T22KGA_20200101T133229_B04_10m.tif");
    write_raster(&input, &Array2::from_elem((4, 4), 2000i16), None, false);
    let angles = write_angles(dir.path(), (4, 4), 3000, 12000, 0, 12000);

    let sensor = SensorDescriptor::new(Platform::Sentinel2B, Collection::Sentinel2).unwrap();
    let processor = NbarProcessor::new(sensor, angles, NbarParams::default());
    let output = processor.process_band("B04", &input, dir.path()).unwrap();
    assert!(output.bandpass_applied);

    // 2000 * 0.9761 + 0.001, truncated
    let (data, _, _) = read_output(&output.path);
    assert!(data.iter().all(|&v| v == 1952), "got {:?}", data);
}

#[test]
fn test_20m_band_averages_10m_angles() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let input = dir.path().join("T23LLF_20190105T132231_B11_20m.tif");
    write_raster(&input, &Array2::from_elem((4, 4), 2500i16), None, false);
    // Angle grid at 10 m covers the 20 m band with twice the pixels
    let angles = write_angles(dir.path(), (8, 8), 3000, 13500, 0, 13500);

    let sensor = SensorDescriptor::new(Platform::Sentinel2A, Collection::Sentinel2).unwrap();
    let processor = NbarProcessor::new(sensor, angles, no_bandpass());
    let output = processor.process_band("B11", &input, dir.path()).unwrap();

    let (data, _, _) = read_output(&output.path);
    assert!(data.iter().all(|&v| v == 2500), "got {:?}", data);

    // Same band against a 20 m angle grid: the scaled window runs off the raster
    let small = tempfile::tempdir().unwrap();
    let short_angles = write_angles(small.path(), (4, 4), 3000, 13500, 0, 13500);
    let processor = NbarProcessor::new(sensor, short_angles, no_bandpass());
    let err = processor.process_band("B11", &input, small.path()).unwrap_err();
    assert!(err.is_tile_recoverable(), "unexpected error: {}", err);
}

#[test]
fn test_tile_failure_policies() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let input = dir.path().join("T23LLF_20190105T132231_B03_10m.tif");
    write_raster(&input, &Array2::from_elem((32, 32), 1200i16), None, true);
    // Angles only cover the top row of 16x16 blocks
    let angles = write_angles(dir.path(), (16, 32), 3000, 13500, 0, 13500);
    let sensor = SensorDescriptor::new(Platform::Sentinel2A, Collection::Sentinel2).unwrap();

    let abort = NbarProcessor::new(sensor, angles.clone(), no_bandpass());
    let err = abort.process_band("B03", &input, dir.path()).unwrap_err();
    assert!(matches!(err, NbarError::Geometry { .. }), "unexpected error: {}", err);

    let params = NbarParams { tile_policy: TileFailurePolicy::Skip, ..no_bandpass() };
    let skip = NbarProcessor::new(sensor, angles, params);
    let output = skip.process_band("B03", &input, dir.path()).unwrap();
    assert_eq!(output.skipped_tiles.len(), 2);
    assert!(output.skipped_tiles.iter().all(|t| t.window.row_off == 16));

    let (data, _, _) = read_output(&output.path);
    assert!(data.slice(ndarray::s![..16, ..]).iter().all(|&v| v == 1200));
    assert!(data.slice(ndarray::s![16.., ..]).iter().all(|&v| v == 0));
}

#[test]
fn test_explicit_tile_size_matches_native_blocks() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let mut reflectance = Array2::<i16>::zeros((20, 24));
    for ((r, c), v) in reflectance.indexed_iter_mut() {
        *v = (1000 + r * 37 + c * 11) as i16;
    }
    let input = dir.path().join("T23LLF_20190105T132231_B08_10m.tif");
    write_raster(&input, &reflectance, None, false);
    let angles = write_angles(dir.path(), (20, 24), 3300, 14000, 420, 10000);
    let sensor = SensorDescriptor::new(Platform::Sentinel2A, Collection::Sentinel2).unwrap();

    let native = NbarProcessor::new(sensor, angles.clone(), no_bandpass())
        .process_band_to("B08", &input, dir.path().join("native.tif"))
        .unwrap();
    let params = NbarParams { tile_size: Some((7, 5)), ..no_bandpass() };
    let small = NbarProcessor::new(sensor, angles, params)
        .process_band_to("B08", &input, dir.path().join("small.tif"))
        .unwrap();

    let (a, _, _) = read_output(&native.path);
    let (b, _, _) = read_output(&small.path);
    assert_eq!(a, b);
}

#[test]
fn test_process_directory_reports_per_band() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let img_dir = dir.path().join("IMG_DATA");
    let out_dir = dir.path().join("HARMONIZED_DATA");
    std::fs::create_dir_all(&img_dir).unwrap();

    let reflectance = Array2::from_elem((4, 4), 900i16);
    write_raster(&img_dir.join("T23LLF_20190105T132231_B02.tif"), &reflectance, None, false);
    write_raster(&img_dir.join("T23LLF_20190105T132231_B01.tif"), &reflectance, None, false);
    let angles = write_angles(dir.path(), (4, 4), 3000, 13500, 0, 13500);

    let scene = "S2A_MSIL2A_20190105T132231_N0211_R038_T23LLF_20190105T145859.SAFE";
    let sensor = SensorDescriptor::from_scene_id(scene).unwrap();
    let processor = NbarProcessor::new(sensor, angles, NbarParams::default());

    let report = processor
        .process_directory(&img_dir, scene, &["B02", "B01", "B08"], &out_dir)
        .unwrap();

    assert_eq!(report.outputs.len(), 1);
    assert!(report.output_for("B02").unwrap().path.starts_with(&out_dir));
    assert!(report.output_for("B02").unwrap().path.exists());

    let mut failed: Vec<&str> = report.failures.iter().map(|f| f.raw_band.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["B01", "B08"]);
    assert!(!report.is_complete());

    let json = report.to_json().unwrap();
    assert!(json.contains("T23LLF_20190105T132231_B02_NBAR.tif"));
}

#[test]
fn test_unknown_band_fails_before_io() {
    let sensor = SensorDescriptor::new(Platform::Landsat5, Collection::Landsat1).unwrap();
    let angles = AngleRasterSet::new(
        "/missing/sz.tif",
        "/missing/sa.tif",
        "/missing/vz.tif",
        "/missing/va.tif",
    );
    let processor = NbarProcessor::new(sensor, angles, NbarParams::default());

    let report = processor
        .process_bands(
            &[BandInput::new("sr_band6", "/missing/LT05_sr_band6.tif")],
            tempfile::tempdir().unwrap().path(),
        )
        .unwrap();

    assert!(report.outputs.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.contains("Unknown band"));
}
