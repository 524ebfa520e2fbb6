use crate::core::bands::BrdfCoefficients;
use crate::core::brdf::brf_array;
use crate::core::nbar::{NbarParams, NbarProcessor};
use crate::io::angles::AngleRasterSet;
use crate::types::{NbarError, SensorDescriptor};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;
use std::path::PathBuf;

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(calc_brf, m)?)?;
    m.add_function(wrap_pyfunction!(harmonize_band, m)?)?;
    m.add_function(wrap_pyfunction!(harmonize_scene, m)?)?;
    Ok(())
}

/// BRF over numpy angle arrays (radians)
#[pyfunction]
fn calc_brf<'py>(
    py: Python<'py>,
    view_zenith: PyReadonlyArray2<'py, f64>,
    solar_zenith: PyReadonlyArray2<'py, f64>,
    relative_azimuth: PyReadonlyArray2<'py, f64>,
    fiso: f64,
    fgeo: f64,
    fvol: f64,
) -> PyResult<&'py PyArray2<f64>> {
    let (vz, sz, ra) = (
        view_zenith.as_array(),
        solar_zenith.as_array(),
        relative_azimuth.as_array(),
    );
    if vz.dim() != sz.dim() || vz.dim() != ra.dim() {
        return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
            "Angle arrays must share a shape: {:?} {:?} {:?}",
            vz.dim(),
            sz.dim(),
            ra.dim()
        )));
    }

    let coefficients = BrdfCoefficients { fiso, fgeo, fvol };
    Ok(brf_array(vz, sz, ra, &coefficients).into_pyarray(py))
}

fn to_py_err(e: NbarError) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
}

/// Harmonize one band file of a scene; returns the output path
#[pyfunction]
#[pyo3(signature = (scene_id, band, input, angles, output_dir, apply_bandpass = true))]
fn harmonize_band(
    scene_id: &str,
    band: &str,
    input: PathBuf,
    angles: (PathBuf, PathBuf, PathBuf, PathBuf),
    output_dir: PathBuf,
    apply_bandpass: bool,
) -> PyResult<String> {
    let sensor = SensorDescriptor::from_scene_id(scene_id).map_err(to_py_err)?;
    let (sz, sa, vz, va) = angles;
    let params = NbarParams { apply_bandpass, ..NbarParams::default() };
    let processor = NbarProcessor::new(sensor, AngleRasterSet::new(sz, sa, vz, va), params);

    let output = processor.process_band(band, &input, &output_dir).map_err(to_py_err)?;
    Ok(output.path.display().to_string())
}

/// Harmonize the bands of a scene.
///
/// Returns `(outputs, failures)`: `[(band, path)]` and `[(band, error)]`.
#[pyfunction]
#[pyo3(signature = (scene_id, img_dir, bands, angles, output_dir, apply_bandpass = true))]
fn harmonize_scene(
    scene_id: &str,
    img_dir: PathBuf,
    bands: Vec<String>,
    angles: (PathBuf, PathBuf, PathBuf, PathBuf),
    output_dir: PathBuf,
    apply_bandpass: bool,
) -> PyResult<(Vec<(String, String)>, Vec<(String, String)>)> {
    let sensor = SensorDescriptor::from_scene_id(scene_id).map_err(to_py_err)?;
    let (sz, sa, vz, va) = angles;
    let params = NbarParams { apply_bandpass, ..NbarParams::default() };
    let processor = NbarProcessor::new(sensor, AngleRasterSet::new(sz, sa, vz, va), params);

    let band_refs: Vec<&str> = bands.iter().map(String::as_str).collect();
    let report = processor
        .process_directory(&img_dir, scene_id, &band_refs, &output_dir)
        .map_err(to_py_err)?;

    let outputs = report
        .outputs
        .iter()
        .map(|o| (o.raw_band.clone(), o.path.display().to_string()))
        .collect();
    let failures = report
        .failures
        .iter()
        .map(|f| (f.raw_band.clone(), f.error.clone()))
        .collect();

    Ok((outputs, failures))
}
