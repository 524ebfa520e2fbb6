//! Scene identifiers and on-disk naming conventions

use crate::types::{Collection, NbarError, NbarResult, Platform, SensorDescriptor};
use regex::Regex;
use std::path::{Path, PathBuf};

const SENTINEL2_SCENE_PATTERN: &str = concat!(
    r"(?i)^S2(?P<satellite>[AB])",
    r"_MSI(?P<level>L[0-2][ABC])",
    r"_(?P<acquisition>[0-9]{8}T[0-9]{6})",
    r"_N(?P<baseline>[0-9]{4})",
    r"_R(?P<relative_orbit>[0-9]{3})",
    r"_T(?P<tile>[0-9]{2}\w{3})",
    r"_(?P<stop>[0-9]{8}T[0-9]{6})",
    r"(\.SAFE)?$"
);

const LANDSAT_SCENE_PATTERN: &str = concat!(
    r"(?i)^L(?P<sensor>[COTEM])(?P<satellite>[0-9]{2})",
    r"_(?P<level>L\w{3})",
    r"_(?P<path>[0-9]{3})(?P<row>[0-9]{3})",
    r"_(?P<acquisition>[0-9]{8})",
    r"_(?P<processing>[0-9]{8})",
    r"_(?P<collection>[0-9]{2})",
    r"_(?P<category>RT|T1|T2)$"
);

fn compile(pattern: &str) -> NbarResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| NbarError::Processing(format!("Invalid pattern {}: {}", pattern, e)))
}

impl SensorDescriptor {
    /// Derive the descriptor from a Sentinel-2 product name or a Landsat
    /// Collection-1/2 product identifier
    pub fn from_scene_id(scene_id: &str) -> NbarResult<Self> {
        if let Some(caps) = compile(SENTINEL2_SCENE_PATTERN)?.captures(scene_id) {
            let platform = match caps["satellite"].to_ascii_uppercase().as_str() {
                "A" => Platform::Sentinel2A,
                _ => Platform::Sentinel2B,
            };
            return SensorDescriptor::new(platform, Collection::Sentinel2);
        }

        if let Some(caps) = compile(LANDSAT_SCENE_PATTERN)?.captures(scene_id) {
            let mission =
                format!("L{}{}", &caps["sensor"], &caps["satellite"]).to_ascii_uppercase();
            let platform = match mission.as_str() {
                "LT05" => Platform::Landsat5,
                "LE07" => Platform::Landsat7,
                "LC08" => Platform::Landsat8,
                other => return Err(NbarError::UnsupportedSensor(other.to_string())),
            };
            let collection = match &caps["collection"] {
                "01" => Collection::Landsat1,
                "02" => Collection::Landsat2,
                other => {
                    return Err(NbarError::UnsupportedSensor(format!(
                        "{} collection {}",
                        mission, other
                    )))
                }
            };
            return SensorDescriptor::new(platform, collection);
        }

        Err(NbarError::SceneId(scene_id.to_string()))
    }
}

/// Locate the surface reflectance file of `raw_band` inside `img_dir`.
///
/// Sentinel-2 files are matched by a `_{band}.tif` / `_{band}*.jp2` suffix;
/// Landsat files are named `{scene_id}_{band}.tif` (Collection-1) or `.TIF`
/// (Collection-2).
pub fn locate_band_file<P: AsRef<Path>>(
    img_dir: P,
    scene_id: &str,
    raw_band: &str,
    sensor: &SensorDescriptor,
) -> NbarResult<PathBuf> {
    let img_dir = img_dir.as_ref();

    let not_found = || {
        NbarError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("No file for band {} in {}", raw_band, img_dir.display()),
        ))
    };

    match sensor.collection {
        Collection::Landsat1 | Collection::Landsat2 => {
            let extension = if sensor.collection == Collection::Landsat1 { "tif" } else { "TIF" };
            let path = img_dir.join(format!("{}_{}.{}", scene_id, raw_band, extension));
            if path.is_file() {
                Ok(path)
            } else {
                Err(not_found())
            }
        }
        Collection::Sentinel2 => {
            let band = regex::escape(raw_band);
            let pattern = compile(&format!(r".*_{}\.tif$|.*_{}.*jp2$", band, band))?;

            let mut names: Vec<String> = std::fs::read_dir(img_dir)?
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| pattern.is_match(name))
                .collect();
            names.sort();
            log::debug!("Candidates for band {}: {:?}", raw_band, names);

            names.into_iter().next().map(|name| img_dir.join(name)).ok_or_else(not_found)
        }
    }
}

/// File name of the NBAR product derived from its input file name
pub fn nbar_output_name<P: AsRef<Path>>(input: P, sensor: &SensorDescriptor) -> NbarResult<String> {
    let input = input.as_ref();
    let invalid =
        || NbarError::InvalidFormat(format!("Input path has no file name: {}", input.display()));

    let name = match sensor.collection {
        Collection::Sentinel2 => {
            let stem = input.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
            format!("{}_NBAR", stem)
        }
        Collection::Landsat1 | Collection::Landsat2 => {
            let marker = if sensor.collection == Collection::Landsat1 { "_sr_" } else { "_SR_" };
            let file_name = input.file_name().and_then(|s| s.to_str()).ok_or_else(invalid)?;
            let renamed = file_name.replace(marker, "_NBAR_");
            Path::new(&renamed)
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(invalid)?
                .to_string()
        }
    };

    Ok(format!("{}.tif", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sentinel2_scene_ids() {
        let s2a = SensorDescriptor::from_scene_id(
            "S2A_MSIL2A_20190105T132231_N0211_R038_T23LLF_20190105T145859.SAFE",
        )
        .unwrap();
        assert_eq!(s2a.platform, Platform::Sentinel2A);
        assert_eq!(s2a.collection, Collection::Sentinel2);

        let s2b = SensorDescriptor::from_scene_id(
            "S2B_MSIL1C_20200101T133229_N0208_R081_T22KGA_20200101T150311",
        )
        .unwrap();
        assert_eq!(s2b.platform, Platform::Sentinel2B);
    }

    #[test]
    fn test_parse_landsat_scene_ids() {
        let l8 =
            SensorDescriptor::from_scene_id("LC08_L2SP_220069_20210101_20210308_02_T1").unwrap();
        assert_eq!(l8.platform, Platform::Landsat8);
        assert_eq!(l8.collection, Collection::Landsat2);
        assert_eq!(l8.nodata(), 0);

        let l7 =
            SensorDescriptor::from_scene_id("LE07_L1TP_220069_20000101_20170101_01_T1").unwrap();
        assert_eq!(l7.platform, Platform::Landsat7);
        assert_eq!(l7.collection, Collection::Landsat1);
        assert_eq!(l7.nodata(), -9999);

        let l5 =
            SensorDescriptor::from_scene_id("LT05_L1TP_220069_19900101_20170101_01_T1").unwrap();
        assert_eq!(l5.platform, Platform::Landsat5);
    }

    #[test]
    fn test_reject_unknown_scene_ids() {
        assert!(matches!(
            SensorDescriptor::from_scene_id("MOD09GA.A2020001.h13v10").unwrap_err(),
            NbarError::SceneId(_)
        ));
        // Landsat-4 is recognised but has no band table
        assert!(matches!(
            SensorDescriptor::from_scene_id("LT04_L1TP_220069_19880101_20170101_01_T1")
                .unwrap_err(),
            NbarError::UnsupportedSensor(_)
        ));
        let collection3 = "LC08_L2SP_220069_20210101_20210308_03_T1";
        assert!(SensorDescriptor::from_scene_id(collection3).is_err());
    }

    #[test]
    fn test_locate_band_files() {
        let dir = tempfile::tempdir().unwrap();
        let s2 = SensorDescriptor::new(Platform::Sentinel2A, Collection::Sentinel2).unwrap();

        std::fs::write(dir.path().join("T23LLF_20190105T132231_B02_10m.jp2"), b"").unwrap();
        std::fs::write(dir.path().join("T23LLF_20190105T132231_B12_20m.jp2"), b"").unwrap();
        std::fs::write(dir.path().join("scene_sr_band8a.tif"), b"").unwrap();

        let b02 = locate_band_file(dir.path(), "unused", "B02", &s2).unwrap();
        assert!(b02.ends_with("T23LLF_20190105T132231_B02_10m.jp2"));
        let b8a = locate_band_file(dir.path(), "unused", "sr_band8a", &s2).unwrap();
        assert!(b8a.ends_with("scene_sr_band8a.tif"));
        assert!(locate_band_file(dir.path(), "unused", "B8A", &s2).is_err());

        let scene = "LC08_L2SP_220069_20210101_20210308_02_T1";
        let l8 = SensorDescriptor::from_scene_id(scene).unwrap();
        std::fs::write(dir.path().join(format!("{}_SR_B4.TIF", scene)), b"").unwrap();
        let b4 = locate_band_file(dir.path(), scene, "SR_B4", &l8).unwrap();
        assert!(b4.ends_with(format!("{}_SR_B4.TIF", scene)));
        assert!(locate_band_file(dir.path(), scene, "SR_B5", &l8).is_err());
    }

    #[test]
    fn test_nbar_output_names() {
        let s2 = SensorDescriptor::new(Platform::Sentinel2B, Collection::Sentinel2).unwrap();
        assert_eq!(
            nbar_output_name("/in/T22KGA_20200101T133229_B04_10m.jp2", &s2).unwrap(),
            "T22KGA_20200101T133229_B04_10m_NBAR.tif"
        );

        let c2 = SensorDescriptor::new(Platform::Landsat8, Collection::Landsat2).unwrap();
        assert_eq!(
            nbar_output_name("LC08_L2SP_220069_20210101_20210308_02_T1_SR_B4.TIF", &c2).unwrap(),
            "LC08_L2SP_220069_20210101_20210308_02_T1_NBAR_B4.tif"
        );

        let c1 = SensorDescriptor::new(Platform::Landsat7, Collection::Landsat1).unwrap();
        assert_eq!(
            nbar_output_name("LE07_L1TP_220069_20000101_20170101_01_T1_sr_band3.tif", &c1).unwrap(),
            "LE07_L1TP_220069_20000101_20170101_01_T1_NBAR_band3.tif"
        );
    }
}
