use std::{fs, path::Path};

use approx::assert_relative_eq;
use geo::{Area, Contains, Point};
use nalgebra::Vector2;
use pcb_stackup::{
    config::{GeometryConfig, GerberConfig},
    geometry::{is_simple_ring, FlashShape, StrokePath},
    Config, DrillFile, GerberFile, Issue, NetFile, Primitive,
};

fn write_file(directory: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = directory.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn gerber_trace_from_disk() {
    let directory = tempfile::tempdir().unwrap();
    let path = write_file(
        directory.path(),
        "board.gtl",
        "%FSLAX25Y25*%\n%MOMM*%\n%ADD10C,0.5*%\nD10*\nX1000000Y1000000D02*\nX2000000Y1000000D01*\nM02*\n",
    );

    let gerber_file = GerberFile::load(&path, &GerberConfig::default());

    assert_eq!(
        gerber_file.primitives,
        vec![Primitive::Stroke {
            path: StrokePath::Line {
                start: Vector2::new(10.0, -10.0),
                end: Vector2::new(20.0, -10.0),
            },
            width: 0.5,
        }]
    );
    assert!(gerber_file.diagnostics.is_empty());
}

#[test]
fn drill_hit_with_inferred_decimals() {
    let directory = tempfile::tempdir().unwrap();
    let path = write_file(
        directory.path(),
        "board.drl",
        "M48\nMETRIC\nT01C0.80\n%\nT01\nX010000Y020000\nM30\n",
    );

    let drill_file = DrillFile::load(&path, &Config::default().drill);

    assert_eq!(drill_file.hits.len(), 1);
    assert_relative_eq!(drill_file.hits[0].position.x, 1.0);
    assert_relative_eq!(drill_file.hits[0].position.y, -2.0);
    assert_relative_eq!(drill_file.hits[0].diameter, 0.8);
}

#[test]
fn figure_eight_region_is_never_returned_invalid() {
    let mut gerber_file = GerberFile::parse_str(
        "%FSLAX25Y25*%\n%MOMM*%\nG36*\nX0Y0D02*\nX200000Y200000D01*\nX200000Y0D01*\nX0Y200000D01*\nX0Y0D01*\nG37*\nM02*\n",
        &GerberConfig::default(),
    );

    match &gerber_file.primitives[..] {
        [Primitive::FilledRegion { path }] => assert_eq!(path.first(), path.last()),
        other => panic!("Unexpected primitives: {:?}", other),
    }

    let polygons = gerber_file.polygons(&GeometryConfig::default());

    assert!(!polygons.is_empty());
    for polygon in polygons.iter() {
        assert!(is_simple_ring(&polygon.exterior().0));
        assert!(polygon.unsigned_area() > 1e-9);
    }

    let total_area: f64 = polygons.iter().map(|polygon| polygon.unsigned_area()).sum();
    assert_relative_eq!(total_area, 2.0, epsilon = 1e-6);
}

#[test]
fn keyhole_pour_keeps_its_cutout() {
    let mut gerber_file = GerberFile::parse_str(
        "%FSLAX25Y25*%\n%MOMM*%\nG36*\nX0Y0D02*\nX1000000Y0D01*\nX1000000Y1000000D01*\n\
         X0Y1000000D01*\nX0Y500000D01*\nX300000Y500000D01*\nX300000Y700000D01*\n\
         X700000Y700000D01*\nX700000Y300000D01*\nX300000Y300000D01*\nX300000Y500000D01*\n\
         X0Y500000D01*\nX0Y0D01*\nG37*\nM02*\n",
        &GerberConfig::default(),
    );

    let polygons = gerber_file.polygons(&GeometryConfig::default());

    assert_eq!(polygons.len(), 1);
    assert_relative_eq!(polygons[0].unsigned_area(), 84.0, epsilon = 1e-6);
    assert!(!polygons[0].contains(&Point::new(5.0, -5.0)));
    assert!(polygons[0].contains(&Point::new(1.0, -1.0)));
}

#[test]
fn pads_and_traces_merge_into_one_copper_area() {
    let mut gerber_file = GerberFile::parse_str(
        "%FSLAX25Y25*%\n%MOMM*%\n\
         %ADD10C,1.0*%\n%ADD11R,2.0X2.0*%\n\
         D11*\nX0Y0D03*\nX1000000Y0D03*\n\
         D10*\nX0Y0D02*\nX1000000Y0D01*\n\
         D11*\nX5000000Y5000000D03*\nM02*\n",
        &GerberConfig::default(),
    );

    let polygons = gerber_file.polygons(&GeometryConfig::default());

    assert_eq!(polygons.len(), 2);
    assert!(gerber_file.diagnostics.is_empty());
}

#[test]
fn missing_files_yield_empty_results() {
    let directory = tempfile::tempdir().unwrap();
    let missing = directory.path().join("missing.gbr");

    let gerber_file = GerberFile::load(&missing, &GerberConfig::default());
    let drill_file = DrillFile::load(&missing, &Config::default().drill);
    let net_file = NetFile::load(&missing);

    assert!(gerber_file.primitives.is_empty());
    assert!(drill_file.hits.is_empty());
    assert!(net_file.nets.is_empty());
    for diagnostics in [
        &gerber_file.diagnostics,
        &drill_file.diagnostics,
        &net_file.diagnostics,
    ] {
        assert!(diagnostics.contains(|issue| matches!(issue, Issue::FileUnreadable(_))));
    }
}

#[test]
fn net_list_from_disk() {
    let directory = tempfile::tempdir().unwrap();
    let path = write_file(
        directory.path(),
        "board.d356",
        "C  IPC-D-356 netlist\nP  UNITS CUST 0\n317GND  R1  -1 D0300PA00X+002540Y-002540X0600Y0600R000 S0\n317+5V  R1  -2 D0300PA00X+005080Y-002540X0600Y0600R000 S0\n317GND  C4  -1 D0300PA00X+007620Y+000000X0600Y0600R000 S0\n999\n",
    );

    let net_file = NetFile::load(&path);

    assert_eq!(net_file.nets.len(), 2);
    assert_eq!(
        net_file.nets["317GND"],
        vec![Vector2::new(10.0, -10.0), Vector2::new(30.0, 0.0)]
    );
    assert_eq!(net_file.nets["317+5V"], vec![Vector2::new(20.0, -10.0)]);
}

#[test]
fn files_parse_independently_in_parallel() {
    use rayon::prelude::*;

    let sources: Vec<String> = (1..=8)
        .map(|index| {
            format!(
                "%FSLAX25Y25*%\n%MOMM*%\n%ADD10C,0.{}*%\nD10*\nX0Y0D03*\nM02*\n",
                index
            )
        })
        .collect();

    let diameters: Vec<f64> = sources
        .par_iter()
        .map(|source| {
            let gerber_file = GerberFile::parse_str(source, &GerberConfig::default());
            match &gerber_file.primitives[..] {
                [Primitive::Flash {
                    shape: FlashShape::Circle { diameter },
                    ..
                }] => *diameter,
                _ => f64::NAN,
            }
        })
        .collect();

    for (index, diameter) in diameters.into_iter().enumerate() {
        assert_relative_eq!(diameter, (index + 1) as f64 / 10.0);
    }
}
