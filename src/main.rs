use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use geo::Polygon;
use rayon::prelude::*;

use pcb_stackup::{
    config::{self, Config},
    diagnostics::Diagnostics,
    drill_file::{DrillFile, DrillHit},
    geometry::Primitive,
    gerber_file::GerberFile,
    layers::{board_outline, sort_for_display, Layer, LayerKind, StackPlan},
    net_file::NetFile,
};

mod arguments;

fn main() {
    let arguments: arguments::Arguments = argh::from_env();

    simple_logger::SimpleLogger::new()
        .with_level(if arguments.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init()
        .expect("Failed to initialize logger.");

    if let Err(error) = trampoline(arguments) {
        log::error!("Fatal error: {:?}", error);
    }
}

fn trampoline(arguments: arguments::Arguments) -> Result<()> {
    let config = load_config(arguments.config.as_deref());

    match arguments.command {
        arguments::CommandEnum::Inspect(command) => inspect(command, &config),
        arguments::CommandEnum::Polygons(command) => polygons(command, &config),
        arguments::CommandEnum::Nets(command) => nets(command),
        arguments::CommandEnum::Stack(command) => stack(command, &config),
    }
}

fn load_config(path: Option<&Path>) -> Config {
    let result = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    match result {
        Ok(config) => config,
        Err(error) => {
            log::warn!(
                "Failed to read config file at {}: {:?}",
                path.map(|path| path.to_string_lossy().to_string())
                    .or_else(|| Config::get_path()
                        .ok()
                        .map(|path| path.to_string_lossy().to_string()))
                    .unwrap_or(String::from("'unavailable'")),
                error
            );
            config::Config::default()
        }
    }
}

/// A parsed input file of either format.
enum DecodedFile {
    Gerber(GerberFile),
    Drill(DrillFile),
}

impl DecodedFile {
    fn load(path: &Path, config: &Config) -> Self {
        match LayerKind::from_path(path) {
            LayerKind::Drill => DecodedFile::Drill(DrillFile::load(path, &config.drill)),
            _ => DecodedFile::Gerber(GerberFile::load(path, &config.gerber)),
        }
    }

    fn diagnostics(&self) -> &Diagnostics {
        match self {
            DecodedFile::Gerber(gerber_file) => &gerber_file.diagnostics,
            DecodedFile::Drill(drill_file) => &drill_file.diagnostics,
        }
    }

    fn polygons(&mut self, config: &Config) -> Vec<Polygon<f64>> {
        match self {
            DecodedFile::Gerber(gerber_file) => gerber_file.polygons(&config.geometry),
            DecodedFile::Drill(drill_file) => drill_file.polygons(&config.geometry),
        }
    }

    fn report_issues(&self, path: &Path) {
        let diagnostics = self.diagnostics();
        if !diagnostics.is_empty() {
            log::warn!(
                "{}: {} issues while decoding.",
                path.to_string_lossy(),
                diagnostics.len()
            );
        }
    }
}

fn inspect(command: arguments::InspectCommand, config: &Config) -> Result<()> {
    let mut files = command.files;
    sort_for_display(&mut files);

    let decoded: Vec<(PathBuf, DecodedFile, usize)> = files
        .into_par_iter()
        .map(|path| {
            let mut decoded = DecodedFile::load(&path, config);
            let polygon_count = decoded.polygons(config).len();
            (path, decoded, polygon_count)
        })
        .collect();

    for (path, decoded, polygon_count) in decoded.iter() {
        let kind = LayerKind::from_path(path);

        match decoded {
            DecodedFile::Gerber(gerber_file) => {
                let mut strokes = 0;
                let mut flashes = 0;
                let mut regions = 0;
                for primitive in gerber_file.primitives.iter() {
                    match primitive {
                        Primitive::Stroke { .. } => strokes += 1,
                        Primitive::Flash { .. } => flashes += 1,
                        Primitive::FilledRegion { .. } => regions += 1,
                    }
                }

                log::info!(
                    "{} ({}): {} strokes, {} flashes, {} regions, {} polygons.",
                    path.to_string_lossy(),
                    kind,
                    strokes,
                    flashes,
                    regions,
                    polygon_count
                );
            }
            DecodedFile::Drill(drill_file) => {
                log::info!(
                    "{} ({}): {} hits.",
                    path.to_string_lossy(),
                    kind,
                    drill_file.hits.len()
                );
            }
        }

        decoded.report_issues(path);
    }

    Ok(())
}

fn polygons(command: arguments::PolygonsCommand, config: &Config) -> Result<()> {
    let mut decoded = DecodedFile::load(&command.file, config);
    let polygons = decoded.polygons(config);
    log::info!("Extracted {} polygons.", polygons.len());
    decoded.report_issues(&command.file);

    let output = serde_yaml::to_string(&polygons).context("Failed to serialize polygons.")?;
    println!("{}", output);

    Ok(())
}

fn nets(command: arguments::NetsCommand) -> Result<()> {
    let net_file = NetFile::load(&command.file);
    let nets: BTreeMap<_, _> = net_file.nets.into_iter().collect();

    let output = serde_yaml::to_string(&nets).context("Failed to serialize nets.")?;
    println!("{}", output);

    Ok(())
}

/// One decoded input of the stack command.
enum StackInput {
    Layer(Layer),
    Drills(Vec<DrillHit>),
}

fn stack(command: arguments::StackCommand, config: &Config) -> Result<()> {
    log::info!("Read board outline: {:?}", command.outline);
    let mut outline_file = DecodedFile::load(&command.outline, config);
    let outline_polygons = outline_file.polygons(config);
    outline_file.report_issues(&command.outline);
    let outline = board_outline(outline_polygons, &config.stackup)
        .context("No valid board shape found in outline file.")?;

    let inputs = command
        .files
        .into_par_iter()
        .map(|path| {
            let kind = LayerKind::from_path(&path);
            let mut decoded = DecodedFile::load(&path, config);
            let polygons = match decoded {
                DecodedFile::Gerber(_) => decoded.polygons(config),
                DecodedFile::Drill(_) => Vec::new(),
            };
            decoded.report_issues(&path);

            let input = match decoded {
                DecodedFile::Drill(drill_file) => StackInput::Drills(drill_file.hits),
                DecodedFile::Gerber(_) => StackInput::Layer(Layer {
                    source: Utf8PathBuf::try_from(path.clone())
                        .context("Layer file path is not valid UTF-8.")?,
                    kind,
                    polygons,
                }),
            };

            Ok(input)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut layers = Vec::new();
    let mut drills = Vec::new();
    for input in inputs {
        match input {
            StackInput::Layer(layer) => layers.push(layer),
            StackInput::Drills(hits) => drills.extend(hits),
        }
    }

    let plan = StackPlan::build(&config.stackup, outline, &layers, &drills);
    let output = serde_yaml::to_string(&plan).context("Failed to serialize stack plan.")?;

    match command.output {
        Some(path) => {
            fs::write(&path, output).context("Failed to save stack plan.")?;
            log::info!("Wrote stack plan to {:?}", path);
        }
        None => println!("{}", output),
    }

    Ok(())
}
