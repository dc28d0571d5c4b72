//! Layer bookkeeping on top of the decoders: what a file is, what order layers are shown in, which
//! polygon is the board, and where every layer sits once the board is built up in 3D.

use std::{fmt, path::Path};

use camino::Utf8PathBuf;
use geo::{Area, Polygon};
use nalgebra::Vector2;
use serde::Serialize;

use crate::{
    config::stackup::{StackupConfig, Thicknesses},
    drill_file::DrillHit,
    geometry::{close_and_repair, is_simple_ring, union_polygons},
};

/// Drill cylinders are made this much taller than the stack they cut through.
const DRILL_HEIGHT_FACTOR: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LayerKind {
    TopCopper,
    TopMask,
    TopSilk,
    TopPaste,
    BottomCopper,
    BottomMask,
    BottomSilk,
    BottomPaste,
    Inner(u32),
    Outline,
    Drill,
    Other,
}

impl LayerKind {
    /// Guess a layer from its file name, first by the usual Gerber extensions and then by keywords
    /// such as `top_copper` or `Inner 2`.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Self::from_extension(&extension).unwrap_or_else(|| Self::from_keywords(&name))
    }

    fn from_extension(extension: &str) -> Option<Self> {
        let kind = match extension {
            "gtl" => LayerKind::TopCopper,
            "gts" => LayerKind::TopMask,
            "gto" => LayerKind::TopSilk,
            "gtp" => LayerKind::TopPaste,
            "gbl" => LayerKind::BottomCopper,
            "gbs" => LayerKind::BottomMask,
            "gbo" => LayerKind::BottomSilk,
            "gbp" => LayerKind::BottomPaste,
            "gko" | "oln" | "out" => LayerKind::Outline,
            "drl" | "xln" | "txt" => LayerKind::Drill,
            extension => {
                let inner = extension
                    .strip_prefix('g')
                    .and_then(|rest| rest.strip_suffix('l'))
                    .and_then(|digits| digits.parse::<u32>().ok());
                let mechanical = extension
                    .strip_prefix("gm")
                    .map(|rest| rest.chars().all(|c| c.is_ascii_digit()) || rest == "l")
                    .unwrap_or(false);

                match (inner, mechanical) {
                    (Some(index), _) => LayerKind::Inner(index),
                    (None, true) => LayerKind::Outline,
                    (None, false) => return None,
                }
            }
        };

        Some(kind)
    }

    fn from_keywords(name: &str) -> Self {
        let in_order = |first: &str, second: &str| {
            name.find(first)
                .map(|index| name[index + first.len()..].contains(second))
                .unwrap_or(false)
        };

        if name.contains("outline") || name.contains("edge") {
            LayerKind::Outline
        } else if name.contains("drill") {
            LayerKind::Drill
        } else if let Some(index) = inner_layer_number(name) {
            LayerKind::Inner(index)
        } else if in_order("top", "copper") {
            LayerKind::TopCopper
        } else if in_order("top", "mask") {
            LayerKind::TopMask
        } else if in_order("top", "silk") {
            LayerKind::TopSilk
        } else if in_order("top", "paste") {
            LayerKind::TopPaste
        } else if in_order("bottom", "copper") {
            LayerKind::BottomCopper
        } else if in_order("bottom", "mask") {
            LayerKind::BottomMask
        } else if in_order("bottom", "silk") {
            LayerKind::BottomSilk
        } else if in_order("bottom", "paste") {
            LayerKind::BottomPaste
        } else {
            LayerKind::Other
        }
    }

    /// Position when layers are listed bottom to top. Anything that is not a top or bottom film
    /// sits between the two sides.
    pub fn display_rank(&self) -> u32 {
        match self {
            LayerKind::BottomPaste => 0,
            LayerKind::BottomSilk => 1,
            LayerKind::BottomMask => 2,
            LayerKind::BottomCopper => 3,
            LayerKind::Inner(_) | LayerKind::Outline | LayerKind::Drill | LayerKind::Other => 4,
            LayerKind::TopCopper => 5,
            LayerKind::TopMask => 6,
            LayerKind::TopSilk => 7,
            LayerKind::TopPaste => 8,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::TopCopper => write!(f, "Top Copper"),
            LayerKind::TopMask => write!(f, "Top Mask"),
            LayerKind::TopSilk => write!(f, "Top Silk"),
            LayerKind::TopPaste => write!(f, "Top Paste"),
            LayerKind::BottomCopper => write!(f, "Bottom Copper"),
            LayerKind::BottomMask => write!(f, "Bottom Mask"),
            LayerKind::BottomSilk => write!(f, "Bottom Silk"),
            LayerKind::BottomPaste => write!(f, "Bottom Paste"),
            LayerKind::Inner(index) => write!(f, "Inner {}", index),
            LayerKind::Outline => write!(f, "Outline"),
            LayerKind::Drill => write!(f, "Drill"),
            LayerKind::Other => write!(f, "Other"),
        }
    }
}

fn inner_layer_number(name: &str) -> Option<u32> {
    let index = name.find("inner")?;
    let digits: String = name[index + "inner".len()..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().ok()
}

/// Stable sort into display order, bottom layers first.
pub fn sort_for_display<P: AsRef<Path>>(paths: &mut [P]) {
    paths.sort_by_key(|path| LayerKind::from_path(path.as_ref()).display_rank());
}

/// Pick the board shape out of the polygons of an outline layer. Slivers are dropped, the rest is
/// merged and the largest piece wins. Cut-outs inside it are filled.
pub fn board_outline(polygons: Vec<Polygon<f64>>, config: &StackupConfig) -> Option<Polygon<f64>> {
    let area_epsilon = config.outline_area_epsilon;

    let candidates = polygons
        .into_iter()
        .filter(|polygon| {
            is_simple_ring(&polygon.exterior().0) && polygon.unsigned_area() > area_epsilon
        })
        .collect();

    let largest = union_polygons(candidates, area_epsilon)
        .into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))?;

    close_and_repair(&largest.exterior().0, area_epsilon)
        .into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

/// A decoded layer ready to be stacked.
#[derive(Debug, Clone)]
pub struct Layer {
    pub source: Utf8PathBuf,
    pub kind: LayerKind,
    pub polygons: Vec<Polygon<f64>>,
}

/// One extruded sheet of the board.
#[derive(Debug, Clone, Serialize)]
pub struct Slab {
    pub name: String,
    pub source: Option<Utf8PathBuf>,
    pub z_start: f64,
    pub height: f64,
    pub polygons: Vec<Polygon<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrillCylinder {
    pub position: Vector2<f64>,
    pub diameter: f64,
    pub z_center: f64,
    pub height: f64,
}

/// Where everything goes when the board is built up in 3D. Z grows from the top surface (0) down
/// through the board, so top films have negative z.
#[derive(Debug, Clone, Serialize)]
pub struct StackPlan {
    pub substrate: Slab,
    pub layers: Vec<Slab>,
    pub drills: Vec<DrillCylinder>,
}

impl StackPlan {
    /// Layers of a kind that appears more than once only use the first file. Outline, drill and
    /// unclassified layers are not stacked.
    pub fn build(
        config: &StackupConfig,
        outline: Polygon<f64>,
        layers: &[Layer],
        drills: &[DrillHit],
    ) -> Self {
        let thicknesses = config.thicknesses();
        let Thicknesses {
            board,
            copper,
            silk,
            mask,
            paste,
            epsilon,
        } = thicknesses;

        let substrate = Slab {
            name: String::from("Board Substrate"),
            source: None,
            z_start: 0.0,
            height: board + epsilon,
            polygons: vec![outline],
        };

        let placements = [
            (LayerKind::TopCopper, -copper, copper),
            (LayerKind::TopMask, -copper - mask, mask),
            (LayerKind::TopSilk, -copper - mask - silk, silk),
            (LayerKind::TopPaste, -copper - mask - silk - paste, paste),
            (LayerKind::BottomCopper, board, copper),
            (LayerKind::BottomMask, board + copper, mask),
            (LayerKind::BottomSilk, board + copper + mask, silk),
            (LayerKind::BottomPaste, board + copper + mask + silk, paste),
        ];

        let mut slabs: Vec<Slab> = placements
            .iter()
            .filter_map(|(kind, z_start, height)| {
                let layer = layers.iter().find(|layer| layer.kind == *kind)?;
                Some(slab(layer, *z_start, *height, epsilon))
            })
            .collect();

        let mut inner_layers: Vec<(u32, &Layer)> = layers
            .iter()
            .filter_map(|layer| match layer.kind {
                LayerKind::Inner(index) => Some((index, layer)),
                _ => None,
            })
            .collect();
        inner_layers.sort_by_key(|(index, _)| *index);
        inner_layers.dedup_by_key(|(index, _)| *index);

        if !inner_layers.is_empty() {
            let count = inner_layers.len();
            let core_height = board - copper * 2.0 - mask * 2.0;
            let spacing = if count > 1 {
                core_height / (count + 1) as f64
            } else {
                core_height / 2.0
            };
            let first_z = board - mask - copper;

            for (position, (_, layer)) in inner_layers.into_iter().enumerate() {
                let z_start = first_z - (position + 1) as f64 * spacing;
                slabs.push(slab(layer, z_start, copper, epsilon));
            }
        }

        let hole_height = board + copper + silk + mask + paste + epsilon;
        let drills: Vec<DrillCylinder> = drills
            .iter()
            .filter(|hit| hit.diameter > 0.0)
            .map(|hit| DrillCylinder {
                position: hit.position,
                diameter: hit.diameter,
                z_center: hole_height / 2.0,
                height: DRILL_HEIGHT_FACTOR * hole_height,
            })
            .collect();

        log::info!(
            "Planned {} layers and {} drill holes.",
            slabs.len(),
            drills.len()
        );

        Self {
            substrate,
            layers: slabs,
            drills,
        }
    }
}

fn slab(layer: &Layer, z_start: f64, height: f64, epsilon: f64) -> Slab {
    Slab {
        name: layer.kind.to_string(),
        source: Some(layer.source.clone()),
        z_start,
        height: height.max(epsilon),
        polygons: layer.polygons.clone(),
    }
}
