use std::{collections::HashMap, fs, path::Path};

use nalgebra::Vector2;

use crate::{
    diagnostics::{Diagnostics, Issue},
    parsing::{
        ipc_d356::{lines, parse_net_line},
        Span,
    },
};

/// Raw net list coordinates are divided by this to get millimeters.
const COORDINATE_DIVISOR: f64 = 254.0;

pub type NetMap = HashMap<String, Vec<Vector2<f64>>>;

#[derive(Debug, Default)]
pub struct NetFile {
    /// Points of every net, in file order.
    pub nets: NetMap,
    pub diagnostics: Diagnostics,
}

impl NetFile {
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse_str(&content),
            Err(error) => {
                let mut net_file = Self::default();
                net_file.diagnostics.push(
                    None,
                    Issue::FileUnreadable(format!("{}: {}", path.to_string_lossy(), error)),
                );
                net_file
            }
        }
    }

    pub fn parse_str(content: &str) -> Self {
        let mut nets = NetMap::new();

        for record in lines(Span::new(content)).filter_map(parse_net_line) {
            nets.entry(record.net.fragment().to_string())
                .or_default()
                .push(Vector2::new(
                    record.x as f64 / COORDINATE_DIVISOR,
                    record.y as f64 / COORDINATE_DIVISOR,
                ));
        }

        log::info!(
            "Loaded {} nets with {} points.",
            nets.len(),
            nets.values().map(Vec::len).sum::<usize>()
        );

        Self {
            nets,
            diagnostics: Diagnostics::default(),
        }
    }
}
