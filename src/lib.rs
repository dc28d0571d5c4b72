//! Decoders for PCB fabrication data (Gerber RS-274X, Excellon drill files and IPC-D-356 net
//! lists) and the geometry needed to turn what they draw into clean polygons.

pub mod aperture;
pub mod arc;
pub mod config;
pub mod coordinates;
pub mod diagnostics;
pub mod drill_file;
pub mod geometry;
pub mod gerber_file;
pub mod layers;
pub mod net_file;
pub mod parsing;

pub use config::Config;
pub use diagnostics::{Diagnostic, Diagnostics, Issue};
pub use drill_file::{DrillFile, DrillHit, DrillTool};
pub use geometry::Primitive;
pub use gerber_file::GerberFile;
pub use net_file::NetFile;
