use std::path::PathBuf;

use argh::FromArgs;

#[derive(FromArgs, PartialEq, Debug)]
/// Read Gerber, Excellon and IPC-D-356 files and turn them into board geometry.
pub struct Arguments {
    #[argh(option)]
    /// path to a config file to use instead of the one in the user's config directory.
    pub config: Option<PathBuf>,

    #[argh(switch, short = 'v')]
    /// log debug messages.
    pub verbose: bool,

    #[argh(subcommand)]
    pub command: CommandEnum,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub enum CommandEnum {
    Inspect(InspectCommand),
    Polygons(PolygonsCommand),
    Nets(NetsCommand),
    Stack(StackCommand),
}

#[derive(FromArgs, PartialEq, Debug)]
/// Parse files and report what they contain.
#[argh(subcommand, name = "inspect")]
pub struct InspectCommand {
    #[argh(positional)]
    /// gerber or drill files to read.
    pub files: Vec<PathBuf>,
}

#[derive(FromArgs, PartialEq, Debug)]
/// Print the merged polygons of a Gerber or drill file as YAML.
#[argh(subcommand, name = "polygons")]
pub struct PolygonsCommand {
    #[argh(positional)]
    /// file to convert.
    pub file: PathBuf,
}

#[derive(FromArgs, PartialEq, Debug)]
/// Print the nets of an IPC-D-356 file as YAML.
#[argh(subcommand, name = "nets")]
pub struct NetsCommand {
    #[argh(positional)]
    /// net list to read.
    pub file: PathBuf,
}

#[derive(FromArgs, PartialEq, Debug)]
/// Plan the 3D layer stack of a board and write it as YAML.
#[argh(subcommand, name = "stack")]
pub struct StackCommand {
    #[argh(option)]
    /// gerber file holding the board outline.
    pub outline: PathBuf,

    #[argh(option)]
    /// where to write the plan. Printed to stdout when omitted.
    pub output: Option<PathBuf>,

    #[argh(positional)]
    /// layer and drill files. Their kind is guessed from the file name.
    pub files: Vec<PathBuf>,
}
