//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Traffic light coordination on top of SUMO: green waves, network inspection, docs hierarchy tooling
#[derive(Parser, Debug)]
#[command(name = "trafficpulse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Project directory holding .trafficpulse.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the co-simulation with green wave coordination
    Run(RunArgs),

    /// Inspect a SUMO road network
    Network {
        #[command(subcommand)]
        command: NetworkCommands,
    },

    /// Check, show and compare class hierarchy listings (hierarchy.js)
    Hierarchy {
        #[command(subcommand)]
        command: HierarchyCommands,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Network file loaded before the simulation starts
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub net: Option<PathBuf>,

    /// SUMO configuration file, used verbatim
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub sumo_config: Option<PathBuf>,

    /// Simulation steps per second
    #[arg(long)]
    pub frequency: Option<f64>,

    /// Stop after this many steps
    #[arg(long)]
    pub steps: Option<u64>,

    /// Stop after this many wall-clock seconds
    #[arg(long)]
    pub duration: Option<f64>,

    /// Append events to this file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum NetworkCommands {
    /// Count intersections, traffic lights and roads
    Summary {
        #[arg(value_hint = ValueHint::FilePath)]
        net: PathBuf,
    },

    /// Show the BFS spanning tree from the first intersection
    Tree {
        #[arg(value_hint = ValueHint::FilePath)]
        net: PathBuf,
    },

    /// Show green wave corridors and offsets
    Corridors {
        #[arg(value_hint = ValueHint::FilePath)]
        net: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum HierarchyCommands {
    /// Validate a listing; exits 65 when issues are found
    Check {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Render a listing as a tree (default: this crate's own types)
    Show {
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },

    /// Compare two listings
    Diff {
        #[arg(value_hint = ValueHint::FilePath)]
        old: PathBuf,
        #[arg(value_hint = ValueHint::FilePath)]
        new: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}
