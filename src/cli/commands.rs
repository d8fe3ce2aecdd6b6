//! Command dispatch

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::CommandFactory;
use clap_complete::generate;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::bfs::spanning_tree;
use crate::application::{DataManager, GreenWave, LoadSummary, NetworkLoader};
use crate::cli::args::{
    Cli, Commands, ConfigCommands, HierarchyCommands, NetworkCommands, RunArgs,
};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::hierarchy::{self, HierarchyNode};
use crate::domain::Entity;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let project_dir = match &cli.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("determine current directory", e))?,
    };

    match &cli.command {
        Some(Commands::Run(args)) => cmd_run(&project_dir, args),
        Some(Commands::Network { command }) => {
            let settings = Settings::load(Some(&project_dir))?;
            match command {
                NetworkCommands::Summary { net } => cmd_network_summary(net),
                NetworkCommands::Tree { net } => cmd_network_tree(net),
                NetworkCommands::Corridors { net } => cmd_network_corridors(&settings, net),
            }
        }
        Some(Commands::Hierarchy { command }) => match command {
            HierarchyCommands::Check { file } => cmd_hierarchy_check(file),
            HierarchyCommands::Show { file } => cmd_hierarchy_show(file.as_deref()),
            HierarchyCommands::Diff { old, new } => cmd_hierarchy_diff(old, new),
        },
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => cmd_config_show(&project_dir),
            ConfigCommands::Init { global } => cmd_config_init(&project_dir, *global),
            ConfigCommands::Path => cmd_config_path(&project_dir),
        },
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()
                .map_err(|e| InfraError::io("print help", e))?;
            Ok(())
        }
    }
}

/// Fold `run` flags into the loaded settings.
pub fn apply_run_args(settings: &mut Settings, args: &RunArgs) -> CliResult<()> {
    if let Some(net) = &args.net {
        settings.system.net_file = Some(net.clone());
    }
    if let Some(cfg) = &args.sumo_config {
        settings.sumo.config_file = cfg.to_string_lossy().into_owned();
        settings.sumo.bypass_config_check = true;
    }
    if let Some(frequency) = args.frequency {
        settings.system.update_frequency = frequency;
    }
    if let Some(log_file) = &args.log_file {
        settings.system.log_file = Some(log_file.clone());
    }
    run_duration(args)?;
    settings.validate()?;
    Ok(())
}

/// Wall-clock limit from `--duration`, if given.
fn run_duration(args: &RunArgs) -> CliResult<Option<Duration>> {
    let Some(secs) = args.duration else {
        return Ok(None);
    };
    if !(secs > 0.0) {
        return Err(CliError::InvalidArgs(
            "--duration must be positive".to_string(),
        ));
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| CliError::InvalidArgs(format!("--duration {secs}: {e}")))
}

#[instrument(skip(args))]
fn cmd_run(project_dir: &Path, args: &RunArgs) -> CliResult<()> {
    let mut settings = Settings::load(Some(project_dir))?;
    apply_run_args(&mut settings, args)?;
    debug!("effective settings: {:?}", settings);

    let container = ServiceContainer::new(settings);
    let mut system = container.traffic_system()?.with_max_steps(args.steps);

    if let Some(limit) = run_duration(args)? {
        let stop = system.stop_handle();
        thread::spawn(move || {
            thread::sleep(limit);
            stop.request_stop();
        });
    }

    system.run()?;

    output::done(&format!("simulation finished after {} steps", system.steps()));
    let dm = system.data_manager();
    output::detail(&format!(
        "{} intersections, {} traffic lights, {} vehicles in the last step",
        dm.intersection_count(),
        dm.traffic_lights().count(),
        dm.vehicles().count()
    ));
    Ok(())
}

fn load_network(net: &Path) -> CliResult<(DataManager, LoadSummary)> {
    let mut dm = DataManager::new();
    let summary = NetworkLoader::new(net).load(&mut dm, |p| {
        debug!("loading {}: {:.0}%", p.stage, p.fraction * 100.0);
    })?;
    Ok((dm, summary))
}

fn cmd_network_summary(net: &Path) -> CliResult<()> {
    let (_, summary) = load_network(net)?;
    output::section(&net.display());
    output::count("intersections", summary.intersections);
    output::count("traffic lights", summary.traffic_lights);
    output::count("roads", summary.road_connections);
    Ok(())
}

fn cmd_network_tree(net: &Path) -> CliResult<()> {
    let (dm, _) = load_network(net)?;
    let Some(root) = dm.intersections().next().map(|i| i.id().to_string()) else {
        output::warning("network has no intersections");
        return Ok(());
    };

    let order = spanning_tree(&root, |id| {
        dm.neighbors(id)
            .into_iter()
            .map(|(next, _)| next.id().to_string())
            .collect::<Vec<_>>()
    });
    let reached = order.len();

    let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (node, parent) in order {
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(node);
        }
    }

    let label = |id: &str| {
        let pos = dm.intersection(id).map(|i| i.position()).unwrap_or_default();
        format!("{} {}", id, pos)
    };
    output::plain(&build_tree(&root, &children, &label));

    let total = dm.intersection_count();
    if reached < total {
        output::warning(&format!(
            "{} of {} intersections are not reachable from {}",
            total - reached,
            total,
            root
        ));
    }
    Ok(())
}

fn build_tree(
    id: &str,
    children: &BTreeMap<String, Vec<String>>,
    label: &dyn Fn(&str) -> String,
) -> Tree<String> {
    let leaves = children
        .get(id)
        .into_iter()
        .flatten()
        .map(|child| build_tree(child, children, label));
    Tree::new(label(id)).with_leaves(leaves)
}

fn cmd_network_corridors(settings: &Settings, net: &Path) -> CliResult<()> {
    let (dm, _) = load_network(net)?;
    let mut wave = GreenWave::new(settings.algo);
    let corridors = wave.find_main_corridors(&dm);
    wave.calculate_schedules(&dm, &corridors);

    if corridors.is_empty() {
        output::warning("network has no intersections");
        return Ok(());
    }
    for (n, corridor) in corridors.iter().enumerate() {
        output::section(&format!(
            "corridor {} ({} intersections, {:.1} m/s)",
            n + 1,
            corridor.intersection_ids.len(),
            corridor.target_speed_m_s
        ));
        for id in &corridor.intersection_ids {
            let offset = wave.offsets().get(id).copied().unwrap_or_default();
            output::offset_row(id, offset, dm.traffic_light(id).is_some());
        }
    }
    Ok(())
}

fn read_listing(path: &Path) -> CliResult<Vec<HierarchyNode>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| InfraError::io(format!("read {}", path.display()), e))?;
    let forest = hierarchy::parse_hierarchy_js(&content)
        .map_err(crate::application::ApplicationError::from)?;
    Ok(forest)
}

fn cmd_hierarchy_check(file: &Path) -> CliResult<()> {
    let forest = read_listing(file)?;
    let issues = hierarchy::validate(&forest);
    if issues.is_empty() {
        output::done(&format!(
            "{}: {} nodes, well-formed",
            file.display(),
            hierarchy::names(&forest).len()
        ));
        return Ok(());
    }

    output::section(&file.display());
    for issue in &issues {
        output::issue(issue);
    }
    Err(CliError::Data(format!(
        "{} issue(s) in {}",
        issues.len(),
        file.display()
    )))
}

fn cmd_hierarchy_show(file: Option<&Path>) -> CliResult<()> {
    let (label, forest) = match file {
        Some(path) => (path.display().to_string(), read_listing(path)?),
        None => ("trafficpulse".to_string(), hierarchy::entity_hierarchy()),
    };
    output::plain(&hierarchy::render(&label, &forest));
    Ok(())
}

fn cmd_hierarchy_diff(old: &Path, new: &Path) -> CliResult<()> {
    let diff = hierarchy::diff(&read_listing(old)?, &read_listing(new)?);
    if diff.is_empty() {
        output::done("listings are identical");
        return Ok(());
    }

    if !diff.added_nodes.is_empty() || !diff.removed_nodes.is_empty() {
        output::section("nodes");
        diff.added_nodes.iter().for_each(|n| output::added(n));
        diff.removed_nodes.iter().for_each(|n| output::removed(n));
    }
    if !diff.added_edges.is_empty() || !diff.removed_edges.is_empty() {
        output::section("edges");
        for (base, derived) in &diff.added_edges {
            output::added(&format!("{} -> {}", base, derived));
        }
        for (base, derived) in &diff.removed_edges {
            output::removed(&format!("{} -> {}", base, derived));
        }
    }
    Ok(())
}

fn cmd_config_show(project_dir: &Path) -> CliResult<()> {
    let settings = Settings::load(Some(project_dir))?;
    output::plain(&settings.to_toml()?);
    Ok(())
}

fn cmd_config_init(project_dir: &Path, global: bool) -> CliResult<()> {
    let path: PathBuf = if global {
        global_config_path().ok_or_else(|| {
            CliError::InvalidArgs("cannot determine global config directory".to_string())
        })?
    } else {
        local_config_path(project_dir)
    };

    if path.exists() {
        output::warning(&format!("config already exists: {}", path.display()));
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
    }
    std::fs::write(&path, Settings::template())
        .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
    output::created(&path);
    Ok(())
}

fn cmd_config_path(project_dir: &Path) -> CliResult<()> {
    match global_config_path() {
        Some(path) => output::path_row("global:", &path),
        None => output::detail("global: (unavailable)"),
    }
    output::path_row("local:", &local_config_path(project_dir));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ApplicationError;

    #[test]
    fn test_sumo_config_flag_bypasses_config_check() {
        let mut settings = Settings::default();
        let args = RunArgs {
            sumo_config: Some(PathBuf::from("/tmp/city.sumocfg")),
            frequency: Some(10.0),
            ..RunArgs::default()
        };
        apply_run_args(&mut settings, &args).unwrap();
        assert!(settings.sumo.bypass_config_check);
        assert_eq!(settings.sumo.config_file, "/tmp/city.sumocfg");
        assert_eq!(settings.system.update_frequency, 10.0);
    }

    #[test]
    fn test_invalid_run_flags_are_rejected() {
        let mut settings = Settings::default();
        let args = RunArgs {
            frequency: Some(0.0),
            ..RunArgs::default()
        };
        assert!(apply_run_args(&mut settings, &args).is_err());

        let args = RunArgs {
            duration: Some(-1.0),
            ..RunArgs::default()
        };
        assert!(matches!(
            apply_run_args(&mut Settings::default(), &args),
            Err(CliError::InvalidArgs(_))
        ));
    }

    #[test]
    fn test_unrepresentable_duration_is_a_usage_error() {
        for secs in [f64::INFINITY, f64::NAN, 1e300] {
            let args = RunArgs {
                duration: Some(secs),
                ..RunArgs::default()
            };
            assert!(
                matches!(
                    apply_run_args(&mut Settings::default(), &args),
                    Err(CliError::InvalidArgs(_))
                ),
                "{secs}"
            );
        }
        let args = RunArgs {
            duration: Some(0.5),
            ..RunArgs::default()
        };
        assert_eq!(run_duration(&args).unwrap(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_tiny_frequency_is_a_config_error() {
        let args = RunArgs {
            frequency: Some(1e-320),
            ..RunArgs::default()
        };
        let err = apply_run_args(&mut Settings::default(), &args).unwrap_err();
        assert!(matches!(
            err,
            CliError::Infra(InfraError::Application(ApplicationError::Config { .. }))
        ));
    }

    #[test]
    fn test_build_tree_nests_children() {
        let mut children = BTreeMap::new();
        children.insert("A".to_string(), vec!["B".to_string(), "C".to_string()]);
        children.insert("B".to_string(), vec!["D".to_string()]);

        let tree = build_tree("A", &children, &|id: &str| id.to_string());
        let text = tree.to_string();
        assert!(text.starts_with("A\n"));
        assert!(text.contains("B"));
        assert!(text.contains("D"));
    }
}
