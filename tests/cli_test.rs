//! Integration tests for command dispatch and exit codes.

use std::path::PathBuf;

use clap::Parser;
use tempfile::TempDir;

use trafficpulse::cli::{execute_command, Cli};
use trafficpulse::exitcode;

fn resource(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources")
        .join(name)
        .display()
        .to_string()
}

fn run(args: &[&str]) -> Result<(), i32> {
    let cli = Cli::try_parse_from(std::iter::once("trafficpulse").chain(args.iter().copied()))
        .expect("arguments parse");
    execute_command(&cli).map_err(|e| e.exit_code())
}

#[test]
fn given_clean_listing_when_checking_then_succeeds() {
    assert_eq!(run(&["hierarchy", "check", &resource("hierarchy_v1.js")]), Ok(()));
}

#[test]
fn given_broken_listing_when_checking_then_exits_with_data_error() {
    assert_eq!(
        run(&["hierarchy", "check", &resource("hierarchy_broken.js")]),
        Err(exitcode::DATAERR)
    );
}

#[test]
fn given_missing_listing_when_checking_then_exits_with_io_error() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("hierarchy.js").display().to_string();

    assert_eq!(run(&["hierarchy", "check", &missing]), Err(exitcode::IOERR));
}

#[test]
fn given_two_listings_when_diffing_then_succeeds() {
    assert_eq!(
        run(&[
            "hierarchy",
            "diff",
            &resource("hierarchy_v1.js"),
            &resource("hierarchy_v2.js"),
        ]),
        Ok(())
    );
}

#[test]
fn given_no_file_when_showing_hierarchy_then_renders_own_types() {
    assert_eq!(run(&["hierarchy", "show"]), Ok(()));
}

#[test]
fn given_network_when_summarising_then_succeeds() {
    assert_eq!(run(&["network", "summary", &resource("corridor.net.xml")]), Ok(()));
    assert_eq!(run(&["network", "tree", &resource("corridor.net.xml")]), Ok(()));
}

#[test]
fn given_listing_as_network_when_summarising_then_exits_with_data_error() {
    assert_eq!(
        run(&["network", "summary", &resource("hierarchy_v1.js")]),
        Err(exitcode::DATAERR)
    );
}

#[test]
fn given_project_dir_when_config_init_then_second_init_keeps_file() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().display().to_string();
    let path = temp.path().join(".trafficpulse.toml");

    assert_eq!(run(&["-C", &dir, "config", "init"]), Ok(()));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[sumo]"));

    std::fs::write(&path, "# edited\n").unwrap();
    assert_eq!(run(&["-C", &dir, "config", "init"]), Ok(()));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited\n");
}

#[test]
fn given_missing_sumo_config_dir_when_running_then_exits_with_noinput() {
    let temp = TempDir::new().unwrap();
    let config = format!(
        "[sumo]\nconfig_dir = \"{}\"\n",
        temp.path().join("missing").display()
    );
    std::fs::write(temp.path().join(".trafficpulse.toml"), config).unwrap();
    let dir = temp.path().display().to_string();

    assert_eq!(
        run(&["-C", &dir, "run", "--steps", "1"]),
        Err(exitcode::NOINPUT)
    );
}

#[test]
fn given_zero_duration_when_running_then_exits_with_usage() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().display().to_string();

    assert_eq!(
        run(&["-C", &dir, "run", "--duration", "0"]),
        Err(exitcode::USAGE)
    );
}
