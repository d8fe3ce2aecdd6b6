//! Colored terminal output for the CLI commands.
//!
//! `colored` honors NO_COLOR and CLICOLOR_FORCE, so the row formatters below
//! only add color and never change the text layout.

use std::fmt::Display;
use std::path::Path;

use colored::Colorize;

/// `error: ...` on stderr
pub fn error(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

pub fn warning(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "warning".yellow().bold(), msg);
}

/// A finished run or a clean check.
pub fn done(msg: &(impl Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// One problem found by `hierarchy check`.
pub fn issue(msg: &(impl Display + ?Sized)) {
    println!("  {} {}", "✗".red(), msg);
}

pub fn section(title: &(impl Display + ?Sized)) {
    println!("{}", title.to_string().cyan().bold());
}

pub fn added(msg: &(impl Display + ?Sized)) {
    println!("  {} {}", "+".green(), msg);
}

pub fn removed(msg: &(impl Display + ?Sized)) {
    println!("  {} {}", "-".red(), msg);
}

pub fn detail(msg: &(impl Display + ?Sized)) {
    println!("  {}", msg);
}

/// Uncolored block output: trees, TOML.
pub fn plain(msg: &(impl Display + ?Sized)) {
    println!("{}", msg);
}

/// `network summary` row, counts right-aligned.
pub fn count(label: &str, n: usize) {
    println!("  {} {:>7}", format!("{:<16}", label).green(), n);
}

pub fn created(path: &Path) {
    println!("{} {}", "created".green(), path.display());
}

/// One intersection of a green-wave corridor.
pub fn offset_row(id: &str, offset: f64, has_light: bool) {
    let row = format_offset_row(id, offset);
    if has_light {
        detail(&row);
    } else {
        detail(&format!("{}  {}", row, "(no traffic light)".dimmed()));
    }
}

fn format_offset_row(id: &str, offset: f64) -> String {
    format!("{:<24} offset {:>6.2} s", id, offset)
}

/// `config path` row; missing files are marked.
pub fn path_row(label: &str, path: &Path) {
    let row = format_path_row(label, path);
    if path.exists() {
        detail(&row);
    } else {
        detail(&format!("{} {}", row, "(not found)".yellow()));
    }
}

fn format_path_row(label: &str, path: &Path) -> String {
    format!("{:<7} {}", label, path.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_rows_align_ids_and_round_offsets() {
        assert_eq!(
            format_offset_row("J1", 7.194),
            "J1                       offset   7.19 s"
        );
        assert_eq!(
            format_offset_row("cluster_12_13", 120.0),
            "cluster_12_13            offset 120.00 s"
        );
    }

    #[test]
    fn test_path_rows_pad_the_label() {
        assert_eq!(
            format_path_row("local:", Path::new("/p/.trafficpulse.toml")),
            "local:  /p/.trafficpulse.toml"
        );
    }
}
