//! CLI command implementations

pub mod generate;
pub mod inspect;
pub mod pack;

use colored::Colorize;
use photonic_texture::{ErrorReport, WrittenFile};
use serde::Serialize;

/// Print a serializable result as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_files(files: &[WrittenFile]) {
    for file in files {
        println!(
            "  {} {} {}",
            "->".dimmed(),
            file.path.display(),
            format!("({} bytes, {})", file.size, short_hash(&file.hash)).dimmed()
        );
    }
}

fn print_failure(report: &ErrorReport) {
    eprintln!(
        "{} [{}] {}: {}",
        "FAILED".red().bold(),
        report.code,
        report.kind,
        report.message
    );
}

fn short_hash(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash() {
        let hash = "0123456789abcdef".repeat(4);
        assert_eq!(short_hash(&hash), "0123456789abcdef");
        assert_eq!(short_hash("abc"), "abc");
    }
}
