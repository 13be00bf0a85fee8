//! `resign logs`: pull errors and warnings out of a build log.

use anyhow::Result;
use resign_core::logscan::{scan_log_file, LogFinding};
use std::path::Path;

/// Prints the findings in `file`. An unreadable file is reported, not fatal.
pub async fn handle_logs_command(file: &Path) -> Result<()> {
    match scan_log_file(file).await {
        Ok(findings) => {
            for line in render_findings(&findings) {
                println!("{}", line);
            }
        }
        Err(e) => println!("Error: {}", e),
    }
    Ok(())
}

fn render_findings(findings: &[LogFinding]) -> Vec<String> {
    if findings.is_empty() {
        return vec!["No build errors or warnings found.".to_string()];
    }

    let mut lines = Vec::with_capacity(findings.len() + 1);
    lines.push("Build errors and warnings:".to_string());
    lines.extend(findings.iter().map(ToString::to_string));
    lines
}
