//! Output formatting module for netverify
//!
//! Provides colored human output and JSON lines.

use chrono::{DateTime, Local};
use colored::{Color, Colorize};
use netverify::checks::Outcome;
use netverify::config::ColorsConfig;
use netverify::inventory::ResolvedHost;
use netverify::matrix::{Case, Parametrization};
use netverify::runner::{CaseResult, RunSummary};
use serde::Serialize;
use std::time::Duration;

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
    /// Outcome colors
    colors: ColorsConfig,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(colors: ColorsConfig, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = colors.enabled && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            json_mode,
            verbosity,
            colors,
        }
    }

    fn emit_json(&self, value: &impl Serialize) {
        match serde_json::to_string(value) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("ERROR: cannot serialize output: {}", e),
        }
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{}", line);
            println!("  {}  ", title);
            println!("{}\n", line);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let header = format!("MODULE [{}]", title);
        let stars = "*".repeat(80_usize.saturating_sub(header.len()));

        if self.use_color {
            println!(
                "\n{} {}",
                header.bright_white().bold(),
                stars.bright_black()
            );
        } else {
            println!("\n{} {}", header, stars);
        }
    }

    fn outcome_color(&self, outcome: &Outcome) -> Color {
        let name = match outcome {
            Outcome::Passed => &self.colors.passed,
            Outcome::Failed(_) => &self.colors.failed,
            Outcome::Skipped(_) => &self.colors.skipped,
            Outcome::XFailed(_) => &self.colors.xfailed,
            Outcome::Error(_) => &self.colors.error,
        };
        Color::from(name.as_str())
    }

    /// Print the result of one case
    pub fn case_result(&self, result: &CaseResult) {
        if self.json_mode {
            self.emit_json(&serde_json::json!({
                "type": "case",
                "result": result,
            }));
            return;
        }

        let label = result.outcome.label();
        let status = if self.use_color {
            let colored = label.color(self.outcome_color(&result.outcome));
            if result.outcome.is_failure() {
                colored.bold().to_string()
            } else {
                colored.to_string()
            }
        } else {
            label.to_string()
        };

        print!("{}: {}", status, result.id);
        if self.verbosity >= 1 {
            print!(" ({})", format_duration(result.duration));
        }
        if let Some(message) = result.outcome.message() {
            print!(" => {}", message);
        }
        println!();
    }

    /// Print one collected case
    pub fn case_listing(&self, case: &Case) {
        if self.json_mode {
            self.emit_json(&serde_json::json!({
                "type": "collected",
                "case": case,
            }));
            return;
        }
        println!("{}", case.id);
    }

    /// Print the cases of one fixture
    pub fn parametrization(&self, parametrization: &Parametrization) {
        if self.json_mode {
            self.emit_json(&serde_json::json!({
                "type": "fixture",
                "fixture": parametrization.fixture.name(),
                "scope": parametrization.scope,
                "ids": parametrization.ids(),
            }));
            return;
        }

        let ids = parametrization.ids().join(", ");
        if self.use_color {
            println!(
                "{:<14} {}",
                parametrization.fixture.name().cyan(),
                ids
            );
        } else {
            println!("{:<14} {}", parametrization.fixture.name(), ids);
        }
    }

    /// Print a resolved host with its key variables, or all of them
    pub fn host(&self, host: &ResolvedHost, all_vars: bool) {
        if self.json_mode {
            self.emit_json(&serde_json::json!({
                "type": "host",
                "host": host,
            }));
            return;
        }

        let key = |name: &str| host.vars.get_str(name).unwrap_or_else(|| "-".to_string());
        let name = if self.use_color {
            host.name.bright_white().bold().to_string()
        } else {
            host.name.clone()
        };
        println!(
            "{:<24} type={:<8} address={:<16} os={}",
            name,
            key("type"),
            key("ansible_host"),
            key("ansible_network_os")
        );

        if all_vars {
            for (var, value) in host.vars.iter() {
                let value = serde_json::to_string(value).unwrap_or_default();
                if self.use_color {
                    println!("    {}: {}", var.bright_black(), value);
                } else {
                    println!("    {}: {}", var, value);
                }
            }
        }
    }

    /// Print the run recap
    pub fn recap(&self, summary: &RunSummary, started: DateTime<Local>) {
        if self.json_mode {
            self.emit_json(&serde_json::json!({
                "type": "summary",
                "started": started.to_rfc3339(),
                "summary": summary,
                "exit_code": summary.exit_code(),
            }));
            return;
        }

        let header = "RUN RECAP";
        let stars = "*".repeat(80 - header.len());

        if self.use_color {
            println!(
                "\n{} {}",
                header.bright_white().bold(),
                stars.bright_black()
            );
        } else {
            println!("\n{} {}", header, stars);
        }

        let counts = [
            ("passed", summary.passed, &self.colors.passed),
            ("failed", summary.failed, &self.colors.failed),
            ("skipped", summary.skipped, &self.colors.skipped),
            ("xfailed", summary.xfailed, &self.colors.xfailed),
            ("errors", summary.errors, &self.colors.error),
        ];
        let line: Vec<String> = counts
            .iter()
            .map(|(label, value, color)| {
                let text = format!("{}={:<4}", label, value);
                if !self.use_color {
                    text
                } else if *value > 0 {
                    text.color(Color::from(color.as_str())).to_string()
                } else {
                    text.dimmed().to_string()
                }
            })
            .collect();
        println!("{:<8} : {}", summary.total, line.join(" "));

        let took = format!(
            "Started {}, took {}",
            started.format("%Y-%m-%d %H:%M:%S"),
            format_duration(summary.duration)
        );
        if self.use_color {
            println!("\n{}", took.bright_black());
        } else {
            println!("\n{}", took);
        }

        let verdict = if summary.total == 0 {
            "No cases were collected."
        } else if summary.has_failures() {
            "Fabric validation failed."
        } else {
            "Fabric validation passed."
        };
        if self.use_color {
            if summary.has_failures() || summary.total == 0 {
                println!("{}", verdict.red().bold());
            } else {
                println!("{}", verdict.green().bold());
            }
        } else {
            println!("{}", verdict);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            self.emit_json(&serde_json::json!({
                "type": "error",
                "message": message
            }));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            self.emit_json(&serde_json::json!({
                "type": "warning",
                "message": message
            }));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.json_mode {
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;
        format!("{}h {}m {}s", hours, mins, secs)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(42)), "42ms");
        assert_eq!(format_duration(Duration::from_millis(2_500)), "2.500s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "1h 2m 5s");
    }

    #[test]
    fn test_outcome_colors_follow_config() {
        let output = OutputFormatter::new(ColorsConfig::default(), false, 0);
        assert_eq!(output.outcome_color(&Outcome::Passed), Color::Green);
        assert_eq!(
            output.outcome_color(&Outcome::Error("timeout".into())),
            Color::BrightRed
        );
    }
}
