//! Output formatting utilities

use chrono::Duration;
use clap::ValueEnum;
use colored::Colorize;
use podwatch_lib::auditor::{AgeFlag, Health, ReadinessClass, RestartFlag, StatusFlag};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a pod age like kubectl does (`45s`, `12m`, `3h`, `2d`)
pub fn format_age(age: Duration) -> String {
    let secs = age.num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}

/// Color status based on its classification
pub fn color_status(status: &str, flag: StatusFlag) -> String {
    match flag {
        StatusFlag::Running => status.green().to_string(),
        StatusFlag::NotRunning => status.red().to_string(),
    }
}

pub fn color_age(age: &str, flag: AgeFlag) -> String {
    match flag {
        AgeFlag::OverThreshold => age.yellow().to_string(),
        AgeFlag::UnderThreshold => age.to_string(),
    }
}

pub fn color_restarts(restarts: u32, flag: RestartFlag) -> String {
    match flag {
        RestartFlag::High => restarts.to_string().red().to_string(),
        RestartFlag::Normal => restarts.to_string(),
    }
}

pub fn color_reachable(reachable: bool) -> String {
    if reachable {
        "yes".green().to_string()
    } else {
        "no".red().bold().to_string()
    }
}

pub fn color_health(health: Health) -> String {
    match health {
        Health::Good => "Good".green().bold().to_string(),
        Health::Bad => "Bad".red().bold().to_string(),
    }
}

/// Color the ready percentage by readiness class
pub fn color_readiness(ready_percentage: f64, readiness: ReadinessClass) -> String {
    let formatted = format!("{:.1}%", ready_percentage);
    match readiness {
        ReadinessClass::HighReadiness => formatted.green().bold().to_string(),
        ReadinessClass::LowReadiness => formatted.red().bold().to_string(),
    }
}

/// Shorten long termination messages for table cells
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
