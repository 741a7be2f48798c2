use chrono::NaiveTime;
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::glyph::BlinkPolicy;
use crate::render::ImageEncoding;
use crate::scheduler::SchedulerOptions;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// run the clock from this time of day instead of the wall clock
    pub start_time: Option<NaiveTime>,
    pub scheduler: Option<SchedulerConfig>,
    pub render: Option<RenderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SchedulerConfig {
    pub blink_policy: Option<BlinkPolicy>,
    pub supervise_delay_ms: Option<u64>,
    pub stop_grace_ms: Option<u64>,
    pub settle_redraw_ms: Option<u64>,
    pub refresh_settings: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RenderConfig {
    pub encoding: Option<ImageEncoding>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "bigclock", about = "Synchronized big clock faces", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// HH:MM:SS to start the clock from
    #[arg(long)]
    pub start_time: Option<NaiveTime>,
    #[arg(long, value_enum)]
    pub blink_policy: Option<BlinkPolicy>,
    #[arg(long)]
    pub supervise_delay_ms: Option<u64>,
    #[arg(long)]
    pub stop_grace_ms: Option<u64>,
    #[arg(long)]
    pub settle_redraw_ms: Option<u64>,
    #[arg(long, action = ArgAction::Set)]
    pub refresh_settings: Option<bool>,
    #[arg(long, value_enum)]
    pub encoding: Option<ImageEncoding>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_from(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Layer defaults, YAML and `cli` without touching the process arguments.
pub fn load_from(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/bigclock/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/bigclock/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/bigclock.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["bigclock.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    if src.start_time.is_some()     { dst.start_time = src.start_time; }
    match (&mut dst.scheduler, src.scheduler) {
        (None, Some(s)) => dst.scheduler = Some(s),
        (Some(d), Some(s)) => merge_scheduler(d, s),
        _ => {}
    }
    match (&mut dst.render, src.render) {
        (None, Some(r)) => dst.render = Some(r),
        (Some(d), Some(r)) => {
            if r.encoding.is_some() { d.encoding = r.encoding; }
        }
        _ => {}
    }
}

fn merge_scheduler(dst: &mut SchedulerConfig, src: SchedulerConfig) {
    if src.blink_policy.is_some()        { dst.blink_policy = src.blink_policy; }
    if src.supervise_delay_ms.is_some()  { dst.supervise_delay_ms = src.supervise_delay_ms; }
    if src.stop_grace_ms.is_some()       { dst.stop_grace_ms = src.stop_grace_ms; }
    if src.settle_redraw_ms.is_some()    { dst.settle_redraw_ms = src.settle_redraw_ms; }
    if src.refresh_settings.is_some()    { dst.refresh_settings = src.refresh_settings; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()   { cfg.log_level = cli.log_level.clone(); }
    if cli.start_time.is_some()  { cfg.start_time = cli.start_time; }

    let any_scheduler = cli.blink_policy.is_some()
        || cli.supervise_delay_ms.is_some()
        || cli.stop_grace_ms.is_some()
        || cli.settle_redraw_ms.is_some()
        || cli.refresh_settings.is_some();
    if any_scheduler && cfg.scheduler.is_none() {
        cfg.scheduler = Some(SchedulerConfig::default());
    }
    if let Some(s) = cfg.scheduler.as_mut() {
        if cli.blink_policy.is_some()        { s.blink_policy = cli.blink_policy; }
        if cli.supervise_delay_ms.is_some()  { s.supervise_delay_ms = cli.supervise_delay_ms; }
        if cli.stop_grace_ms.is_some()       { s.stop_grace_ms = cli.stop_grace_ms; }
        if cli.settle_redraw_ms.is_some()    { s.settle_redraw_ms = cli.settle_redraw_ms; }
        if cli.refresh_settings.is_some()    { s.refresh_settings = cli.refresh_settings; }
    }

    if cli.encoding.is_some() {
        cfg.render.get_or_insert_with(RenderConfig::default).encoding = cli.encoding;
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(level) = cfg.log_level.as_deref() {
        if log::LevelFilter::from_str(level).is_err() {
            return Err(ConfigError::Validation(format!("unknown log_level '{level}'")));
        }
    }
    if let Some(s) = cfg.scheduler.as_ref() {
        if s.supervise_delay_ms == Some(0) {
            return Err(ConfigError::Validation("scheduler supervise_delay_ms must be > 0".into()));
        }
        if s.stop_grace_ms.is_some_and(|ms| ms > 60_000) {
            return Err(ConfigError::Validation("scheduler stop_grace_ms must be <= 60000".into()));
        }
        if s.settle_redraw_ms.is_some_and(|ms| ms == 0 || ms > 5_000) {
            return Err(ConfigError::Validation("scheduler settle_redraw_ms must be 1..=5000".into()));
        }
    }
    Ok(())
}

impl Config {
    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        let mut options = SchedulerOptions::default();
        if let Some(s) = self.scheduler.as_ref() {
            if let Some(policy) = s.blink_policy      { options.blink_policy = policy; }
            if let Some(ms) = s.supervise_delay_ms    { options.supervise_delay = Duration::from_millis(ms); }
            if let Some(ms) = s.stop_grace_ms         { options.stop_grace = Duration::from_millis(ms); }
            if let Some(refresh) = s.refresh_settings { options.refresh_settings = refresh; }
        }
        options
    }

    pub fn settle_redraw(&self) -> Option<Duration> {
        self.scheduler.as_ref()?.settle_redraw_ms.map(Duration::from_millis)
    }

    pub fn encoding(&self) -> ImageEncoding {
        self.render.as_ref().and_then(|r| r.encoding).unwrap_or_default()
    }
}
