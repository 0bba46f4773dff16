//! Layered configuration: built-in defaults, then environment variables (optionally
//! loaded from a `.env` file), then CLI flags — flags always win. Assembled once at
//! startup into a single immutable `ReplicationConfig` value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::filter::SubjectFilter;

#[derive(Debug, Parser)]
#[command(name = "registry-sync", version, about = "Mirrors a Confluent-compatible schema registry into another")]
pub struct Cli {
    #[arg(long, env = "SRC_SR_URL")]
    pub src_sr_url: Option<String>,
    #[arg(long, env = "SRC_API_KEY")]
    pub src_api_key: Option<String>,
    #[arg(long, env = "SRC_API_SECRET")]
    pub src_api_secret: Option<String>,

    #[arg(long, env = "DST_SR_URL")]
    pub dst_sr_url: Option<String>,
    #[arg(long, env = "DST_API_KEY")]
    pub dst_api_key: Option<String>,
    #[arg(long, env = "DST_API_SECRET")]
    pub dst_api_secret: Option<String>,

    #[arg(long)]
    pub sync: bool,
    #[arg(long)]
    pub batch_export: bool,
    #[arg(long)]
    pub get_local_copy: bool,
    #[arg(long)]
    pub from_local_copy: bool,
    #[arg(long)]
    pub delete_all_from_destination: bool,

    #[arg(long)]
    pub custom_source: bool,
    #[arg(long)]
    pub custom_destination: bool,

    #[arg(long)]
    pub sync_deletes: bool,
    #[arg(long)]
    pub sync_hard_deletes: bool,

    #[arg(long)]
    pub allow_list: Option<String>,
    #[arg(long)]
    pub disallow_list: Option<String>,

    #[arg(long, default_value_t = 60)]
    pub scrape_interval: u64,
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    #[arg(long)]
    pub local_copy_path: Option<PathBuf>,

    #[arg(long)]
    pub no_prompt: bool,
}

/// The mutually exclusive operation the CLI selected.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    Sync,
    BatchExport,
    GetLocalCopy,
    FromLocalCopy,
    DeleteAllFromDestination,
}

#[derive(Debug, Clone, Deserialize)]
struct EnvDefaults {
    #[serde(default)]
    src_sr_url: Option<String>,
    #[serde(default)]
    src_api_key: Option<String>,
    #[serde(default)]
    src_api_secret: Option<String>,
    #[serde(default)]
    dst_sr_url: Option<String>,
    #[serde(default)]
    dst_api_key: Option<String>,
    #[serde(default)]
    dst_api_secret: Option<String>,
}

/// The assembled, immutable configuration value threaded through the rest of the
/// program.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    pub mode: Mode,
    pub custom_source: bool,
    pub custom_destination: bool,

    pub src_sr_url: Option<String>,
    pub src_api_key: Option<String>,
    pub src_api_secret: Option<String>,
    pub dst_sr_url: Option<String>,
    pub dst_api_key: Option<String>,
    pub dst_api_secret: Option<String>,

    pub sync_deletes: bool,
    pub sync_hard_deletes: bool,
    pub filter: SubjectFilter,

    pub scrape_interval: Duration,
    pub timeout: Duration,

    pub local_copy_path: Option<PathBuf>,
    pub no_prompt: bool,
}

impl ReplicationConfig {
    pub fn build(cli: Cli) -> Result<Self, ConfigError> {
        let env_defaults = load_env_defaults()?;

        let mode = select_mode(&cli)?;
        let filter = build_filter(cli.allow_list.as_deref(), cli.disallow_list.as_deref())?;

        Ok(Self {
            mode,
            custom_source: cli.custom_source,
            custom_destination: cli.custom_destination,

            src_sr_url: cli.src_sr_url.or(env_defaults.src_sr_url),
            src_api_key: cli.src_api_key.or(env_defaults.src_api_key),
            src_api_secret: cli.src_api_secret.or(env_defaults.src_api_secret),
            dst_sr_url: cli.dst_sr_url.or(env_defaults.dst_sr_url),
            dst_api_key: cli.dst_api_key.or(env_defaults.dst_api_key),
            dst_api_secret: cli.dst_api_secret.or(env_defaults.dst_api_secret),

            sync_deletes: cli.sync_deletes,
            sync_hard_deletes: cli.sync_hard_deletes,
            filter,

            scrape_interval: Duration::from_secs(cli.scrape_interval),
            timeout: Duration::from_secs(cli.timeout),

            local_copy_path: cli.local_copy_path,
            no_prompt: cli.no_prompt,
        })
    }

    pub fn require_src_url(&self) -> Result<&str, ConfigError> {
        self.src_sr_url.as_deref().ok_or(ConfigError::MissingSetting("SRC_SR_URL"))
    }

    pub fn require_dst_url(&self) -> Result<&str, ConfigError> {
        self.dst_sr_url.as_deref().ok_or(ConfigError::MissingSetting("DST_SR_URL"))
    }

    pub fn require_local_copy_path(&self) -> Result<&Path, ConfigError> {
        self.local_copy_path
            .as_deref()
            .ok_or(ConfigError::MissingSetting("--local-copy-path"))
    }
}

fn load_env_defaults() -> Result<EnvDefaults, ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) | Err(dotenvy::Error::Io(_)) => {}
        Err(error) => return Err(ConfigError::Build(config::ConfigError::Message(error.to_string()))),
    }

    let built = config::Config::builder()
        .add_source(config::Environment::default())
        .build()?;

    Ok(built.try_deserialize().unwrap_or(EnvDefaults {
        src_sr_url: None,
        src_api_key: None,
        src_api_secret: None,
        dst_sr_url: None,
        dst_api_key: None,
        dst_api_secret: None,
    }))
}

fn select_mode(cli: &Cli) -> Result<Mode, ConfigError> {
    let selected = [
        (cli.sync, Mode::Sync),
        (cli.batch_export, Mode::BatchExport),
        (cli.get_local_copy, Mode::GetLocalCopy),
        (cli.from_local_copy, Mode::FromLocalCopy),
        (cli.delete_all_from_destination, Mode::DeleteAllFromDestination),
    ]
    .into_iter()
    .filter(|(flag, _)| *flag)
    .map(|(_, mode)| mode)
    .collect::<Vec<_>>();

    match selected.as_slice() {
        [mode] => Ok(*mode),
        [] => Err(ConfigError::NoModeSelected),
        _ => Err(ConfigError::NoModeSelected),
    }
}

fn build_filter(allow_list: Option<&str>, disallow_list: Option<&str>) -> Result<SubjectFilter, ConfigError> {
    match (allow_list, disallow_list) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingFilters),
        (Some(raw), None) => Ok(SubjectFilter::allow(parse_subject_list(raw)?)),
        (None, Some(raw)) => Ok(SubjectFilter::deny(parse_subject_list(raw)?)),
        (None, None) => Ok(SubjectFilter::Unrestricted),
    }
}

fn parse_subject_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    let path = Path::new(raw);
    if path.is_file() {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::SubjectListFile {
            path: raw.to_string(),
            source,
        })?;
        Ok(contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
    } else {
        Ok(raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_and_disallow_lists_are_mutually_exclusive() {
        let result = build_filter(Some("a,b"), Some("c,d"));
        assert!(matches!(result, Err(ConfigError::ConflictingFilters)));
    }

    #[test]
    fn comma_separated_allow_list_is_parsed() {
        let filter = build_filter(Some("a-value, b-value"), None).unwrap();
        assert_eq!(filter, SubjectFilter::allow(["a-value".to_string(), "b-value".to_string()]));
    }

    #[test]
    fn exactly_one_mode_must_be_selected() {
        let cli = Cli::parse_from(["registry-sync", "--sync", "--batch-export"]);
        assert!(matches!(select_mode(&cli), Err(ConfigError::NoModeSelected)));

        let cli = Cli::parse_from(["registry-sync"]);
        assert!(matches!(select_mode(&cli), Err(ConfigError::NoModeSelected)));

        let cli = Cli::parse_from(["registry-sync", "--sync"]);
        assert_eq!(select_mode(&cli).unwrap(), Mode::Sync);
    }
}
