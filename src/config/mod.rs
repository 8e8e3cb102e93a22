//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::grouping::GroupingConfig;
use crate::cache::{BackendKind, CacheConfig};
use crate::infra::api::DEFAULT_TIMEOUT;

mod cli;

pub use cli::{
    CacheArgs, CacheCommand, CliArgs, Command, ForgetArgs, GlobalOverrides, GroupingOverrides,
    GroupsArgs, OutputFormat, TargetArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "cohort";
const ENV_PREFIX: &str = "COHORT";
const DEFAULT_API_ROOT: &str = "https://api.twitter.com/1.1/";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub grouping: GroupingSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub root: Url,
    pub timeout: Duration,
    pub token: Option<String>,
    pub secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub backend: BackendKind,
    pub directory: PathBuf,
    pub ttl: Duration,
    pub persist_errors: bool,
}

#[derive(Debug, Clone)]
pub struct GroupingSettings {
    pub user_call_count: usize,
    pub super_user_filter: u64,
    pub followed_count_filter: usize,
    pub intersection_filter: f64,
    pub correspondence_filter: usize,
    pub worker_pool_size: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_global_overrides(&cli.overrides);
    if let Command::Groups(args) = &cli.command {
        raw.apply_grouping_overrides(&args.overrides);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    api: RawApiSettings,
    cache: RawCacheSettings,
    grouping: RawGroupingSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(root) = overrides.api_root.as_ref() {
            self.api.root = Some(root.clone());
        }
        if let Some(directory) = overrides.cache_dir.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
        if let Some(seconds) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(seconds);
        }
        if overrides.no_cache {
            self.cache.enabled = Some(false);
        }
    }

    fn apply_grouping_overrides(&mut self, overrides: &GroupingOverrides) {
        if let Some(value) = overrides.user_call_count {
            self.grouping.user_call_count = Some(value);
        }
        if let Some(value) = overrides.super_user_filter {
            self.grouping.super_user_filter = Some(value);
        }
        if let Some(value) = overrides.followed_count_filter {
            self.grouping.followed_count_filter = Some(value);
        }
        if let Some(value) = overrides.intersection_filter {
            self.grouping.intersection_filter = Some(value);
        }
        if let Some(value) = overrides.correspondence_filter {
            self.grouping.correspondence_filter = Some(value);
        }
        if let Some(value) = overrides.worker_pool_size {
            self.grouping.worker_pool_size = Some(value);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            api,
            cache,
            grouping,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            api: build_api_settings(api)?,
            cache: build_cache_settings(cache)?,
            grouping: build_grouping_settings(grouping)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let raw_root = api.root.unwrap_or_else(|| DEFAULT_API_ROOT.to_string());
    let mut root = Url::parse(raw_root.trim())
        .map_err(|err| LoadError::invalid("api.root", format!("invalid URL: {err}")))?;
    if root.cannot_be_a_base() {
        return Err(LoadError::invalid("api.root", "URL cannot be used as a base"));
    }
    // Relative endpoint paths join under the last segment only with a trailing slash.
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }

    let timeout_secs = api.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT.as_secs());
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "api.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let token = non_blank(api.token);
    let secret = non_blank(api.secret);
    if token.is_some() != secret.is_some() {
        return Err(LoadError::invalid(
            "api.token",
            "token and secret must be configured together",
        ));
    }

    Ok(ApiSettings {
        root,
        timeout: Duration::from_secs(timeout_secs),
        token,
        secret,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();

    let directory = cache.directory.unwrap_or(defaults.directory);
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.directory",
            "path must not be empty",
        ));
    }

    let ttl = cache.ttl_seconds.map_or(defaults.ttl, Duration::from_secs);
    if ttl.is_zero() {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(defaults.enabled),
        backend: cache.backend.unwrap_or(defaults.backend),
        directory,
        ttl,
        persist_errors: cache.persist_errors.unwrap_or(defaults.persist_errors),
    })
}

fn build_grouping_settings(grouping: RawGroupingSettings) -> Result<GroupingSettings, LoadError> {
    let defaults = GroupingConfig::default();

    let intersection_filter = grouping
        .intersection_filter
        .unwrap_or(defaults.intersection_filter);
    if !(0.0..=1.0).contains(&intersection_filter) {
        return Err(LoadError::invalid(
            "grouping.intersection_filter",
            "must be between 0 and 1",
        ));
    }

    let worker_pool_size = match grouping.worker_pool_size {
        Some(size) => NonZeroUsize::new(size).ok_or_else(|| {
            LoadError::invalid("grouping.worker_pool_size", "must be greater than zero")
        })?,
        None => defaults.worker_pool_size,
    };

    Ok(GroupingSettings {
        user_call_count: grouping
            .user_call_count
            .unwrap_or(defaults.user_call_count),
        super_user_filter: grouping
            .super_user_filter
            .unwrap_or(defaults.super_user_filter),
        followed_count_filter: grouping
            .followed_count_filter
            .unwrap_or(defaults.followed_count_filter),
        intersection_filter,
        correspondence_filter: grouping
            .correspondence_filter
            .unwrap_or(defaults.correspondence_filter),
        worker_pool_size,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    root: Option<String>,
    timeout_seconds: Option<u64>,
    token: Option<String>,
    secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    backend: Option<BackendKind>,
    directory: Option<PathBuf>,
    ttl_seconds: Option<u64>,
    persist_errors: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGroupingSettings {
    user_call_count: Option<usize>,
    super_user_filter: Option<u64>,
    followed_count_filter: Option<usize>,
    intersection_filter: Option<f64>,
    correspondence_filter: Option<usize>,
    worker_pool_size: Option<usize>,
}
