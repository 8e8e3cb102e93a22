use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the cohort binary.
#[derive(Debug, Parser)]
#[command(
    name = "cohort",
    version,
    about = "Discover interest groups among the accounts a user follows"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "COHORT_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build interest groups for one account.
    Groups(Box<GroupsArgs>),
    /// Response cache maintenance.
    Cache(CacheArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the REST API root URL.
    #[arg(long = "api-root", value_name = "URL", global = true)]
    pub api_root: Option<String>,

    /// Override the file cache directory.
    #[arg(
        long = "cache-dir",
        value_name = "PATH",
        value_hint = ValueHint::DirPath,
        global = true
    )]
    pub cache_dir: Option<PathBuf>,

    /// Override the cache time-to-live.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS", global = true)]
    pub cache_ttl_seconds: Option<u64>,

    /// Bypass the response cache entirely.
    #[arg(long = "no-cache", action = clap::ArgAction::SetTrue, global = true)]
    pub no_cache: bool,
}

#[derive(Debug, Args, Clone)]
pub struct GroupsArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub overrides: GroupingOverrides,

    /// Report format written to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Create one remote list per discovered group.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub publish: bool,
}

#[derive(Debug, Args, Clone)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// Numeric id of the account to analyse.
    #[arg(long = "user-id", value_name = "ID")]
    pub user_id: Option<u64>,

    /// Screen name of the account to analyse.
    #[arg(long = "user-name", value_name = "NAME")]
    pub user_name: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GroupingOverrides {
    /// Override how many candidates are expanded.
    #[arg(long = "user-call-count", value_name = "COUNT")]
    pub user_call_count: Option<usize>,

    /// Override the follower count above which an account is a power user.
    #[arg(long = "super-user-filter", value_name = "COUNT")]
    pub super_user_filter: Option<u64>,

    /// Override the minimum bucket size, exclusive.
    #[arg(long = "followed-count-filter", value_name = "COUNT")]
    pub followed_count_filter: Option<usize>,

    /// Override the overlap fraction needed to merge buckets.
    #[arg(long = "intersection-filter", value_name = "FRACTION")]
    pub intersection_filter: Option<f64>,

    /// Override the minimum similarity set size, exclusive.
    #[arg(long = "correspondence-filter", value_name = "COUNT")]
    pub correspondence_filter: Option<usize>,

    /// Override the number of concurrent candidate fetches.
    #[arg(long = "worker-pool-size", value_name = "COUNT")]
    pub worker_pool_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// Remove the cached response of one GET request.
    Forget(ForgetArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ForgetArgs {
    /// Endpoint path relative to the API root, e.g. `friends/ids.json`.
    #[arg(long, value_name = "PATH")]
    pub path: String,

    /// Request parameter as `key=value`; repeat for several.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty parameter name in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
