use std::{io::Write, process, sync::Arc};

use cohort::{
    application::{
        error::AppError,
        grouping::{Grouper, GroupingConfig, GroupingReport, LogProgress},
    },
    cache::{CacheConfig, ResponseCache},
    config::{self, CacheCommand, Command, ForgetArgs, GroupsArgs, Settings, TargetArgs},
    infra::{
        api::{ApiConfig, RestClient},
        error::InfraError,
        telemetry,
    },
    presentation,
};
use cohort_api_types::UserRef;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let client = build_client(&settings)?;

    match cli_args.command {
        Command::Groups(args) => run_groups(client, &settings, *args).await,
        Command::Cache(cache) => match cache.command {
            CacheCommand::Forget(args) => run_forget(client, args).await,
        },
    }
}

fn build_client(settings: &Settings) -> Result<RestClient, AppError> {
    let client = RestClient::new(&ApiConfig::from(&settings.api))?;
    let cache_config = CacheConfig::from(&settings.cache);

    match ResponseCache::from_config(&cache_config) {
        Some(cache) => {
            info!(
                target = "cohort::main",
                backend = ?cache_config.backend,
                directory = %cache_config.directory.display(),
                ttl_secs = cache_config.ttl.as_secs(),
                "Response cache enabled"
            );
            Ok(client.with_cache(Arc::new(cache), cache_config.persist_errors))
        }
        None => Ok(client),
    }
}

async fn run_groups(
    client: RestClient,
    settings: &Settings,
    args: GroupsArgs,
) -> Result<(), AppError> {
    let target = target_ref(&args.target)?;
    let client = Arc::new(client);
    let grouper = Grouper::new(client.clone(), GroupingConfig::from(&settings.grouping))
        .with_progress(Arc::new(LogProgress::new()));

    let report = grouper.generate(&target).await?;
    info!(
        target = "cohort::main",
        user = %target,
        groups = report.groups.len(),
        power_users = report.power_users.len(),
        "Grouping complete"
    );

    if args.publish {
        publish(&client, &report).await?;
    }

    let rendered = presentation::render(&report, args.format)
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    let mut stdout = std::io::stdout().lock();
    let written = if rendered.ends_with('\n') {
        stdout.write_all(rendered.as_bytes())
    } else {
        writeln!(stdout, "{rendered}")
    };
    written.map_err(InfraError::from)?;
    Ok(())
}

async fn publish(client: &RestClient, report: &GroupingReport) -> Result<(), AppError> {
    for (index, group) in report.groups.iter().enumerate() {
        let label = group.label.trim();
        let name = if label.is_empty() {
            format!("cohort group {}", index + 1)
        } else {
            label.to_string()
        };
        let description = format!(
            "Accounts followed together by {} people",
            group.members.len()
        );
        let list = client
            .create_list(&name, &description, &group.similarity_ids)
            .await?;
        info!(
            target = "cohort::main",
            list_id = %list.id_str,
            name = %list.name,
            members = group.similarity_ids.len(),
            "Published group as list"
        );
    }
    if report.groups.is_empty() {
        warn!(target = "cohort::main", "No groups to publish");
    }
    Ok(())
}

async fn run_forget(client: RestClient, args: ForgetArgs) -> Result<(), AppError> {
    let params: Vec<(&str, String)> = args
        .params
        .iter()
        .map(|(key, value)| (key.as_str(), value.clone()))
        .collect();
    client.forget(&args.path, &params).await?;
    info!(
        target = "cohort::main",
        path = %args.path,
        params = params.len(),
        "Cache entry removed"
    );
    Ok(())
}

fn target_ref(target: &TargetArgs) -> Result<UserRef, AppError> {
    match (target.user_id, target.user_name.as_deref()) {
        (Some(id), None) => Ok(UserRef::Id(id)),
        (None, Some(name)) => {
            let name = name.trim().trim_start_matches('@');
            if name.is_empty() {
                return Err(AppError::validation("user name must not be empty"));
            }
            Ok(UserRef::ScreenName(name.to_string()))
        }
        _ => Err(AppError::validation(
            "exactly one of --user-id or --user-name is required",
        )),
    }
}
