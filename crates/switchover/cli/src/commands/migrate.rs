//! `switch` and `query` commands

use crate::client::LoginClient;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::notify::PubNubPublisher;
use crate::output::{self, print_warning, OutputFormat};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use switchover_migration::{
    CachingTokenProvider, DeviceReport, DisabledPublisher, MigrationCoordinator,
    NotificationPublisher, PairReport, RunReport,
};
use switchover_registry::HttpRegistry;
use switchover_types::{BatchEntry, DeviceType, DeviceUuid, ReleaseId, VersionTag};
use tabled::Tabled;
use tracing::debug;

/// Options shared by `switch` and `query`
#[derive(Debug, Clone, Default, Args)]
pub struct MigrateArgs {
    /// Supervisor tag devices move from
    #[arg(short, long)]
    pub from: Option<String>,

    /// Supervisor tag devices move to
    #[arg(short, long)]
    pub to: Option<String>,

    /// Device UUID (repeatable)
    #[arg(short, long)]
    pub uuid: Vec<String>,

    /// Restrict to one device type
    #[arg(short = 'd', long = "devicetype")]
    pub device_type: Option<String>,

    /// JSON file of {fromTag, toTag, device_type} entries
    #[arg(short, long)]
    pub batchfile: Option<PathBuf>,

    /// Refresh the API token stored in the config file
    #[arg(short, long = "refreshtoken")]
    pub refresh_token: bool,
}

/// Whether the command may write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Switch,
    Query,
}

impl Mode {
    fn writes(self) -> bool {
        matches!(self, Mode::Switch)
    }

    fn verb(self) -> &'static str {
        match self {
            Mode::Switch => "Switching",
            Mode::Query => "Checking",
        }
    }
}

/// What a `switch` or `query` invocation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Single-device path for each uuid
    Devices {
        uuids: Vec<DeviceUuid>,
        from: VersionTag,
        to: VersionTag,
    },
    /// Batch path for each entry of a batch file
    BatchFile(PathBuf),
    /// Batch path for one tag pair
    Fleet {
        from: VersionTag,
        to: VersionTag,
        device_type: Option<DeviceType>,
    },
    /// Nothing but the token refresh
    RefreshOnly,
}

impl Dispatch {
    /// Decide what to run from the options given
    ///
    /// `--uuid` takes precedence over `--batchfile`, which takes precedence
    /// over a bare `--from`/`--to` pair.
    pub fn from_args(args: &MigrateArgs) -> CliResult<Self> {
        let tags = match (&args.from, &args.to) {
            (Some(from), Some(to)) => Some((VersionTag::new(from), VersionTag::new(to))),
            _ => None,
        };

        if !args.uuid.is_empty() {
            let (from, to) = tags
                .ok_or_else(|| CliError::Usage("--uuid requires both --from and --to".into()))?;
            return Ok(Dispatch::Devices {
                uuids: args.uuid.iter().map(DeviceUuid::new).collect(),
                from,
                to,
            });
        }

        if let Some(path) = &args.batchfile {
            return Ok(Dispatch::BatchFile(path.clone()));
        }

        if let Some((from, to)) = tags {
            return Ok(Dispatch::Fleet {
                from,
                to,
                device_type: args.device_type.as_deref().map(DeviceType::new),
            });
        }

        if args.refresh_token {
            return Ok(Dispatch::RefreshOnly);
        }

        Err(CliError::Usage(
            "specify --uuid with --from and --to, a --batchfile, or --from with --to".into(),
        ))
    }
}

/// Table row for the single-device path
#[derive(Debug, Serialize, Tabled)]
struct DeviceRow {
    uuid: String,
    outcome: String,
    detail: String,
}

impl From<&DeviceReport> for DeviceRow {
    fn from(report: &DeviceReport) -> Self {
        Self {
            uuid: report.uuid.to_string(),
            outcome: report.outcome.label().to_string(),
            detail: report.outcome.detail(),
        }
    }
}

/// Table row for the batch path
#[derive(Debug, Serialize, Tabled)]
struct PairRow {
    device_type: String,
    from: String,
    to: String,
    outcome: String,
    detail: String,
}

impl From<&PairReport> for PairRow {
    fn from(report: &PairReport) -> Self {
        Self {
            device_type: report
                .device_type
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "*".to_string()),
            from: tag_with_release(&report.from_tag, report.from_release),
            to: tag_with_release(&report.to_tag, report.to_release),
            outcome: report.outcome.label().to_string(),
            detail: report.outcome.detail(),
        }
    }
}

fn tag_with_release(tag: &VersionTag, release: Option<ReleaseId>) -> String {
    match release {
        Some(id) => format!("{} ({})", tag, id),
        None => tag.to_string(),
    }
}

/// Execute a `switch` or `query` command
///
/// Returns whether every device or device type succeeded.
pub async fn execute(
    mode: Mode,
    dispatch: Dispatch,
    config: &CliConfig,
    format: OutputFormat,
) -> CliResult<bool> {
    let dry_run = !mode.writes();

    let report = match dispatch {
        Dispatch::RefreshOnly => return Ok(true),

        Dispatch::Devices { uuids, from, to } => {
            let coordinator = build_coordinator(config)?;
            let pb = spinner(format, format!("{} {} device(s)...", mode.verb(), uuids.len()));
            let reports = coordinator.migrate_devices(&uuids, &from, &to, dry_run).await;
            pb.finish_and_clear();
            RunReport::Devices(reports)
        }

        Dispatch::BatchFile(path) => {
            let contents = std::fs::read_to_string(&path)?;
            let entries: Vec<BatchEntry> = serde_json::from_str(&contents)?;
            for (index, entry) in entries.iter().enumerate() {
                if entry.to_request().is_none() {
                    print_warning(&format!(
                        "Skipping entry {} of {}: fromTag and toTag are both required",
                        index,
                        path.display()
                    ));
                }
            }

            let coordinator = build_coordinator(config)?;
            let pb = spinner(format, format!("{} {} batch entries...", mode.verb(), entries.len()));
            let reports = coordinator.reconcile_batch(&entries, dry_run).await;
            pb.finish_and_clear();
            RunReport::Pairs(reports)
        }

        Dispatch::Fleet {
            from,
            to,
            device_type,
        } => {
            let coordinator = build_coordinator(config)?;
            let pb = spinner(format, format!("{} {} to {}...", mode.verb(), from, to));
            let reports = coordinator
                .reconcile(&from, &to, device_type.as_ref(), dry_run)
                .await;
            pb.finish_and_clear();
            RunReport::Pairs(reports?)
        }
    };

    render(&report, format)?;
    Ok(report.all_succeeded())
}

fn render(report: &RunReport, format: OutputFormat) -> CliResult<()> {
    let summary = match report {
        RunReport::Devices(reports) => {
            output::print_output(reports.iter().map(DeviceRow::from).collect(), format)?;
            output::summary_line(reports.iter().map(|r| r.outcome.label()))
        }
        RunReport::Pairs(reports) => {
            output::print_output(reports.iter().map(PairRow::from).collect(), format)?;
            output::summary_line(reports.iter().map(|r| r.outcome.label()))
        }
    };
    output::print_summary(&summary, report.all_succeeded());
    Ok(())
}

fn build_coordinator(config: &CliConfig) -> CliResult<MigrationCoordinator> {
    let registry = HttpRegistry::new(&config.api_endpoint, config.credential(), config.timeout())?;
    let tokens = CachingTokenProvider::new(LoginClient::new(
        &config.api_endpoint,
        config.credential(),
        config.timeout(),
    )?);

    let notifier: Arc<dyn NotificationPublisher> = match config.pubnub_keys() {
        Some((publish_key, subscribe_key)) => Arc::new(
            PubNubPublisher::new(publish_key, subscribe_key, config.timeout())
                .map_err(|e| CliError::Config(e.to_string()))?,
        ),
        None => {
            debug!("No PubNub keys configured, tombstones are disabled");
            Arc::new(DisabledPublisher)
        }
    };

    Ok(MigrationCoordinator::new(
        Arc::new(registry),
        Arc::new(tokens),
        notifier,
        config.coordinator_config(),
    ))
}

fn spinner(format: OutputFormat, message: String) -> ProgressBar {
    if !matches!(format, OutputFormat::Table) {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
