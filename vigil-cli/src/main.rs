//! Vigil CLI tool

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vigil_core::{AuthContext, ExecutionType, SuiteId, SuiteKind, ThresholdSide};
use vigil_runtime::{CallContext, FeedbackRequest, TriggerRequest};
use vigil_storage::WarehouseConfig;

mod commands;
mod tracing_config;

use commands::Connections;
use tracing_config::{init_tracing, TracingConfig};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about = "Vigil data test-suite pipeline CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Metadata database URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Warehouse URL for staleness probes (defaults to the metadata database)
    #[arg(long, env = "WAREHOUSE_URL", global = true)]
    warehouse_url: Option<String>,

    /// Relation holding warehouse table metadata with a `last_altered` column
    #[arg(long, env = "VIGIL_WAREHOUSE_METADATA_RELATION", global = true)]
    metadata_relation: Option<String>,

    /// Organization the caller belongs to
    #[arg(long, env = "VIGIL_ORGANIZATION_ID", global = true)]
    organization: Option<String>,

    /// Bearer token forwarded to downstream services
    #[arg(long, env = "VIGIL_JWT", default_value = "", hide_env_values = true, global = true)]
    jwt: String,

    /// Act as a system-internal caller
    #[arg(long, global = true)]
    system: bool,

    /// Deadline for the whole operation in seconds
    #[arg(long, default_value = "60", global = true)]
    timeout: u64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,

    /// Trigger one suite now, subject to its staleness gate
    Trigger {
        /// Suite id
        suite_id: String,

        /// Suite kind (quantitative, qualitative, qualitative_schema, custom)
        #[arg(long)]
        kind: SuiteKind,

        /// Execution type the schedule fired with (automatic, frequency)
        #[arg(long)]
        execution_type: Option<ExecutionType>,

        /// Organization to act on
        #[arg(long)]
        target_org: Option<String>,
    },

    /// Record user feedback on an alert
    Feedback {
        /// Alert id
        alert_id: String,

        /// 1 confirms the anomaly, 0 marks a false positive
        #[arg(long)]
        is_anomaly: i32,

        /// Value the alert reported
        #[arg(long, allow_hyphen_values = true)]
        detected_value: Option<f64>,

        /// Crossed bound (upper, lower)
        #[arg(long)]
        threshold_type: Option<ThresholdSide>,

        /// Suite the alert belongs to
        #[arg(long)]
        suite_id: Option<String>,

        /// Organization to act on
        #[arg(long)]
        target_org: Option<String>,
    },

    /// Run a stored execution result through alerting
    HandleResult {
        /// JSON file with the execution result
        file: PathBuf,

        /// The file holds a schema-change result
        #[arg(long)]
        schema_change: bool,
    },

    /// Manage test suites
    Suites {
        #[command(subcommand)]
        action: SuiteAction,

        /// Organization to act on
        #[arg(long)]
        target_org: Option<String>,
    },
}

#[derive(Subcommand)]
enum SuiteAction {
    /// List suites
    List {
        #[arg(long)]
        kind: Option<SuiteKind>,

        #[arg(long)]
        activated: Option<bool>,
    },

    /// Print one suite as JSON
    Show { suite_id: String },

    /// Create suites from a JSON array of definitions
    Create { file: PathBuf },

    /// Soft delete suites
    Delete {
        #[arg(required = true)]
        suite_ids: Vec<String>,
    },
}

impl Cli {
    fn auth(&self) -> AuthContext {
        if self.system {
            AuthContext::system(self.jwt.clone())
        } else {
            AuthContext {
                caller_org_id: self.organization.clone(),
                is_system_internal: false,
                jwt: self.jwt.clone(),
            }
        }
    }

    async fn connect(&self) -> anyhow::Result<Connections> {
        let database_url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL not set")?;
        let warehouse = self.metadata_relation.as_deref().map(WarehouseConfig::new);
        Connections::open(database_url, self.warehouse_url.as_deref(), warehouse).await
    }
}

/// Cancel the operation on Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling operation");
            on_signal.cancel();
        }
    });
    token
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let auth = cli.auth();
    let ctx = CallContext::new()
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_cancellation(cancel_on_interrupt());

    match &cli.command {
        Commands::Migrate => {
            let database_url = cli
                .database_url
                .as_deref()
                .context("DATABASE_URL not set")?;
            commands::migrate::execute(database_url).await?;
        }
        Commands::Trigger {
            suite_id,
            kind,
            execution_type,
            target_org,
        } => {
            let conns = cli.connect().await?;
            let request = TriggerRequest {
                test_suite_id: SuiteId::new(suite_id.as_str()),
                kind: *kind,
                execution_type: *execution_type,
                target_org_id: target_org.clone(),
            };
            commands::trigger::execute(&conns, &auth, request, &ctx).await?;
        }
        Commands::Feedback {
            alert_id,
            is_anomaly,
            detected_value,
            threshold_type,
            suite_id,
            target_org,
        } => {
            let conns = cli.connect().await?;
            let request = FeedbackRequest {
                alert_id: alert_id.clone(),
                user_feedback_is_anomaly: *is_anomaly,
                detected_value: *detected_value,
                threshold_type: *threshold_type,
                test_suite_id: suite_id.as_deref().map(SuiteId::new),
                target_org_id: target_org.clone(),
            };
            commands::feedback::execute(&conns, &auth, request, &ctx).await?;
        }
        Commands::HandleResult {
            file,
            schema_change,
        } => {
            let conns = cli.connect().await?;
            commands::results::execute(&conns, &auth, file, *schema_change, &ctx).await?;
        }
        Commands::Suites { action, target_org } => {
            let conns = cli.connect().await?;
            let target_org = target_org.as_deref();
            match action {
                SuiteAction::List { kind, activated } => {
                    commands::suites::list(&conns, &auth, target_org, *kind, *activated, &ctx)
                        .await?
                }
                SuiteAction::Show { suite_id } => {
                    let id = SuiteId::new(suite_id.as_str());
                    commands::suites::show(&conns, &auth, target_org, &id, &ctx).await?
                }
                SuiteAction::Create { file } => {
                    commands::suites::create(&conns, &auth, target_org, file, &ctx).await?
                }
                SuiteAction::Delete { suite_ids } => {
                    let ids: Vec<SuiteId> =
                        suite_ids.iter().map(|id| SuiteId::new(id.as_str())).collect();
                    commands::suites::delete(&conns, &auth, target_org, &ids, &ctx).await?
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&TracingConfig::from_environment(cli.verbose));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
