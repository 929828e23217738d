use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use usync_config::{LoadedConfig, SyncConfig, UnusedKeyPolicy};
use usync_runtime::{CycleReport, MySqlSource};
use usync_state::SnapshotStore;

#[derive(Parser)]
#[command(name = "usync")]
#[command(about = "Xray user-sync operator CLI", long_about = None)]
struct Cli {
    /// Config layers in merge order (falls back to USYNC_CONFIG, then defaults)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> host...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Panel database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Applied-state snapshot commands
    Snapshot {
        #[command(subcommand)]
        cmd: SnapshotCmd,
    },

    /// Print the mutations the next cycle would issue. Touches nothing.
    Plan,

    /// Run a single full cycle (no cold start) and print its report.
    ReconcileOnce,
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
}

#[derive(Subcommand)]
enum SnapshotCmd {
    /// List the applied accounts (credentials are not printed).
    Show,

    /// Delete the snapshot so the next cycle resynchronizes from empty.
    Reset {
        /// Acknowledge the next cycle will re-add every account.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = usync_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Db { cmd } => {
            let (_, cfg) = load_config(&cli.config_paths)?;
            let secrets = usync_config::resolve_secrets(&cfg)?;
            let pool = usync_runtime::connect_database(&cfg, &secrets).await?;
            match cmd {
                DbCmd::Status => {
                    let s = usync_db::status(&pool).await?;
                    println!("db_ok={} has_user_table={}", s.ok, s.has_user_table);
                }
            }
        }

        Commands::Snapshot { cmd } => {
            let (_, cfg) = load_config(&cli.config_paths)?;
            let store = usync_runtime::snapshot_store(&cfg);
            match cmd {
                SnapshotCmd::Show => {
                    let applied = store.load()?;
                    println!("snapshot_path={}", store.path().display());
                    println!("accounts={}", applied.len());
                    for acct in applied.iter() {
                        println!(
                            "email={} level={} inbound={}",
                            acct.email, acct.level, acct.inbound_tag
                        );
                    }
                }
                SnapshotCmd::Reset { yes } => {
                    if !yes {
                        anyhow::bail!(
                            "REFUSING RESET: the next cycle will re-add every account. Re-run with: `usync snapshot reset --yes`"
                        );
                    }
                    store.reset()?;
                    println!("snapshot_reset=true path={}", store.path().display());
                }
            }
        }

        Commands::Plan => {
            let (_, cfg) = load_config(&cli.config_paths)?;
            let secrets = usync_config::resolve_secrets(&cfg)?;
            let pool = usync_runtime::connect_database(&cfg, &secrets).await?;
            let panel = MySqlSource::new(pool, usync_runtime::account_profile(&cfg));
            let store = usync_runtime::snapshot_store(&cfg);

            let p = usync_runtime::preview(&panel, store.as_ref()).await?;
            println!(
                "adds={} updates={} removes={} unchanged={}",
                p.adds.len(),
                p.updates.len(),
                p.removes.len(),
                p.unchanged
            );
            for a in &p.adds {
                println!("add {a}");
            }
            for u in &p.updates {
                println!("update {} changed={:?}", u.next, u.changed);
            }
            for r in &p.removes {
                println!("remove {r}");
            }
        }

        Commands::ReconcileOnce => {
            let (_, cfg) = load_config(&cli.config_paths)?;
            let secrets = usync_config::resolve_secrets(&cfg)?;
            let reconciler = usync_runtime::connect_reconciler(&cfg, &secrets).await?;
            let report = reconciler.run_cycle().await.context("cycle failed")?;
            print_report(&report);
        }
    }

    Ok(())
}

fn load_config(paths: &[String]) -> Result<(LoadedConfig, SyncConfig)> {
    let paths = if paths.is_empty() {
        usync_config::config_paths_from_env()
    } else {
        paths.to_vec()
    };
    let (loaded, cfg) = usync_config::load_sync_config(&paths)?;
    let unused = usync_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for pointer in &unused.unused_leaf_pointers {
        tracing::warn!(%pointer, "config key not recognised; ignored");
    }
    Ok((loaded, cfg))
}

fn print_report(report: &CycleReport) {
    let s = report.summary();
    println!("cycle_id={}", s.cycle_id);
    println!(
        "desired={} applied={} added={} updated={} removed={}",
        s.desired, s.applied, s.added, s.updated, s.removed
    );
    println!(
        "settled={} below_floor={} counter_failures={} lost_traffic={}",
        s.settled, s.below_floor, s.counter_failures, s.lost_traffic
    );
    for f in &report.failed {
        println!("failed email={} op={} error={}", f.email, f.op, f.error);
    }
    for l in &report.lost_traffic {
        println!(
            "lost email={} download={} upload={} error={}",
            l.email, l.sample.download, l.sample.upload, l.error
        );
    }
    println!("clean={}", report.is_clean());
}

// Logs go to stderr so stdout stays key=value.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
