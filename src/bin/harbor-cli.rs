use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use harbor_lib::backend::HttpServiceBackend;
use harbor_lib::config::ClientConfig;
use harbor_lib::logging::LogManager;
use harbor_lib::notifier::SilentNotifier;
use harbor_lib::release_feed::GithubReleaseFeed;
use harbor_lib::settings_sync::{SettingsSnapshot, SettingsSync};
use harbor_lib::store::JsonFileStore;
use harbor_lib::update_tracker::{CheckOutcome, UpdateTracker};
use harbor_lib::APP_VERSION;

#[derive(Parser)]
#[command(name = "harbor-cli")]
#[command(about = "Control the Harbor organizer service and check for releases", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "harbor.client.yaml")]
    config: PathBuf,

    #[arg(short, long, default_value = "harbor.preferences.json")]
    prefs: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show service status, startup preference and download folder
    Status,
    Start,
    Stop,
    /// Turn start-at-boot on or off
    Startup {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Run one organize pass now
    Organize,
    Reload,
    Reset,
    CheckUpdate,
    /// Stop notifying about the latest release
    DismissUpdate,
    ToggleUpdateChecks,
    /// Poll the service and print every change until Ctrl-C
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

fn print_snapshot(snapshot: &SettingsSnapshot) {
    let status = if snapshot.service_status.running { "running" } else { "stopped" };
    println!("   Service: {status}");
    if let Some(uptime) = snapshot.service_status.uptime_seconds {
        println!("   Uptime: {uptime}s");
    }
    println!("   Start at boot: {}", if snapshot.startup_enabled { "on" } else { "off" });
    println!("   Download folder: {}", snapshot.download_dir);
    if let Some(error) = &snapshot.error {
        eprintln!("⚠️  {error}");
    }
}

/// Prints the snapshot and fails if it carries an error.
fn finish(snapshot: &SettingsSnapshot) -> anyhow::Result<()> {
    print_snapshot(snapshot);
    match &snapshot.error {
        Some(error) => anyhow::bail!("{error}"),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ClientConfig::load_or_default(&cli.config)?;
    let logs = Arc::new(LogManager::default().with_stderr_mirror());

    match cli.command {
        Command::CheckUpdate | Command::DismissUpdate | Command::ToggleUpdateChecks => {
            let feed = GithubReleaseFeed::from_config(&config)?;
            let tracker = UpdateTracker::new(
                Arc::new(feed),
                Arc::new(JsonFileStore::open(&cli.prefs)),
                Arc::new(SilentNotifier),
                logs,
                APP_VERSION,
            );
            return run_update_command(&cli.command, &tracker).await;
        }
        _ => {}
    }

    let backend = HttpServiceBackend::from_config(&config)?;
    let sync = Arc::new(SettingsSync::with_poll_interval(
        Arc::new(backend),
        logs,
        config.poll_interval(),
    ));

    match cli.command {
        Command::Status => {
            sync.refresh().await?;
            println!("📊 Harbor {APP_VERSION}");
            finish(&sync.snapshot().await)
        }
        Command::Start | Command::Stop => {
            sync.refresh().await?;
            let want_running = matches!(cli.command, Command::Start);
            if sync.snapshot().await.service_status.running != want_running {
                sync.toggle_service().await;
            } else {
                println!("✅ Nothing to do");
            }
            finish(&sync.snapshot().await)
        }
        Command::Startup { state } => {
            sync.refresh().await?;
            let want_enabled = matches!(state, Switch::On);
            if sync.snapshot().await.startup_enabled != want_enabled {
                sync.toggle_startup().await;
            }
            finish(&sync.snapshot().await)
        }
        Command::Organize => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
            pb.set_message("Organizing downloads...");
            pb.enable_steady_tick(Duration::from_millis(100));

            match sync.organize_now().await {
                Ok(count) => {
                    pb.finish_with_message(format!("✅ Organized {count} file(s)"));
                    Ok(())
                }
                Err(e) => {
                    pb.abandon_with_message("❌ Organize failed!");
                    Err(e.into())
                }
            }
        }
        Command::Reload => {
            sync.reload_config().await?;
            println!("🔄 Configuration reloaded");
            finish(&sync.snapshot().await)
        }
        Command::Reset => {
            sync.reset_to_defaults().await?;
            println!("🔄 Configuration reset to defaults");
            finish(&sync.snapshot().await)
        }
        Command::Watch => {
            let handle = sync.activate();
            let mut last: Option<SettingsSnapshot> = None;
            let mut ticker = tokio::time::interval(Duration::from_millis(500));

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => {
                        let snapshot = sync.snapshot().await;
                        if !snapshot.loading && last.as_ref() != Some(&snapshot) {
                            println!("[{}]", chrono::Local::now().format("%H:%M:%S"));
                            print_snapshot(&snapshot);
                            last = Some(snapshot);
                        }
                    }
                }
            }

            sync.deactivate();
            if let Some(handle) = handle {
                let _ = handle.await;
            }
            Ok(())
        }
        Command::CheckUpdate | Command::DismissUpdate | Command::ToggleUpdateChecks => Ok(()),
    }
}

async fn run_update_command(command: &Command, tracker: &UpdateTracker) -> anyhow::Result<()> {
    match command {
        Command::ToggleUpdateChecks => {
            let enabled = tracker.toggle_check_updates_enabled();
            println!(
                "Automatic update checks {}",
                if enabled { "enabled" } else { "disabled" }
            );
            Ok(())
        }
        Command::DismissUpdate => {
            tracker.check_for_updates().await;
            match tracker.dismiss_notification().await {
                Some(version) => println!("🔕 Notifications for {version} dismissed"),
                None => println!("Nothing to dismiss"),
            }
            Ok(())
        }
        _ => {
            let outcome = tracker.refresh_update_check().await;
            let snapshot = tracker.snapshot().await;
            let version = snapshot.state.version.as_deref().unwrap_or("?");

            match outcome {
                CheckOutcome::Disabled => println!("Update checks are disabled"),
                CheckOutcome::Inactive => {}
                CheckOutcome::NoUpdate => println!("✅ Harbor {APP_VERSION} is up to date (latest {version})"),
                CheckOutcome::Dismissed => println!("Harbor {version} is available (dismissed)"),
                CheckOutcome::Available => {
                    println!("🎉 Harbor {version} is available");
                    if let Some(url) = &snapshot.state.url {
                        println!("   {url}");
                    }
                }
                CheckOutcome::Failed => {
                    anyhow::bail!(
                        "Update check failed: {}",
                        snapshot.state.error.unwrap_or_default()
                    );
                }
            }
            Ok(())
        }
    }
}
