//! Single-cycle and scheduled execution.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use codelist_sync_core::{AutoApprove, Synchronizer, TransferApproval};
use tracing::{error, info};

use crate::ProcessExit;
use crate::app::config::{AppConfig, load_file_config};
use crate::app::prompt::TerminalPrompt;
use crate::cli::Args;

/// Resolves configuration and runs one cycle or the schedule.
pub(crate) async fn run(args: &Args) -> Result<ProcessExit> {
    let file = load_file_config(&args.config)?;
    let config = AppConfig::resolve(&file, args);

    let approval: Arc<dyn TransferApproval> = if config.auto_confirm {
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalPrompt)
    };
    let synchronizer = Synchronizer::new(config.settings.clone(), approval)
        .context("Failed to initialise synchronizer")?;

    info!(
        catalog = %config.settings.catalog_url,
        base = %config.settings.base_path.display(),
        registry = %config.settings.registry_path.display(),
        "codelist-sync starting"
    );

    if args.schedule {
        let interval = args
            .interval
            .map_or(config.check_interval, Duration::from_secs);
        run_scheduled(&synchronizer, Duration::from_secs(args.initial_delay), interval).await;
        return Ok(ProcessExit::Success);
    }

    Ok(if run_once(&synchronizer).await {
        ProcessExit::Success
    } else {
        ProcessExit::Failure
    })
}

/// Runs one cycle and logs its outcome; returns whether it completed.
async fn run_once(synchronizer: &Synchronizer) -> bool {
    match synchronizer.run_cycle().await {
        Ok(report) => {
            info!(
                discovered = report.discovered,
                planned = report.planned(),
                transferred = report.transferred,
                failed = report.failed,
                "synchronization finished"
            );
            true
        }
        Err(err) => {
            error!(error = %err, "synchronization cycle failed");
            false
        }
    }
}

/// Runs cycles until Ctrl-C; a failing cycle does not stop the loop.
async fn run_scheduled(synchronizer: &Synchronizer, initial_delay: Duration, interval: Duration) {
    info!(
        initial_delay_secs = initial_delay.as_secs(),
        interval_secs = interval.as_secs(),
        "scheduled mode - press Ctrl-C to stop"
    );

    let schedule = async {
        tokio::time::sleep(initial_delay).await;
        loop {
            run_once(synchronizer).await;
            info!(next_in_secs = interval.as_secs(), "waiting for next cycle");
            tokio::time::sleep(interval).await;
        }
    };

    tokio::select! {
        _ = schedule => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!(error = %err, "failed to listen for Ctrl-C");
            }
            info!("interrupted - stopping schedule");
        }
    }
}
