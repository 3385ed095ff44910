use anyhow::Context;
use clap::Parser;
use monitor::bridge::{monitor_bind_address, MonitorBridge};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{PipelineOverrides, WorkflowConfig};
use workflow::runner::Runner;

mod generator;
mod monitor;
mod vehicle;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "LiDAR obstacle-distance telemetry simulator")]
struct Args {
    /// Bin a single simulated revolution and print the resulting message
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[command(flatten)]
    pipeline: PipelineOverrides,
    /// Mirror every published message as a MAVLink v2 frame to HOST:PORT over UDP
    #[arg(long)]
    mirror: Option<String>,
    /// Keep the monitor endpoint alive after the mission until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Append a one-line summary of the run to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

fn append_report(path: &Path, line: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening report {}", path.display()))?;
    writeln!(file, "{}", line)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = match args.workflow.as_ref() {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    };
    workflow_config.apply(&args.pipeline);
    if args.mirror.is_some() {
        workflow_config.mavlink_mirror = args.mirror.clone();
    }
    workflow_config
        .pipeline
        .validate()
        .context("invalid pipeline configuration")?;

    let runner = Runner::new(workflow_config.clone());

    if args.offline {
        let result = runner.offline()?;
        let nearest = result.profile.nearest();
        println!(
            "Offline run -> packets {}, samples {}, occupied bins {}/{}, nearest {:?}",
            result.packets,
            result.samples_applied,
            result.profile.occupied(),
            result.profile.len(),
            nearest
        );
        println!("{}", serde_json::to_string(&result.message)?);

        if let Some(path) = args.report.as_ref() {
            let line = format!(
                "offline packets={} samples={} occupied={} nearest={:?}",
                result.packets,
                result.samples_applied,
                result.profile.occupied(),
                nearest
            );
            append_report(path, &line)?;
        }
        return Ok(());
    }

    let bridge = MonitorBridge::new(runner.vehicle(), runner.metrics());
    if args.serve {
        bridge.serve(monitor_bind_address(workflow_config.monitor_port));
    }

    let report = runner.execute()?;
    println!(
        "Mission complete -> sent {}, ticks {} (skipped {}), publish errors {}, dropouts {}, source {:?}, nearest {:?}",
        report.messages_sent,
        report.stats.ticks,
        report.stats.skipped_ticks,
        report.stats.publish_errors,
        report.stats.source_dropouts,
        report.source_status,
        report.nearest
    );
    println!(
        "Vehicle -> armed {}, mode {:?}, altitude {:.1} m",
        report.final_state.armed, report.final_state.mode, report.final_state.position.relative_alt_m
    );
    if let Some(path) = args.report.as_ref() {
        let line = format!(
            "mission sent={} ticks={} skipped={} errors={} dropouts={}",
            report.messages_sent,
            report.stats.ticks,
            report.stats.skipped_ticks,
            report.stats.publish_errors,
            report.stats.source_dropouts
        );
        append_report(path, &line)?;
    }

    if args.serve {
        println!("Monitor running on port {} (Ctrl+C to stop)...", workflow_config.monitor_port);
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
