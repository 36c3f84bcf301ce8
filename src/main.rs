//! ipcam-discovery - find IP cameras and recorders and their RTSP streams
//!
//! ## Usage
//! ```bash
//! ipcam-discovery --range 192.168.1.1-254 --cred admin:admin --cred admin:12345
//! ipcam-discovery --range 10.0.0.10 --cred admin:pass --no-onvif --output result.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use colored::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ipcam_discovery::discovery_engine::DiscoveryResult;
use ipcam_discovery::models::{Credential, ProgressEvent, ProgressListener};
use ipcam_discovery::stream_probe::{FfprobeProber, RtspDescribeProber, StreamProber};
use ipcam_discovery::{DiscoveryConfig, DiscoveryEngine, DiscoveryRequest};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProberKind {
    /// Built-in RTSP DESCRIBE client
    Rtsp,
    /// External ffprobe binary
    Ffprobe,
}

#[derive(Parser, Debug)]
#[command(name = "ipcam-discovery")]
#[command(about = "Discover IP cameras / NVRs and their RTSP stream URLs")]
struct Args {
    /// IP range: a.b.c.d, a.b.c.d-w.x.y.z or a.b.c.d-e
    #[arg(long)]
    range: String,

    /// Credential as user:pass (repeatable, tried in order)
    #[arg(long = "cred", value_name = "USER:PASS")]
    creds: Vec<String>,

    /// Skip WS-Discovery
    #[arg(long)]
    no_onvif: bool,

    /// Skip the TCP port scan
    #[arg(long)]
    no_port_scan: bool,

    /// Skip RTSP path guessing
    #[arg(long)]
    no_rtsp_guess: bool,

    /// Skip NVR/DVR channel detection
    #[arg(long)]
    no_nvr: bool,

    /// Device worker pool size
    #[arg(long)]
    workers: Option<usize>,

    /// Overall timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// RTSP pattern file (overrides IPCAM_PATTERN_FILE)
    #[arg(long)]
    patterns: Option<PathBuf>,

    /// Stream prober
    #[arg(long, value_enum, default_value = "rtsp")]
    prober: ProberKind,

    /// Write JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Keep trying credentials after a device rejects one
    #[arg(long)]
    continue_on_auth_failure: bool,
}

struct StderrProgress;

impl ProgressListener for StderrProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        let device = event.device.as_deref().unwrap_or("");
        eprintln!(
            "{} {:>3}% {} {}",
            format!("[{}]", event.phase).cyan(),
            event.percentage(),
            event.message,
            device.dimmed()
        );
    }

    fn on_cancelled(&self) {
        eprintln!("{}", "Probing cancelled".yellow());
    }
}

fn print_summary(result: &DiscoveryResult) {
    eprintln!();
    eprintln!("{}", "  Discovery Summary".bold());
    eprintln!(
        "  {} devices, {} with streams, {} failed ({}ms)",
        result.total_devices,
        result.successful_devices.to_string().green(),
        result.failed_devices.to_string().red(),
        result.duration_ms
    );
    for d in &result.devices {
        let label = d.name.as_deref().or(d.model.as_deref()).unwrap_or("-");
        let url = d.main_stream.as_ref().map(|s| s.url.as_str()).unwrap_or("(recorder)");
        eprintln!("  {} {} {} {}", "✓".green(), d.ip.bold(), label, url.dimmed());
    }
    for e in &result.errors {
        eprintln!("  {} {} {}", "✗".red(), e.ip.bold(), e.error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ipcam_discovery=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let credentials = args
        .creds
        .iter()
        .map(|c| Credential::parse(c).ok_or_else(|| anyhow!("Invalid credential: {}", c)))
        .collect::<Result<Vec<_>>>()?;

    let mut config = DiscoveryConfig::default();
    if let Some(path) = args.patterns {
        config.pattern_file = path;
    }

    let prober: Arc<dyn StreamProber> = match args.prober {
        ProberKind::Rtsp => Arc::new(RtspDescribeProber::new()),
        ProberKind::Ffprobe => Arc::new(FfprobeProber::new("ffprobe")),
    };

    let request = DiscoveryRequest {
        ip_range: args.range,
        credentials,
        enable_onvif: !args.no_onvif,
        enable_port_scan: !args.no_port_scan,
        enable_rtsp_guess: !args.no_rtsp_guess,
        enable_nvr: !args.no_nvr,
        workers: args.workers,
        timeout_secs: args.timeout,
        continue_on_auth_failure: args.continue_on_auth_failure,
    };

    tracing::info!("Starting ipcam-discovery v{}", env!("CARGO_PKG_VERSION"));
    let engine = DiscoveryEngine::new(config, prober);
    let result = engine.run(&request, Some(Arc::new(StderrProgress))).await;

    print_summary(&result);

    let json = result.to_json()?;
    match args.output {
        Some(path) => {
            tokio::fs::write(&path, json).await?;
            eprintln!("  Results written to {}", path.display().to_string().bold());
        }
        None => println!("{}", json),
    }
    Ok(())
}
