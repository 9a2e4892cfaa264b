use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use landwatch::analysis::pipeline::AnalysisReport;
use landwatch::config::{LoggingConfig, Settings};
use landwatch::detect::Alert;
use landwatch::monitor::regions::default_regions;
use landwatch::monitor::CycleSummary;

#[derive(Parser)]
#[command(
    name = "landwatch",
    about = "Land-cover classification and satellite region monitoring",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one or more images (GeoTIFF, PNG, JPEG)
    Analyze {
        /// Image files to analyze
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Run one monitoring cycle over all regions
    Monitor {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Run monitoring cycles on the configured interval until interrupted
    Watch,

    /// List the monitored regions
    Regions,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    // Logs go to stderr so report output on stdout stays parseable.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.is_json() {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load_or_default();
    init_tracing(&settings.logging);

    match cli.command {
        Commands::Analyze { paths, json } => {
            let alerts = landwatch::build_alert_store(&settings).await?;
            let orchestrator = landwatch::build_orchestrator(&settings, None);

            let mut results = Vec::with_capacity(paths.len());
            let mut failed = 0usize;
            for path in &paths {
                tracing::info!(path = %path.display(), "Analyzing image");
                match landwatch::analyze_file(path, &orchestrator, &alerts, &settings).await {
                    Ok((report, raised)) => results.push((path, report, raised)),
                    Err(e) => {
                        tracing::error!(path = %path.display(), "analysis failed: {:#}", e);
                        eprintln!("Error: {}: {:#}", path.display(), e);
                        failed += 1;
                    }
                }
            }

            if json {
                let reports: Vec<_> = results.iter().map(|(_, report, _)| report).collect();
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for (path, report, raised) in &results {
                    print_report(&path.display().to_string(), report, raised);
                }
                if results.len() > 1 {
                    let stats = alerts.aggregate_stats().await;
                    println!(
                        "Uploads: {}  avg NDVI {:.4}  avg NDWI {:.4}  flood-risk {}  stressed {}",
                        stats.total_uploads,
                        stats.avg_ndvi,
                        stats.avg_ndwi,
                        stats.flood_risk_count,
                        stats.vegetation_stress_count
                    );
                }
            }

            if failed > 0 {
                anyhow::bail!("{} of {} image(s) could not be analyzed", failed, paths.len());
            }
        }
        Commands::Monitor { json } => {
            let alerts = landwatch::build_alert_store(&settings).await?;
            let monitor = landwatch::build_monitor(&settings, alerts.clone());
            let summaries = monitor.run_full_cycle().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                print_cycle(&summaries, &alerts.list().await, settings.thresholds.ndwi_flood_threshold);
            }
        }
        Commands::Watch => {
            let alerts = landwatch::build_alert_store(&settings).await?;
            let monitor = Arc::new(landwatch::build_monitor(&settings, alerts));
            let every = Duration::from_secs(settings.monitor.interval_hours.max(1) * 3600);

            tracing::info!(interval_hours = settings.monitor.interval_hours, "Starting landwatch monitor");
            tokio::select! {
                _ = landwatch::scheduler::run_monitor_loop(monitor, every) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, shutting down");
                }
            }
        }
        Commands::Regions => {
            println!("{:<20} | {:>9} | {:>9} | Bounding box (W, S, E, N)", "Region", "Lat", "Lon");
            println!("{:-<20}-|-{:->9}-|-{:->9}-|-{:-<30}", "", "", "", "");
            for region in default_regions() {
                let [w, s, e, n] = region.bbox.to_array();
                println!(
                    "{:<20} | {:>9.4} | {:>9.4} | {}, {}, {}, {}",
                    region.name, region.latitude, region.longitude, w, s, e, n
                );
            }
        }
    }

    Ok(())
}

fn print_report(label: &str, report: &AnalysisReport, alerts: &[Alert]) {
    println!("\n=== {} ===", label);
    println!("Class:       {} ({:.0}%)", report.predicted_class, report.confidence * 100.0);
    println!("Model:       {}", report.analysis_model);
    println!("Status:      {}", report.vegetation_status);
    println!(
        "NDVI:        mean {:.4}  min {:.4}  max {:.4}  std {:.4}",
        report.indices.ndvi_mean, report.indices.ndvi_min, report.indices.ndvi_max, report.indices.ndvi_std
    );
    println!("NDWI:        mean {:.4}", report.indices.ndwi_mean);
    println!("Flood risk:  {}", report.risk.flood_risk);
    println!("Vegetation:  {}", report.risk.vegetation_stress.description);
    println!("Water:       {}", report.risk.water_presence);
    println!("Probabilities:");
    for p in &report.probabilities {
        println!("  {:<24} {:>5.1}%", p.name, p.value);
    }
    if !alerts.is_empty() {
        println!("Alerts:");
        for alert in alerts {
            println!("  [{:?}] {}", alert.severity, alert.title);
        }
    }
}

fn print_cycle(summaries: &[CycleSummary], alerts: &[Alert], flood_threshold: f64) {
    println!("\n{:<20} | {:>7} | {:>7} | {:<8} | {:>6} | Mode", "Region", "NDVI", "NDWI", "Risk", "Alerts");
    println!("{:-<20}-|-{:->7}-|-{:->7}-|-{:-<8}-|-{:->6}-|-{:-<9}", "", "", "", "", "", "");
    for s in summaries {
        println!(
            "{:<20} | {:>7.4} | {:>7.4} | {:<8} | {:>6} | {}",
            s.region_name, s.ndvi, s.ndwi, s.risk_level, s.alerts_triggered, s.mode
        );
    }

    let wet: Vec<_> = summaries
        .iter()
        .filter(|s| s.ndwi > flood_threshold)
        .map(|s| s.region_name.as_str())
        .collect();
    if !wet.is_empty() {
        println!("\nNDWI above {}: {}", flood_threshold, wet.join(", "));
    }

    if !alerts.is_empty() {
        println!("\nAlerts:");
        for alert in alerts {
            println!("  #{} [{:?}] {} ({})", alert.id, alert.severity, alert.title, alert.module);
        }
    }
    println!();
}
