//! HealthLens CLI
//!
//! Command-line interface for the health analytics engine:
//! - Full analysis report
//! - Correlations, forecasts, trends and risks on their own
//! - Default config generation

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use healthlens::analysis::{
    AnalysisReport, AnalyticsEngine, CorrelationReport, HealthPrediction, HealthRiskAssessment,
    HealthTrend,
};
use healthlens::config::{generate_default_config, Config};
use healthlens::metrics::MetricId;
use healthlens::service::AnalysisService;
use healthlens::sources::FileSource;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "healthlens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Nutrition and wearable health analytics")]
#[command(long_about = "HealthLens correlates what you eat with how you sleep and recover.\nFind significant correlations, likely causes, trends, forecasts and risks.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Meal log (JSON or CSV)
    #[arg(long, global = true)]
    pub meals: Option<PathBuf>,

    /// Wearable daily summaries (JSON)
    #[arg(long, global = true)]
    pub wearable: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full analysis
    Analyze,

    /// Significant nutrition and biometric correlations
    Correlations,

    /// Forecast one metric
    Forecast {
        /// Metric name, e.g. sleep_score or calories
        metric: String,
    },

    /// Trend of every wearable metric
    Trends,

    /// Rule-based risk assessments
    Risks,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("writing config to {:?}", path))?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    // A broken config file stops the run before any logging is set up
    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default()?,
    };
    if let Some(path) = &cli.meals {
        config.sources.meals_path = Some(path.clone());
    }
    if let Some(path) = &cli.wearable {
        config.sources.wearable_path = Some(path.clone());
    }

    init_logging(&config);
    tracing::debug!("HealthLens v{}", env!("CARGO_PKG_VERSION"));

    let source = FileSource::from_paths(
        config.sources.meals_path.clone(),
        config.sources.wearable_path.clone(),
    )
    .context("pass --meals and/or --wearable, or set [sources] in the config file")?;

    let engine = AnalyticsEngine::new(config.analytics.clone(), config.risk.clone());
    let service = AnalysisService::new(Arc::new(source), engine)
        .with_lookback(config.sources.lookback_days);

    match cli.command {
        Commands::Analyze => {
            let report = service.run().await?;
            output(cli.format, &report, print_report)?;
        }
        Commands::Correlations => {
            let report = service.correlations().await?;
            output(cli.format, &report, print_correlations)?;
        }
        Commands::Forecast { metric } => {
            let metric: MetricId = match metric.parse() {
                Ok(m) => m,
                Err(e) => bail!("{}; known metrics: {}", e, metric_names()),
            };
            let predictions = service.forecast(metric).await?;
            output(cli.format, &predictions, |p| print_predictions(p))?;
        }
        Commands::Trends => {
            let trends = service.trends().await?;
            output(cli.format, &trends, |t| print_trends(t))?;
        }
        Commands::Risks => {
            let risks = service.risks().await?;
            output(cli.format, &risks, |r| print_risks(r))?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Logs go to stderr so JSON output on stdout stays clean
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("healthlens={}", config.logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn metric_names() -> String {
    MetricId::all()
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn output<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    table: impl Fn(&T),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table => table(value),
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("{}", report.summary);
    println!();
    if let Some(message) = &report.message {
        println!("{}", message);
        println!();
    }

    print_correlation_rows(report.overlapping_days, &report.correlations);

    if !report.causal_graph.is_empty() {
        println!();
        println!("Causal graph:");
        for edge in &report.causal_graph.edges {
            let granger = edge
                .granger_p_value
                .map(|p| format!("granger p={:.3}", p))
                .unwrap_or_else(|| "no granger evidence".to_string());
            println!(
                "  {} -> {}  score {:.2}  lag {}  ({})",
                edge.from, edge.to, edge.causality_score, edge.optimal_lag, granger
            );
        }
    }

    println!();
    print_trends(&report.trends);
    println!();
    print_predictions(&report.predictions);
    println!();
    print_risks(&report.risks);
}

fn print_correlations(report: &CorrelationReport) {
    if let Some(message) = &report.message {
        println!("{}", message);
        println!();
    }
    print_correlation_rows(report.overlapping_days, &report.correlations);
}

fn print_correlation_rows(
    overlapping_days: usize,
    correlations: &[healthlens::analysis::CorrelationResult],
) {
    println!("Correlations ({} overlapping days):", overlapping_days);
    if correlations.is_empty() {
        println!("  none");
        return;
    }
    println!(
        "  {:<20} {:<22} {:>4} {:>7} {:>7} {:>4}  {}",
        "From", "To", "Lag", "r", "p", "n", "Strength"
    );
    println!("  {}", "-".repeat(78));
    for c in correlations {
        println!(
            "  {:<20} {:<22} {:>4} {:>7.3} {:>7.4} {:>4}  {}",
            c.metric_a.as_str(),
            c.metric_b.as_str(),
            c.lag_days,
            c.coefficient,
            c.p_value,
            c.sample_size,
            c.strength
        );
    }
}

fn print_trends(trends: &[HealthTrend]) {
    println!("Trends:");
    if trends.is_empty() {
        println!("  not enough history (7 days needed)");
        return;
    }
    println!(
        "  {:<22} {:<12} {:>9} {:>6} {:>8}  {}",
        "Metric", "Trend", "Slope/day", "R²", "Change", "Significance"
    );
    println!("  {}", "-".repeat(78));
    for t in trends {
        println!(
            "  {:<22} {:<12} {:>9.3} {:>6.2} {:>7.1}%  {}",
            t.metric.as_str(),
            t.trend_type.to_string(),
            t.slope,
            t.r_squared,
            t.percent_change,
            t.significance
        );
        for a in &t.anomalies {
            println!("    anomaly {} value {:.1} (z {:+.2})", a.date, a.value, a.z_score);
        }
    }
}

fn print_predictions(predictions: &[HealthPrediction]) {
    println!("Forecasts:");
    if predictions.is_empty() {
        println!("  not enough history (3 days needed)");
        return;
    }
    println!(
        "  {:<22} {:<11} {:>10} {:>21} {:>6}  {}",
        "Metric", "Date", "Value", "95% interval", "Conf", "Model"
    );
    println!("  {}", "-".repeat(88));
    for p in predictions {
        println!(
            "  {:<22} {:<11} {:>10.1} {:>10.1}..{:<9.1} {:>6.2}  {}",
            p.metric.as_str(),
            p.prediction_date.to_string(),
            p.predicted_value,
            p.confidence_interval.0,
            p.confidence_interval.1,
            p.confidence,
            p.model
        );
    }
}

fn print_risks(risks: &[HealthRiskAssessment]) {
    println!("Risks:");
    if risks.is_empty() {
        println!("  none detected");
        return;
    }
    for r in risks {
        println!(
            "  {} ({}, {}) score {:.2}",
            r.risk_type, r.category, r.risk_level, r.risk_score
        );
        for f in &r.contributing_factors {
            println!("    - {} [+{:.1}]", f.description, f.impact_score);
        }
        if let Some(first) = r.recommendations.first() {
            println!("    Try: {}", first);
        }
    }
}
