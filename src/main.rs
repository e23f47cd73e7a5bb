use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use log::info;

mod cli;

use cli::{Args, Commands, ReportFormat};
use kubeowler_optimizer::collector::Collector;
use kubeowler_optimizer::optimizer::OptimizerFacade;
use kubeowler_optimizer::reporting;
use kubeowler_optimizer::store::TimeSeriesStore;
use kubeowler_optimizer::telemetry::kube_port::KubeTelemetryPort;
use kubeowler_optimizer::OptimizerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    match args.command {
        Commands::Optimize { namespace, config_file, duration, format, output } => {
            run_optimize_command(namespace, config_file, duration, format, output).await?
        }
    }

    Ok(())
}

async fn run_optimize_command(
    namespace: Vec<String>,
    config_file: Option<String>,
    duration: std::time::Duration,
    format: ReportFormat,
    output: Option<String>,
) -> Result<()> {
    println!("{}", "🛰  kubeowler-optimizer".bright_cyan().bold());
    println!("{}", "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━".bright_cyan());

    info!("starting optimizer run");

    println!("📋 {}", "Configuration:".bright_yellow().bold());
    println!(
        "   Namespaces: {}",
        if namespace.is_empty() { "all".to_string() } else { namespace.join(", ") }.bright_green()
    );
    println!("   Sampling duration: {}", format!("{duration:?}").bright_green());
    println!();

    print!("🔗 Connecting to cluster... ");
    let port = match KubeTelemetryPort::new(config_file.as_deref()).await {
        Ok(port) => {
            println!("{}", "✅ Success".bright_green());
            Arc::new(port)
        }
        Err(e) => {
            println!("{}", "❌ Failed".bright_red());
            eprintln!("Error: {e}");
            return Err(e);
        }
    };

    let mut config = OptimizerConfig::default();
    config.namespaces = namespace.clone();
    config.validate()?;

    let store = Arc::new(TimeSeriesStore::new(config.max_points_per_series()));
    let collector = Arc::new(Collector::new(config.clone(), port.clone(), store.clone()));

    print!("📡 Sampling cluster telemetry for {duration:?}... ");
    collector.start().await?;
    tokio::time::sleep(duration).await;
    collector.stop().await;
    println!("{}", "✅ Done".bright_green());

    let facade = OptimizerFacade::new(config, store, port)?;
    let recommendations = facade.recommend_all(&namespace).await;
    let stats = facade.stats();

    println!();
    println!("{}", "📊 Summary:".bright_yellow().bold());
    println!("   Recommendations: {}", recommendations.len().to_string().bright_green());
    println!("   Estimated monthly savings: {}", format!("${:.2}", stats.total_savings).bright_green());

    match &output {
        Some(path) => {
            reporting::write_report_to_file(&recommendations, &stats, format_str(format), std::path::Path::new(path))?;
            println!("   Report: {}", path.bright_cyan());
        }
        None => {
            let report = reporting::write_report(&recommendations, &stats, format_str(format));
            println!();
            println!("{report}");
        }
    }

    println!();
    println!("{}", "🎉 Optimization run completed!".bright_green().bold());
    Ok(())
}

fn format_str(format: ReportFormat) -> &'static str {
    match format {
        ReportFormat::Text => "text",
        ReportFormat::Json => "json",
    }
}
