use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(author, version, about = "Kubernetes workload right-sizing and autoscaling optimizer", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sample cluster telemetry for a while, then analyze and report recommendations.
    Optimize {
        /// Namespace to scope sampling/analysis to; repeatable. Default: all namespaces.
        #[arg(short, long, value_name = "NAMESPACE")]
        namespace: Vec<String>,

        /// Kubernetes config file path.
        #[arg(short, long)]
        config_file: Option<String>,

        /// How long to sample before analyzing (e.g. "30s", "5m"). This crate has no
        /// persistence, so a demo run must collect for a while first.
        #[arg(short, long, default_value = "30s", value_parser = parse_duration)]
        duration: std::time::Duration,

        /// Output format.
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,

        /// Output file path; if unset, writes to stdout.
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn parse_duration(s: &str) -> Result<std::time::Duration, String> {
    let s = s.trim();
    let (num, unit) = s.split_at(s.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(s.len()));
    let value: f64 = num.parse().map_err(|_| format!("invalid duration: {s}"))?;
    let seconds = match unit {
        "" | "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unknown duration unit: {other}")),
    };
    Ok(std::time::Duration::from_secs_f64(seconds))
}

#[derive(Clone, Copy, ValueEnum, Debug, Default)]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_optimize_with_defaults() {
        let args = Args::try_parse_from(["kubeowler-optimizer", "optimize"]).unwrap();
        match args.command {
            Commands::Optimize { duration, format, .. } => {
                assert_eq!(duration, std::time::Duration::from_secs(30));
                assert!(matches!(format, ReportFormat::Text));
            }
        }
    }

    #[test]
    fn parses_namespace_and_duration_overrides() {
        let args = Args::try_parse_from([
            "kubeowler-optimizer",
            "optimize",
            "-n",
            "default",
            "-n",
            "staging",
            "--duration",
            "5m",
            "--format",
            "json",
        ])
        .unwrap();
        match args.command {
            Commands::Optimize { namespace, duration, format, .. } => {
                assert_eq!(namespace, vec!["default".to_string(), "staging".to_string()]);
                assert_eq!(duration, std::time::Duration::from_secs(300));
                assert!(matches!(format, ReportFormat::Json));
            }
        }
    }

    #[test]
    fn duration_parser_rejects_unknown_unit() {
        assert!(parse_duration("10x").is_err());
    }
}
