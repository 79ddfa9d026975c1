//! roi-kit — reconciles marketing platform exports and reports ROI and
//! incrementality.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use roi_core::ProjectConfig;
use roi_metrics::{estimate_lift, LiftResult, RoiReport, Sample};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "roi-kit")]
#[command(about = "Open Marketing ROI Kit CLI")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "ROI_KIT_JSON_LOGS", default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ROI pipeline
    Run {
        /// Path to config YAML file
        #[arg(long)]
        config: PathBuf,
    },
    /// Estimate incremental lift from an A/B test
    Lift(LiftArgs),
}

#[derive(Args, Debug)]
struct LiftArgs {
    #[arg(long)]
    test_conversions: u64,
    #[arg(long)]
    test_users: u64,
    #[arg(long)]
    control_conversions: u64,
    #[arg(long)]
    control_users: u64,
    /// Extra spend attributable to the test treatment
    #[arg(long)]
    spend_increment: Option<f64>,
    /// Revenue per conversion (defaults to the config's LTV when enabled)
    #[arg(long)]
    revenue_per_conversion: Option<f64>,
    /// Significance level: 0.10, 0.05 or 0.01
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,
    /// Project config providing LTV defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the result as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Run { config } => run(config),
        Command::Lift(args) => lift(args),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "roi_kit=info,roi_core=info,roi_transform=info,roi_metrics=info,roi_io=info".into()
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(config_path: PathBuf) -> anyhow::Result<()> {
    let config = ProjectConfig::load(&config_path)?;
    info!(config = %config_path.display(), "Configuration loaded");

    let output = roi_kit::run_pipeline(&config)?;

    println!("{}", format_summary(&config.project_name, &output.report));
    println!("Fact table: {}", output.fact_table.display());
    for path in &output.reports {
        println!("Report:     {}", path.display());
    }
    Ok(())
}

fn lift(args: LiftArgs) -> anyhow::Result<()> {
    let ltv = match &args.config {
        Some(path) => ProjectConfig::load(path)?.ltv.revenue_per_conversion(),
        None => None,
    };
    let revenue_per_conversion = args.revenue_per_conversion.or(ltv);

    let result = estimate_lift(
        Sample::new(args.test_conversions, args.test_users),
        Sample::new(args.control_conversions, args.control_users),
        args.spend_increment,
        revenue_per_conversion,
        args.alpha,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", format_lift(&result));
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "n/a".to_string())
}

fn format_summary(project: &str, report: &RoiReport) -> String {
    let overall = &report.overall;
    let mut out = format!(
        "{project}\n  spend {:.2}  revenue {:.2}  net profit {:.2}  ROAS {}  net ROI {}\n",
        overall.spend,
        overall.revenue,
        overall.net_profit,
        fmt_opt(overall.roas),
        fmt_opt(overall.net_roi),
    );
    for m in &report.by_channel {
        out.push_str(&format!(
            "  {:<20} spend {:>12.2}  revenue {:>12.2}  ROAS {:>8}  CAC {:>8}\n",
            m.channel.as_deref().unwrap_or_default(),
            m.spend,
            m.revenue,
            fmt_opt(m.roas),
            fmt_opt(m.cac),
        ));
    }
    out
}

fn format_lift(result: &LiftResult) -> String {
    format!(
        "lift                      {:.4}\n\
         standard error            {:.6}\n\
         z                         {:.2}\n\
         CI (rate difference)      [{:.6}, {:.6}]{}\n\
         incremental conversions   {:.2}\n\
         incremental revenue       {}\n\
         incremental cost/conv     {}\n\
         incremental ROI           {}",
        result.lift,
        result.standard_error,
        result.z_score,
        result.ci_lower,
        result.ci_upper,
        if result.is_significant() { "  significant" } else { "" },
        result.incremental_conversions,
        fmt_opt(result.incremental_revenue),
        fmt_opt(result.incremental_cost_per_conversion),
        fmt_opt(result.incremental_roi),
    )
}
