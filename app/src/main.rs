use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use common::config::Config;
use eyre::{ContextCompat, Result};
use tracing::{debug, error};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod pipeline;

const MODULES: &[&str] = &["common", "grouped_bar", "scaling_line"];

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Extra tracing directives, ie. `common=debug`
    #[arg(short, long)]
    log: Vec<String>,
    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured pipelines
    Ls {
        #[arg(short, long, default_value = "config.yaml")]
        config_file: PathBuf,
    },
    /// Extract, aggregate and plot benchmark results
    Plot {
        #[arg(short, long, default_value = "config.yaml")]
        config_file: PathBuf,
        /// Only run these pipelines
        #[arg(short, long)]
        pipeline: Vec<String>,
    },
    /// Print the aggregated records of a pipeline as JSON
    Print {
        #[arg(short, long, default_value = "config.yaml")]
        config_file: PathBuf,
        #[arg(short, long)]
        pipeline: String,
    },
}

fn init_logging(args: &Cli) -> Result<Option<WorkerGuard>> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let mut env_filter = EnvFilter::new(format!("gol_bench_plot={log_level}"));

    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }
    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    let (file_layer, guard) = match &args.log_file {
        Some(path) => {
            let file_name = path.file_name().context("Log file needs a file name")?;
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => Path::new("."),
            };
            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            (
                Some(layer().with_writer(non_blocking).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(file_layer)
        .init();
    Ok(guard)
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let _guard = init_logging(&args)?;

    let plots = default_plots::init_plots();
    debug!("Plot types: {plots:?}");

    let result = match &args.command {
        Commands::Ls { config_file } => list_pipelines(config_file),
        Commands::Plot {
            config_file,
            pipeline,
        } => plot(config_file, pipeline),
        Commands::Print {
            config_file,
            pipeline,
        } => print_records(config_file, pipeline),
    };
    if let Err(err) = &result {
        error!("{err:#?}");
    }
    result
}

fn list_pipelines(config_file: &Path) -> Result<()> {
    let config = Config::from_file(config_file)?;
    println!("{}", config.name);
    for pipeline in &config.pipelines {
        let categories = pipeline
            .sources
            .iter()
            .map(|s| s.category.as_str())
            .collect::<Vec<_>>();
        println!(
            "{} [{}] {:?} -> {}",
            pipeline.name,
            pipeline.plot.name(),
            categories,
            pipeline.output.display()
        );
    }
    Ok(())
}

fn plot(config_file: &Path, names: &[String]) -> Result<()> {
    let config = Config::from_file(config_file)?;
    for pipeline in pipeline::select(&config, names)? {
        pipeline::run_pipeline(pipeline)?;
        println!("{} -> {}", pipeline.name, pipeline.output.display());
    }
    Ok(())
}

fn print_records(config_file: &Path, name: &str) -> Result<()> {
    let config = Config::from_file(config_file)?;
    let pipeline = config
        .pipeline(name)
        .with_context(|| format!("No pipeline named {name}"))?;
    let records = pipeline::load_records(pipeline)?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
