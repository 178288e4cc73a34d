use anyhow::{bail, Context as _, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dw_core::{DualWriterConfig, DualWriterMode};
use dw_sim::{participating_backends, run_simulator, SimulatorConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("dw-sim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Dual writer migration simulator")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Drive synthetic traffic through a dual writer")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration providing the mode and comparator settings"),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .help("Mode to simulate (1-4), overrides the configuration"),
                )
                .arg(
                    Arg::new("resource")
                        .long("resource")
                        .default_value("playlists")
                        .help("Resource name used to resolve the mode and label telemetry"),
                )
                .arg(
                    Arg::new("objects")
                        .long("objects")
                        .default_value("100")
                        .value_parser(value_parser!(usize))
                        .help("Objects seeded before traffic starts"),
                )
                .arg(
                    Arg::new("divergence")
                        .long("divergence")
                        .default_value("0.1")
                        .value_parser(value_parser!(f64))
                        .help("Share of objects whose storage copy differs (0.0-1.0)"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Parse a configuration and print the mode of each resource")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Configuration file"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn required<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

async fn run(args: &ArgMatches) -> Result<()> {
    let resource: String = required(args, "resource")?;
    let objects: usize = required(args, "objects")?;
    let divergence: f64 = required(args, "divergence")?;
    let seed: u64 = required(args, "seed")?;

    if !(0.0..=1.0).contains(&divergence) {
        bail!("--divergence must be between 0.0 and 1.0, got {divergence}");
    }

    let file_config = match args.get_one::<PathBuf>("config") {
        Some(path) => DualWriterConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DualWriterConfig::default().with_resource_mode(&resource, DualWriterMode::Mode2),
    };
    let mode = match args.get_one::<String>("mode") {
        Some(raw) => raw.parse::<DualWriterMode>()?,
        None => file_config.mode_for(&resource),
    };

    let config = SimulatorConfig {
        seed,
        objects,
        divergence,
        mode,
        resource,
        options: file_config.options(),
    };

    let backends: Vec<&str> = participating_backends(mode).iter().map(|b| b.as_str()).collect();
    tracing::info!(%mode, backends = ?backends, "starting simulation");

    let report = run_simulator(config).await;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }
    Ok(())
}

fn check_config(args: &ArgMatches) -> Result<()> {
    let path: PathBuf = required(args, "file")?;
    let config = DualWriterConfig::load(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    println!("Configuration: {}", path.display());
    println!("  default mode: {}", config.default_mode);
    println!("  parallel reads: {}", config.parallel_reads);
    if config.resources.is_empty() {
        println!("  resources: none (all use the default mode)");
    }
    for resource in config.resources.keys() {
        println!("  {resource}: mode {}", config.mode_for(resource));
    }
    if !config.comparator.ignored_annotation_prefixes.is_empty() {
        println!(
            "  ignored annotation prefixes: {}",
            config.comparator.ignored_annotation_prefixes.join(", ")
        );
    }
    if !config.comparator.ignored_label_keys.is_empty() {
        println!(
            "  ignored label keys: {}",
            config.comparator.ignored_label_keys.join(", ")
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("check-config", args)) => check_config(args),
        _ => Ok(()),
    }
}
