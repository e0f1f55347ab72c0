//! `rig` command-line entry point

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use rig_harness::{
    builtin_fixtures, describe_routes, recording_routes, run_simulator, HarnessConfig,
    HarnessSession, SimulatorConfig,
};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("rig")
        .version(rig_harness::VERSION)
        .about("Fixture rig for the session-recording player preview")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("JSON logs on stderr and JSON output on stdout"),
        )
        .subcommand(
            Command::new("run")
                .about("Mount the preview, settle it and report")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_name("PATH")
                        .value_parser(value_parser!(std::path::PathBuf))
                        .help("Harness config (TOML)"),
                ),
        )
        .subcommand(Command::new("routes").about("List the fixture routes"))
        .subcommand(
            Command::new("simulate")
                .about("Run seeded randomized sessions")
                .arg(
                    Arg::new("runs")
                        .long("runs")
                        .default_value("100")
                        .value_parser(value_parser!(u64))
                        .help("Number of runs"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("max-latency-ms")
                        .long("max-latency-ms")
                        .default_value("50")
                        .value_parser(value_parser!(u64))
                        .help("Upper bound of simulated latency"),
                )
                .arg(
                    Arg::new("keep-going")
                        .long("keep-going")
                        .action(ArgAction::SetTrue)
                        .help("Keep running after the first violation"),
                ),
        )
}

fn setup_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let json = matches.get_flag("json");
    setup_tracing(json);

    match matches.subcommand() {
        Some(("run", args)) => {
            let config = match args.get_one::<std::path::PathBuf>("config") {
                Some(path) => HarnessConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => HarnessConfig::default(),
            };

            let session = HarnessSession::mount(config).context("mounting harness session")?;
            session.settle().await;
            let report = session.report();
            session.unmount();

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("routes", _)) => {
            let table = recording_routes(&builtin_fixtures()?)?;
            let lines = describe_routes(&table);
            if json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else {
                for line in lines {
                    println!("{line}");
                }
            }
        }
        Some(("simulate", args)) => {
            let config = SimulatorConfig::new()
                .with_runs(*args.get_one::<u64>("runs").context("--runs")?)
                .with_seed(*args.get_one::<u64>("seed").context("--seed")?)
                .with_max_latency_ms(*args.get_one::<u64>("max-latency-ms").context("--max-latency-ms")?)
                .with_stop_on_first_violation(!args.get_flag("keep-going"));

            tracing::info!(?config, "running simulator");
            let report = run_simulator(config).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        _ => {}
    }
    Ok(())
}
