use clap::{Parser, Subcommand, ValueEnum};
use netshaper::Result;
use netshaper::config::Config;
use netshaper::exec::{self, DryRun, Executor, Shell};
use netshaper::model::{self, Compilation};
use netshaper::{host, input, render};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "netshaper")]
#[command(about = "Hierarchical bandwidth shaping planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// tc / flow-steering command lines.
    Commands,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the shaping plan and print it without touching the system.
    Plan {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        devices: PathBuf,

        #[arg(long)]
        network: PathBuf,

        /// Number of hardware queues; detected from the download interface when omitted.
        #[arg(long)]
        queues: Option<u16>,

        #[arg(long, value_enum, default_value = "commands")]
        format: Format,

        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
    /// Clear prior shaping, set up flow steering, and apply a freshly compiled plan.
    Refresh {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        devices: PathBuf,

        #[arg(long)]
        network: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Plan {
            config,
            devices,
            network,
            queues,
            format,
            out,
        } => {
            let config = Config::from_file(&config)?;
            let queues = resolve_queues(&config, queues)?;
            let compilation = compile(&config, &devices, &network, queues)?;

            let text = match format {
                Format::Commands => {
                    let mut text = String::new();
                    for cmd in render::render_plan(&compilation.plan, &config.xdp_cpumap_dir) {
                        text.push_str(&cmd.to_string());
                        text.push('\n');
                    }
                    text
                }
                Format::Json => render::render_json(&compilation)?,
            };

            match out {
                Some(out) => {
                    std::fs::write(&out, text)?;
                    println!("Wrote {}", out.display());
                }
                None => print!("{}", text),
            }
        }
        Commands::Refresh {
            config,
            devices,
            network,
        } => {
            let config = Config::from_file(&config)?;
            refresh(&config, &devices, &network)?;
        }
    }

    Ok(())
}

fn resolve_queues(config: &Config, cli_queues: Option<u16>) -> Result<u16> {
    match cli_queues.or(config.queues) {
        Some(queues) => Ok(queues),
        None => host::available_queues(
            Path::new(host::SYSFS_ROOT),
            Path::new(host::CPUINFO_PATH),
            &config.interface_a,
        ),
    }
}

/// Load inputs and compile. Any loader failure aborts before compilation starts.
fn compile(config: &Config, devices: &Path, network: &Path, queues: u16) -> Result<Compilation> {
    let devices = input::load_devices(devices, config.overhead_factor)?;
    let topology = input::load_network(network)?;
    tracing::info!(
        devices = devices.len(),
        nodes = topology.node_count(),
        queues,
        "loaded inputs"
    );

    Ok(model::compile(
        &topology,
        &devices,
        &config.shaping_params(queues),
    )?)
}

fn refresh(config: &Config, devices: &Path, network: &Path) -> Result<()> {
    let queues = resolve_queues(config, None)?;
    // Compile before touching the system so bad input leaves the current shaping in place.
    let compilation = compile(config, devices, network, queues)?;

    let mut executor: Box<dyn Executor> = if config.enable_shell_commands {
        Box::new(Shell::new(config.run_as_sudo))
    } else {
        Box::new(DryRun::new())
    };

    let cleared = exec::run_ignoring_failures(
        executor.as_mut(),
        &render::clear_prior_settings(&config.interface_a, &config.interface_b),
    );
    tracing::debug!(cleared, "cleared prior settings");

    exec::run_all(
        executor.as_mut(),
        &render::flow_steering_setup(
            &config.interface_a,
            &config.interface_b,
            &config.xdp_cpumap_dir,
        ),
    )?;

    let applied = exec::run_all(
        executor.as_mut(),
        &render::render_plan(&compilation.plan, &config.xdp_cpumap_dir),
    )?;

    tracing::info!(
        applied,
        shaped = compilation.shaped_count(),
        unshaped = compilation.unshaped.len(),
        dry_run = !config.enable_shell_commands,
        "successful run completed"
    );
    Ok(())
}
