mod config;
mod selector;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use vmattach_core::AttachProvider;
use vmattach_core::hotspot::HotSpotProvider;

use config::ResolvedConfig;

#[derive(Parser)]
#[command(
    name = "vmattach",
    about = "Load a JVMTI native agent into a running JVM",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Path to the native agent shared library (e.g. /path/to/libagent.so)
    agent_path: Option<String>,

    /// Option string handed to the agent verbatim
    #[arg(default_value = "")]
    agent_options: String,

    /// Target JVM pid (skips the interactive selector)
    #[arg(long, global = true)]
    pid: Option<u32>,

    /// Directory holding HotSpot attach sockets and perf data
    #[arg(long, global = true)]
    tmpdir: Option<PathBuf>,

    /// How long to wait for the target to open its attach socket, in ms
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered attach-capable JVMs
    List,
}

/// What one parsed invocation asks for. Split from `main` so the
/// zero-argument and subcommand routing stays testable.
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Usage,
    List,
    Attach {
        agent_path: String,
        agent_options: String,
    },
}

fn plan(cli: &Cli) -> Invocation {
    if matches!(cli.command, Some(Commands::List)) {
        return Invocation::List;
    }
    match &cli.agent_path {
        None => Invocation::Usage,
        Some(agent_path) => Invocation::Attach {
            agent_path: agent_path.clone(),
            agent_options: cli.agent_options.clone(),
        },
    }
}

fn provider_for(cli: &Cli) -> anyhow::Result<HotSpotProvider> {
    let resolved = ResolvedConfig::resolve(cli.tmpdir.clone(), cli.timeout_ms)?;
    Ok(HotSpotProvider::new(
        resolved.tmpdir,
        Duration::from_millis(resolved.timeout_ms),
    ))
}

fn cmd_list(cli: &Cli) -> anyhow::Result<()> {
    let provider = provider_for(cli)?;
    let vms = provider
        .list()
        .context("failed to enumerate attach-capable JVMs")?;
    if vms.is_empty() {
        println!("no attach-capable JVMs found");
        return Ok(());
    }
    for vm in vms {
        println!("{:>8}  {}", vm.id, vm.display_name);
    }
    Ok(())
}

fn cmd_attach(cli: &Cli, agent_path: &str, agent_options: &str) -> anyhow::Result<()> {
    let provider = provider_for(cli)?;
    tracing::info!(agent = agent_path, options = agent_options, "agent load request");

    let pid: i64 = match cli.pid {
        Some(pid) => i64::from(pid),
        None => selector::select(&provider)?,
    };
    if pid <= 0 {
        tracing::info!("no target selected, nothing to do");
        return Ok(());
    }

    vmattach_core::attach_and_load(&provider, &pid.to_string(), agent_path, agent_options)
        .with_context(|| format!("failed to load agent into pid {pid}"))?;

    println!("agent {agent_path} loaded into pid {pid}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match plan(&cli) {
        Invocation::Usage => {
            // No arguments: help and a clean exit, no attach attempted.
            println!("vmattach: load a JVMTI native agent into a running JVM");
            println!("usage: vmattach </path/to/libagent.so> [options] [--pid <pid>]");
            Ok(())
        }
        Invocation::List => cmd_list(&cli),
        Invocation::Attach {
            agent_path,
            agent_options,
        } => cmd_attach(&cli, &agent_path, &agent_options),
    }
}
