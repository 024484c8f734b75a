use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use domain_events::config::{ClientConfig, DEFAULT_URI};
use domain_events::eventloop::signals;
use domain_events::hypervisor::DomainEventCallback;
use domain_events::{Connection, EventLoop, LoopExit};
use log::debug;
use std::path::PathBuf;
use std::process::ExitCode;


/// Print domain lifecycle events delivered through a custom event loop.
#[derive(Parser, Debug)]
#[command(name = "event-test", version, after_help = format!("uri will default to {}", DEFAULT_URI))]
struct Cli {
    /// Connection URI, e.g. qemu:///system or test:///default
    uri: Option<String>,
    /// Directory holding per-driver event sockets
    #[arg(long, value_name = "DIR")]
    socket_dir: Option<PathBuf>,
    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}


fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}


fn print_event(tag: &'static str) -> DomainEventCallback {
    Box::new(move |_conn, dom, event, detail| {
        println!("{} EVENT: Domain {}({}) {} {}", tag, dom.name, dom.id, event, detail)
    })
}


fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = ClientConfig::default();
    if let Some(uri) = cli.uri {
        config.uri = uri;
    }
    if let Some(dir) = cli.socket_dir {
        config.socket_dir = dir;
    }
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Using uri:{}", config.uri);

    signals::install_keyboard_handler().context("installing SIGINT handler")?;
    let mut event_loop = EventLoop::new().with_timeout(config.poll_timeout);
    let conn = Connection::open(&config.uri, &config, &mut event_loop)
        .with_context(|| format!("opening {}", config.uri))?;

    // two subscribers, to show fan-out
    conn.domain_event_register(print_event("event-callback-1"));
    conn.domain_event_register(print_event("event-callback-2"));

    let status = match event_loop.run_until_exit().context("event loop failed")? {
        LoopExit::Interrupted => {
            println!("Keyboard Interrupt caught - exiting cleanly");
            ExitCode::SUCCESS
        }
        LoopExit::PeerReset => {
            println!("Reset by peer");
            ExitCode::FAILURE
        }
    };
    debug!("closing {}", config.uri);
    conn.close(&mut event_loop);
    Ok(status)
}


fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(status) => status,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
