//! dlogger - sensor data logger node agent
//!
//! Connects to the master, registers under its role tag and logs every
//! sensor reading the master pushes. Runs until SIGINT, SIGHUP or SIGTERM.
//!
//! Exit status is 0 on every signal-driven shutdown. With
//! `--on-connect-failure abort` a failed first connect exits with 2.

use std::time::Duration;

use clap::Parser;
use dlogger::config::{AgentConfig, ConnectPolicy, MasterEndpoint};
use dlogger::config::{DEFAULT_IDENTITY, DEFAULT_MASTER_HOST, DEFAULT_MASTER_PORT};
use dlogger::{lifecycle, LogSink, TcpTransport};

#[derive(Parser)]
#[command(name = "dlogger")]
#[command(about = "Receive sensor data from the master and log it")]
struct Args {
    /// Master host name or address
    #[arg(long, env = "DLOGGER_MASTER_HOST", default_value = DEFAULT_MASTER_HOST)]
    master_host: String,

    /// Master port
    #[arg(long, env = "DLOGGER_MASTER_PORT", default_value_t = DEFAULT_MASTER_PORT)]
    master_port: u16,

    /// Role tag sent to the master on registration
    #[arg(long, env = "DLOGGER_IDENTITY", default_value = DEFAULT_IDENTITY)]
    identity: String,

    /// Time allowed for connecting and registering, in milliseconds
    #[arg(long, env = "DLOGGER_CONNECT_TIMEOUT_MS", default_value_t = 5000)]
    connect_timeout_ms: u64,

    /// What to do if the master cannot be reached at startup
    #[arg(
        long,
        value_enum,
        env = "DLOGGER_ON_CONNECT_FAILURE",
        default_value_t = ConnectPolicy::Continue
    )]
    on_connect_failure: ConnectPolicy,
}

impl Args {
    fn into_config(self) -> AgentConfig {
        AgentConfig {
            master: MasterEndpoint::new(self.master_host, self.master_port),
            identity: self.identity,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            on_connect_failure: self.on_connect_failure,
        }
    }
}

fn main() {
    let args = Args::parse();

    // Records go to stdout, one complete line each
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    let config = args.into_config();
    let transport = TcpTransport::from_config(&config);

    match lifecycle::run(config, transport, LogSink) {
        Ok(report) => std::process::exit(report.exit_code),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
