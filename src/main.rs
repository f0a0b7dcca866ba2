/*
    Four processes, ids 0 to 3, each broadcast 100 messages to the rest
    of the group over TCP. Every message carries the sender's vector
    clock, and a receiver only hands a message to the application once
    everything the sender had seen when sending it has been handed over
    too. Messages that arrive early wait in a buffer until their causal
    history catches up. A process stops once it has sent its 100 and
    delivered 100 from every other member.
*/

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use causal_bcast::broadcast::{BroadcastSession, Summary};
use causal_bcast::common::config::{Config, BASE_PORT, MESSAGE_QUOTA};
use causal_bcast::common::delay::RandomDelay;
use causal_bcast::network::tcp::TcpTransport;

#[derive(Parser, Debug)]
#[command(name = "causal-bcast")]
#[command(version, about = "Causally ordered broadcast within a fixed group of four processes")]
struct Args {
    /// Identity of this process (0-3)
    id: usize,

    /// `delay` simulates network jitter on inbound messages, `debug` dumps state on every termination check
    #[arg(value_enum, num_args = 0..=2)]
    modes: Vec<Mode>,

    /// Process i listens on base-port + i
    #[arg(long, default_value_t = BASE_PORT)]
    base_port: u16,

    /// Comma separated host of every process, in id order
    #[arg(long, value_delimiter = ',')]
    hosts: Option<Vec<String>>,

    /// Messages each process broadcasts
    #[arg(long, default_value_t = MESSAGE_QUOTA)]
    messages: u32,

    /// Seed for the send and jitter delays
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Delay,
    Debug,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = Config::new(self.id)?;
        if let Some(hosts) = self.hosts {
            config.hosts = hosts;
        }
        config.base_port = self.base_port;
        config.quota = self.messages;
        config.simulate_delay = self.modes.contains(&Mode::Delay);
        config.debug = self.modes.contains(&Mode::Debug);
        config.seed = self.seed;
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> anyhow::Result<Summary> {
    let config = args.into_config()?;
    info!(
        id = config.id,
        delay = config.simulate_delay,
        "Process {} initialized. Delay mode: {}",
        config.id,
        if config.simulate_delay { "ON" } else { "OFF" }
    );

    let transport = TcpTransport::connect_all(&config)
        .await
        .context("failed to connect to the group")?;
    info!("Process {}: All connections established", config.id);

    let delay = RandomDelay::new(config.send_delay_ms.clone(), config.jitter_ms.clone(), config.seed);
    let mut session = BroadcastSession::new(config, transport, delay);
    Ok(session.run().await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(args.modes.contains(&Mode::Debug));

    match run(args).await {
        Ok(summary) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        let args = Args::try_parse_from(["causal-bcast", "2", "delay", "debug"]).unwrap();
        let config = args.into_config().unwrap();

        assert_eq!(config.id, 2);
        assert!(config.simulate_delay);
        assert!(config.debug);
        assert_eq!(config.quota, 100);
    }

    #[test]
    fn test_parse_defaults() {
        let args = Args::try_parse_from(["causal-bcast", "0"]).unwrap();
        let config = args.into_config().unwrap();

        assert!(!config.simulate_delay);
        assert!(!config.debug);
        assert_eq!(config.base_port, 8000);
    }

    #[test]
    fn test_parse_hosts() {
        let args = Args::try_parse_from(["causal-bcast", "1", "--hosts", "dc01,dc02,dc03,dc04"]).unwrap();
        let config = args.into_config().unwrap();

        assert_eq!(config.addr_of(3), "dc04:8003");
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(Args::try_parse_from(["causal-bcast"]).is_err());
        assert!(Args::try_parse_from(["causal-bcast", "x"]).is_err());
        assert!(Args::try_parse_from(["causal-bcast", "1", "fast"]).is_err());

        let args = Args::try_parse_from(["causal-bcast", "4"]).unwrap();
        assert!(args.into_config().is_err());

        let args = Args::try_parse_from(["causal-bcast", "1", "--hosts", "a,b"]).unwrap();
        assert!(args.into_config().is_err());
    }
}
