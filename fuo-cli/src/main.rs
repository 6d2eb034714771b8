//! `fuo`: send one request to a running FeelUOwn server and print the reply.
//!
//! ```text
//! fuo status
//! fuo play fuo://local/songs/1
//! fuo --port 23333 search 'blue in green' --source local
//! ```
//!
//! Exit status is 0 on `ACK OK`, 1 on `ACK Oops` and 2 when the server
//! cannot be reached or speaks something else.

mod client;

use clap::Parser;
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use std::process::ExitCode;
use tokio::net::TcpStream;
use tracing::debug;

use client::{request_line, Client};

#[derive(Debug, Parser)]
#[command(name = "fuo")]
#[command(about = "Command line client for the FeelUOwn RPC server")]
struct Cli {
    /// Server host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// RPC port.
    #[arg(long, default_value_t = 23333)]
    port: u16,

    /// Log to stderr; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Command, e.g. `status`, `play`, `search`.
    cmd: String,

    /// Command arguments, passed through as-is.
    #[arg(num_args = 0.., trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose > 0 {
        let logging = LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::from_verbosity(cli.verbose));
        if let Err(err) = init_logging(logging) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("fuo: {err:#}");
            ExitCode::from(2)
        }
    }
}

/// `Ok(ok)` carries the ACK code; errors mean no ACK was received.
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let line = request_line(&cli.cmd, &cli.args)?;
    let addr = format!("{}:{}", cli.host, cli.port);
    debug!(%addr, request = %line, "Sending request");

    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|err| anyhow::anyhow!("cannot connect to {addr}: {err}"))?;
    let mut client = Client::handshake(stream).await?;
    let ack = client.request(&line).await?;

    if ack.ok {
        if !ack.body.is_empty() {
            println!("{}", ack.body);
        }
    } else {
        eprintln!("{}", ack.body);
    }
    Ok(ack.ok)
}
