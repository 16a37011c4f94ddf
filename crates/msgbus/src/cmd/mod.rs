use std::time::Duration;

use clap::{Args, Subcommand};
use msgbus_frame::Payload;

use crate::exit::{CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod notify;
pub mod serve;
pub mod version;

/// Used when neither `--addr` nor `MSGBUS_ADDR` is given.
pub const DEFAULT_ADDR: &str = "127.0.0.1:7878";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and answer every request with its own payload.
    Serve(ServeArgs),
    /// Send a request and print the response.
    Call(CallArgs),
    /// Send a fire-and-forget request.
    Notify(NotifyArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Notify(args) => notify::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Bus address (host:port).
    #[arg(long, env = "MSGBUS_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,
}

#[derive(Args, Debug)]
pub struct BodyArgs {
    /// Payload entry as KEY=VALUE (repeatable).
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_key_value, conflicts_with = "json")]
    pub set: Vec<(String, String)>,
    /// Payload as a JSON object of string values.
    #[arg(long, conflicts_with = "set")]
    pub json: Option<String>,
}

impl BodyArgs {
    pub fn payload(&self) -> CliResult<Payload> {
        if let Some(json) = &self.json {
            return serde_json::from_str::<Payload>(json).map_err(|err| {
                CliError::new(
                    DATA_INVALID,
                    format!("--json must be an object of string values: {err}"),
                )
            });
        }
        Ok(self.set.iter().cloned().collect())
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (host:port).
    #[arg(long, env = "MSGBUS_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,
    /// Do not print received requests.
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Method to invoke.
    pub method: String,
    #[command(flatten)]
    pub target: TargetArgs,
    #[command(flatten)]
    pub body: BodyArgs,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Method to invoke.
    pub method: String,
    #[command(flatten)]
    pub target: TargetArgs,
    #[command(flatten)]
    pub body: BodyArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_key_value(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{input}`"))?;
    if key.is_empty() {
        return Err("key must not be empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
