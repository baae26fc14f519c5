//! Command-line argument parsing for trackdeck.
//!
//! Flags take their value either as the next argument (`--user alice`) or
//! inline (`--user=alice`).

use std::time::Duration;

use thiserror::Error;

use crate::transfer::{TransferIdentity, TransferRequest};

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Follow one transfer until it ends
    Download(DownloadArgs),
}

/// Arguments for a download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadArgs {
    pub user: String,
    pub file: String,
    pub token: String,
    /// Expected size in bytes, 0 when unknown
    pub size: u64,
    /// Give up (and cancel) after this long
    pub timeout: Option<Duration>,
    /// Overrides the configured API base URL
    pub api: Option<String>,
}

impl DownloadArgs {
    pub fn to_request(&self) -> TransferRequest {
        TransferRequest::new(
            TransferIdentity::new(&self.user, &self.token, &self.file),
            self.size,
        )
    }
}

/// Errors from argument parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidValue { flag: String, value: String },

    #[error("missing required flag {0}")]
    MissingFlag(&'static str),
}

pub const USAGE: &str = "\
Usage: trackdeck --user <peer> --file <name> --token <token> [options]

Follow a download and print its progress until it completes or fails.

Options:
  --user <peer>       Peer that shares the file
  --file <name>       Name of the shared file
  --token <token>     Token identifying the file on the peer
  --size <bytes>      Expected size in bytes (default 0)
  --timeout <secs>    Cancel the download after this many seconds
  --api <url>         API base URL (default $TRACKDECK_API_URL or http://localhost:5030)
  -V, --version       Print version
  -h, --help          Print this help";

/// Parse command-line arguments (including the program name) into a command.
///
/// `--version` and `--help` win over everything else on the line.
///
/// # Examples
///
/// ```
/// use trackdeck::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["trackdeck".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), Ok(CliCommand::Version));
/// ```
pub fn parse_args<I>(args: I) -> Result<CliCommand, ArgsError>
where
    I: Iterator<Item = String>,
{
    let args: Vec<String> = args.skip(1).collect();

    for arg in &args {
        match arg.as_str() {
            "--version" | "-V" => return Ok(CliCommand::Version),
            "--help" | "-h" => return Ok(CliCommand::Help),
            _ => {}
        }
    }
    if args.is_empty() {
        return Ok(CliCommand::Help);
    }

    let mut user = None;
    let mut file = None;
    let mut token = None;
    let mut size = 0u64;
    let mut timeout = None;
    let mut api = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => {
                (flag.to_string(), Some(value.to_string()))
            }
            _ => (arg, None),
        };

        let target = match flag.as_str() {
            "--user" | "--file" | "--token" | "--size" | "--timeout" | "--api" => flag.clone(),
            _ => return Err(ArgsError::UnknownArgument(flag)),
        };
        let value = match inline.or_else(|| iter.next()) {
            Some(value) => value,
            None => return Err(ArgsError::MissingValue(target)),
        };

        match target.as_str() {
            "--user" => user = Some(value),
            "--file" => file = Some(value),
            "--token" => token = Some(value),
            "--api" => api = Some(value),
            "--size" => {
                size = value.parse().map_err(|_| ArgsError::InvalidValue {
                    flag: target.clone(),
                    value: value.clone(),
                })?;
            }
            "--timeout" => {
                let invalid = || ArgsError::InvalidValue {
                    flag: target.clone(),
                    value: value.clone(),
                };
                let secs: f64 = value.parse().map_err(|_| invalid())?;
                // try_from rejects NaN, infinities, negatives and overflow.
                let limit = Duration::try_from_secs_f64(secs).map_err(|_| invalid())?;
                if limit.is_zero() {
                    return Err(invalid());
                }
                timeout = Some(limit);
            }
            _ => unreachable!("flag list checked above"),
        }
    }

    Ok(CliCommand::Download(DownloadArgs {
        user: user.ok_or(ArgsError::MissingFlag("--user"))?,
        file: file.ok_or(ArgsError::MissingFlag("--file"))?,
        token: token.ok_or(ArgsError::MissingFlag("--token"))?,
        size,
        timeout,
        api,
    }))
}
