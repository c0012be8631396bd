use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "jobdesk",
    version,
    about = "Jobdesk: operational job tracking dashboard",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "jobdeskrc")]
    pub jobdeskrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Acting user recorded as `createdBy` and in the activity log.
    #[arg(long = "user")]
    pub user: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

/// Log level from `-v`/`-q` unless `RUST_LOG` is set. Logs go to stderr so
/// command output stays clean.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let level = match (quiet, verbose) {
        (q, _) if q >= 2 => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        _ => "trace",
    };

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| anyhow!("invalid log filter: {e}"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .or_else(|err| {
            debug!(error = %err, "tracing already initialised");
            Ok::<(), anyhow::Error>(())
        })
}

/// Pulls `rc.KEY=VALUE` / `rc.KEY:VALUE` words out of argv before clap sees
/// them. The program name is kept in place.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let (program, args) = match raw.split_first() {
        Some((program, args)) => (Some(program.clone()), args),
        None => (None, raw),
    };

    let mut pre = PreprocessedArgs {
        cleaned_args: program.into_iter().collect(),
        rc_overrides: Vec::new(),
    };

    for arg in args {
        match positional_override(&arg.to_string_lossy()) {
            Some((key, value)) => {
                debug!(%key, %value, "positional rc override");
                pre.rc_overrides.push((key, value));
            }
            None => pre.cleaned_args.push(arg.clone()),
        }
    }

    Ok(pre)
}

fn positional_override(arg: &str) -> Option<(String, String)> {
    let body = arg.strip_prefix("rc.")?;
    let split_at = body.find(['=', ':'])?;
    let (key, value) = (&body[..split_at], &body[split_at + 1..]);
    if key.is_empty() {
        return None;
    }
    Some((format!("rc.{key}"), value.to_string()))
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let Some((first, args)) = tokens.split_first() else {
            let cmd = cfg
                .get("default.command")
                .unwrap_or_else(|| "summary".to_string());
            debug!(command = %cmd, "no explicit command, using default");
            return Ok(Self {
                command: cmd,
                command_args: vec![],
            });
        };

        let known = crate::commands::known_command_names();
        let Some(command) = crate::commands::expand_command_abbrev(first, &known) else {
            warn!(token = %first, "unrecognized command token");
            return Err(anyhow!(
                "unknown or ambiguous command: {first} (try `jobdesk help`)"
            ));
        };

        debug!(token = %first, expanded = %command, "resolved command token");
        Ok(Self {
            command: command.to_string(),
            command_args: args.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&os(&[
            "jobdesk",
            "rc.color:off",
            "summary",
            "rc.user.email=a@b.c",
        ]))
        .expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["jobdesk", "summary"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.user.email".to_string(), "a@b.c".to_string()),
            ]
        );
    }

    #[test]
    fn command_abbreviations_and_default() {
        let cfg = Config::with_defaults();

        let inv = Invocation::parse(&cfg, os(&["imp", "file.csv"])).expect("parse");
        assert_eq!(inv.command, "import");
        assert_eq!(inv.command_args, vec!["file.csv".to_string()]);

        let inv = Invocation::parse(&cfg, vec![]).expect("parse");
        assert_eq!(inv.command, "summary");

        assert!(Invocation::parse(&cfg, os(&["frobnicate"])).is_err());
        assert!(Invocation::parse(&cfg, os(&["de"])).is_err());
    }

    #[test]
    fn key_val_requires_equals() {
        assert!("color".parse::<KeyVal>().is_err());
        let kv: KeyVal = " color = off ".parse().expect("kv");
        assert_eq!((kv.key.as_str(), kv.value.as_str()), ("color", "off"));
    }
}
