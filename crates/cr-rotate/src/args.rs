use std::path::PathBuf;

use color_eyre::eyre::{bail, Result};

use cr_core::services::config_loader::CONFIG_PATH_ENV;

pub const USAGE: &str = "\
Usage: cr-rotate [OPTIONS]

Keeps the cache refresh server address in the directory pointed at a live
oxTrust pod.

Options:
  --config <path>     YAML config file (default: $GLUU_CR_ROTATE_CONFIG)
  --log-file <path>   Write logs to this file instead of stderr
  --debug             Default log level debug instead of info
  --once              Run a single cycle, print the report as JSON, exit
  -h, --help          Show this help
";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub debug: bool,
    pub once: bool,
    pub help: bool,
}

impl Args {
    pub fn parse<I: IntoIterator<Item = String>>(raw: I) -> Result<Self> {
        let mut args = Args::default();
        let mut iter = raw.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => args.config = Some(value_for(&arg, iter.next())?),
                "--log-file" => args.log_file = Some(value_for(&arg, iter.next())?),
                "--debug" => args.debug = true,
                "--once" => args.once = true,
                "-h" | "--help" => args.help = true,
                other => bail!("unknown argument '{other}'\n\n{USAGE}"),
            }
        }
        Ok(args)
    }

    /// Explicit `--config` wins over the environment variable.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
        })
    }
}

fn value_for(flag: &str, value: Option<String>) -> Result<PathBuf> {
    match value {
        Some(v) if !v.starts_with("--") => Ok(PathBuf::from(v)),
        _ => bail!("{flag} requires a value"),
    }
}
