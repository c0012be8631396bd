use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::job::User;

const RC_ENV_VAR: &str = "JOBDESKRC";
const RC_FILE_NAME: &str =
  ".jobdeskrc";
const DEFAULT_DATA_DIR: &str =
  ".jobdesk";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  /// A configuration with no keys at
  /// all, not even defaults.
  pub fn empty() -> Self {
    Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    }
  }

  pub fn with_defaults() -> Self {
    let mut cfg = Self::empty();
    cfg.map.insert(
      "data.location".to_string(),
      format!("~/{DEFAULT_DATA_DIR}")
    );
    cfg.map.insert(
      "default.command".to_string(),
      "summary".to_string()
    );
    cfg.map.insert(
      "color".to_string(),
      "on".to_string()
    );
    cfg.map.insert(
      "template.dir".to_string(),
      ".".to_string()
    );
    cfg
  }

  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::with_defaults();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading jobdeskrc");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no jobdeskrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  /// Identity attached to created and
  /// imported jobs. An explicit
  /// `--user` wins over `user.email`.
  pub fn acting_user(
    &self,
    email_override: Option<&str>
  ) -> User {
    let email = email_override
      .map(ToString::to_string)
      .or_else(|| {
        self.get("user.email")
      })
      .or_else(|| {
        std::env::var("USER").ok()
      })
      .filter(|s| !s.trim().is_empty())
      .unwrap_or_else(|| {
        "unknown".to_string()
      });
    let name = self
      .get("user.name")
      .unwrap_or_else(|| email.clone());
    User::new(email, name)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  /// Reads one rc file, following
  /// `include` lines relative to it.
  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path.clone());

    let base_dir = path
      .parent()
      .unwrap_or_else(|| Path::new("."))
      .to_path_buf();

    for (idx, raw_line) in
      text.lines().enumerate()
    {
      match RcLine::parse(raw_line) {
        | RcLine::Blank => {}
        | RcLine::Include(target) => {
          let target = expand_tilde(
            Path::new(target)
          );
          let target = base_dir.join(target);
          if target.exists() {
            self.load_file(&target)?;
          } else {
            warn!(
              include = %target.display(),
              "missing include skipped"
            );
          }
        }
        | RcLine::Pair(key, value) => {
          trace!(key, value, "rc key");
          self.map.insert(
            key.to_string(),
            value.to_string()
          );
        }
        | RcLine::Invalid => {
          return Err(anyhow!(
            "invalid config line {}:{}: \
             {raw_line}",
            path.display(),
            idx + 1
          ));
        }
      }
    }

    Ok(())
  }
}

enum RcLine<'a> {
  Blank,
  Include(&'a str),
  Pair(&'a str, &'a str),
  Invalid
}

impl<'a> RcLine<'a> {
  fn parse(raw: &'a str) -> Self {
    let line = raw
      .split_once('#')
      .map_or(raw, |(before, _)| before)
      .trim();
    if line.is_empty() {
      return RcLine::Blank;
    }

    if let Some(target) =
      line.strip_prefix("include ")
      && !target.trim().is_empty()
    {
      return RcLine::Include(
        target.trim()
      );
    }

    match line.split_once('=') {
      | Some((key, value))
        if !key.trim().is_empty() =>
      {
        RcLine::Pair(
          key.trim(),
          value.trim()
        )
      }
      | _ => RcLine::Invalid
    }
  }
}

/// `--data` wins over `data.location`;
/// the directory is created if needed.
#[tracing::instrument(skip(cfg))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match (
    override_dir,
    cfg.get("data.location")
  ) {
    | (Some(path), _) => {
      path.to_path_buf()
    }
    | (None, Some(configured)) => {
      expand_tilde(Path::new(&configured))
    }
    | (None, None) => {
      home_dir()?.join(DEFAULT_DATA_DIR)
    }
  };

  fs::create_dir_all(&dir).with_context(
    || {
      format!(
        "failed to create {}",
        dir.display()
      )
    }
  )?;
  debug!(dir = %dir.display(), "data directory");
  Ok(dir)
}

/// `--jobdeskrc`, then `$JOBDESKRC`
/// (`/dev/null` disables the rc file),
/// then `~/.jobdeskrc` if present.
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  match std::env::var(RC_ENV_VAR) {
    | Ok(raw) if raw == "/dev/null" => {
      Ok(None)
    }
    | Ok(raw) => {
      Ok(Some(PathBuf::from(raw)))
    }
    | Err(_) => {
      let candidate =
        home_dir()?.join(RC_FILE_NAME);
      Ok(candidate
        .exists()
        .then_some(candidate))
    }
  }
}

fn home_dir() -> anyhow::Result<PathBuf> {
  dirs::home_dir().ok_or_else(|| {
    anyhow!("cannot determine home directory")
  })
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  match (
    path.strip_prefix("~"),
    dirs::home_dir()
  ) {
    | (Ok(rest), Some(home)) => {
      home.join(rest)
    }
    | _ => path.to_path_buf()
  }
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
