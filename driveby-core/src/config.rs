use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub classifier: ClassifierConfig,
  pub logging: LoggingConfig,
}

/// How a navigated hostname is compared with the malicious host list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMatch {
  /// Hostname equals a list entry.
  Exact,
  /// Hostname equals a list entry or is a subdomain of it.
  #[default]
  Suffix,
  /// Hostname contains a list entry anywhere. Over-matches.
  Substring,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
  #[serde(default)]
  pub host_match: HostMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,

  #[serde(default = "default_true")]
  pub stderr: bool,
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_retention_days() -> u64 {
  14
}

fn default_true() -> bool {
  true
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_retention_days(),
      stderr: true,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
  #[serde(default)]
  pub classifier: Option<ClassifierConfig>,

  #[serde(default)]
  pub logging: Option<LoggingConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(c) = self.classifier {
      cfg.classifier = c;
    }
    if let Some(l) = self.logging {
      cfg.logging = l;
    }

    if tracing_subscriber::EnvFilter::try_new(&cfg.logging.level).is_err() {
      eprintln!(
        "Drive-by Guard: invalid logging.level `{}`; falling back to `info`.",
        cfg.logging.level
      );
      cfg.logging.level = default_log_level();
    }

    cfg
  }

  fn needs_upgrade(&self) -> bool {
    self.classifier.is_none() || self.logging.is_none()
  }
}

pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, true)
}

pub fn load_or_default_readonly(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, false)
}

fn load_impl(path: &Path, allow_writes: bool) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
  if allow_writes {
    fs::create_dir_all(parent)?;
  }

  if !path.exists() {
    let cfg = Config::default();
    if allow_writes {
      write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
    } else {
      eprintln!(
        "Drive-by Guard: config missing at {}; using defaults in read-only mode (--dry-run).",
        path.display()
      );
    }
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path)?;
  match parse(&raw) {
    Ok(file) => {
      let cfg = file.clone().normalize();
      if allow_writes && file.needs_upgrade() {
        match write_upgrade(path, parent, &cfg) {
          Ok(backup) => eprintln!(
            "Drive-by Guard: upgraded config defaults written to {} (backup: {})",
            path.display(),
            backup.display()
          ),
          Err(e) => eprintln!(
            "Drive-by Guard: could not upgrade config at {}; continuing with in-memory defaults: {e:#}",
            path.display()
          ),
        }
      } else if !allow_writes && file.needs_upgrade() {
        eprintln!(
          "Drive-by Guard: config at {} needs upgrade; proceeding without writing in --dry-run mode.",
          path.display()
        );
      }
      Ok(cfg)
    }
    Err(e) => {
      let cfg = Config::default();
      if allow_writes {
        let backup = parent.join(format!("config.toml.bad-{}", unix_seconds()));
        let _ = fs::rename(path, &backup);
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!(
          "Drive-by Guard: invalid config at {} (backed up to {}): {e}",
          path.display(),
          backup.display()
        );
      } else {
        eprintln!(
          "Drive-by Guard: invalid config at {}; using defaults in read-only mode (--dry-run): {e}",
          path.display()
        );
      }
      Ok(cfg)
    }
  }
}

/// Backs up the current file, then rewrites it with every section present.
/// Returns the backup path.
fn write_upgrade(path: &Path, parent: &Path, cfg: &Config) -> anyhow::Result<PathBuf> {
  let backup = parent.join(format!("config.toml.bak-{}", unix_seconds()));
  fs::copy(path, &backup)
    .with_context(|| format!("back up config to {}", backup.display()))?;
  write_atomic(path, &toml::to_string_pretty(&to_config_file(cfg))?)
    .with_context(|| format!("write upgraded config to {}", path.display()))?;
  Ok(backup)
}

fn parse(raw: &str) -> Result<ConfigFile, toml::de::Error> {
  toml::from_str::<ConfigFile>(raw)
}

fn to_config_file(cfg: &Config) -> ConfigFile {
  ConfigFile {
    classifier: Some(cfg.classifier.clone()),
    logging: Some(cfg.logging.clone()),
  }
}

fn unix_seconds() -> u64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));

  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!(
      "driveby-config-{name}-{}",
      uuid::Uuid::new_v4()
    ));
    fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn defaults_use_suffix_matching() {
    let cfg = Config::default();
    assert_eq!(cfg.classifier.host_match, HostMatch::Suffix);
    assert_eq!(cfg.logging.level, "info");
    assert_eq!(cfg.logging.retention_days, 14);
  }

  #[test]
  fn parses_host_match_modes() {
    let file = parse("[classifier]\nhost_match = \"substring\"\n").unwrap();
    assert_eq!(file.normalize().classifier.host_match, HostMatch::Substring);

    let file = parse("[classifier]\nhost_match = \"exact\"\n").unwrap();
    assert_eq!(file.normalize().classifier.host_match, HostMatch::Exact);
  }

  #[test]
  fn partial_file_needs_upgrade_and_keeps_defaults() {
    let file = parse("[logging]\nlevel = \"debug\"\n").unwrap();
    assert!(file.needs_upgrade());
    let cfg = file.normalize();
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.logging.retention_days, 14);
    assert_eq!(cfg.classifier.host_match, HostMatch::Suffix);
  }

  #[test]
  fn invalid_log_level_falls_back_to_info() {
    let file = parse("[logging]\nlevel = \"driveby=verbose\"\n").unwrap();
    assert_eq!(file.normalize().logging.level, "info");
  }

  #[test]
  fn missing_file_is_created_with_defaults() {
    let dir = temp_dir("missing");
    let path = dir.join("config.toml");

    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.classifier.host_match, HostMatch::Suffix);
    assert!(path.exists());

    let reloaded = parse(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(!reloaded.needs_upgrade());
    let _ = fs::remove_dir_all(dir);
  }

  #[test]
  fn invalid_file_is_backed_up_and_replaced() {
    let dir = temp_dir("invalid");
    let path = dir.join("config.toml");
    fs::write(&path, "classifier = [[[").unwrap();

    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.classifier.host_match, HostMatch::Suffix);

    let backups: Vec<_> = fs::read_dir(&dir)
      .unwrap()
      .flatten()
      .filter(|e| e.file_name().to_string_lossy().starts_with("config.toml.bad-"))
      .collect();
    assert_eq!(backups.len(), 1);
    let _ = fs::remove_dir_all(dir);
  }

  #[test]
  fn partial_file_is_upgraded_with_backup() {
    let dir = temp_dir("upgrade");
    let path = dir.join("config.toml");
    fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.logging.level, "debug");

    let rewritten = parse(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(!rewritten.needs_upgrade());
    let backups = fs::read_dir(&dir)
      .unwrap()
      .flatten()
      .filter(|e| e.file_name().to_string_lossy().starts_with("config.toml.bak-"))
      .count();
    assert_eq!(backups, 1);
    let _ = fs::remove_dir_all(dir);
  }

  #[test]
  fn failed_upgrade_is_reported_and_leaves_file_alone() {
    let dir = temp_dir("upgrade-fails");
    let path = dir.join("config.toml");
    let original = "[logging]\nlevel = \"debug\"\n";
    fs::write(&path, original).unwrap();
    // A directory where the temp file should go makes the atomic write fail.
    fs::create_dir_all(dir.join(".config.toml.tmp")).unwrap();

    let cfg = parse(original).unwrap().normalize();
    assert!(write_upgrade(&path, &dir, &cfg).is_err());

    let loaded = load_or_create_default(&path).unwrap();
    assert_eq!(loaded.logging.level, "debug");
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
    let _ = fs::remove_dir_all(dir);
  }

  #[test]
  fn readonly_load_does_not_write() {
    let dir = temp_dir("readonly");
    let path = dir.join("config.toml");

    let _ = load_or_default_readonly(&path).unwrap();
    assert!(!path.exists());
    let _ = fs::remove_dir_all(dir);
  }
}
