use std::path::{Path, PathBuf};

pub fn base_dir() -> anyhow::Result<PathBuf> {
  if let Ok(program_data) = std::env::var("ProgramData") {
    return Ok(PathBuf::from(program_data).join("Drive-by Guard"));
  }
  let home = std::env::var("HOME")
    .map_err(|_| anyhow::anyhow!("neither ProgramData nor HOME is set"))?;
  Ok(PathBuf::from(home).join(".local").join("share").join("driveby-guard"))
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("config.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}
