pub mod classifier;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod heuristics;
pub mod host;
pub mod ledger;
pub mod logging;
pub mod paths;
pub mod response_engine;
pub mod threat_lists;
pub mod types;

pub fn run_console(args: &[String]) -> anyhow::Result<()> {
  let dry_run = args.iter().any(|a| a == "--dry-run");
  let base = paths::base_dir()?;
  let config_path = paths::config_path(&base);

  let cfg = if dry_run {
    let cfg = config::load_or_default_readonly(&config_path)?;
    logging::init_stderr_only(&cfg.logging.level)?;
    cfg
  } else {
    let cfg = config::load_or_create_default(&config_path)?;
    logging::init(&paths::logs_dir(&base), &cfg.logging)?;
    cfg
  };

  tracing::info!(
    host_match = ?cfg.classifier.host_match,
    dry_run,
    rules = heuristics::active_rule_ids().len(),
    "starting Drive-by Guard console"
  );

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()?;
  rt.block_on(console::run_console_command(&cfg, args))
}
