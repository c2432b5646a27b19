use crate::classifier::Classifier;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::heuristics::HeuristicEngine;
use crate::host::ScriptedHost;
use crate::response_engine::Responder;
use crate::types::{
  max_severity, now_unix_ms, Alert, BrowserEvent, DownloadItem, Tab, TabChangeInfo,
};
use anyhow::Context;
use serde::Deserialize;
use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// A recorded session: what the host answers to queries, and the events to
/// feed through the dispatcher in order.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayTrace {
  /// Clock value before the first timed event. Defaults to the first
  /// `at_unix_ms` in the trace, then to the wall clock.
  #[serde(default)]
  pub start_unix_ms: Option<u64>,
  #[serde(default)]
  pub active_tabs: Vec<Tab>,
  #[serde(default)]
  pub downloads: Vec<DownloadItem>,
  pub events: Vec<TraceEvent>,
}

/// An event and, optionally, when it happened. Untimed events reuse the
/// previous event's time.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceEvent {
  #[serde(default)]
  pub at_unix_ms: Option<u64>,
  #[serde(flatten)]
  pub event: BrowserEvent,
}

impl ReplayTrace {
  fn start_time(&self) -> u64 {
    self
      .start_unix_ms
      .or_else(|| self.events.iter().find_map(|e| e.at_unix_ms))
      .unwrap_or_else(now_unix_ms)
  }
}

#[derive(Debug, Clone, Copy)]
pub struct ConsoleOptions {
  pub dry_run: bool,
  pub json: bool,
}

impl ConsoleOptions {
  pub fn from_args(args: &[String]) -> Self {
    Self {
      dry_run: args.iter().any(|a| a == "--dry-run"),
      json: args.iter().any(|a| a == "--json"),
    }
  }
}

pub async fn run_console_command(cfg: &Config, args: &[String]) -> anyhow::Result<()> {
  let opts = ConsoleOptions::from_args(args);
  let args = strip_global_flags(args);

  if let Some(i) = args.iter().position(|a| a == "--simulate") {
    return run_simulate(cfg, opts, &args[i + 1..]).await;
  }

  if let Some(i) = args.iter().position(|a| a == "--replay") {
    let path = args
      .get(i + 1)
      .ok_or_else(|| anyhow::anyhow!("expected: --replay <path-to-trace.json>"))?;
    return run_replay(cfg, opts, Path::new(path)).await;
  }

  print_help();
  Ok(())
}

async fn run_simulate(cfg: &Config, opts: ConsoleOptions, tail: &[String]) -> anyhow::Result<()> {
  let sub = tail.first().map(|s| s.as_str()).unwrap_or("");
  let now = now_unix_ms();

  let (host, events, seeded_tab): (ScriptedHost, Vec<BrowserEvent>, Option<(i64, u64)>) =
    match sub {
      "malicious-nav" => (
        ScriptedHost::new(),
        vec![navigate(1, "https://www.eicar.org/")],
        None,
      ),
      "malicious-download" => (
        ScriptedHost::new().with_active_tab(7, "https://badssl.com/"),
        vec![BrowserEvent::DownloadCreated {
          item: DownloadItem {
            id: 42,
            url: "https://badssl.com/malware.exe".to_string(),
            final_url: "https://badssl.com/malware.exe".to_string(),
            filename: "malware.exe".to_string(),
            start_time_unix_ms: now,
            ..DownloadItem::default()
          },
        }],
        None,
      ),
      "tab-close-fast" => (ScriptedHost::new(), vec![close(3)], Some((3, 10_000))),
      "tab-close-slow" => (ScriptedHost::new(), vec![close(3)], Some((3, 60_000))),
      "suspicious-mime" => (
        ScriptedHost::new().with_download(DownloadItem {
          id: 5,
          url: "https://files.example/setup".to_string(),
          mime: Some("application/x-msdownload".to_string()),
          filename: "setup.exe".to_string(),
          start_time_unix_ms: now.saturating_sub(60_000),
          ..DownloadItem::default()
        }),
        vec![BrowserEvent::ScanRecentDownloads {
          tab_id: 1,
          tab_url: "https://example.com/".to_string(),
        }],
        None,
      ),
      "test-page" => (
        ScriptedHost::new().with_active_tab(2, "https://secure.eicar.org/"),
        vec![BrowserEvent::DownloadCreated {
          item: DownloadItem {
            id: 9,
            url: "https://secure.eicar.org/eicar.com".to_string(),
            filename: "eicar.com".to_string(),
            start_time_unix_ms: now,
            ..DownloadItem::default()
          },
        }],
        None,
      ),
      "drive-by" => (
        ScriptedHost::new().with_download(DownloadItem {
          id: 8,
          url: "https://cdn.example.net/payload.bin".to_string(),
          referrer: Some("https://landing.example.net/".to_string()),
          filename: "payload.bin".to_string(),
          start_time_unix_ms: now.saturating_sub(1_000),
          ..DownloadItem::default()
        }),
        vec![navigate(2, "https://landing.example.net/")],
        None,
      ),
      _ => {
        eprintln!(
          "Unknown `--simulate` scenario. Expected: malicious-nav|malicious-download|tab-close-fast|tab-close-slow|suspicious-mime|test-page|drive-by"
        );
        print_help();
        return Ok(());
      }
    };

  let mut dispatcher = build_dispatcher(cfg, opts, host);
  if let Some((tab_id, age_ms)) = seeded_tab {
    dispatcher
      .ledger_mut()
      .record_download_at(tab_id, None, now.saturating_sub(age_ms));
  }

  let alerts = run_events(&mut dispatcher, events).await;
  print_alerts(opts, &alerts)?;
  print_calls(&dispatcher);
  Ok(())
}

async fn run_replay(cfg: &Config, opts: ConsoleOptions, path: &Path) -> anyhow::Result<()> {
  let trace = load_trace(path)?;
  tracing::info!(
    trace = %path.display(),
    events = trace.events.len(),
    "replaying recorded browser events"
  );

  let (dispatcher, alerts) = replay(cfg, opts, trace).await;
  print_alerts(opts, &alerts)?;
  print_calls(&dispatcher);
  Ok(())
}

/// Feeds the trace through a dispatcher whose clock follows the trace's
/// timestamps instead of the wall clock.
async fn replay(
  cfg: &Config,
  opts: ConsoleOptions,
  trace: ReplayTrace,
) -> (Dispatcher<ScriptedHost>, Vec<Alert>) {
  let clock = Rc::new(Cell::new(trace.start_time()));
  let host = ScriptedHost::new()
    .with_active_tabs(trace.active_tabs)
    .with_downloads(trace.downloads);
  let mut dispatcher = build_dispatcher(cfg, opts, host).with_clock({
    let clock = Rc::clone(&clock);
    move || clock.get()
  });

  let mut alerts = Vec::new();
  for ev in trace.events {
    if let Some(at) = ev.at_unix_ms {
      if at < clock.get() {
        tracing::warn!(
          at_unix_ms = at,
          clock_unix_ms = clock.get(),
          "trace event is earlier than the previous one; clock not moved back"
        );
      } else {
        clock.set(at);
      }
    }
    alerts.extend(dispatcher.dispatch(ev.event).await);
  }
  (dispatcher, alerts)
}

pub fn load_trace(path: &Path) -> anyhow::Result<ReplayTrace> {
  let raw = fs::read_to_string(path).with_context(|| format!("read trace {}", path.display()))?;
  serde_json::from_str(&raw).with_context(|| format!("parse trace {}", path.display()))
}

fn build_dispatcher(cfg: &Config, opts: ConsoleOptions, host: ScriptedHost) -> Dispatcher<ScriptedHost> {
  let engine = HeuristicEngine::new(Classifier::new(cfg.classifier.host_match));
  Dispatcher::new(host, engine, Responder::new(opts.dry_run))
}

async fn run_events(
  dispatcher: &mut Dispatcher<ScriptedHost>,
  events: Vec<BrowserEvent>,
) -> Vec<Alert> {
  let mut alerts = Vec::new();
  for ev in events {
    alerts.extend(dispatcher.dispatch(ev).await);
  }
  alerts
}

fn print_alerts(opts: ConsoleOptions, alerts: &[Alert]) -> anyhow::Result<()> {
  if opts.json {
    for a in alerts {
      println!("{}", serde_json::to_string(a)?);
    }
    return Ok(());
  }

  if alerts.is_empty() {
    println!("No alerts.");
    return Ok(());
  }

  println!(
    "{} alert(s), highest severity {:?}:",
    alerts.len(),
    max_severity(alerts)
  );
  for a in alerts {
    let actions = if a.actions_taken.is_empty() {
      "none".to_string()
    } else {
      a.actions_taken.join(",")
    };
    println!(
      "- {} {} severity={:?} actions={} {}",
      a.alert_id, a.rule_id, a.severity, actions, a.description
    );
  }
  Ok(())
}

fn print_calls(dispatcher: &Dispatcher<ScriptedHost>) {
  let calls = dispatcher.host().calls();
  if calls.is_empty() {
    return;
  }
  println!("Host control calls:");
  for c in calls {
    println!("- {c:?}");
  }
}

fn navigate(tab_id: i64, url: &str) -> BrowserEvent {
  BrowserEvent::TabUpdated {
    tab_id,
    change_info: TabChangeInfo {
      url: Some(url.to_string()),
      status: None,
    },
    tab: Tab {
      id: Some(tab_id),
      url: Some(url.to_string()),
      active: true,
      window_id: Some(1),
    },
  }
}

fn close(tab_id: i64) -> BrowserEvent {
  BrowserEvent::TabRemoved {
    tab_id,
    remove_info: Default::default(),
  }
}

fn strip_global_flags(args: &[String]) -> Vec<String> {
  args
    .iter()
    .filter(|a| a.as_str() != "--dry-run" && a.as_str() != "--json")
    .cloned()
    .collect()
}

fn print_help() {
  println!("Drive-by Guard v{}", env!("CARGO_PKG_VERSION"));
  println!("Commands:");
  println!("  --dry-run (global; logs corrective actions without sending them)");
  println!("  --json (global; print alerts as JSON lines)");
  println!("  --simulate malicious-nav");
  println!("  --simulate malicious-download");
  println!("  --simulate tab-close-fast");
  println!("  --simulate tab-close-slow");
  println!("  --simulate suspicious-mime");
  println!("  --simulate test-page");
  println!("  --simulate drive-by");
  println!("  --replay <path-to-trace.json>");
}
