//! Routes host browser events to the ledger and the heuristic engine.
//!
//! Handlers run one at a time on a single-threaded executor. The ledger is
//! only touched between awaits, so it needs no locking.

use crate::error::GuardError;
use crate::heuristics::rules::RECENT_DOWNLOADS_WINDOW_MS;
use crate::heuristics::{CorrectiveAction, Detection, HeuristicEngine};
use crate::host::{BrowserHost, DownloadQuery};
use crate::ledger::TabDownloadLedger;
use crate::response_engine::{self, Responder};
use crate::types::{
  now_unix_ms, redact_filename_for_log, Alert, BrowserEvent, DownloadItem, TabChangeInfo, TabId,
};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

pub const HOST_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Dispatcher<H: BrowserHost> {
  host: H,
  ledger: TabDownloadLedger,
  engine: HeuristicEngine,
  responder: Responder,
  /// Corrective actions already sent. The recent-download scan runs on every
  /// navigation and would otherwise ask for the same removal again.
  requested: HashSet<CorrectiveAction>,
  clock: Box<dyn Fn() -> u64>,
}

impl<H: BrowserHost> Dispatcher<H> {
  pub fn new(host: H, engine: HeuristicEngine, responder: Responder) -> Self {
    Self {
      host,
      ledger: TabDownloadLedger::new(),
      engine,
      responder,
      requested: HashSet::new(),
      clock: Box::new(now_unix_ms),
    }
  }

  pub fn with_clock(mut self, clock: impl Fn() -> u64 + 'static) -> Self {
    self.clock = Box::new(clock);
    self
  }

  pub fn host(&self) -> &H {
    &self.host
  }

  pub fn ledger(&self) -> &TabDownloadLedger {
    &self.ledger
  }

  pub fn ledger_mut(&mut self) -> &mut TabDownloadLedger {
    &mut self.ledger
  }

  /// Handles one event. Errors abort only this event's remaining work.
  pub async fn dispatch(&mut self, event: BrowserEvent) -> Vec<Alert> {
    let result = match &event {
      BrowserEvent::TabUpdated {
        tab_id,
        change_info,
        ..
      } => self.on_tab_updated(*tab_id, change_info).await,
      BrowserEvent::TabRemoved { tab_id, .. } => Ok(self.on_tab_removed(*tab_id)),
      BrowserEvent::DownloadCreated { item } => self.on_download_created(item).await,
      BrowserEvent::ScanRecentDownloads { tab_id, tab_url } => {
        self.scan_recent_downloads(*tab_id, tab_url).await
      }
    };

    match result {
      Ok(alerts) => alerts,
      Err(e) => {
        tracing::warn!(error = %e, event = ?event, "event handler aborted");
        Vec::new()
      }
    }
  }

  pub async fn on_tab_updated(
    &mut self,
    tab_id: TabId,
    change_info: &TabChangeInfo,
  ) -> Result<Vec<Alert>, GuardError> {
    let Some(url) = change_info.url.as_deref() else {
      return Ok(Vec::new());
    };
    tracing::info!(tab_id, url = %url, "tab updated");

    let now = self.now();
    let detections = self.engine.evaluate(&self.ledger, now, url, None, tab_id)?;
    let mut alerts = self.respond(detections).await;

    match self.scan_recent_downloads(tab_id, url).await {
      Ok(more) => alerts.extend(more),
      Err(e) => tracing::warn!(tab_id, error = %e, "recent download scan skipped"),
    }

    Ok(alerts)
  }

  /// Warns when the tab closes inside the drive-by window, then forgets it.
  pub fn on_tab_removed(&mut self, tab_id: TabId) -> Vec<Alert> {
    let now = self.now();
    let record = self.ledger.get_record(tab_id);
    let detection = self.engine.on_tab_closed(record, tab_id, now);
    self.ledger.remove(tab_id);

    detection
      .map(|d| {
        response_engine::report(&d.alert);
        vec![d.alert]
      })
      .unwrap_or_default()
  }

  pub async fn on_download_created(&mut self, item: &DownloadItem) -> Result<Vec<Alert>, GuardError> {
    let tab_id = match self.active_tab_id().await {
      Ok(id) => id,
      Err(GuardError::MissingActiveTab) => {
        tracing::debug!(download_id = item.id, "no active tab; download not attributed");
        return Ok(Vec::new());
      }
      Err(e) => {
        tracing::warn!(download_id = item.id, error = %e, "download not attributed");
        return Ok(Vec::new());
      }
    };

    let now = self.now();
    self.ledger.record_download_at(tab_id, Some(item.id), now);
    tracing::info!(
      tab_id,
      download_id = item.id,
      filename = %redact_filename_for_log(&item.filename),
      "download recorded for active tab"
    );

    let detections =
      self
        .engine
        .evaluate(&self.ledger, now, item.effective_url(), Some(item.id), tab_id)?;
    Ok(self.respond(detections).await)
  }

  /// Inspects downloads started in the last five minutes against `tab_url`.
  pub async fn scan_recent_downloads(
    &mut self,
    tab_id: TabId,
    tab_url: &str,
  ) -> Result<Vec<Alert>, GuardError> {
    tracing::debug!(tab_id, "checking recent downloads for tab");
    let query = DownloadQuery {
      started_after_unix_ms: self.now().saturating_sub(RECENT_DOWNLOADS_WINDOW_MS),
    };
    let downloads = bounded("downloads.search", self.host.search_downloads(query)).await?;
    if downloads.is_empty() {
      tracing::debug!(tab_id, "no recent downloads to check");
      return Ok(Vec::new());
    }

    tracing::info!(tab_id, count = downloads.len(), "inspecting recent downloads");
    let mut detections = Vec::new();
    for item in &downloads {
      tracing::debug!(
        download_id = item.id,
        url = %item.url,
        mime = ?item.mime,
        filename = %redact_filename_for_log(&item.filename),
        "inspecting download"
      );
      detections.extend(self.engine.inspect_recent_download(item, tab_url));
    }

    Ok(self.respond(detections).await)
  }

  async fn active_tab_id(&self) -> Result<TabId, GuardError> {
    let tabs = bounded("tabs.query", self.host.query_active_tabs()).await?;
    tabs
      .into_iter()
      .find_map(|t| t.id)
      .ok_or(GuardError::MissingActiveTab)
  }

  async fn respond(&mut self, detections: Vec<Detection>) -> Vec<Alert> {
    let mut alerts = Vec::with_capacity(detections.len());
    for mut d in detections {
      if let Some(action) = d.action {
        if !self.requested.insert(action) {
          tracing::debug!(
            rule_id = %d.alert.rule_id,
            download_id = action.download_id(),
            "{} already requested; not repeating",
            action.name()
          );
          d.action = None;
        }
      }
      alerts.push(self.responder.handle_detection(&self.host, d).await);
    }
    alerts
  }

  fn now(&self) -> u64 {
    (self.clock)()
  }
}

async fn bounded<T>(
  op: &'static str,
  fut: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, GuardError> {
  match tokio::time::timeout(HOST_QUERY_TIMEOUT, fut).await {
    Ok(Ok(v)) => Ok(v),
    Ok(Err(e)) => Err(GuardError::HostQuery {
      op,
      message: format!("{e:#}"),
    }),
    Err(_) => Err(GuardError::HostQuery {
      op,
      message: format!("timed out after {}s", HOST_QUERY_TIMEOUT.as_secs()),
    }),
  }
}
