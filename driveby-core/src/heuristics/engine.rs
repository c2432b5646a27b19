use super::rules::{self, RuleMeta, DRIVE_BY_WINDOW_MS};
use crate::classifier::{self, Classifier};
use crate::error::GuardError;
use crate::ledger::{TabActivity, TabDownloadLedger, TabRecord};
use crate::types::{redact_filename_for_log, Alert, DownloadId, DownloadItem, Evidence, TabId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrectiveAction {
  Cancel(DownloadId),
  Pause(DownloadId),
  RemoveFile(DownloadId),
}

impl CorrectiveAction {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Cancel(_) => "cancel_download",
      Self::Pause(_) => "pause_download",
      Self::RemoveFile(_) => "remove_file",
    }
  }

  pub fn download_id(&self) -> DownloadId {
    match self {
      Self::Cancel(id) | Self::Pause(id) | Self::RemoveFile(id) => *id,
    }
  }
}

/// An alert plus the single corrective action it asks for, if any.
#[derive(Debug, Clone)]
pub struct Detection {
  pub alert: Alert,
  pub action: Option<CorrectiveAction>,
}

impl Detection {
  fn new(meta: RuleMeta, description: String, evidence: Vec<Evidence>) -> Self {
    Self {
      alert: Alert::new(meta.id, meta.severity, description, evidence),
      action: None,
    }
  }
}

/// Decides what a URL, a closed tab, or a recent download means. Never
/// touches the host or mutates the ledger; callers apply the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEngine {
  classifier: Classifier,
}

impl HeuristicEngine {
  pub fn new(classifier: Classifier) -> Self {
    Self { classifier }
  }

  /// `download_id` is `None` when the URL came from a navigation rather
  /// than a download. In that case any action targets the download last
  /// recorded for `tab_id`, if it is still inside the drive-by window.
  pub fn evaluate(
    &self,
    ledger: &TabDownloadLedger,
    now_unix_ms: u64,
    final_url: &str,
    download_id: Option<DownloadId>,
    tab_id: TabId,
  ) -> Result<Vec<Detection>, GuardError> {
    let malicious = self.classifier.is_known_malicious(final_url)?;
    let test_page = classifier::is_test_page(final_url);

    if !malicious && !test_page {
      tracing::debug!(tab_id, url = %final_url, "url is not on any threat list");
      return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let mut action_requested = false;

    if malicious {
      let mut d = Detection::new(
        rules::D001,
        format!("The site {final_url} is known for hosting malicious content"),
        url_evidence(final_url, download_id, tab_id),
      );
      d.action = match download_id {
        Some(id) => Some(CorrectiveAction::Cancel(id)),
        None => tab_level_action(ledger, now_unix_ms, tab_id, CorrectiveAction::Cancel),
      };
      action_requested = d.action.is_some();
      out.push(d);
    }

    if test_page {
      let mut d = Detection::new(
        rules::D002,
        format!("{final_url} is a known security test page"),
        url_evidence(final_url, download_id, tab_id),
      );
      if action_requested {
        d.alert.evidence.push(Evidence::Note {
          message: "corrective action already requested for this url".to_string(),
        });
      } else {
        d.action = match download_id {
          Some(id) => Some(CorrectiveAction::Cancel(id)),
          None => tab_level_action(ledger, now_unix_ms, tab_id, CorrectiveAction::Pause),
        };
      }
      out.push(d);
    }

    Ok(out)
  }

  /// `record` is the ledger entry the tab had when it closed.
  pub fn on_tab_closed(
    &self,
    record: Option<TabRecord>,
    tab_id: TabId,
    now_unix_ms: u64,
  ) -> Option<Detection> {
    let record = record.filter(|r| r.download_initiated)?;
    let elapsed_ms = now_unix_ms.saturating_sub(record.download_time_unix_ms);
    if elapsed_ms >= DRIVE_BY_WINDOW_MS {
      tracing::debug!(tab_id, elapsed_ms, "tab closed long after its last download");
      return None;
    }

    Some(Detection::new(
      rules::D003,
      format!(
        "Tab {tab_id} closed {elapsed_ms} ms after a download. This may be a drive-by download attempt"
      ),
      vec![Evidence::TabClosed {
        tab_id,
        download_id: record.download_id,
        elapsed_ms,
        window_ms: DRIVE_BY_WINDOW_MS,
      }],
    ))
  }

  /// Checks one download from the recent-downloads scan against the URL of
  /// the tab being examined.
  pub fn inspect_recent_download(&self, item: &DownloadItem, tab_url: &str) -> Vec<Detection> {
    let mut out = Vec::new();
    let filename = redact_filename_for_log(&item.filename);

    if item
      .mime
      .as_deref()
      .map(classifier::is_suspicious_mime_type)
      .unwrap_or(false)
    {
      out.push(Detection::new(
        rules::D004,
        format!("Suspicious MIME type detected for download {filename}"),
        vec![download_evidence(item)],
      ));
    }

    let referred_by_tab = item.referrer.as_deref() == Some(tab_url);
    if referred_by_tab && item.by_extension_id.is_none() {
      let mut d = Detection::new(
        rules::D005,
        format!("Potential drive-by download detected: {filename}"),
        vec![download_evidence(item)],
      );
      d.action = Some(CorrectiveAction::RemoveFile(item.id));
      out.push(d);
    } else {
      tracing::debug!(
        download_id = item.id,
        filename = %filename,
        "download does not appear to be a drive-by download"
      );
    }

    out
  }
}

fn tab_level_action(
  ledger: &TabDownloadLedger,
  now_unix_ms: u64,
  tab_id: TabId,
  action: fn(DownloadId) -> CorrectiveAction,
) -> Option<CorrectiveAction> {
  match ledger.activity(tab_id) {
    TabActivity::DownloadRecorded {
      download_time_unix_ms,
      download_id: Some(id),
    } if now_unix_ms.saturating_sub(download_time_unix_ms) < DRIVE_BY_WINDOW_MS => {
      Some(action(id))
    }
    _ => None,
  }
}

fn url_evidence(url: &str, download_id: Option<DownloadId>, tab_id: TabId) -> Vec<Evidence> {
  let mut evidence = vec![Evidence::Navigation {
    tab_id,
    url: url.to_string(),
  }];
  if let Some(id) = download_id {
    evidence.push(Evidence::Note {
      message: format!("download #{id} resolved to this url"),
    });
  }
  evidence
}

fn download_evidence(item: &DownloadItem) -> Evidence {
  Evidence::Download {
    download_id: item.id,
    url: item.effective_url().to_string(),
    filename: redact_filename_for_log(&item.filename),
    mime: item.mime.clone(),
    referrer: item.referrer.clone(),
  }
}
