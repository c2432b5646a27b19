use serde::{Deserialize, Serialize};

pub type TabId = i64;
pub type DownloadId = i64;
pub type RuleId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Green,
  Yellow,
  Red,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
  #[serde(default)]
  pub id: Option<TabId>,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default)]
  pub active: bool,
  #[serde(default)]
  pub window_id: Option<i64>,
}

/// Fields that changed on a tab-updated notification. Only `url` drives checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabChangeInfo {
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveInfo {
  #[serde(default)]
  pub window_id: Option<i64>,
  #[serde(default)]
  pub is_window_closing: bool,
}

/// A download as reported by the host browser. Read-only input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadItem {
  pub id: DownloadId,
  pub url: String,
  #[serde(default)]
  pub final_url: String,
  #[serde(default)]
  pub referrer: Option<String>,
  #[serde(default)]
  pub mime: Option<String>,
  #[serde(default)]
  pub filename: String,
  #[serde(default)]
  pub by_extension_id: Option<String>,
  #[serde(default)]
  pub start_time_unix_ms: u64,
}

impl DownloadItem {
  /// The URL the download resolved to after redirects, or the request URL if
  /// the host has not reported one yet.
  pub fn effective_url(&self) -> &str {
    if self.final_url.is_empty() {
      &self.url
    } else {
      &self.final_url
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserEvent {
  TabUpdated {
    tab_id: TabId,
    change_info: TabChangeInfo,
    #[serde(default)]
    tab: Tab,
  },
  TabRemoved {
    tab_id: TabId,
    #[serde(default)]
    remove_info: RemoveInfo,
  },
  DownloadCreated {
    item: DownloadItem,
  },
  ScanRecentDownloads {
    tab_id: TabId,
    tab_url: String,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
  Navigation {
    tab_id: TabId,
    url: String,
  },
  Download {
    download_id: DownloadId,
    url: String,
    filename: String,
    mime: Option<String>,
    referrer: Option<String>,
  },
  TabClosed {
    tab_id: TabId,
    download_id: Option<DownloadId>,
    elapsed_ms: u64,
    window_ms: u64,
  },
  Note {
    message: String,
  },
}

/// Advisory output of a check. Nothing here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
  pub alert_id: String,
  pub rule_id: RuleId,
  pub severity: Severity,
  pub description: String,
  pub evidence: Vec<Evidence>,
  pub actions_taken: Vec<String>,
  pub created_at_unix_ms: u64,
}

impl Alert {
  pub fn new(rule_id: &str, severity: Severity, description: String, evidence: Vec<Evidence>) -> Self {
    Self {
      alert_id: uuid::Uuid::new_v4().to_string(),
      rule_id: rule_id.to_string(),
      severity,
      description,
      evidence,
      actions_taken: Vec::new(),
      created_at_unix_ms: now_unix_ms(),
    }
  }
}

pub fn max_severity(alerts: &[Alert]) -> Severity {
  alerts
    .iter()
    .map(|a| a.severity)
    .max_by_key(|s| match s {
      Severity::Green => 0,
      Severity::Yellow => 1,
      Severity::Red => 2,
    })
    .unwrap_or(Severity::Green)
}

pub fn redact_filename_for_log(path: &str) -> String {
  // Download paths carry the user's home directory; log the file name only.
  std::path::Path::new(path)
    .file_name()
    .and_then(|s| s.to_str())
    .unwrap_or("<redacted>")
    .to_string()
}

pub fn now_unix_ms() -> u64 {
  use std::time::{SystemTime, UNIX_EPOCH};
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}
