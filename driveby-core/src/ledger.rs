use crate::types::{now_unix_ms, DownloadId, TabId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabRecord {
  pub download_initiated: bool,
  pub download_time_unix_ms: u64,
  /// Most recent download seen while this tab was active, when known.
  pub download_id: Option<DownloadId>,
}

/// Per-tab view of the ledger. Absent entries are `NoActivity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabActivity {
  NoActivity,
  DownloadRecorded {
    download_time_unix_ms: u64,
    download_id: Option<DownloadId>,
  },
}

/// Tab id -> last download record. Entries are dropped when the tab closes.
#[derive(Debug, Default)]
pub struct TabDownloadLedger {
  tabs: HashMap<TabId, TabRecord>,
}

impl TabDownloadLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_download(&mut self, tab_id: TabId) {
    self.record_download_at(tab_id, None, now_unix_ms());
  }

  /// Last write wins.
  pub fn record_download_at(
    &mut self,
    tab_id: TabId,
    download_id: Option<DownloadId>,
    now_unix_ms: u64,
  ) {
    self.tabs.insert(
      tab_id,
      TabRecord {
        download_initiated: true,
        download_time_unix_ms: now_unix_ms,
        download_id,
      },
    );
  }

  pub fn get_record(&self, tab_id: TabId) -> Option<TabRecord> {
    self.tabs.get(&tab_id).copied()
  }

  pub fn activity(&self, tab_id: TabId) -> TabActivity {
    match self.tabs.get(&tab_id) {
      Some(r) if r.download_initiated => TabActivity::DownloadRecorded {
        download_time_unix_ms: r.download_time_unix_ms,
        download_id: r.download_id,
      },
      _ => TabActivity::NoActivity,
    }
  }

  pub fn remove(&mut self, tab_id: TabId) -> Option<TabRecord> {
    self.tabs.remove(&tab_id)
  }

  pub fn len(&self) -> usize {
    self.tabs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tabs.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn record_then_get_is_timestamped_now() {
    let mut ledger = TabDownloadLedger::new();
    let before = now_unix_ms();
    ledger.record_download(5);
    let after = now_unix_ms();

    let rec = ledger.get_record(5).unwrap();
    assert!(rec.download_initiated);
    assert!(rec.download_time_unix_ms >= before);
    assert!(rec.download_time_unix_ms <= after);
    assert_eq!(rec.download_id, None);
  }

  #[test]
  fn later_download_overwrites_record() {
    let mut ledger = TabDownloadLedger::new();
    ledger.record_download_at(1, Some(10), 1_000);
    ledger.record_download_at(1, Some(11), 2_000);

    let rec = ledger.get_record(1).unwrap();
    assert_eq!(rec.download_time_unix_ms, 2_000);
    assert_eq!(rec.download_id, Some(11));
    assert_eq!(ledger.len(), 1);
  }

  #[test]
  fn remove_clears_entry_and_is_noop_when_absent() {
    let mut ledger = TabDownloadLedger::new();
    ledger.record_download_at(3, Some(42), 1_000);
    assert!(ledger.remove(3).is_some());
    assert_eq!(ledger.get_record(3), None);
    assert_eq!(ledger.activity(3), TabActivity::NoActivity);

    assert!(ledger.remove(3).is_none());
    assert!(ledger.is_empty());
  }

  #[test]
  fn activity_reflects_recorded_download() {
    let mut ledger = TabDownloadLedger::new();
    assert_eq!(ledger.activity(9), TabActivity::NoActivity);

    ledger.record_download_at(9, Some(7), 123);
    assert_eq!(
      ledger.activity(9),
      TabActivity::DownloadRecorded {
        download_time_unix_ms: 123,
        download_id: Some(7),
      }
    );
  }
}
