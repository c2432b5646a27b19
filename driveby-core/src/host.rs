//! Seam to the host browser's tab and download APIs.
//!
//! The core never talks to a browser directly. Everything it consumes or
//! requests goes through [`BrowserHost`], which keeps handlers testable with
//! [`ScriptedHost`].

use crate::types::{DownloadId, DownloadItem, Tab};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadQuery {
  pub started_after_unix_ms: u64,
}

#[allow(async_fn_in_trait)]
pub trait BrowserHost {
  /// Tabs that are active in the current window. Usually zero or one.
  async fn query_active_tabs(&self) -> anyhow::Result<Vec<Tab>>;

  async fn search_downloads(&self, query: DownloadQuery) -> anyhow::Result<Vec<DownloadItem>>;

  async fn cancel_download(&self, id: DownloadId) -> anyhow::Result<()>;

  async fn pause_download(&self, id: DownloadId) -> anyhow::Result<()>;

  async fn remove_file(&self, id: DownloadId) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", content = "download_id", rename_all = "snake_case")]
pub enum HostCall {
  Cancel(DownloadId),
  Pause(DownloadId),
  RemoveFile(DownloadId),
}

/// In-memory host with fixed query results. Control calls are recorded,
/// not executed.
#[derive(Debug, Default)]
pub struct ScriptedHost {
  active_tabs: RefCell<Vec<Tab>>,
  downloads: RefCell<Vec<DownloadItem>>,
  calls: RefCell<Vec<HostCall>>,
  fail_queries: bool,
  hang_queries: bool,
  fail_controls: bool,
}

impl ScriptedHost {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_active_tab(self, id: i64, url: &str) -> Self {
    self.active_tabs.borrow_mut().push(Tab {
      id: Some(id),
      url: Some(url.to_string()),
      active: true,
      window_id: Some(1),
    });
    self
  }

  pub fn with_active_tabs(self, tabs: Vec<Tab>) -> Self {
    *self.active_tabs.borrow_mut() = tabs;
    self
  }

  pub fn with_download(self, item: DownloadItem) -> Self {
    self.downloads.borrow_mut().push(item);
    self
  }

  pub fn with_downloads(self, items: Vec<DownloadItem>) -> Self {
    self.downloads.borrow_mut().extend(items);
    self
  }

  pub fn failing_queries(mut self) -> Self {
    self.fail_queries = true;
    self
  }

  /// Queries never resolve, like a host that stopped answering.
  pub fn hanging_queries(mut self) -> Self {
    self.hang_queries = true;
    self
  }

  pub fn failing_controls(mut self) -> Self {
    self.fail_controls = true;
    self
  }

  pub fn calls(&self) -> Vec<HostCall> {
    self.calls.borrow().clone()
  }

  fn control(&self, call: HostCall) -> anyhow::Result<()> {
    self.calls.borrow_mut().push(call);
    if self.fail_controls {
      anyhow::bail!("scripted host rejected {call:?}");
    }
    Ok(())
  }
}

impl BrowserHost for ScriptedHost {
  async fn query_active_tabs(&self) -> anyhow::Result<Vec<Tab>> {
    if self.hang_queries {
      return std::future::pending().await;
    }
    if self.fail_queries {
      anyhow::bail!("tabs.query unavailable");
    }
    Ok(self.active_tabs.borrow().clone())
  }

  async fn search_downloads(&self, query: DownloadQuery) -> anyhow::Result<Vec<DownloadItem>> {
    if self.hang_queries {
      return std::future::pending().await;
    }
    if self.fail_queries {
      anyhow::bail!("downloads.search unavailable");
    }
    Ok(
      self
        .downloads
        .borrow()
        .iter()
        .filter(|d| d.start_time_unix_ms >= query.started_after_unix_ms)
        .cloned()
        .collect(),
    )
  }

  async fn cancel_download(&self, id: DownloadId) -> anyhow::Result<()> {
    self.control(HostCall::Cancel(id))
  }

  async fn pause_download(&self, id: DownloadId) -> anyhow::Result<()> {
    self.control(HostCall::Pause(id))
  }

  async fn remove_file(&self, id: DownloadId) -> anyhow::Result<()> {
    self.control(HostCall::RemoveFile(id))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn search_filters_by_start_time() {
    let host = ScriptedHost::new()
      .with_download(DownloadItem {
        id: 1,
        start_time_unix_ms: 100,
        ..DownloadItem::default()
      })
      .with_download(DownloadItem {
        id: 2,
        start_time_unix_ms: 500,
        ..DownloadItem::default()
      });

    let found = host
      .search_downloads(DownloadQuery {
        started_after_unix_ms: 200,
      })
      .await
      .unwrap();
    assert_eq!(found.iter().map(|d| d.id).collect::<Vec<_>>(), vec![2]);
  }

  #[tokio::test]
  async fn control_calls_are_recorded_even_when_rejected() {
    let host = ScriptedHost::new().failing_controls();
    assert!(host.cancel_download(4).await.is_err());
    assert!(host.remove_file(5).await.is_err());
    assert_eq!(host.calls(), vec![HostCall::Cancel(4), HostCall::RemoveFile(5)]);
  }
}
