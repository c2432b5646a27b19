use crate::types::Severity;

/// A tab closing this soon after a download in it looks evasive.
pub const DRIVE_BY_WINDOW_MS: u64 = 30_000;

/// How far back the recent-downloads scan looks.
pub const RECENT_DOWNLOADS_WINDOW_MS: u64 = 5 * 60 * 1_000;

pub const ACTIVE_RULE_IDS: &[&str] = &["D001", "D002", "D003", "D004", "D005"];

#[derive(Debug, Clone, Copy)]
pub struct RuleMeta {
  pub id: &'static str,
  pub title: &'static str,
  pub severity: Severity,
}

pub const D001: RuleMeta = RuleMeta {
  id: "D001",
  title: "URL is hosted on a known malicious site",
  severity: Severity::Red,
};
pub const D002: RuleMeta = RuleMeta {
  id: "D002",
  title: "URL is an intentional malware test page",
  severity: Severity::Yellow,
};
pub const D003: RuleMeta = RuleMeta {
  id: "D003",
  title: "Possible drive-by download: tab closed shortly after a download",
  severity: Severity::Yellow,
};
pub const D004: RuleMeta = RuleMeta {
  id: "D004",
  title: "Recent download has an executable MIME type",
  severity: Severity::Yellow,
};
pub const D005: RuleMeta = RuleMeta {
  id: "D005",
  title: "Potential drive-by download: referred by the current tab, not started by an extension",
  severity: Severity::Red,
};

pub fn rule_meta(id: &str) -> Option<RuleMeta> {
  [D001, D002, D003, D004, D005]
    .into_iter()
    .find(|m| m.id == id)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_active_rule_has_metadata() {
    for id in ACTIVE_RULE_IDS {
      let meta = rule_meta(id).unwrap();
      assert_eq!(meta.id, *id);
      assert!(!meta.title.is_empty());
    }
    assert!(rule_meta("D999").is_none());
  }
}
