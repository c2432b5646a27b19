use crate::heuristics::{CorrectiveAction, Detection};
use crate::host::BrowserHost;
use crate::types::{Alert, Severity};

/// Applies corrective actions. Every action is best-effort: a failure is
/// logged and recorded on the alert, never returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct Responder {
  dry_run: bool,
}

impl Responder {
  pub fn new(dry_run: bool) -> Self {
    Self { dry_run }
  }

  pub async fn handle_detection<H: BrowserHost>(&self, host: &H, detection: Detection) -> Alert {
    let Detection { mut alert, action } = detection;
    report(&alert);

    match action {
      Some(action) => self.apply(host, action, &mut alert).await,
      None => tracing::debug!(
        alert_id = %alert.alert_id,
        rule_id = %alert.rule_id,
        "no corrective action for alert"
      ),
    }

    alert
  }

  pub async fn apply<H: BrowserHost>(&self, host: &H, action: CorrectiveAction, alert: &mut Alert) {
    if self.dry_run {
      tracing::warn!(
        alert_id = %alert.alert_id,
        download_id = action.download_id(),
        "DRY-RUN: would {}",
        action.name()
      );
      alert
        .actions_taken
        .push(format!("{}_skipped_dry_run", action.name()));
      return;
    }

    let result = match action {
      CorrectiveAction::Cancel(id) => host.cancel_download(id).await,
      CorrectiveAction::Pause(id) => host.pause_download(id).await,
      CorrectiveAction::RemoveFile(id) => host.remove_file(id).await,
    };

    match result {
      Ok(()) => {
        tracing::info!(
          alert_id = %alert.alert_id,
          download_id = action.download_id(),
          "{} requested",
          action.name()
        );
        alert.actions_taken.push(action.name().to_string());
      }
      Err(e) => {
        tracing::error!(
          alert_id = %alert.alert_id,
          download_id = action.download_id(),
          error = ?e,
          "{} failed (continuing)",
          action.name()
        );
        alert.actions_taken.push(format!("{}_failed", action.name()));
      }
    }
  }
}

pub fn report(alert: &Alert) {
  match alert.severity {
    Severity::Green => tracing::info!(
      alert_id = %alert.alert_id,
      rule_id = %alert.rule_id,
      "{}",
      alert.description
    ),
    Severity::Yellow | Severity::Red => tracing::warn!(
      alert_id = %alert.alert_id,
      rule_id = %alert.rule_id,
      severity = ?alert.severity,
      evidence = alert.evidence.len(),
      "{}",
      alert.description
    ),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::host::{HostCall, ScriptedHost};

  fn detection(action: Option<CorrectiveAction>) -> Detection {
    Detection {
      alert: Alert::new("D001", Severity::Red, "test".to_string(), vec![]),
      action,
    }
  }

  #[tokio::test]
  async fn action_is_forwarded_to_host() {
    let host = ScriptedHost::new();
    let alert = Responder::new(false)
      .handle_detection(&host, detection(Some(CorrectiveAction::Cancel(42))))
      .await;

    assert_eq!(host.calls(), vec![HostCall::Cancel(42)]);
    assert_eq!(alert.actions_taken, vec!["cancel_download".to_string()]);
  }

  #[tokio::test]
  async fn host_failure_is_recorded_not_returned() {
    let host = ScriptedHost::new().failing_controls();
    let alert = Responder::new(false)
      .handle_detection(&host, detection(Some(CorrectiveAction::RemoveFile(9))))
      .await;

    assert_eq!(alert.actions_taken, vec!["remove_file_failed".to_string()]);
  }

  #[tokio::test]
  async fn dry_run_never_calls_host() {
    let host = ScriptedHost::new();
    let alert = Responder::new(true)
      .handle_detection(&host, detection(Some(CorrectiveAction::Pause(3))))
      .await;

    assert!(host.calls().is_empty());
    assert_eq!(alert.actions_taken, vec!["pause_download_skipped_dry_run".to_string()]);
  }

  #[tokio::test]
  async fn alert_without_action_is_passed_through() {
    let host = ScriptedHost::new();
    let alert = Responder::default()
      .handle_detection(&host, detection(None))
      .await;

    assert!(host.calls().is_empty());
    assert!(alert.actions_taken.is_empty());
  }
}
