use crate::config::HostMatch;
use crate::error::GuardError;
use crate::threat_lists::{MALICIOUS_HOSTS, SUSPICIOUS_MIME_TYPES, TEST_PAGE_URLS};
use url::Url;

/// URL and MIME checks against the compiled-in lists.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
  host_match: HostMatch,
}

impl Classifier {
  pub fn new(host_match: HostMatch) -> Self {
    Self { host_match }
  }

  /// Returns an error if `url` does not parse. URLs without a host
  /// (`about:blank`, `data:`) never match.
  pub fn is_known_malicious(&self, url: &str) -> Result<bool, GuardError> {
    let parsed = Url::parse(url).map_err(|e| GuardError::malformed_url(url, e))?;
    let Some(host) = parsed.host_str() else {
      return Ok(false);
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    Ok(
      MALICIOUS_HOSTS
        .iter()
        .any(|entry| host_matches(self.host_match, &host, entry)),
    )
  }
}

impl Default for Classifier {
  fn default() -> Self {
    Self::new(HostMatch::default())
  }
}

fn host_matches(mode: HostMatch, host: &str, entry: &str) -> bool {
  match mode {
    HostMatch::Exact => host == entry,
    HostMatch::Suffix => {
      host == entry
        || host
          .strip_suffix(entry)
          .map(|rest| rest.ends_with('.'))
          .unwrap_or(false)
    }
    HostMatch::Substring => host.contains(entry),
  }
}

/// Exact string comparison; no normalization is applied.
pub fn is_test_page(url: &str) -> bool {
  TEST_PAGE_URLS.iter().any(|t| *t == url)
}

pub fn is_suspicious_mime_type(mime: &str) -> bool {
  SUSPICIOUS_MIME_TYPES.contains(&mime)
}
