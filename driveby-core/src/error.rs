use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
  #[error("malformed URL `{url}`: {source}")]
  MalformedUrl {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("no active tab in the current window")]
  MissingActiveTab,

  #[error("host query `{op}` failed: {message}")]
  HostQuery { op: &'static str, message: String },
}

impl GuardError {
  pub fn malformed_url(url: &str, source: url::ParseError) -> Self {
    Self::MalformedUrl {
      url: url.to_string(),
      source,
    }
  }
}
