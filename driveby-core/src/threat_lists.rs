//! Compiled-in reputation data. These lists are the only detection
//! configuration and never change at runtime.

/// Hostnames known to serve malicious or malware-test content.
pub const MALICIOUS_HOSTS: &[&str] = &[
  "www.eicar.org",
  "testsafebrowsing.appspot.com",
  "www.amtso.org",
  "phishtank.com",
  "www.wicar.org",
  "mixed-script.badssl.com",
  "badssl.com",
];

/// Full URLs of pages that exist to exercise security products on purpose.
pub const TEST_PAGE_URLS: &[&str] = &[
  "https://secure.eicar.org/eicar.com",
  "https://secure.eicar.org/eicar.com.txt",
  "https://secure.eicar.org/eicar_com.zip",
  "https://secure.eicar.org/eicarcom2.zip",
  "https://testsafebrowsing.appspot.com/s/malware.html",
  "https://testsafebrowsing.appspot.com/s/phishing.html",
  "https://testsafebrowsing.appspot.com/s/unwanted.html",
  "https://www.amtso.org/security-features-check/",
];

/// MIME types treated as executable content. Compared case-sensitively.
pub const SUSPICIOUS_MIME_TYPES: &[&str] = &[
  "application/exe",
  "application/x-msdownload",
  "application/x-sh",
];

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn lists_have_no_duplicates() {
    for list in [MALICIOUS_HOSTS, TEST_PAGE_URLS, SUSPICIOUS_MIME_TYPES] {
      let set: HashSet<_> = list.iter().collect();
      assert_eq!(set.len(), list.len());
    }
  }

  #[test]
  fn malicious_hosts_are_lowercase_hostnames() {
    for h in MALICIOUS_HOSTS {
      assert_eq!(*h, h.to_ascii_lowercase());
      assert!(!h.contains('/'), "{h} should be a bare hostname");
    }
  }
}
