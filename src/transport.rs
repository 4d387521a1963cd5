use crate::error::{EngineError, EngineResult};
use std::{io::Read, time::Duration};
use tracing::debug;

pub const USER_AGENT: &str = concat!("modforge/", env!("CARGO_PKG_VERSION"));

/// Only one redirect hop is followed. The CDN answers package downloads with a
/// single 302 to the storage bucket.
const MAX_REDIRECTS: usize = 1;

pub trait DownloadTransport: Send + Sync {
    fn download(&self, url: &str) -> EngineResult<Vec<u8>>;
}

pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(120))
            .timeout_write(Duration::from_secs(60))
            .redirects(0)
            .build();
        Self { agent }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadTransport for HttpTransport {
    fn download(&self, url: &str) -> EngineResult<Vec<u8>> {
        let mut current = url.to_string();
        for hop in 0..=MAX_REDIRECTS {
            let response = match self.agent.get(&current).set("User-Agent", USER_AGENT).call() {
                Ok(response) => response,
                Err(ureq::Error::Status(status, _)) => {
                    return Err(EngineError::HttpStatus {
                        url: current,
                        status,
                    })
                }
                Err(err) => return Err(EngineError::network(&current, err)),
            };

            let status = response.status();
            if (300..400).contains(&status) {
                if hop == MAX_REDIRECTS {
                    return Err(EngineError::RedirectLimitExceeded(url.to_string()));
                }
                let location = response
                    .header("Location")
                    .ok_or_else(|| EngineError::network(&current, "redirect without location"))?;
                let next = resolve_location(&current, location);
                debug!(from = %current, to = %next, "following redirect");
                current = next;
                continue;
            }
            if !(200..300).contains(&status) {
                return Err(EngineError::HttpStatus {
                    url: current,
                    status,
                });
            }

            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|err| EngineError::network(&current, err))?;
            return Ok(bytes);
        }
        Err(EngineError::RedirectLimitExceeded(url.to_string()))
    }
}

/// Resolves a `Location` header against the URL that produced it.
fn resolve_location(base: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        return location.to_string();
    }
    let scheme_end = base.find("://").map(|idx| idx + 3).unwrap_or(0);
    if location.starts_with("//") {
        let scheme = base[..scheme_end].trim_end_matches("//");
        return format!("{scheme}{location}");
    }
    let host_end = base[scheme_end..]
        .find(&['/', '?', '#'][..])
        .map(|idx| scheme_end + idx)
        .unwrap_or(base.len());
    if location.starts_with('/') {
        return format!("{}{}", &base[..host_end], location);
    }
    let path_end = base[host_end..]
        .find(&['?', '#'][..])
        .map(|idx| host_end + idx)
        .unwrap_or(base.len());
    if location.starts_with('?') {
        return format!("{}{}", &base[..path_end], location);
    }
    if location.starts_with('#') {
        let fragment_end = base.find('#').unwrap_or(base.len());
        return format!("{}{}", &base[..fragment_end], location);
    }
    let dir_end = base[..path_end]
        .rfind('/')
        .filter(|idx| *idx >= host_end)
        .unwrap_or(host_end);
    format!("{}/{}", &base[..dir_end], location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_location_wins() {
        assert_eq!(
            resolve_location("https://a.test/x/y.zip", "https://cdn.test/z.zip"),
            "https://cdn.test/z.zip"
        );
    }

    #[test]
    fn root_relative_location() {
        assert_eq!(
            resolve_location("https://a.test/package/download/T/M/1.0.0/", "/files/m.zip"),
            "https://a.test/files/m.zip"
        );
    }

    #[test]
    fn scheme_relative_location_keeps_scheme() {
        assert_eq!(
            resolve_location("https://a.test/x/y.zip", "//cdn.test/z.zip"),
            "https://cdn.test/z.zip"
        );
        assert_eq!(
            resolve_location("http://a.test", "//cdn.test/z.zip"),
            "http://cdn.test/z.zip"
        );
    }

    #[test]
    fn query_only_location_replaces_query() {
        assert_eq!(
            resolve_location("https://a.test/dl/file.zip?token=old", "?token=new"),
            "https://a.test/dl/file.zip?token=new"
        );
        assert_eq!(
            resolve_location("https://a.test?x=1", "/files/m.zip"),
            "https://a.test/files/m.zip"
        );
    }

    #[test]
    fn path_relative_location() {
        assert_eq!(
            resolve_location("https://a.test/dir/file", "other.zip"),
            "https://a.test/dir/other.zip"
        );
        assert_eq!(
            resolve_location("https://a.test", "other.zip"),
            "https://a.test/other.zip"
        );
        assert_eq!(
            resolve_location("https://a.test/dir/file?q=/x/y", "other.zip"),
            "https://a.test/dir/other.zip"
        );
    }
}
