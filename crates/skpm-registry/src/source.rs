//! Registry transports.
//!
//! A registry locator resolves once, up front, to either a local directory or
//! an HTTP base URL. Both implement [`RegistrySource`], so the catalog client
//! never re-inspects the locator string per request.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::redirect::Policy;
use reqwest::Url;
use tracing::debug;

use crate::error::{RegistryError, Result};

/// A parsed registry locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// `http://` or `https://` base URL (always ends with `/`).
    Remote(Url),
    /// Local registry directory.
    Local(PathBuf),
}

/// Trim whitespace and trailing slashes from a locator string.
pub fn normalize_locator(locator: &str) -> String {
    locator.trim().trim_end_matches('/').to_string()
}

fn is_http(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl Locator {
    /// Classify a locator: network URL, `file://` URL, or filesystem path.
    ///
    /// Bare paths must be absolute or start with `.`.
    pub fn parse(locator: &str) -> Result<Self> {
        let trimmed = normalize_locator(locator);
        let invalid = || RegistryError::InvalidLocator {
            locator: locator.to_string(),
        };

        if trimmed.starts_with("file://") {
            let url = Url::parse(&trimmed).map_err(|_| invalid())?;
            let path = url.to_file_path().map_err(|_| invalid())?;
            return Ok(Locator::Local(path));
        }
        if is_http(&trimmed) {
            let url = Url::parse(&format!("{trimmed}/")).map_err(|_| invalid())?;
            return Ok(Locator::Remote(url));
        }

        let path = Path::new(&trimmed);
        if path.is_absolute() {
            return Ok(Locator::Local(path.to_path_buf()));
        }
        if trimmed.starts_with('.') {
            let cwd = std::env::current_dir()?;
            return Ok(Locator::Local(cwd.join(path)));
        }
        Err(invalid())
    }
}

/// Response metadata for a completed byte download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Where the bytes came from (final URL after redirects, or a file path).
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
}

/// Read access to registry documents and archives.
pub trait RegistrySource {
    /// Human-readable location, used in diagnostics.
    fn describe(&self) -> String;

    /// Whether documents are read from the local filesystem.
    fn is_local(&self) -> bool;

    /// Fetch a registry-relative document.
    fn fetch_document(&self, relative: &str) -> Result<Vec<u8>>;

    /// Fetch a registry-relative file into `target`.
    fn fetch_bytes(&self, relative: &str, target: &Path) -> Result<Download>;
}

/// Registry backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: PathBuf) -> Self {
        LocalSource { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }
}

impl RegistrySource for LocalSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn is_local(&self) -> bool {
        true
    }

    fn fetch_document(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.resolve(relative);
        fs::read(&path).map_err(|e| RegistryError::io(path, e))
    }

    fn fetch_bytes(&self, relative: &str, target: &Path) -> Result<Download> {
        copy_local_file(&self.resolve(relative), target)
    }
}

/// Copy a local archive into `target`, reporting it like a download.
pub fn copy_local_file(source: &Path, target: &Path) -> Result<Download> {
    fs::copy(source, target).map_err(|e| RegistryError::io(source, e))?;
    Ok(Download {
        url: source.display().to_string(),
        status: 200,
        content_type: Some("application/gzip".to_string()),
    })
}

/// Blocking HTTP client with a request timeout and bounded redirects.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_redirects: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_redirects: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("skpm/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .redirect(Policy::limited(max_redirects))
            .build()
            .map_err(|e| RegistryError::RegistryUnreachable {
                locator: "http client".to_string(),
                detail: e.to_string(),
            })?;
        Ok(HttpFetcher {
            client,
            timeout,
            max_redirects,
        })
    }

    /// GET `url`, failing on transport errors and non-2xx statuses.
    pub fn get(&self, url: &Url) -> Result<Response> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| self.map_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Fetch the full body of `url`.
    pub fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self.get(url)?;
        let bytes = response.bytes().map_err(|e| self.map_error(url, e))?;
        Ok(bytes.to_vec())
    }

    /// Stream the body of `url` into `target`.
    pub fn download(&self, url: &Url, target: &Path) -> Result<Download> {
        let mut response = self.get(url)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut file = fs::File::create(target).map_err(|e| RegistryError::io(target, e))?;
        response.copy_to(&mut file).map_err(|e| self.map_error(url, e))?;

        Ok(Download {
            url: final_url,
            status,
            content_type,
        })
    }

    fn map_error(&self, url: &Url, err: reqwest::Error) -> RegistryError {
        if err.is_timeout() {
            RegistryError::RequestTimeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else if err.is_redirect() {
            RegistryError::TooManyRedirects {
                url: url.to_string(),
                limit: self.max_redirects,
            }
        } else if let Some(status) = err.status() {
            RegistryError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            RegistryError::RegistryUnreachable {
                locator: url.to_string(),
                detail: err.to_string(),
            }
        }
    }
}

/// Registry served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base: Url,
    http: HttpFetcher,
}

impl HttpSource {
    pub fn new(base: Url, http: HttpFetcher) -> Self {
        HttpSource { base, http }
    }

    /// Resolve a registry-relative path against the base URL.
    pub fn url_for(&self, relative: &str) -> Result<Url> {
        self.base
            .join(relative.trim_start_matches('/'))
            .map_err(|_| RegistryError::InvalidLocator {
                locator: format!("{}{relative}", self.base),
            })
    }
}

impl RegistrySource for HttpSource {
    fn describe(&self) -> String {
        self.base.to_string()
    }

    fn is_local(&self) -> bool {
        false
    }

    fn fetch_document(&self, relative: &str) -> Result<Vec<u8>> {
        self.http.fetch(&self.url_for(relative)?)
    }

    fn fetch_bytes(&self, relative: &str, target: &Path) -> Result<Download> {
        self.http.download(&self.url_for(relative)?, target)
    }
}

impl RegistryError {
    /// Whether this error means the requested document does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            RegistryError::PathIo { source, .. } => source.kind() == io::ErrorKind::NotFound,
            RegistryError::HttpStatus { status, .. } => *status == 404,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_http_locator() {
        let locator = Locator::parse("https://registry.example.test/skills/").unwrap();
        match locator {
            Locator::Remote(url) => {
                assert_eq!(url.as_str(), "https://registry.example.test/skills/");
            }
            other => panic!("expected remote, got {other:?}"),
        }
    }

    #[test]
    fn parse_file_url_locator() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_directory_path(dir.path()).unwrap();
        let locator = Locator::parse(url.as_str()).unwrap();
        assert_eq!(locator, Locator::Local(dir.path().to_path_buf()));
    }

    #[test]
    fn parse_absolute_path_locator() {
        let dir = tempfile::tempdir().unwrap();
        let locator = Locator::parse(&dir.path().display().to_string()).unwrap();
        assert_eq!(locator, Locator::Local(dir.path().to_path_buf()));
    }

    #[test]
    fn parse_relative_dot_path() {
        let locator = Locator::parse("./registry").unwrap();
        match locator {
            Locator::Local(path) => assert!(path.ends_with("registry")),
            other => panic!("expected local, got {other:?}"),
        }
    }

    #[test]
    fn reject_bare_word() {
        let err = Locator::parse("registry").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidLocator { .. }));
    }

    #[test]
    fn http_source_joins_relative_paths() {
        let base = Url::parse("https://registry.example.test/base/").unwrap();
        let source = HttpSource::new(base, HttpFetcher::new(Duration::from_secs(1), 1).unwrap());
        assert_eq!(
            source.url_for("/packages/core/index.json").unwrap().as_str(),
            "https://registry.example.test/base/packages/core/index.json"
        );
    }

    #[test]
    fn local_source_missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalSource::new(dir.path().to_path_buf());
        let err = source.fetch_document("index.json").unwrap_err();
        assert!(err.is_not_found());
    }
}
