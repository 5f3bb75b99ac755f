//! Downloading component archives and manifests.
//!
//! Redirects are followed by hand so the hop limit and the name of the
//! artifact stay under our control. Every download lands in a temp file named
//! after the process id; the file is removed again if anything goes wrong.

use std::path::{Path, PathBuf};

use reqwest::header::{CONTENT_LENGTH, LOCATION};
use reqwest::{Client, Proxy, StatusCode, Url, redirect};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ProxySettings;
use crate::consts::{APP_NAME, MAX_REDIRECTS};

const DEFAULT_PROXY_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum DownloadError {
  #[error("Unsupported protocol: {0}")]
  UnsupportedScheme(String),

  #[error("Invalid URL '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  #[error("Can't parse proxy host: {0}")]
  InvalidProxy(String),

  #[error("Too many redirects")]
  TooManyRedirects,

  #[error("Server returned {0} error status")]
  Status(u16),

  #[error("Invalid content-length: {0}")]
  InvalidLength(String),

  #[error("content-length = 0")]
  ZeroLength,

  #[error("no content in downloaded file")]
  Empty,

  #[error("expected {expected} bytes, got {actual}")]
  LengthMismatch { expected: u64, actual: u64 },

  #[error("Request failed: {0}")]
  Transport(#[source] reqwest::Error),

  #[error("I/O error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// A downloaded file waiting to be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
  /// Temp file holding the body.
  pub path: PathBuf,
  /// Last path segment of the requested URL, without query string.
  pub original_name: String,
}

/// HTTP(S) downloader with optional proxy routing.
#[derive(Debug, Clone)]
pub struct Fetcher {
  direct: Client,
  proxied: Option<Client>,
  force_proxy: bool,
  temp_dir: PathBuf,
}

impl Fetcher {
  pub fn new(proxy: &ProxySettings) -> Result<Self, DownloadError> {
    let proxied = match &proxy.url {
      Some(raw) => {
        let (host, port) = parse_proxy(raw)?;
        debug!(host = %host, port, "using proxy");
        let proxy = Proxy::all(format!("http://{}:{}", host, port)).map_err(|_| DownloadError::InvalidProxy(raw.clone()))?;
        Some(client_builder().proxy(proxy).build().map_err(DownloadError::Transport)?)
      }
      None => None,
    };

    Ok(Self {
      direct: client_builder().build().map_err(DownloadError::Transport)?,
      proxied,
      force_proxy: proxy.force,
      temp_dir: std::env::temp_dir(),
    })
  }

  /// Put temp files somewhere other than the system temp dir.
  pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.temp_dir = dir.into();
    self
  }

  /// Download `url` into a fresh temp file.
  pub async fn download(&self, url: &str) -> Result<Artifact, DownloadError> {
    let original_name = original_name(url);
    let path = self
      .temp_dir
      .join(format!("{}-{}-{}", APP_NAME, std::process::id(), original_name));

    info!(url = %url, "downloading");
    match self.download_to(url, &path).await {
      Ok(size) => {
        debug!(path = ?path, size, "download complete");
        Ok(Artifact { path, original_name })
      }
      Err(e) => {
        if let Err(rm) = fs::remove_file(&path).await
          && rm.kind() != std::io::ErrorKind::NotFound
        {
          warn!(path = ?path, error = %rm, "failed to remove partial download");
        }
        Err(e)
      }
    }
  }

  /// Download `url` and return the body as text, for small documents like manifests.
  ///
  /// Goes through the same temp file and length checks as [`Fetcher::download`].
  pub async fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
    let artifact = self.download(url).await?;
    let text = fs::read_to_string(&artifact.path)
      .await
      .map_err(|source| DownloadError::Io {
        path: artifact.path.clone(),
        source,
      });
    if let Err(e) = fs::remove_file(&artifact.path).await {
      warn!(path = ?artifact.path, error = %e, "failed to remove downloaded file");
    }
    text
  }

  async fn download_to(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
    let mut response = self.follow(url).await?;

    let expected = match response.headers().get(CONTENT_LENGTH) {
      Some(value) => {
        let raw = value.to_str().unwrap_or_default();
        let length: u64 = raw
          .trim()
          .parse()
          .map_err(|_| DownloadError::InvalidLength(raw.to_string()))?;
        if length == 0 {
          return Err(DownloadError::ZeroLength);
        }
        Some(length)
      }
      None => None,
    };
    debug!(expected = ?expected, "content-length");

    let io_err = |source| DownloadError::Io {
      path: path.to_path_buf(),
      source,
    };

    let mut file = fs::File::create(path).await.map_err(io_err)?;
    let mut written: u64 = 0;
    loop {
      let chunk = match response.chunk().await {
        Ok(Some(chunk)) => chunk,
        Ok(None) => break,
        Err(e) => {
          // A connection closed before Content-Length is reached surfaces as a body error.
          if let Some(expected) = expected
            && written < expected
          {
            debug!(error = %e, expected, written, "body ended early");
            return Err(DownloadError::LengthMismatch {
              expected,
              actual: written,
            });
          }
          return Err(DownloadError::Transport(e));
        }
      };
      file.write_all(&chunk).await.map_err(io_err)?;
      written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    drop(file);

    if written == 0 {
      return Err(DownloadError::Empty);
    }
    if let Some(expected) = expected
      && expected != written
    {
      return Err(DownloadError::LengthMismatch {
        expected,
        actual: written,
      });
    }

    Ok(written)
  }

  /// Issue GETs until a response without `Location` arrives, then require 200.
  async fn follow(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
    let mut current = parse_url(url)?;
    let mut hops = 0;

    loop {
      let response = self
        .client_for(&current)
        .get(current.clone())
        .send()
        .await
        .map_err(DownloadError::Transport)?;

      if let Some(location) = response.headers().get(LOCATION) {
        hops += 1;
        if hops >= MAX_REDIRECTS {
          return Err(DownloadError::TooManyRedirects);
        }
        let location = location.to_str().unwrap_or_default();
        let next = current.join(location).map_err(|e| DownloadError::InvalidUrl {
          url: location.to_string(),
          message: e.to_string(),
        })?;
        debug!(from = %current, to = %next, hops, "redirect");
        current = checked_scheme(next)?;
        continue;
      }

      if response.status() != StatusCode::OK {
        return Err(DownloadError::Status(response.status().as_u16()));
      }
      return Ok(response);
    }
  }

  fn client_for(&self, url: &Url) -> &Client {
    match &self.proxied {
      Some(proxied) if self.force_proxy || url.scheme() == "http" => proxied,
      _ => &self.direct,
    }
  }
}

fn client_builder() -> reqwest::ClientBuilder {
  Client::builder()
    .no_proxy()
    .redirect(redirect::Policy::none())
    .user_agent(concat!("hoist/", env!("CARGO_PKG_VERSION")))
}

fn parse_url(url: &str) -> Result<Url, DownloadError> {
  let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
    url: url.to_string(),
    message: e.to_string(),
  })?;
  checked_scheme(parsed)
}

fn checked_scheme(url: Url) -> Result<Url, DownloadError> {
  match url.scheme() {
    "http" | "https" => Ok(url),
    other => Err(DownloadError::UnsupportedScheme(other.to_string())),
  }
}

/// Last path segment of a URL with any query string removed.
pub fn original_name(url: &str) -> String {
  let without_query = url.split('?').next().unwrap_or(url);
  without_query.rsplit('/').next().unwrap_or_default().to_string()
}

/// Extract host and port from a proxy URL such as `http://proxy:3128/`.
fn parse_proxy(raw: &str) -> Result<(String, u16), DownloadError> {
  let invalid = || DownloadError::InvalidProxy(raw.to_string());

  let (_, rest) = raw.split_once("://").ok_or_else(invalid)?;
  let authority = rest.split('/').next().unwrap_or_default();
  let authority = authority.rsplit('@').next().unwrap_or(authority);

  let (host, port) = match authority.rsplit_once(':') {
    Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
    None => (authority, DEFAULT_PROXY_PORT),
  };
  if host.is_empty() {
    return Err(invalid());
  }
  Ok((host.to_string(), port))
}
