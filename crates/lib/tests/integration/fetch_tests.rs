//! Downloading through the public API.

use hoist_lib::config::ProxySettings;
use hoist_lib::fetch::{DownloadError, Fetcher};
use mockito::ServerGuard;
use tempfile::TempDir;

/// Serve `/hop0` .. `/hop{hops}` where every hop but the last redirects to the next.
async fn redirect_chain(hops: usize) -> ServerGuard {
  let mut server = mockito::Server::new_async().await;
  for hop in 0..hops {
    server
      .mock("GET", format!("/hop{}", hop).as_str())
      .with_status(301)
      .with_header("location", &format!("/hop{}", hop + 1))
      .create_async()
      .await;
  }
  server
    .mock("GET", format!("/hop{}", hops).as_str())
    .with_status(200)
    .with_body("done")
    .create_async()
    .await;
  server
}

#[tokio::test]
async fn relative_redirect_chain_is_followed() {
  let temp = TempDir::new().unwrap();
  let server = redirect_chain(5).await;

  let fetcher = Fetcher::new(&ProxySettings::default()).unwrap().with_temp_dir(temp.path());
  let artifact = fetcher.download(&format!("{}/hop0", server.url())).await.unwrap();

  assert_eq!(artifact.original_name, "hop0");
  assert_eq!(std::fs::read_to_string(&artifact.path).unwrap(), "done");
}

#[tokio::test]
async fn nine_redirects_are_allowed() {
  let temp = TempDir::new().unwrap();
  let server = redirect_chain(9).await;

  let fetcher = Fetcher::new(&ProxySettings::default()).unwrap().with_temp_dir(temp.path());
  let artifact = fetcher.download(&format!("{}/hop0", server.url())).await.unwrap();
  assert_eq!(std::fs::read_to_string(&artifact.path).unwrap(), "done");
}

#[tokio::test]
async fn tenth_redirect_fails() {
  let temp = TempDir::new().unwrap();
  let server = redirect_chain(10).await;

  let fetcher = Fetcher::new(&ProxySettings::default()).unwrap().with_temp_dir(temp.path());
  let err = fetcher
    .download(&format!("{}/hop0", server.url()))
    .await
    .unwrap_err();

  assert!(matches!(err, DownloadError::TooManyRedirects), "{:?}", err);
  assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn empty_body_is_rejected() {
  let temp = TempDir::new().unwrap();
  let mut server = mockito::Server::new_async().await;
  server.mock("GET", "/empty.tgz").with_status(200).create_async().await;

  let fetcher = Fetcher::new(&ProxySettings::default()).unwrap().with_temp_dir(temp.path());
  let err = fetcher
    .download(&format!("{}/empty.tgz", server.url()))
    .await
    .unwrap_err();

  assert!(matches!(err, DownloadError::ZeroLength | DownloadError::Empty));
  assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}
