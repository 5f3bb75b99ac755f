//! Bringing an installation in line with a manifest.
//!
//! A run walks through the [`Phase`]s in order. Everything up to and
//! including [`Phase::ResolvingLinks`] only adds new component directories
//! next to the existing ones, so a failure there leaves the current install
//! working. From [`Phase::InstallingLinks`] on, links are being replaced; an
//! error is wrapped in [`ReconcileError::Interrupted`], and running again
//! repairs the install because every step is idempotent.

mod links;
mod types;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive;
use crate::fetch::Fetcher;
use crate::install_lock::InstallLock;
use crate::manifest::{Href, Manifest, ManifestStore, StagedManifest};
use crate::platform::paths::with_suffix;
use crate::platform::{InstallLayout, PlatformInfo, resolve_opt};
use crate::trash::TrashCan;

pub use links::{install_link, resolve_links, stale_link_dests};
pub use types::*;

/// Receives progress events of a reconcile run.
pub trait Progress: Send + Sync {
  fn on_phase(&self, _phase: Phase) {}

  /// A component is about to be downloaded.
  fn on_download(&self, _component: &str, _url: &str) {}
}

/// Progress sink that ignores every event.
#[derive(Debug, Default)]
pub struct Silent;

impl Progress for Silent {}

pub struct Reconciler {
  layout: InstallLayout,
  platform: Arc<dyn PlatformInfo>,
  fetcher: Fetcher,
  trash: TrashCan,
  store: ManifestStore,
  progress: Arc<dyn Progress>,
}

impl Reconciler {
  pub fn new(layout: InstallLayout, platform: Arc<dyn PlatformInfo>, fetcher: Fetcher) -> Self {
    Self {
      trash: TrashCan::new(layout.trash_dir()),
      store: ManifestStore::new(&layout),
      layout,
      platform,
      fetcher,
      progress: Arc::new(Silent),
    }
  }

  pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
    self.progress = progress;
    self
  }

  pub fn layout(&self) -> &InstallLayout {
    &self.layout
  }

  pub fn store(&self) -> &ManifestStore {
    &self.store
  }

  /// Run the full algorithm under the install lock.
  pub async fn reconcile(&self, mode: ReconcileMode) -> Result<ReconcileOutcome, ReconcileError> {
    let result = self.run(mode).await;
    if let Err(e) = &result {
      info!(class = ?e.class(), error = %e, "reconcile failed");
    }
    result
  }

  async fn run(&self, mode: ReconcileMode) -> Result<ReconcileOutcome, ReconcileError> {
    let _lock = InstallLock::acquire(&self.layout, mode.command())?;
    info!(root = ?self.layout.root(), mode = ?mode, "reconciling");

    self.enter(Phase::LoadingManifest);
    let active = self
      .store
      .load_active()?
      .ok_or_else(|| ReconcileError::ActiveUnusable(self.store.active_path().to_path_buf()))?;

    let target = match mode {
      ReconcileMode::FreshInstall => active.clone(),
      ReconcileMode::Update => match self.load_staged()? {
        Some(staged) => staged,
        None => {
          info!("no update pending");
          return Ok(ReconcileOutcome::NoUpdatePending);
        }
      },
    };

    self.enter(Phase::FetchingComponents);
    let components = self.components(&target)?;
    let mut downloaded = Vec::new();
    for component in &components {
      if component.root.exists() {
        continue;
      }
      debug!(component = %component.name, root = ?component.root, "new component required");
      if self.fetch_component(component).await? {
        downloaded.push(component.name.clone());
      }
    }

    self.enter(Phase::ResolvingLinks);
    let links = resolve_links(&components, &target, &self.layout, self.platform.as_ref())?;
    if links.is_empty() {
      return Err(ReconcileError::NoLinks);
    }
    let keep: HashSet<PathBuf> = links.iter().map(|link| link.dest.clone()).collect();
    let stale = stale_link_dests(&active, &keep, &self.layout, self.platform.as_ref());
    debug!(keep = keep.len(), stale = stale.len(), "link set computed");

    let stale_removed = self.apply(mode, &links, stale)?;

    self.enter(Phase::PurgingTrash);
    let trash_purged = match self.trash.purge().await {
      Ok(()) => true,
      Err(e) => {
        warn!(
          error = %e,
          "Error cleaning up old files. Please delete {} manually.",
          self.trash.root().display()
        );
        false
      }
    };

    self.enter(Phase::Done);
    Ok(ReconcileOutcome::Completed(Box::new(ReconcileReport {
      mode,
      manifest: target,
      downloaded,
      links,
      stale_removed,
      trash_purged,
    })))
  }

  fn enter(&self, phase: Phase) {
    info!(phase = %phase, "reconcile phase");
    self.progress.on_phase(phase);
  }

  /// `Ok(None)` when no update is staged.
  fn load_staged(&self) -> Result<Option<Manifest>, ReconcileError> {
    match self.store.load_staged() {
      StagedManifest::Absent => Ok(None),
      StagedManifest::Ready(manifest) => Ok(Some(manifest)),
      StagedManifest::Unusable => Err(ReconcileError::StagedUnusable(
        self.store.staged_path().to_path_buf(),
      )),
      StagedManifest::Corrupt(e) => {
        if let Err(rm) = self.store.discard_staged() {
          warn!(error = %rm, "failed to remove corrupt staged manifest");
        }
        Err(ReconcileError::StagedCorrupt(e))
      }
    }
  }

  fn components(&self, manifest: &Manifest) -> Result<Vec<Component>, ReconcileError> {
    manifest
      .data
      .iter()
      .map(|(name, spec)| {
        let id = spec
          .id
          .as_deref()
          .filter(|id| !id.is_empty())
          .ok_or_else(|| ReconcileError::Malformed(format!("component {} has no id", name)))?;
        Ok(Component {
          name: name.clone(),
          root: self.layout.component_dir(name, id),
          spec: spec.clone(),
        })
      })
      .collect()
  }

  /// Download and unpack one component. Returns false when it does not apply
  /// to this platform.
  async fn fetch_component(&self, component: &Component) -> Result<bool, ReconcileError> {
    let platform_err = |source| ReconcileError::Platform {
      component: component.name.clone(),
      source,
    };

    let url = match resolve_opt(component.spec.href.as_ref(), self.platform.as_ref()).map_err(platform_err)? {
      Some(Href::Flag(false)) => {
        debug!(component = %component.name, "not needed on this platform");
        return Ok(false);
      }
      Some(Href::Url(url)) if !url.is_empty() => url,
      _ => {
        return Err(ReconcileError::Malformed(format!(
          "no href for component {}",
          component.name
        )));
      }
    };
    let strip = resolve_opt(component.spec.extract.as_ref(), self.platform.as_ref()).map_err(platform_err)?;

    self.progress.on_download(&component.name, &url);
    let artifact = self
      .fetcher
      .download(&url)
      .await
      .map_err(|source| ReconcileError::Fetch {
        component: component.name.clone(),
        source,
      })?;

    let dest = component.root.clone();
    let staging = with_suffix(&dest, ".tmp");
    self.trash.trash_if_exists(&staging)?;
    self.trash.trash_if_exists(&dest)?;

    let trash = self.trash.clone();
    let unpack_into = staging.clone();
    let downloaded = artifact.clone();
    let extracted = tokio::task::spawn_blocking(move || archive::extract(&downloaded, &unpack_into, strip, &trash))
      .await
      .map_err(|e| ReconcileError::fs(&staging, std::io::Error::other(e)))?;

    if let Err(e) = std::fs::remove_file(&artifact.path) {
      warn!(path = ?artifact.path, error = %e, "failed to remove downloaded file");
    }

    extracted.map_err(|source| ReconcileError::Extract {
      component: component.name.clone(),
      source,
    })?;

    std::fs::rename(&staging, &dest).map_err(|e| ReconcileError::fs(&dest, e))?;
    info!(component = %component.name, root = ?dest, "component installed");
    Ok(true)
  }

  /// Everything past the point of no return, except the purge.
  fn apply(
    &self,
    mode: ReconcileMode,
    links: &[Link],
    stale: Vec<PathBuf>,
  ) -> Result<Vec<PathBuf>, ReconcileError> {
    let interrupted = |phase: Phase| {
      move |e: ReconcileError| ReconcileError::Interrupted {
        phase,
        source: Box::new(e),
      }
    };

    self.enter(Phase::InstallingLinks);
    for link in links {
      install_link(link, &self.trash).map_err(interrupted(Phase::InstallingLinks))?;
    }

    self.enter(Phase::PruningStaleLinks);
    let mut removed = Vec::new();
    for dest in stale {
      if self
        .trash
        .trash_if_exists(&dest)
        .map_err(|e| interrupted(Phase::PruningStaleLinks)(e.into()))?
        .is_some()
      {
        debug!(dest = ?dest, "removed stale link");
        removed.push(dest);
      }
    }

    if mode == ReconcileMode::Update {
      self.enter(Phase::CommittingManifest);
      self
        .store
        .commit()
        .map_err(|e| interrupted(Phase::CommittingManifest)(e.into()))?;
    }

    Ok(removed)
  }
}
