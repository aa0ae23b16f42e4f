//! Collaborator seams for SBOM orchestration.
//!
//! `download-sbom` needs two external capabilities: getting a repository's
//! working tree onto disk and turning that tree into an SBOM document. Both
//! are traits so the batch driver in [`crate::sbom`] can run against fakes
//! in tests and against `git` / `syft` in production.
//!
//! # Architecture
//!
//! ```text
//!   query_repos() ──► Vec<Repo>
//!                        │
//!                        ▼
//!               download_sboms()
//!          ┌─────────────┴─────────────┐
//!          ▼                           ▼
//!   dyn RepoFetcher              dyn SbomGenerator
//!   (GitFetcher: git clone)      (CommandGenerator: syft scan)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::path::Path;
//! use anyhow::Result;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use bomfactory::traits::RepoFetcher;
//!
//! struct LocalMirror;
//!
//! #[async_trait]
//! impl RepoFetcher for LocalMirror {
//!     fn name(&self) -> &str { "mirror" }
//!
//!     async fn fetch(&self, _url: &str, dest: &Path, _token: &CancellationToken) -> Result<()> {
//!         std::fs::write(dest.join("go.mod"), "module example.com/x\n")?;
//!         Ok(())
//!     }
//! }
//! ```

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Places a repository's working tree into a local directory.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Populate `dest` (an existing, empty directory) with the tree at `url`.
    ///
    /// Implementations must stop promptly once `token` is cancelled.
    async fn fetch(&self, url: &str, dest: &Path, token: &CancellationToken) -> Result<()>;
}

/// Produces an SBOM document for a checked-out tree.
#[async_trait]
pub trait SbomGenerator: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Scan `checkout` and write the SBOM to `output`.
    ///
    /// `label` identifies the component (repository URL without scheme).
    /// On failure nothing may be left at `output`.
    async fn generate(
        &self,
        checkout: &Path,
        output: &Path,
        label: &str,
        token: &CancellationToken,
    ) -> Result<()>;
}
