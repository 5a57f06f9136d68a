//! VCS client adapters and their registry

pub mod archive;
pub mod bzr;
pub mod git;
pub mod hg;
pub mod process;
pub mod svn;
pub mod tarball;
pub mod zipfile;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use vcsgrip_core::domain::RepoKind;
use vcsgrip_core::ports::VcsClient;

pub use bzr::BzrClient;
pub use git::GitClient;
pub use hg::HgClient;
pub use svn::SvnClient;
pub use tarball::TarClient;
pub use zipfile::ZipClient;

/// A client type known to the crawler and importer
pub struct Registration {
    pub kind: RepoKind,
    pub is_repository: fn(&Path) -> bool,
    pub build: fn(PathBuf) -> Arc<dyn VcsClient>,
}

/// Registered client types in marker probing order
pub static REGISTRY: [Registration; 6] = [
    Registration {
        kind: RepoKind::Bzr,
        is_repository: BzrClient::is_repository,
        build: build::<BzrClient>,
    },
    Registration {
        kind: RepoKind::Git,
        is_repository: GitClient::is_repository,
        build: build::<GitClient>,
    },
    Registration {
        kind: RepoKind::Hg,
        is_repository: HgClient::is_repository,
        build: build::<HgClient>,
    },
    Registration {
        kind: RepoKind::Svn,
        is_repository: SvnClient::is_repository,
        build: build::<SvnClient>,
    },
    Registration {
        kind: RepoKind::Tar,
        is_repository: TarClient::is_repository,
        build: build::<TarClient>,
    },
    Registration {
        kind: RepoKind::Zip,
        is_repository: ZipClient::is_repository,
        build: build::<ZipClient>,
    },
];

fn build<C>(path: PathBuf) -> Arc<dyn VcsClient>
where
    C: VcsClient + From<PathBuf> + 'static,
{
    Arc::new(C::from(path))
}

/// First registered kind whose marker is present at `path`
pub fn detect_kind(path: &Path) -> Option<RepoKind> {
    REGISTRY
        .iter()
        .find(|registration| (registration.is_repository)(path))
        .map(|registration| registration.kind)
}

/// Build the adapter for `kind` at `path`, `None` for kinds without a client
pub fn client_for(kind: RepoKind, path: impl Into<PathBuf>) -> Option<Arc<dyn VcsClient>> {
    REGISTRY
        .iter()
        .find(|registration| registration.kind == kind)
        .map(|registration| (registration.build)(path.into()))
}
