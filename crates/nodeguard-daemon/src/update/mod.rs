mod fetcher;
mod orchestrator;
mod release;
pub mod swap;

pub use fetcher::{ArchiveFetcher, CommandFetcher, UnconfiguredFetcher};
pub use orchestrator::{UpdateOrchestrator, UpdateOutcome};
pub use release::{
    is_newer_release, latest_stable, normalize_version, GithubReleases, Release,
    ReleaseSource,
};
