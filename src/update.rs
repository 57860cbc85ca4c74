use serde::Deserialize;
use std::cmp::Ordering;
use std::fmt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::fetcher::{AsyncFetcher, FetchOutcome};
use crate::signal::Signal;

pub const GITHUB_RELEASES_URL: &str = "https://api.github.com/repos/dynobo/normcap/releases";
pub const PYPI_URL: &str = "https://pypi.org/pypi/normcap/json";

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct PypiProject {
    info: PypiInfo,
}

#[derive(Debug, Deserialize)]
struct PypiInfo {
    version: String,
}

/// Response bodies understood by the checker
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReleaseFeed {
    GithubReleases(Vec<GithubRelease>),
    GithubLatest(GithubRelease),
    Pypi(PypiProject),
}

/// Dotted numeric version; missing components count as zero
#[derive(Debug, Clone)]
pub struct Version(Vec<u64>);

impl Version {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().trim_start_matches('v');
        let parts = text
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            None
        } else {
            Some(Self(parts))
        }
    }

    fn component(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Newest stable version in a GitHub releases or PyPI JSON body.
///
/// Drafts and prereleases are skipped, as are tags that are not plain
/// dotted numbers (`1.0.0rc1`).
pub fn parse_newest_version(body: &str) -> Option<Version> {
    let feed: ReleaseFeed = match serde_json::from_str(body) {
        Ok(feed) => feed,
        Err(e) => {
            debug!("Unrecognised release feed: {}", e);
            return None;
        }
    };

    match feed {
        ReleaseFeed::GithubReleases(releases) => releases
            .iter()
            .filter(|r| !r.prerelease && !r.draft)
            .filter_map(|r| Version::parse(&r.tag_name))
            .max(),
        ReleaseFeed::GithubLatest(release) if !release.prerelease && !release.draft => {
            Version::parse(&release.tag_name)
        }
        ReleaseFeed::GithubLatest(_) => None,
        ReleaseFeed::Pypi(project) => Version::parse(&project.info.version),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Available(Version),
    UpToDate,
    Unknown,
}

/// Looks up the newest release and publishes an [`UpdateStatus`] per check.
pub struct UpdateChecker {
    url: String,
    current: Version,
    results: Signal<UpdateStatus>,
}

impl UpdateChecker {
    pub fn new(url: impl Into<String>, current: Version) -> Self {
        Self {
            url: url.into(),
            current,
            results: Signal::new(),
        }
    }

    pub fn for_running_version(url: impl Into<String>) -> Self {
        let current = Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or(Version(vec![0]));
        Self::new(url, current)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateStatus> {
        self.results.subscribe()
    }

    /// Each check downloads through its own fetcher, so concurrent checks
    /// never see each other's responses.
    pub fn check(&self) -> Result<JoinHandle<()>, FetchError> {
        let fetcher = AsyncFetcher::new()?;
        let mut outcomes = fetcher.subscribe();
        fetcher.fetch(&self.url)?;

        let current = self.current.clone();
        let results = self.results.clone();
        Ok(tokio::spawn(async move {
            let status = match outcomes.recv().await {
                Ok(FetchOutcome::Succeeded(body)) => evaluate(&body, &current),
                Ok(FetchOutcome::Failed) | Err(_) => UpdateStatus::Unknown,
            };
            match &status {
                UpdateStatus::Available(newest) => {
                    info!("Newer version available: {} (running {})", newest, current)
                }
                UpdateStatus::UpToDate => debug!("NormCap {} is up to date", current),
                UpdateStatus::Unknown => warn!("Could not determine newest version"),
            }
            results.emit(status);
        }))
    }
}

fn evaluate(body: &str, current: &Version) -> UpdateStatus {
    match parse_newest_version(body) {
        Some(newest) if newest > *current => UpdateStatus::Available(newest),
        Some(_) => UpdateStatus::UpToDate,
        None => UpdateStatus::Unknown,
    }
}
