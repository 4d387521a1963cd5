use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, str::FromStr};
use tracing::warn;

/// Loader pack every BepInEx game depends on. Never offered for removal.
pub const BOOTSTRAP_PACKAGE: &str = "BepInEx-BepInExPack";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub namespace: String,
    pub name: String,
}

impl PackageIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parses a version-free `namespace-name`. The namespace ends at the first hyphen.
    pub fn parse(full_name: &str) -> Option<Self> {
        let (namespace, name) = full_name.split_once('-')?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }

    pub fn full_name(&self) -> String {
        format!("{}-{}", self.namespace, self.name)
    }

    pub fn is_bootstrap(&self) -> bool {
        self.full_name() == BOOTSTRAP_PACKAGE
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.namespace, self.name)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for SemVer {
    type Err = ();

    /// Exactly three dot-separated unsigned integers.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.split('.');
        let mut next = || -> Result<u64, ()> {
            let part = parts.next().ok_or(())?;
            if part.is_empty() || !part.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(());
            }
            part.parse::<u64>().map_err(|_| ())
        };
        let version = SemVer::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(());
        }
        Ok(version)
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Splits a trailing `-X.Y.Z` off `raw`. Hyphens inside the namespace or name are
/// left alone; only a final segment made of three numeric components counts.
pub fn split_version_suffix(raw: &str) -> (&str, Option<SemVer>) {
    if let Some((head, tail)) = raw.rsplit_once('-') {
        if !head.is_empty() {
            if let Ok(version) = tail.parse::<SemVer>() {
                return (head, Some(version));
            }
        }
    }
    (raw, None)
}

/// `raw` with any trailing version removed.
pub fn strip_version(raw: &str) -> &str {
    split_version_suffix(raw).0
}

/// Decoded `namespace-name-major.minor.patch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencySpecifier {
    pub identity: PackageIdentity,
    pub version: Option<SemVer>,
}

impl DependencySpecifier {
    pub fn parse(raw: &str) -> Option<Self> {
        let (base, version) = split_version_suffix(raw.trim());
        let identity = PackageIdentity::parse(base)?;
        Some(Self { identity, version })
    }

    /// Parses every specifier, logging and dropping the malformed ones.
    pub fn parse_all<'a>(raws: impl IntoIterator<Item = &'a String>) -> Vec<Self> {
        raws.into_iter()
            .filter_map(|raw| {
                let parsed = Self::parse(raw);
                if parsed.is_none() {
                    warn!(specifier = %raw, "ignoring malformed dependency specifier");
                }
                parsed
            })
            .collect()
    }
}

impl fmt::Display for DependencySpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{}-{}", self.identity, version),
            None => write!(f, "{}", self.identity),
        }
    }
}

/// Package record as served by the community index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub full_name: String,
    pub owner: String,
    #[serde(default)]
    pub package_url: String,
    #[serde(default)]
    pub date_created: String,
    #[serde(default)]
    pub date_updated: String,
    #[serde(default)]
    pub uuid4: String,
    #[serde(default)]
    pub rating_score: i64,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub has_nsfw_content: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub versions: Vec<PackageVersion>,
}

impl Package {
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::parse(&self.full_name)
            .unwrap_or_else(|| PackageIdentity::new(self.owner.clone(), self.name.clone()))
    }

    /// Highest semantic version; unparsable version strings sort last.
    pub fn latest(&self) -> Option<&PackageVersion> {
        self.versions.iter().max_by(|a, b| match (a.semver(), b.semver()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        })
    }

    pub fn version(&self, version_number: &str) -> Option<&PackageVersion> {
        self.versions
            .iter()
            .find(|version| version.version_number == version_number)
    }

    /// The requested version when the index has it, otherwise the latest.
    pub fn version_or_latest(&self, version: Option<SemVer>) -> Option<&PackageVersion> {
        version
            .and_then(|wanted| {
                self.versions
                    .iter()
                    .find(|candidate| candidate.semver() == Some(wanted))
            })
            .or_else(|| self.latest())
    }

    pub fn total_downloads(&self) -> u64 {
        self.versions.iter().map(|version| version.downloads).sum()
    }

    pub fn is_modpack(&self) -> bool {
        self.categories.iter().any(|category| category == "Modpacks")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageVersion {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub version_number: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub download_url: String,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub date_created: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub uuid4: String,
}

impl PackageVersion {
    pub fn semver(&self) -> Option<SemVer> {
        self.version_number.parse().ok()
    }

    pub fn identity(&self) -> Option<PackageIdentity> {
        PackageIdentity::parse(strip_version(&self.full_name))
    }

    pub fn dependency_specifiers(&self) -> Vec<DependencySpecifier> {
        DependencySpecifier::parse_all(&self.dependencies)
    }
}
