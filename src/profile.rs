use crate::package::{split_version_suffix, Package, PackageIdentity, PackageVersion};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledModEntry {
    pub uuid4: String,
    /// Version-qualified name as installed, e.g. `Team-Mod-1.0.0`.
    pub full_name: String,
    pub version_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    pub enabled: bool,
}

impl InstalledModEntry {
    pub fn from_version(package: &Package, version: &PackageVersion) -> Self {
        let uuid4 = if version.uuid4.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            version.uuid4.clone()
        };
        Self {
            uuid4,
            full_name: version.full_name.clone(),
            version_number: version.version_number.clone(),
            icon_url: version.icon.clone(),
            enabled: true,
        }
        .with_fallback_name(package)
    }

    fn with_fallback_name(mut self, package: &Package) -> Self {
        if self.full_name.is_empty() {
            self.full_name = format!("{}-{}", package.full_name, self.version_number);
        }
        self
    }

    pub fn identity(&self) -> Option<PackageIdentity> {
        PackageIdentity::parse(self.base_name())
    }

    /// `namespace-name` without the version. Also the mod's directory name.
    pub fn base_name(&self) -> &str {
        split_version_suffix(&self.full_name).0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub game_identifier: String,
    #[serde(default)]
    pub mods: Vec<InstalledModEntry>,
    #[serde(default)]
    pub date_created: i64,
    #[serde(default)]
    pub last_used: i64,
}

impl Profile {
    pub fn new(name: &str, game_identifier: &str) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            game_identifier: game_identifier.to_string(),
            mods: Vec::new(),
            date_created: now,
            last_used: now,
        }
    }

    pub fn find_mod(&self, mod_id: &str) -> Option<&InstalledModEntry> {
        self.mods.iter().find(|entry| entry.uuid4 == mod_id)
    }

    /// Entry with the same `namespace-name`, whatever its version.
    pub fn find_by_identity(&self, identity: &PackageIdentity) -> Option<&InstalledModEntry> {
        self.mods
            .iter()
            .find(|entry| entry.identity().as_ref() == Some(identity))
    }

    pub fn is_installed(&self, identity: &PackageIdentity) -> bool {
        self.find_by_identity(identity).is_some()
    }

    pub fn enabled_mods(&self) -> impl Iterator<Item = &InstalledModEntry> {
        self.mods.iter().filter(|entry| entry.enabled)
    }

    pub fn touch(&mut self) {
        self.last_used = now_millis();
    }
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(full_name: &str, enabled: bool) -> InstalledModEntry {
        let (_, version) = split_version_suffix(full_name);
        InstalledModEntry {
            uuid4: full_name.to_string(),
            full_name: full_name.to_string(),
            version_number: version.map(|v| v.to_string()).unwrap_or_default(),
            icon_url: None,
            enabled,
        }
    }

    #[test]
    fn identity_match_ignores_version() {
        let mut profile = Profile::new("Main", "lethal-company");
        profile.mods.push(entry("Team-Mod-1.0.0", true));
        assert!(profile.is_installed(&PackageIdentity::new("Team", "Mod")));
        assert!(!profile.is_installed(&PackageIdentity::new("Team", "Mo")));
        assert!(!profile.is_installed(&PackageIdentity::new("Team", "Mod-Extra")));
    }

    #[test]
    fn enabled_mods_skip_disabled() {
        let mut profile = Profile::new("Main", "lethal-company");
        profile.mods.push(entry("A-One-1.0.0", true));
        profile.mods.push(entry("B-Two-1.0.0", false));
        let names: Vec<&str> = profile.enabled_mods().map(|m| m.base_name()).collect();
        assert_eq!(names, vec!["A-One"]);
    }

    #[test]
    fn serializes_camel_case() {
        let profile = Profile::new("Main", "lethal-company");
        let raw = serde_json::to_value(&profile).unwrap();
        assert!(raw.get("gameIdentifier").is_some());
        assert!(raw.get("dateCreated").is_some());
        assert!(raw.get("lastUsed").is_some());
    }
}
