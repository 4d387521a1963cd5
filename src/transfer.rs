//! Profile export files.
//!
//! An export is a zip holding `export.r2x`, a YAML document with the profile name
//! and its mods. Imports also accept a `manifest.json` carrying the same shape,
//! and a bare `.r2x` document outside any archive. Share codes carry the same zip
//! as base64 text behind a `#r2modman` header line.

use crate::{
    package::{split_version_suffix, SemVer},
    profile::Profile,
};
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{Cursor, Read, Write},
    path::Path,
};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

pub const EXPORT_ENTRY: &str = "export.r2x";
pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const SHARE_HEADER: &str = "#r2modman";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileExport {
    pub profile_name: String,
    #[serde(default)]
    pub mods: Vec<ExportedMod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawExportedMod")]
pub struct ExportedMod {
    /// Version-free `namespace-name`.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<SemVer>,
    pub enabled: bool,
}

#[derive(Deserialize)]
struct RawExportedMod {
    name: String,
    #[serde(default)]
    version: Option<RawVersion>,
    #[serde(default = "enabled_default")]
    enabled: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Triple(SemVer),
    Text(String),
}

fn enabled_default() -> bool {
    true
}

impl From<RawExportedMod> for ExportedMod {
    fn from(raw: RawExportedMod) -> Self {
        let (base, suffix) = split_version_suffix(raw.name.trim());
        let declared = match raw.version {
            Some(RawVersion::Triple(version)) => Some(version),
            Some(RawVersion::Text(text)) => text.trim().parse().ok(),
            None => None,
        };
        Self {
            name: base.to_string(),
            version: declared.or(suffix),
            enabled: raw.enabled,
        }
    }
}

impl ExportedMod {
    /// `namespace-name-X.Y.Z` when the version is known.
    pub fn specifier(&self) -> String {
        match self.version {
            Some(version) => format!("{}-{}", self.name, version),
            None => self.name.clone(),
        }
    }
}

impl ProfileExport {
    pub fn from_profile(profile: &Profile) -> Self {
        let mods = profile
            .mods
            .iter()
            .map(|entry| ExportedMod {
                name: entry.base_name().to_string(),
                version: entry.version_number.parse().ok(),
                enabled: entry.enabled,
            })
            .collect();
        Self {
            profile_name: profile.name.clone(),
            mods,
        }
    }

    /// Mod names in export order. Repeats of a name (ignoring case) are dropped.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in &self.mods {
            if !names.iter().any(|name| name.eq_ignore_ascii_case(&entry.name)) {
                names.push(entry.name.clone());
            }
        }
        names
    }

    pub fn find(&self, name: &str) -> Option<&ExportedMod> {
        self.mods
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

/// The export archive for `profile`, built in memory.
pub fn export_bytes(profile: &Profile) -> Result<Vec<u8>> {
    let export = ProfileExport::from_profile(profile);
    let yaml = serde_yaml::to_string(&export).context("serialize profile export")?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer
        .start_file(EXPORT_ENTRY, options)
        .context("start export entry")?;
    writer
        .write_all(yaml.as_bytes())
        .context("write export entry")?;
    let cursor = writer.finish().context("finish export archive")?;
    Ok(cursor.into_inner())
}

pub fn write_export(profile: &Profile, path: &Path) -> Result<()> {
    let bytes = export_bytes(profile)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("create export dir")?;
    }
    fs::write(path, bytes).with_context(|| format!("write export {path:?}"))
}

pub fn read_export(path: &Path) -> Result<ProfileExport> {
    let bytes = fs::read(path).with_context(|| format!("read export {path:?}"))?;
    parse_export_bytes(&bytes).with_context(|| format!("parse export {path:?}"))
}

/// Parses an export archive, or a bare YAML document when the bytes are not a zip.
pub fn parse_export_bytes(bytes: &[u8]) -> Result<ProfileExport> {
    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(_) => {
            let text = std::str::from_utf8(bytes).context("decode export document")?;
            return parse_yaml(text);
        }
    };

    if let Some(text) = read_entry(&mut archive, EXPORT_ENTRY)? {
        return parse_yaml(&text);
    }
    if let Some(text) = read_entry(&mut archive, MANIFEST_ENTRY)? {
        return serde_json::from_str(&text).context("parse manifest.json");
    }
    bail!("archive contains neither {EXPORT_ENTRY} nor {MANIFEST_ENTRY}")
}

/// `#r2modman` followed by the base64 export archive on the next line.
pub fn encode_share(profile: &Profile) -> Result<String> {
    let bytes = export_bytes(profile)?;
    Ok(format!("{SHARE_HEADER}\n{}", STANDARD.encode(bytes)))
}

pub fn decode_share(payload: &str) -> Result<ProfileExport> {
    let Some(body) = payload.trim_start().strip_prefix(SHARE_HEADER) else {
        bail!("shared profile does not start with {SHARE_HEADER}");
    };
    let compact: String = body.split_whitespace().collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .context("decode shared profile base64")?;
    parse_export_bytes(&bytes)
}

fn parse_yaml(text: &str) -> Result<ProfileExport> {
    serde_yaml::from_str(text).context("parse export.r2x")
}

fn read_entry<R: std::io::Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err).context("zip entry"),
    };
    let mut text = String::new();
    file.read_to_string(&mut text)
        .with_context(|| format!("read {name}"))?;
    Ok(Some(text))
}
