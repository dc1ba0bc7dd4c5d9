//! Parameter manifest and size-class selection
//!
//! The manifest is a JSON object mapping each parameter file name to its
//! CID, digest prefix and sector size. A copy is compiled into the crate.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::fetcher::core::Result;

/// Manifest bundled at build time
const EMBEDDED_MANIFEST: &str = include_str!("../../proof-params/parameters.json");

/// Suffix marking files that only apply to one sector size
pub const SIZE_SCOPED_SUFFIX: &str = ".params";

/// One required parameter file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamFile {
    pub name: String,
    /// Content identifier appended to the gateway URL
    pub cid: String,
    /// Hex of the first 16 bytes of the file's BLAKE2b-512 digest
    pub digest: String,
    pub sector_size: u64,
}

impl ParamFile {
    /// Whether this file is only needed for its own sector size
    pub fn is_size_scoped(&self) -> bool {
        self.name.ends_with(SIZE_SCOPED_SUFFIX)
    }

    /// Whether this file is required when proving with `sector_size`
    pub fn applies_to(&self, sector_size: u64) -> bool {
        !self.is_size_scoped() || self.sector_size == sector_size
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    cid: String,
    digest: String,
    sector_size: u64,
}

/// All known parameter files keyed by name
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    files: BTreeMap<String, ParamFile>,
}

impl Manifest {
    /// Load the manifest compiled into the crate
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_MANIFEST)
    }

    /// Parse a manifest document
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, ManifestEntry> = serde_json::from_str(json)?;
        let files = entries
            .into_iter()
            .map(|(name, entry)| {
                let file = ParamFile {
                    name: name.clone(),
                    cid: entry.cid,
                    digest: entry.digest,
                    sector_size: entry.sector_size,
                };
                (name, file)
            })
            .collect();
        Ok(Self { files })
    }

    pub fn from_entries<I: IntoIterator<Item = ParamFile>>(entries: I) -> Self {
        let files = entries
            .into_iter()
            .map(|file| (file.name.clone(), file))
            .collect();
        Self { files }
    }

    pub fn get(&self, name: &str) -> Option<&ParamFile> {
        self.files.get(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamFile> {
        self.files.values()
    }

    /// Files required for `sector_size`, sorted by name
    ///
    /// Size-independent files are always included; `.params` files only
    /// when their sector size matches exactly.
    pub fn select(&self, sector_size: u64) -> Vec<ParamFile> {
        self.files
            .values()
            .filter(|file| file.applies_to(sector_size))
            .cloned()
            .collect()
    }

    /// Distinct sector sizes that have size-scoped files
    pub fn sector_sizes(&self) -> Vec<u64> {
        let mut sizes: Vec<u64> = self
            .files
            .values()
            .filter(|file| file.is_size_scoped())
            .map(|file| file.sector_size)
            .collect();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }
}
