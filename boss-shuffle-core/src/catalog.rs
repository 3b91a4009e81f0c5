use flate2::read::GzDecoder;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

use crate::enemies::{EnemyRoster, EnemyStatProfile};
use crate::formations::EncounterPack;
use crate::slots::{BossSlot, World};
use crate::{Result, ShuffleError};

/// One catalog document. A catalog may be split across several files; any
/// section may be left out of any file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub enemies: Vec<EnemyStatProfile>,
    #[serde(default)]
    pub packs: Vec<EncounterPack>,
    #[serde(default)]
    pub slots: Vec<BossSlot>,
}

impl CatalogFile {
    pub fn from_json(text: &str) -> Result<CatalogFile> {
        Ok(serde_json::from_str(text)?)
    }

    /// Appends `other` after this file's entries. Duplicates are caught
    /// when the world is built.
    pub fn merge(&mut self, other: CatalogFile) {
        self.enemies.extend(other.enemies);
        self.packs.extend(other.packs);
        self.slots.extend(other.slots);
    }

    pub fn into_world(self) -> Result<World> {
        let mut roster = EnemyRoster::new();
        for profile in self.enemies {
            roster.insert(profile)?;
        }
        World::new(roster, self.packs, self.slots)
    }
}

fn is_catalog_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".json") || name.ends_with(".json.gz")
}

fn read_catalog_file(path: &Path) -> Result<CatalogFile> {
    let raw = fs::read(path)?;
    let is_gz = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    let text = if is_gz {
        let mut decoder = GzDecoder::new(raw.as_slice());
        let mut out = String::new();
        decoder.read_to_string(&mut out)?;
        out
    } else {
        String::from_utf8(raw).map_err(|_| {
            ShuffleError::Config(format!("{} is not valid UTF-8", path.display()))
        })?
    };

    serde_json::from_str(&text).map_err(|e| {
        ShuffleError::Config(format!("{}: {}", path.display(), e))
    })
}

/// Loads a catalog from a single `.json`/`.json.gz` file, or from every such
/// file below a directory, merged in file-name order.
pub fn load_catalog(path: &Path) -> Result<CatalogFile> {
    if !path.exists() {
        return Err(ShuffleError::Config(format!(
            "Catalog path does not exist: {}",
            path.display()
        )));
    }

    if path.is_file() {
        return read_catalog_file(path);
    }

    let mut catalog = CatalogFile::default();
    let mut files = 0usize;
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_catalog_file(entry.path()) {
            continue;
        }
        debug!("reading catalog file {}", entry.path().display());
        catalog.merge(read_catalog_file(entry.path())?);
        files += 1;
    }

    if files == 0 {
        return Err(ShuffleError::Config(format!(
            "No catalog files (*.json, *.json.gz) under {}",
            path.display()
        )));
    }

    info!(
        "catalog: {} files, {} enemies, {} packs, {} slots",
        files,
        catalog.enemies.len(),
        catalog.packs.len(),
        catalog.slots.len()
    );
    Ok(catalog)
}

/// Catalog shipped with the crate, covering a handful of boss slots.
pub const SAMPLE_CATALOG: &str = include_str!("../data/sample_catalog.json");

pub fn sample_world() -> Result<World> {
    CatalogFile::from_json(SAMPLE_CATALOG)?.into_world()
}
