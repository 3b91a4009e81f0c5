use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

pub mod budget;
pub mod catalog;
pub mod enemies;
mod fixups;
pub mod formations;
pub mod output;
pub mod shuffle;
pub mod slots;

pub use budget::{compute_budget, Budget};
pub use catalog::{load_catalog, sample_world, CatalogFile};
pub use enemies::{EnemyId, EnemyRoster, EnemyStatProfile, ScalingRatios, Stat, StatLine};
pub use formations::{BattleMusic, EncounterFormation, EncounterPack, HpAggregation, PackId};
pub use output::{build_spoiler_log, WorldSnapshot};
pub use shuffle::{apply_assignment, shuffle_bosses, ShuffleReport, SlotOutcome};
pub use slots::{BossSlot, World};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuffleSettings {
    pub seed: u64,
    /// Let the optional boss take part in the shuffle.
    pub include_optional_boss: bool,
    /// Move packs without touching any stats or rewards.
    pub disable_stat_scaling: bool,
    /// Also write the spoiler log.
    pub debug: bool,
    /// Also pack the outputs into a zip next to the output folder.
    pub export_bundle: bool,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum ShuffleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("slot '{slot}' has no scaling members")]
    EmptyScalingMembers { slot: String },
    #[error("slot '{slot}' has no total-stat members")]
    EmptyTotalStatMembers { slot: String },
    #[error("formation {formation} uses primary+escort HP but has no primary")]
    EscortModeMissingPrimary { formation: u16 },
    #[error("formation {formation} uses primary+escort HP but has no escort")]
    EscortModeMissingEscort { formation: u16 },
    #[error("formation {formation} has more than one anchor: {anchors:?}")]
    MultipleAnchors { formation: u16, anchors: Vec<EnemyId> },
    #[error("unknown enemy {enemy}")]
    UnknownEnemy { enemy: EnemyId },
    #[error("slot '{slot}' refers to unknown {pack}")]
    UnknownPack { slot: String, pack: PackId },
    #[error("{pack} has {count} formations (expected 1-3)")]
    PackSize { pack: PackId, count: usize },
    #[error("duplicate {kind} id {id}")]
    Duplicate { kind: &'static str, id: String },
    #[error("enemy {enemy} has invalid {stat} ratio {ratio}")]
    InvalidRatio {
        enemy: EnemyId,
        stat: &'static str,
        ratio: f64,
    },
    #[error("assignment is not a permutation: {0}")]
    NotAPermutation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ShuffleError>;

/// Loads the catalog, shuffles the bosses and writes the snapshot (and,
/// when asked, the spoiler log and zip bundle) under a per-seed folder.
/// Nothing is written unless the whole shuffle succeeds.
pub fn run(settings: ShuffleSettings) -> Result<PathBuf> {
    if !settings.input_path.exists() {
        return Err(ShuffleError::Config(format!(
            "Input path does not exist: {}",
            settings.input_path.display()
        )));
    }

    let mut world = load_catalog(&settings.input_path)?.into_world()?;
    let report = shuffle_bosses(&mut world, &settings)?;

    let snapshot = WorldSnapshot::new(settings.seed, &world).to_json()?;
    let spoiler = if settings.debug {
        Some(build_spoiler_log(settings.seed, &world, &report))
    } else {
        None
    };

    // Per-seed subfolder so repeated runs never collide.
    let out_root = settings
        .output_path
        .join(format!("BossShuffle_{}", settings.seed));
    if !out_root.exists() {
        fs::create_dir_all(&out_root)?;
    }

    fs::write(out_root.join(output::SNAPSHOT_FILE), &snapshot)?;
    if let Some(log) = &spoiler {
        fs::write(out_root.join(output::SPOILER_LOG_FILE), log)?;
    }

    if settings.export_bundle {
        let mut files = vec![(output::SNAPSHOT_FILE, snapshot.as_str())];
        if let Some(log) = &spoiler {
            files.push((output::SPOILER_LOG_FILE, log.as_str()));
        }
        let bundle_path = settings
            .output_path
            .join(format!("BossShuffle_{}.zip", settings.seed));
        output::write_bundle(&bundle_path, &files)?;
        info!("bundle written to {}", bundle_path.display());
    }

    info!(
        "seed {}: {} slots shuffled, output in {}",
        settings.seed,
        report.placements.len(),
        out_root.display()
    );

    Ok(out_root)
}
