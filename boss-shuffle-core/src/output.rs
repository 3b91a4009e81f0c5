use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::enemies::{EnemyStatProfile, Stat};
use crate::formations::EncounterPack;
use crate::shuffle::ShuffleReport;
use crate::slots::{BossSlot, World};
use crate::Result;

pub const SNAPSHOT_FILE: &str = "snapshot.json";
pub const SPOILER_LOG_FILE: &str = "spoiler_log.txt";

/// Read-only view of the final state handed to the patch emitter.
#[derive(Debug, Serialize)]
pub struct WorldSnapshot<'a> {
    pub seed: u64,
    pub slots: &'a [BossSlot],
    pub packs: &'a [EncounterPack],
    pub enemies: &'a [EnemyStatProfile],
}

impl<'a> WorldSnapshot<'a> {
    pub fn new(seed: u64, world: &'a World) -> Self {
        Self {
            seed,
            slots: &world.slots,
            packs: world.packs(),
            enemies: world.roster.as_slice(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn build_spoiler_log(seed: u64, world: &World, report: &ShuffleReport) -> String {
    let mut log = format!("Boss Shuffle seed: {}\n", seed);
    log.push_str(&format!(
        "boss slots: {} shuffled of {}\n",
        report.placements.len(),
        world.slots.len()
    ));

    log.push_str("placements:\n");
    for placement in &report.placements {
        let name = world
            .slot(&placement.slot)
            .map(|s| s.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(placement.slot.as_str());

        log.push_str(&format!(
            "  {}: {} -> {}",
            name,
            world.boss_name(placement.original),
            world.boss_name(placement.donor)
        ));
        if placement.original == placement.donor {
            log.push_str(" (unchanged)");
        }
        log.push('\n');

        if let Some(budget) = &placement.budget {
            log.push_str(&format!(
                "    budget: hp={} atk={} def={} matk={} mdef={} spd={} fp={} evd={} mevd={} xp={} coins={}\n",
                budget.stats.hp,
                budget.stats.attack,
                budget.stats.defense,
                budget.stats.magic_attack,
                budget.stats.magic_defense,
                budget.stats.speed,
                budget.stats.fp,
                budget.stats.evade,
                budget.stats.magic_evade,
                budget.xp,
                budget.coins,
            ));
        } else {
            log.push_str("    budget: n/a (stat scaling disabled)\n");
        }

        for fixup in &placement.fixups {
            log.push_str(&format!("    fixup: {}\n", fixup));
        }
    }

    log.push_str("rescaled enemies:\n");
    let mut listed = Vec::new();
    for placement in &report.placements {
        for id in &placement.rescaled {
            if listed.contains(id) {
                continue;
            }
            listed.push(*id);

            if let Some(profile) = world.roster.get(*id) {
                log.push_str(&format!("  {} {}:", id, profile.name));
                for stat in Stat::ALL {
                    log.push_str(&format!(" {}={}", stat.label(), profile.stats.get(stat)));
                }
                log.push_str(&format!(" xp={} coins={}\n", profile.xp, profile.coins));
            }
        }
    }
    if listed.is_empty() {
        log.push_str("  none\n");
    }

    log
}

/// Writes every `(name, contents)` pair into a deflated zip archive.
pub fn write_bundle(path: &Path, files: &[(&str, &str)]) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, contents) in files {
        zip.start_file(*name, options)?;
        zip.write_all(contents.as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}
