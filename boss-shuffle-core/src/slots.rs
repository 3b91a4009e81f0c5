use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::enemies::{EnemyId, EnemyRoster};
use crate::formations::{BattleMusic, EncounterFormation, EncounterPack, HpAggregation, PackId};
use crate::{Result, ShuffleError};

/// A fixed story location that always hosts a boss fight.
///
/// `music`, `can_flee` and `required_battlefield` describe the location and
/// never move with the pack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BossSlot {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub pack: PackId,
    #[serde(default)]
    pub music: BattleMusic,
    #[serde(default)]
    pub can_flee: bool,
    #[serde(default)]
    pub required_battlefield: Option<u8>,
    #[serde(default)]
    pub has_star_piece: bool,
    /// The one boss the player may skip entirely.
    #[serde(default)]
    pub optional: bool,
}

/// Everything the shuffle reads and writes.
#[derive(Clone, Debug, Default)]
pub struct World {
    pub slots: Vec<BossSlot>,
    pub roster: EnemyRoster,
    packs: Vec<EncounterPack>,
    pack_index: HashMap<PackId, usize>,
}

impl World {
    /// Builds a world and checks that every reference resolves.
    pub fn new(
        roster: EnemyRoster,
        packs: Vec<EncounterPack>,
        slots: Vec<BossSlot>,
    ) -> Result<World> {
        let mut pack_index = HashMap::new();
        for (idx, pack) in packs.iter().enumerate() {
            if pack_index.insert(pack.id, idx).is_some() {
                return Err(ShuffleError::Duplicate {
                    kind: "pack",
                    id: pack.id.0.to_string(),
                });
            }

            let count = pack.formations.len();
            if count == 0 || count > EncounterPack::MAX_FORMATIONS {
                return Err(ShuffleError::PackSize { pack: pack.id, count });
            }

            for formation in &pack.formations {
                for enemy in formation.referenced_enemies() {
                    if !roster.contains(enemy) {
                        return Err(ShuffleError::UnknownEnemy { enemy });
                    }
                }
                check_hp_mode(formation)?;
            }
        }

        let mut seen_slots = HashSet::new();
        let mut seen_occupants = HashSet::new();
        let mut optional_slot: Option<&str> = None;
        for slot in &slots {
            if !seen_slots.insert(slot.id.as_str()) {
                return Err(ShuffleError::Duplicate {
                    kind: "slot",
                    id: slot.id.clone(),
                });
            }
            if !pack_index.contains_key(&slot.pack) {
                return Err(ShuffleError::UnknownPack {
                    slot: slot.id.clone(),
                    pack: slot.pack,
                });
            }
            // Packs move as units; two slots sharing one would break the
            // permutation.
            if !seen_occupants.insert(slot.pack) {
                return Err(ShuffleError::Config(format!(
                    "{} occupies more than one slot (second: {})",
                    slot.pack, slot.id
                )));
            }
            if slot.optional {
                if let Some(first) = optional_slot {
                    return Err(ShuffleError::Config(format!(
                        "only one slot may be optional ('{}' and '{}')",
                        first, slot.id
                    )));
                }
                optional_slot = Some(slot.id.as_str());
            }
        }

        Ok(World {
            slots,
            packs,
            roster,
            pack_index,
        })
    }

    pub fn packs(&self) -> &[EncounterPack] {
        &self.packs
    }

    pub fn pack(&self, id: PackId) -> Option<&EncounterPack> {
        self.pack_index.get(&id).map(|&idx| &self.packs[idx])
    }

    pub fn pack_mut(&mut self, id: PackId) -> Option<&mut EncounterPack> {
        match self.pack_index.get(&id) {
            Some(&idx) => Some(&mut self.packs[idx]),
            None => None,
        }
    }

    pub fn slot(&self, id: &str) -> Option<&BossSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    /// Primary formation of a pack, or an error naming the slot that needs it.
    pub(crate) fn primary_formation(&self, slot: &str, pack: PackId) -> Result<&EncounterFormation> {
        self.pack(pack)
            .and_then(|p| p.primary())
            .ok_or_else(|| ShuffleError::UnknownPack {
                slot: slot.to_string(),
                pack,
            })
    }

    /// Display name of a pack's boss, taken from the first scaling member.
    pub fn boss_name(&self, pack: PackId) -> String {
        self.pack(pack)
            .and_then(|p| p.primary())
            .and_then(|f| f.scaling_members().first().copied())
            .and_then(|id| self.roster.get(id))
            .map(|p| p.name.clone())
            .unwrap_or_else(|| pack.to_string())
    }
}

fn check_hp_mode(formation: &EncounterFormation) -> Result<()> {
    if let HpAggregation::PrimaryEscort { primary, escorts } = &formation.hp_mode {
        let counted = formation.total_stat_members();
        if primary.is_empty() || !primary.iter().any(|id| counted.contains(id)) {
            return Err(ShuffleError::EscortModeMissingPrimary {
                formation: formation.id,
            });
        }
        if escorts.is_empty() || !escorts.iter().any(|id| counted.contains(id)) {
            return Err(ShuffleError::EscortModeMissingEscort {
                formation: formation.id,
            });
        }
    }
    Ok(())
}

/// Checks a formation that is about to be used as a budget source or a
/// donor. Runs before any profile is written.
pub(crate) fn check_shuffle_formation(
    slot: &str,
    formation: &EncounterFormation,
    roster: &EnemyRoster,
) -> Result<()> {
    if formation.scaling_members().is_empty() {
        return Err(ShuffleError::EmptyScalingMembers {
            slot: slot.to_string(),
        });
    }

    let counted = formation.total_stat_members();
    if counted.is_empty() {
        return Err(ShuffleError::EmptyTotalStatMembers {
            slot: slot.to_string(),
        });
    }

    let mut anchors: Vec<EnemyId> = Vec::new();
    for id in counted {
        if roster.profile(id)?.is_anchor && !anchors.contains(&id) {
            anchors.push(id);
        }
    }
    if anchors.len() > 1 {
        return Err(ShuffleError::MultipleAnchors {
            formation: formation.id,
            anchors,
        });
    }

    check_hp_mode(formation)
}
