use serde::{Deserialize, Serialize};

use crate::enemies::EnemyId;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackId(pub u16);

impl std::fmt::Display for PackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pack {}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleMusic {
    Normal,
    Boss,
    Midboss,
    Culex,
    Smithy,
    Silent,
}

impl Default for BattleMusic {
    fn default() -> Self {
        BattleMusic::Boss
    }
}

/// Sprite coordinates on the battlefield.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: u8,
    pub y: u8,
}

impl Placement {
    /// Coordinates outside the drawable battlefield. A member parked here is
    /// still loaded but never rendered.
    pub const OFFSCREEN: Placement = Placement { x: 0xFF, y: 0xFF };
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FormationMember {
    pub position: u8,
    pub enemy: EnemyId,
    #[serde(flatten)]
    pub placement: Placement,
}

/// How a formation's HP budget is aggregated. Chosen per formation by the
/// catalog author, never from the enemy types involved.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HpAggregation {
    /// Sum of every total-stat member.
    Simple,
    /// Escorts are optional to defeat, so only half their HP counts.
    PrimaryEscort {
        primary: Vec<EnemyId>,
        escorts: Vec<EnemyId>,
    },
}

impl Default for HpAggregation {
    fn default() -> Self {
        HpAggregation::Simple
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncounterFormation {
    pub id: u16,
    pub members: Vec<FormationMember>,
    /// Replaces the member list when counting the slot budget, e.g. to add
    /// copies spawned mid-fight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_stat_members: Option<Vec<EnemyId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_members: Option<Vec<EnemyId>>,
    #[serde(default)]
    pub hp_mode: HpAggregation,
    #[serde(default)]
    pub required_battlefield: Option<u8>,

    // Presentation state. The catalog gives the vanilla values; the shuffle
    // overwrites them with those of whichever slot ends up hosting the pack.
    #[serde(default)]
    pub music: BattleMusic,
    #[serde(default)]
    pub can_flee: bool,
    #[serde(default)]
    pub battlefield: Option<u8>,
}

impl EncounterFormation {
    pub fn member_ids(&self) -> impl Iterator<Item = EnemyId> + '_ {
        self.members.iter().map(|m| m.enemy)
    }

    /// Every instance counted toward a slot budget, duplicates included.
    pub fn total_stat_members(&self) -> Vec<EnemyId> {
        match &self.total_stat_members {
            Some(list) => list.clone(),
            None => self.member_ids().collect(),
        }
    }

    /// Unique species rewritten when this formation is moved, in priority
    /// order. The first entry carries the fight's reward.
    pub fn scaling_members(&self) -> Vec<EnemyId> {
        if let Some(list) = &self.scaling_members {
            return list.clone();
        }

        let mut out: Vec<EnemyId> = Vec::new();
        for id in self.member_ids() {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    /// Every enemy id this formation refers to, in any role.
    pub(crate) fn referenced_enemies(&self) -> Vec<EnemyId> {
        let mut ids: Vec<EnemyId> = self.member_ids().collect();
        if let Some(list) = &self.total_stat_members {
            ids.extend(list.iter().copied());
        }
        if let Some(list) = &self.scaling_members {
            ids.extend(list.iter().copied());
        }
        if let HpAggregation::PrimaryEscort { primary, escorts } = &self.hp_mode {
            ids.extend(primary.iter().copied());
            ids.extend(escorts.iter().copied());
        }
        ids
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncounterPack {
    pub id: PackId,
    pub formations: Vec<EncounterFormation>,
}

impl EncounterPack {
    pub const MAX_FORMATIONS: usize = 3;

    /// The formation whose members are counted and rescaled.
    pub fn primary(&self) -> Option<&EncounterFormation> {
        self.formations.first()
    }
}

#[cfg(test)]
pub(crate) fn test_formation(id: u16, enemies: &[u16]) -> EncounterFormation {
    EncounterFormation {
        id,
        members: enemies
            .iter()
            .enumerate()
            .map(|(i, &e)| FormationMember {
                position: i as u8,
                enemy: EnemyId(e),
                placement: Placement {
                    x: 160 + 16 * i as u8,
                    y: 100,
                },
            })
            .collect(),
        total_stat_members: None,
        scaling_members: None,
        hp_mode: HpAggregation::Simple,
        required_battlefield: None,
        music: BattleMusic::Boss,
        can_flee: false,
        battlefield: None,
    }
}
