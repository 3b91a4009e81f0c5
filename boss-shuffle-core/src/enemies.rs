use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Result, ShuffleError};

/// Stable species id as used by the catalog and the patch emitter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnemyId(pub u16);

impl std::fmt::Display for EnemyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:03X}", self.0)
    }
}

/// The nine combat axes that boss rescaling touches.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Stat {
    Hp,
    Speed,
    Attack,
    Defense,
    MagicAttack,
    MagicDefense,
    Fp,
    Evade,
    MagicEvade,
}

impl Stat {
    pub const ALL: [Stat; 9] = [
        Stat::Hp,
        Stat::Speed,
        Stat::Attack,
        Stat::Defense,
        Stat::MagicAttack,
        Stat::MagicDefense,
        Stat::Fp,
        Stat::Evade,
        Stat::MagicEvade,
    ];

    /// Inclusive range a rescaled value is clamped into. HP is bounded
    /// only by its 16-bit storage; evasion stats are percentages.
    pub fn clamp_range(self) -> (u32, u32) {
        match self {
            Stat::Hp => (0, 0xFFFF),
            Stat::Evade | Stat::MagicEvade => (0, 100),
            Stat::Speed
            | Stat::Attack
            | Stat::Defense
            | Stat::MagicAttack
            | Stat::MagicDefense
            | Stat::Fp => (0, 0xFF),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stat::Hp => "hp",
            Stat::Speed => "speed",
            Stat::Attack => "attack",
            Stat::Defense => "defense",
            Stat::MagicAttack => "magic_attack",
            Stat::MagicDefense => "magic_defense",
            Stat::Fp => "fp",
            Stat::Evade => "evade",
            Stat::MagicEvade => "magic_evade",
        }
    }
}

/// Current values for all nine axes. Shared by enemy profiles and budgets.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatLine {
    pub hp: u32,
    pub speed: u32,
    pub attack: u32,
    pub defense: u32,
    pub magic_attack: u32,
    pub magic_defense: u32,
    pub fp: u32,
    pub evade: u32,
    pub magic_evade: u32,
}

impl StatLine {
    pub fn get(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Hp => self.hp,
            Stat::Speed => self.speed,
            Stat::Attack => self.attack,
            Stat::Defense => self.defense,
            Stat::MagicAttack => self.magic_attack,
            Stat::MagicDefense => self.magic_defense,
            Stat::Fp => self.fp,
            Stat::Evade => self.evade,
            Stat::MagicEvade => self.magic_evade,
        }
    }

    pub fn set(&mut self, stat: Stat, value: u32) {
        let slot = match stat {
            Stat::Hp => &mut self.hp,
            Stat::Speed => &mut self.speed,
            Stat::Attack => &mut self.attack,
            Stat::Defense => &mut self.defense,
            Stat::MagicAttack => &mut self.magic_attack,
            Stat::MagicDefense => &mut self.magic_defense,
            Stat::Fp => &mut self.fp,
            Stat::Evade => &mut self.evade,
            Stat::MagicEvade => &mut self.magic_evade,
        };
        *slot = value;
    }
}

/// Per-axis coefficients relative to a slot budget. A species that is the
/// only scaling member of its fight usually carries 1.0 everywhere; helpers
/// and multi-part bosses split the budget between them.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingRatios {
    pub hp: f64,
    pub speed: f64,
    pub attack: f64,
    pub defense: f64,
    pub magic_attack: f64,
    pub magic_defense: f64,
    pub fp: f64,
    pub evade: f64,
    pub magic_evade: f64,
}

impl Default for ScalingRatios {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl ScalingRatios {
    pub fn uniform(ratio: f64) -> Self {
        Self {
            hp: ratio,
            speed: ratio,
            attack: ratio,
            defense: ratio,
            magic_attack: ratio,
            magic_defense: ratio,
            fp: ratio,
            evade: ratio,
            magic_evade: ratio,
        }
    }

    pub fn get(&self, stat: Stat) -> f64 {
        match stat {
            Stat::Hp => self.hp,
            Stat::Speed => self.speed,
            Stat::Attack => self.attack,
            Stat::Defense => self.defense,
            Stat::MagicAttack => self.magic_attack,
            Stat::MagicDefense => self.magic_defense,
            Stat::Fp => self.fp,
            Stat::Evade => self.evade,
            Stat::MagicEvade => self.magic_evade,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyStatProfile {
    pub id: EnemyId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub stats: StatLine,
    #[serde(default)]
    pub xp: u32,
    #[serde(default)]
    pub coins: u32,
    #[serde(default)]
    pub is_boss: bool,
    #[serde(default)]
    pub is_anchor: bool,
    #[serde(default)]
    pub death_immune: bool,
    /// Always fights as one of two copies that share a single reward.
    #[serde(default)]
    pub paired: bool,
    #[serde(default)]
    pub ratios: ScalingRatios,
}

/// Arena of every species profile in the world.
///
/// Formations only ever hold an [`EnemyId`]; all reads and writes go
/// through here, so a rescale done for one slot is seen by every other
/// formation naming the same species.
#[derive(Clone, Debug, Default)]
pub struct EnemyRoster {
    profiles: Vec<EnemyStatProfile>,
    by_id: HashMap<EnemyId, usize>,
}

impl EnemyRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile: EnemyStatProfile) -> Result<()> {
        for stat in Stat::ALL {
            let ratio = profile.ratios.get(stat);
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(ShuffleError::InvalidRatio {
                    enemy: profile.id,
                    stat: stat.label(),
                    ratio,
                });
            }
        }

        if self.by_id.contains_key(&profile.id) {
            return Err(ShuffleError::Duplicate {
                kind: "enemy",
                id: profile.id.to_string(),
            });
        }

        self.by_id.insert(profile.id, self.profiles.len());
        self.profiles.push(profile);
        Ok(())
    }

    pub fn get(&self, id: EnemyId) -> Option<&EnemyStatProfile> {
        self.by_id.get(&id).map(|&idx| &self.profiles[idx])
    }

    pub fn get_mut(&mut self, id: EnemyId) -> Option<&mut EnemyStatProfile> {
        match self.by_id.get(&id) {
            Some(&idx) => Some(&mut self.profiles[idx]),
            None => None,
        }
    }

    pub fn profile(&self, id: EnemyId) -> Result<&EnemyStatProfile> {
        self.get(id).ok_or(ShuffleError::UnknownEnemy { enemy: id })
    }

    pub fn profile_mut(&mut self, id: EnemyId) -> Result<&mut EnemyStatProfile> {
        self.get_mut(id).ok_or(ShuffleError::UnknownEnemy { enemy: id })
    }

    pub fn contains(&self, id: EnemyId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profiles in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &EnemyStatProfile> {
        self.profiles.iter()
    }

    pub(crate) fn as_slice(&self) -> &[EnemyStatProfile] {
        &self.profiles
    }
}

#[cfg(test)]
pub(crate) fn test_profile(id: u16, hp: u32, other: u32, xp: u32, coins: u32) -> EnemyStatProfile {
    EnemyStatProfile {
        id: EnemyId(id),
        name: format!("enemy {}", id),
        stats: StatLine {
            hp,
            speed: other,
            attack: other,
            defense: other,
            magic_attack: other,
            magic_defense: other,
            fp: other,
            evade: other.min(100),
            magic_evade: other.min(100),
        },
        xp,
        coins,
        is_boss: true,
        is_anchor: false,
        death_immune: false,
        paired: false,
        ratios: ScalingRatios::default(),
    }
}
