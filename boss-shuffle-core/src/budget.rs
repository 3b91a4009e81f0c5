use serde::Serialize;

use crate::enemies::{EnemyRoster, Stat, StatLine};
use crate::formations::{EncounterFormation, HpAggregation};
use crate::Result;

/// Target stat and reward envelope for whatever boss ends up in a slot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Budget {
    pub stats: StatLine,
    pub xp: u32,
    pub coins: u32,
}

/// Computes the budget a slot offers, from the formation that originally
/// occupied it. Reads profiles only.
pub fn compute_budget(formation: &EncounterFormation, roster: &EnemyRoster) -> Result<Budget> {
    let counted = formation.total_stat_members();
    let mut profiles = Vec::with_capacity(counted.len());
    for id in &counted {
        profiles.push(roster.profile(*id)?);
    }

    let mut budget = Budget::default();

    budget.stats.hp = match &formation.hp_mode {
        HpAggregation::Simple => saturating_sum(profiles.iter().map(|p| p.stats.hp)),
        HpAggregation::PrimaryEscort { escorts, .. } => {
            let mut primary_sum = 0u32;
            let mut escort_sum = 0u32;
            for p in &profiles {
                if escorts.contains(&p.id) {
                    escort_sum = escort_sum.saturating_add(p.stats.hp);
                } else {
                    primary_sum = primary_sum.saturating_add(p.stats.hp);
                }
            }
            primary_sum.saturating_add(escort_sum / 2)
        }
    };

    budget.xp = saturating_sum(profiles.iter().map(|p| p.xp));
    budget.coins = saturating_sum(profiles.iter().map(|p| p.coins));

    let anchor = profiles.iter().find(|p| p.is_anchor);
    for stat in Stat::ALL {
        if stat == Stat::Hp {
            continue;
        }

        let value = match anchor {
            Some(anchor) => anchor.stats.get(stat),
            None => mean_rounded(profiles.iter().map(|p| p.stats.get(stat))),
        };
        budget.stats.set(stat, value);
    }

    Ok(budget)
}

fn saturating_sum(values: impl Iterator<Item = u32>) -> u32 {
    values.fold(0u32, |acc, v| acc.saturating_add(v))
}

/// Arithmetic mean, ties rounded away from zero. Empty input gives 0.
fn mean_rounded(values: impl Iterator<Item = u32>) -> u32 {
    let mut sum = 0u64;
    let mut count = 0u64;
    for v in values {
        sum += v as u64;
        count += 1;
    }
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u32
}
