use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;

use crate::budget::{compute_budget, Budget};
use crate::enemies::{EnemyId, Stat};
use crate::fixups::apply_fixups;
use crate::formations::PackId;
use crate::slots::{check_shuffle_formation, World};
use crate::{Result, ShuffleError, ShuffleSettings};

/// Salt mixed into the run seed so boss shuffling draws from its own stream.
pub const BOSS_SHUFFLE_SALT: u64 = 0xB055_5EED;

/// Outcome for a single eligible slot.
#[derive(Clone, Debug, Serialize)]
pub struct SlotOutcome {
    pub slot: String,
    pub original: PackId,
    pub donor: PackId,
    pub budget: Option<Budget>,
    pub rescaled: Vec<EnemyId>,
    pub fixups: Vec<&'static str>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ShuffleReport {
    pub placements: Vec<SlotOutcome>,
}

/// Indices of the slots taking part in the shuffle, in registry order.
pub fn eligible_slots(world: &World, include_optional_boss: bool) -> Vec<usize> {
    world
        .slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| include_optional_boss || !slot.optional)
        .map(|(idx, _)| idx)
        .collect()
}

/// Shuffles the given occupant list. Element `i` of the result is the donor
/// for eligible slot `i`.
pub fn generate_assignment<R: Rng + ?Sized>(originals: &[PackId], rng: &mut R) -> Vec<PackId> {
    let mut donors = originals.to_vec();
    donors.shuffle(rng);
    donors
}

/// Runs the whole boss shuffle for one seed.
pub fn shuffle_bosses(world: &mut World, settings: &ShuffleSettings) -> Result<ShuffleReport> {
    let eligible = eligible_slots(world, settings.include_optional_boss);
    let originals: Vec<PackId> = eligible.iter().map(|&idx| world.slots[idx].pack).collect();

    let mut rng = StdRng::seed_from_u64(settings.seed ^ BOSS_SHUFFLE_SALT);
    let donors = generate_assignment(&originals, &mut rng);

    info!(
        "shuffling {} of {} boss slots (seed {})",
        eligible.len(),
        world.slots.len(),
        settings.seed
    );

    apply_assignment(world, &eligible, &donors, !settings.disable_stat_scaling)
}

/// Places `donors[i]` into slot `eligible[i]` and rebalances it.
///
/// Every check runs before the first write, so a configuration error leaves
/// the world untouched.
pub fn apply_assignment(
    world: &mut World,
    eligible: &[usize],
    donors: &[PackId],
    scale_stats: bool,
) -> Result<ShuffleReport> {
    if eligible.len() != donors.len() {
        return Err(ShuffleError::NotAPermutation(format!(
            "{} slots but {} donors",
            eligible.len(),
            donors.len()
        )));
    }

    let mut originals = Vec::with_capacity(eligible.len());
    for &idx in eligible {
        let slot = world.slots.get(idx).ok_or_else(|| {
            ShuffleError::Config(format!("slot index {} out of range", idx))
        })?;
        originals.push(slot.pack);
    }

    let mut sorted_originals = originals.clone();
    let mut sorted_donors = donors.to_vec();
    sorted_originals.sort();
    sorted_donors.sort();
    if sorted_originals != sorted_donors {
        return Err(ShuffleError::NotAPermutation(
            "donor packs differ from the packs occupying the eligible slots".to_string(),
        ));
    }

    for (&idx, &pack) in eligible.iter().zip(originals.iter()) {
        let slot = &world.slots[idx].id;
        let formation = world.primary_formation(slot, pack)?;
        check_shuffle_formation(slot, formation, &world.roster)?;
    }

    // Budgets come from the vanilla occupants, so all of them are read
    // before any profile is rewritten.
    let budgets: Vec<Option<Budget>> = if scale_stats {
        let mut out = Vec::with_capacity(eligible.len());
        for (&idx, &pack) in eligible.iter().zip(originals.iter()) {
            let formation = world.primary_formation(&world.slots[idx].id, pack)?;
            out.push(Some(compute_budget(formation, &world.roster)?));
        }
        out
    } else {
        vec![None; eligible.len()]
    };

    let mut report = ShuffleReport::default();
    let mut rescaled_by: HashMap<EnemyId, String> = HashMap::new();

    for (i, &idx) in eligible.iter().enumerate() {
        let original = originals[i];
        let donor = donors[i];
        let slot_id = world.slots[idx].id.clone();

        let mut rescaled = Vec::new();
        if let Some(budget) = &budgets[i] {
            rescaled = redistribute(world, &slot_id, donor, budget)?;
            for id in &rescaled {
                if let Some(previous) = rescaled_by.insert(*id, slot_id.clone()) {
                    warn!(
                        "enemy {} rescaled for {} after {}; last write wins",
                        id, slot_id, previous
                    );
                }
            }
        }

        propagate_metadata(world, idx, donor);
        let fixups = apply_fixups(world, idx, original);

        debug!(
            "{}: {} -> {} ({} rescaled, fixups: {:?})",
            slot_id,
            world.boss_name(original),
            world.boss_name(donor),
            rescaled.len(),
            fixups
        );

        report.placements.push(SlotOutcome {
            slot: slot_id,
            original,
            donor,
            budget: budgets[i],
            rescaled,
            fixups,
        });
    }

    Ok(report)
}

/// Rewrites the donor's scaling members to fit `budget`. Returns the species
/// that were written, in order.
pub fn redistribute(
    world: &mut World,
    slot: &str,
    donor: PackId,
    budget: &Budget,
) -> Result<Vec<EnemyId>> {
    let scaling = world.primary_formation(slot, donor)?.scaling_members();

    for (position, &id) in scaling.iter().enumerate() {
        let profile = world.roster.profile_mut(id)?;

        for stat in Stat::ALL {
            let value = scale_stat(budget.stats.get(stat), profile.ratios.get(stat), stat);
            profile.stats.set(stat, value);
        }

        // One fight pays out once, however many species back it.
        if position == 0 {
            if profile.paired {
                profile.xp = half_rounded(budget.xp);
                profile.coins = half_rounded(budget.coins);
            } else {
                profile.xp = budget.xp;
                profile.coins = budget.coins;
            }
        } else {
            profile.xp = 0;
            profile.coins = 0;
        }
    }

    Ok(scaling)
}

fn scale_stat(budget: u32, ratio: f64, stat: Stat) -> u32 {
    let (lo, hi) = stat.clamp_range();
    let scaled = (budget as f64 * ratio).round();
    if scaled.is_nan() {
        return lo;
    }
    scaled.clamp(lo as f64, hi as f64) as u32
}

fn half_rounded(value: u32) -> u32 {
    (value as f64 / 2.0).round() as u32
}

/// Moves the donor into the slot and makes its formations present the way
/// the location does.
pub fn propagate_metadata(world: &mut World, slot_index: usize, donor: PackId) {
    world.slots[slot_index].pack = donor;

    let music = world.slots[slot_index].music;
    let can_flee = world.slots[slot_index].can_flee;
    let slot_battlefield = world.slots[slot_index].required_battlefield;

    if let Some(pack) = world.pack_mut(donor) {
        for formation in pack.formations.iter_mut() {
            formation.music = music;
            formation.can_flee = can_flee;
            formation.battlefield = formation.required_battlefield.or(slot_battlefield);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enemies::{test_profile, EnemyRoster, EnemyStatProfile, ScalingRatios};
    use crate::formations::{test_formation, BattleMusic, EncounterFormation, EncounterPack};
    use crate::slots::BossSlot;
    use std::collections::HashSet;

    fn slot(id: &str, pack: u16) -> BossSlot {
        BossSlot {
            id: id.to_string(),
            name: id.to_string(),
            pack: PackId(pack),
            music: BattleMusic::Boss,
            can_flee: false,
            required_battlefield: None,
            has_star_piece: false,
            optional: false,
        }
    }

    fn pack(id: u16, formation: EncounterFormation) -> EncounterPack {
        EncounterPack {
            id: PackId(id),
            formations: vec![formation],
        }
    }

    fn build(
        profiles: Vec<EnemyStatProfile>,
        packs: Vec<EncounterPack>,
        slots: Vec<BossSlot>,
    ) -> World {
        let mut roster = EnemyRoster::new();
        for p in profiles {
            roster.insert(p).unwrap();
        }
        World::new(roster, packs, slots).unwrap()
    }

    /// Slots A, B, C hosting PA (one anchored species), PB (two species
    /// averaging 40) and PC (a weak single enemy).
    fn abc_world() -> World {
        let mut a = test_profile(1, 100, 20, 10, 5);
        a.is_anchor = true;

        let mut b1 = test_profile(2, 200, 30, 20, 10);
        b1.ratios = ScalingRatios {
            hp: 0.5,
            attack: 1.5,
            ..ScalingRatios::default()
        };
        let mut b2 = test_profile(3, 200, 50, 20, 10);
        b2.ratios = ScalingRatios {
            hp: 0.25,
            ..ScalingRatios::default()
        };

        let c = test_profile(4, 10, 5, 1, 1);

        let mut slot_a = slot("a", 1);
        slot_a.music = BattleMusic::Midboss;
        slot_a.can_flee = true;
        slot_a.required_battlefield = Some(7);

        let mut pb = test_formation(20, &[2, 3]);
        pb.music = BattleMusic::Smithy;
        pb.can_flee = false;

        build(
            vec![a, b1, b2, c],
            vec![
                pack(1, test_formation(10, &[1])),
                pack(2, pb),
                pack(3, test_formation(30, &[4])),
            ],
            vec![slot_a, slot("b", 2), slot("c", 3)],
        )
    }

    #[test]
    fn eligibility_drops_optional_slot_and_keeps_order() {
        let mut world = abc_world();
        world.slots[1].optional = true;
        assert_eq!(eligible_slots(&world, false), vec![0, 2]);
        assert_eq!(eligible_slots(&world, true), vec![0, 1, 2]);
    }

    #[test]
    fn assignment_is_a_permutation_for_every_seed() {
        let originals: Vec<PackId> = (0..29).map(PackId).collect();
        for seed in 0..200u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let donors = generate_assignment(&originals, &mut rng);
            assert_eq!(donors.len(), originals.len());
            let unique: HashSet<PackId> = donors.iter().copied().collect();
            assert_eq!(unique.len(), originals.len());
            assert!(donors.iter().all(|d| originals.contains(d)));
        }
    }

    #[test]
    fn empty_assignment_is_fine() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_assignment(&[], &mut rng).is_empty());
    }

    #[test]
    fn same_seed_same_result() {
        let settings = ShuffleSettings {
            seed: 1234,
            ..ShuffleSettings::default()
        };
        let mut first = abc_world();
        let mut second = abc_world();
        shuffle_bosses(&mut first, &settings).unwrap();
        shuffle_bosses(&mut second, &settings).unwrap();
        assert_eq!(first.slots, second.slots);
        assert_eq!(
            first.roster.iter().collect::<Vec<_>>(),
            second.roster.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn end_to_end_abc() {
        let mut world = abc_world();
        let report = apply_assignment(
            &mut world,
            &[0, 1, 2],
            &[PackId(2), PackId(3), PackId(1)],
            true,
        )
        .unwrap();

        // Slot A's budget comes from PA: hp 100, anchor stats 20, xp 10, coins 5.
        let budget_a = report.placements[0].budget.unwrap();
        assert_eq!(budget_a.stats.hp, 100);
        assert_eq!(budget_a.stats.attack, 20);
        assert_eq!((budget_a.xp, budget_a.coins), (10, 5));

        // PB's budget (read before any write) is the mean of 30 and 50.
        let budget_b = report.placements[1].budget.unwrap();
        assert_eq!(budget_b.stats.hp, 400);
        assert_eq!(budget_b.stats.attack, 40);
        assert_eq!((budget_b.xp, budget_b.coins), (40, 20));

        let b1 = world.roster.profile(EnemyId(2)).unwrap();
        assert_eq!(b1.stats.hp, 50);
        assert_eq!(b1.stats.attack, 30);
        assert_eq!(b1.stats.defense, 20);
        assert_eq!((b1.xp, b1.coins), (10, 5));

        let b2 = world.roster.profile(EnemyId(3)).unwrap();
        assert_eq!(b2.stats.hp, 25);
        assert_eq!((b2.xp, b2.coins), (0, 0));

        // PA landed in C and takes C's tiny budget.
        let a = world.roster.profile(EnemyId(1)).unwrap();
        assert_eq!(a.stats.hp, 10);
        assert_eq!((a.xp, a.coins), (1, 1));

        // PC landed in B.
        let c = world.roster.profile(EnemyId(4)).unwrap();
        assert_eq!(c.stats.hp, 400);
        assert_eq!(c.stats.attack, 40);

        // Slot A keeps its own presentation.
        assert_eq!(world.slots[0].pack, PackId(2));
        assert_eq!(world.slots[0].music, BattleMusic::Midboss);
        assert!(world.slots[0].can_flee);
        let pb = &world.pack(PackId(2)).unwrap().formations[0];
        assert_eq!(pb.music, BattleMusic::Midboss);
        assert!(pb.can_flee);
        assert_eq!(pb.battlefield, Some(7));
    }

    #[test]
    fn metadata_follows_location_for_random_seeds() {
        for seed in 0..20u64 {
            let mut world = abc_world();
            let before: Vec<(BattleMusic, bool)> =
                world.slots.iter().map(|s| (s.music, s.can_flee)).collect();
            let settings = ShuffleSettings {
                seed,
                ..ShuffleSettings::default()
            };
            shuffle_bosses(&mut world, &settings).unwrap();
            for (slot, (music, can_flee)) in world.slots.iter().zip(before) {
                assert_eq!((slot.music, slot.can_flee), (music, can_flee));
                for f in &world.pack(slot.pack).unwrap().formations {
                    assert_eq!((f.music, f.can_flee), (music, can_flee));
                }
            }
        }
    }

    #[test]
    fn donor_battlefield_wins_over_slot() {
        let mut world = abc_world();
        world.pack_mut(PackId(2)).unwrap().formations[0].required_battlefield = Some(3);
        apply_assignment(&mut world, &[0, 1, 2], &[PackId(2), PackId(3), PackId(1)], false).unwrap();
        assert_eq!(world.pack(PackId(2)).unwrap().formations[0].battlefield, Some(3));
        // PA sits in C, which declares nothing.
        assert_eq!(world.pack(PackId(1)).unwrap().formations[0].battlefield, None);
    }

    #[test]
    fn fixup_battlefield_overrides_propagated_one() {
        let mut world = crate::catalog::sample_world().unwrap();
        let eligible: Vec<usize> = (0..7).collect();
        let mut donors: Vec<PackId> = eligible.iter().map(|&i| world.slots[i].pack).collect();
        // Bean Valley (pack 5) and Exor's Bridge (pack 7) trade places.
        donors.swap(4, 6);

        let report = apply_assignment(&mut world, &eligible, &donors, true).unwrap();

        let exor = &report.placements[6];
        assert_eq!(exor.donor, PackId(5));
        assert_eq!(exor.fixups, vec!["keep Exor battlefield"]);
        for formation in &world.pack(PackId(5)).unwrap().formations {
            assert_eq!(formation.battlefield, Some(crate::fixups::EXOR_BATTLEFIELD));
        }

        assert!(report.placements[4].fixups.is_empty());
        assert_eq!(world.pack(PackId(7)).unwrap().formations[0].battlefield, Some(46));
    }

    #[test]
    fn disabled_scaling_only_moves_packs() {
        let mut world = abc_world();
        let before: Vec<EnemyStatProfile> = world.roster.iter().cloned().collect();
        let report =
            apply_assignment(&mut world, &[0, 1, 2], &[PackId(3), PackId(1), PackId(2)], false)
                .unwrap();
        assert!(report.placements.iter().all(|p| p.budget.is_none()));
        assert_eq!(world.roster.iter().cloned().collect::<Vec<_>>(), before);
        assert_eq!(world.slots[0].pack, PackId(3));
    }

    #[test]
    fn paired_species_takes_half_reward() {
        let mut world = abc_world();
        world.roster.profile_mut(EnemyId(2)).unwrap().paired = true;
        world.roster.profile_mut(EnemyId(1)).unwrap().xp = 11;
        apply_assignment(&mut world, &[0, 1, 2], &[PackId(2), PackId(3), PackId(1)], true).unwrap();
        let b1 = world.roster.profile(EnemyId(2)).unwrap();
        // round(11 / 2) and round(5 / 2), ties away from zero.
        assert_eq!((b1.xp, b1.coins), (6, 3));
        assert_eq!(world.roster.profile(EnemyId(3)).unwrap().xp, 0);
    }

    #[test]
    fn reward_is_conserved_within_rounding() {
        for seed in 0..30u64 {
            let mut world = abc_world();
            let settings = ShuffleSettings {
                seed,
                ..ShuffleSettings::default()
            };
            let report = shuffle_bosses(&mut world, &settings).unwrap();
            for placement in &report.placements {
                let budget = placement.budget.unwrap();
                let xp: u32 = placement
                    .rescaled
                    .iter()
                    .map(|id| world.roster.profile(*id).unwrap().xp)
                    .sum();
                let coins: u32 = placement
                    .rescaled
                    .iter()
                    .map(|id| world.roster.profile(*id).unwrap().coins)
                    .sum();
                assert_eq!(xp, budget.xp);
                assert_eq!(coins, budget.coins);
            }
        }
    }

    #[test]
    fn clamps_hold_for_huge_budgets() {
        let mut world = abc_world();
        world.roster.profile_mut(EnemyId(2)).unwrap().ratios = ScalingRatios::uniform(3.0);
        let budget = Budget {
            stats: crate::enemies::StatLine {
                hp: u32::MAX,
                speed: u32::MAX,
                attack: u32::MAX,
                defense: u32::MAX,
                magic_attack: u32::MAX,
                magic_defense: u32::MAX,
                fp: u32::MAX,
                evade: u32::MAX,
                magic_evade: u32::MAX,
            },
            xp: 0,
            coins: 0,
        };
        redistribute(&mut world, "a", PackId(2), &budget).unwrap();
        let b1 = world.roster.profile(EnemyId(2)).unwrap();
        for stat in Stat::ALL {
            assert_eq!(b1.stats.get(stat), stat.clamp_range().1, "{:?}", stat);
        }
    }

    #[test]
    fn zero_ratio_floors_at_zero() {
        assert_eq!(scale_stat(500, 0.0, Stat::Attack), 0);
        assert_eq!(scale_stat(3, 0.5, Stat::Attack), 2);
        assert_eq!(scale_stat(200, 0.75, Stat::Evade), 100);
    }

    #[test]
    fn shared_species_last_assignment_wins() {
        // Species 5 backs both packs 1 and 2.
        let profiles = vec![
            test_profile(5, 100, 10, 10, 10),
            test_profile(6, 500, 10, 10, 10),
            test_profile(7, 900, 10, 10, 10),
        ];
        let mut f1 = test_formation(10, &[5]);
        f1.total_stat_members = Some(vec![EnemyId(6)]);
        let mut f2 = test_formation(20, &[5]);
        f2.total_stat_members = Some(vec![EnemyId(7)]);
        let mut world = build(
            profiles,
            vec![pack(1, f1), pack(2, f2)],
            vec![slot("x", 1), slot("y", 2)],
        );

        let report =
            apply_assignment(&mut world, &[0, 1], &[PackId(1), PackId(2)], true).unwrap();
        assert_eq!(report.placements[0].budget.unwrap().stats.hp, 500);
        assert_eq!(world.roster.profile(EnemyId(5)).unwrap().stats.hp, 900);
    }

    #[test]
    fn config_error_leaves_world_untouched() {
        let mut world = abc_world();
        world.pack_mut(PackId(3)).unwrap().formations[0].scaling_members = Some(vec![]);
        let before_slots = world.slots.clone();
        let before: Vec<EnemyStatProfile> = world.roster.iter().cloned().collect();

        let err = apply_assignment(&mut world, &[0, 1, 2], &[PackId(2), PackId(3), PackId(1)], true)
            .unwrap_err();
        assert!(matches!(err, ShuffleError::EmptyScalingMembers { ref slot } if slot == "c"));
        assert_eq!(world.slots, before_slots);
        assert_eq!(world.roster.iter().cloned().collect::<Vec<_>>(), before);
    }

    #[test]
    fn rejects_non_permutation() {
        let mut world = abc_world();
        let err = apply_assignment(&mut world, &[0, 1, 2], &[PackId(2), PackId(2), PackId(1)], true)
            .unwrap_err();
        assert!(matches!(err, ShuffleError::NotAPermutation(_)));
        assert_eq!(world.slots[0].pack, PackId(1));
    }
}
