use crate::enemies::EnemyId;
use crate::formations::{PackId, Placement};
use crate::slots::World;

pub(crate) const BOB_OMB: EnemyId = EnemyId(0x105);

pub(crate) const EXOR_BATTLEFIELD: u8 = 0x2E;
pub(crate) const CULEX_BATTLEFIELD: u8 = 0x36;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum FixupAction {
    /// Park every copy of a helper outside the drawable battlefield.
    HideMember { enemy: EnemyId },
    /// Override the battlefield of every formation in the slot.
    ForceBattlefield(u8),
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct BossFixup {
    pub slot: &'static str,
    pub donor_is_original: bool,
    pub label: &'static str,
    pub action: FixupAction,
}

pub(crate) const BOSS_FIXUPS: &[BossFixup] = &[
    // A visible Bob-omb in the sewers sets the pipe-vault flag.
    BossFixup {
        slot: "kero_sewers",
        donor_is_original: false,
        label: "hide Bob-omb helper",
        action: FixupAction::HideMember { enemy: BOB_OMB },
    },
    // The bridge cutscene after the fight reloads this backdrop.
    BossFixup {
        slot: "exor_bridge",
        donor_is_original: false,
        label: "keep Exor battlefield",
        action: FixupAction::ForceBattlefield(EXOR_BATTLEFIELD),
    },
    BossFixup {
        slot: "monstro_town",
        donor_is_original: false,
        label: "keep Culex battlefield",
        action: FixupAction::ForceBattlefield(CULEX_BATTLEFIELD),
    },
];

pub(crate) fn fixups_for(
    slot: &str,
    donor_is_original: bool,
) -> impl Iterator<Item = &'static BossFixup> + '_ {
    BOSS_FIXUPS
        .iter()
        .filter(move |f| f.slot == slot && f.donor_is_original == donor_is_original)
}

/// Applies the table entries for one slot to the pack now occupying it.
/// Returns the labels of the entries that changed something.
pub(crate) fn apply_fixups(
    world: &mut World,
    slot_index: usize,
    original: PackId,
) -> Vec<&'static str> {
    let slot_id = world.slots[slot_index].id.clone();
    let donor = world.slots[slot_index].pack;
    let donor_is_original = donor == original;

    let mut applied = Vec::new();
    let Some(pack) = world.pack_mut(donor) else {
        return applied;
    };

    for fixup in fixups_for(&slot_id, donor_is_original) {
        let mut changed = false;
        for formation in pack.formations.iter_mut() {
            match fixup.action {
                FixupAction::HideMember { enemy } => {
                    for member in formation.members.iter_mut().filter(|m| m.enemy == enemy) {
                        member.placement = Placement::OFFSCREEN;
                        changed = true;
                    }
                }
                FixupAction::ForceBattlefield(battlefield) => {
                    formation.battlefield = Some(battlefield);
                    changed = true;
                }
            }
        }
        if changed {
            applied.push(fixup.label);
        }
    }

    applied
}
