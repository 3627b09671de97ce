//! System-CC remapping.
//!
//! Maps ordinary Control-Change numbers onto cross-voice roles (volume,
//! pan, detune) via an 8-bank table, one configured bank per role. A
//! 128-bit bitmap rejects uninvolved CC numbers before any scanning.
//! Configuration-time constant; the router consults it read-only.

use crate::config::MidiConfig;

pub const SYSTEM_CC_BANKS: usize = 8;
const SLOTS_PER_BANK: usize = 8;

/// CC number per (bank, slot). Bank 0 disables the role.
const SYSTEM_CC_TABLE: [[u8; SLOTS_PER_BANK]; SYSTEM_CC_BANKS] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [16, 17, 18, 19, 80, 81, 82, 83],
    [20, 21, 22, 23, 84, 85, 86, 87],
    [24, 25, 26, 27, 88, 89, 90, 91],
    [28, 29, 30, 31, 92, 93, 94, 95],
    [102, 103, 104, 105, 106, 107, 108, 109],
    [110, 111, 112, 113, 114, 115, 116, 117],
    [3, 9, 14, 15, 35, 41, 46, 47],
];

/// Cross-voice roles a remapped CC can drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CcRole {
    Volume,
    Pan,
    Detune,
}

const ROLES: [CcRole; 3] = [CcRole::Volume, CcRole::Pan, CcRole::Detune];

/// Resolved remap table plus fast-reject bitmap.
pub struct SystemCcMap {
    banks: [usize; 3],
    slot_count: usize,
    bitmap: u128,
}

impl SystemCcMap {
    pub fn new(config: &MidiConfig) -> Self {
        let banks = [
            config.system_cc_volume.min(SYSTEM_CC_BANKS - 1),
            config.system_cc_pan.min(SYSTEM_CC_BANKS - 1),
            config.system_cc_detune.min(SYSTEM_CC_BANKS - 1),
        ];
        let slot_count = config.slot_count.min(SLOTS_PER_BANK);

        let mut bitmap = 0u128;
        for &bank in &banks {
            if bank == 0 {
                continue;
            }
            for &cc in &SYSTEM_CC_TABLE[bank][..slot_count] {
                bitmap |= 1u128 << cc;
            }
        }

        Self {
            banks,
            slot_count,
            bitmap,
        }
    }

    /// True when no role is configured at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap == 0
    }

    /// Resolve a CC number to at most one (role, slot) pair.
    ///
    /// Bitmap reject first, then a role-major scan over the configured
    /// banks; the first match wins and scanning stops, so one message never
    /// drives more than one role.
    pub fn resolve(&self, cc: u8) -> Option<(CcRole, usize)> {
        if cc > 127 || self.bitmap & (1u128 << cc) == 0 {
            return None;
        }
        for (role_index, &role) in ROLES.iter().enumerate() {
            let bank = self.banks[role_index];
            if bank == 0 {
                continue;
            }
            for slot in 0..self.slot_count {
                if SYSTEM_CC_TABLE[bank][slot] == cc {
                    return Some((role, slot));
                }
            }
        }
        None
    }
}
