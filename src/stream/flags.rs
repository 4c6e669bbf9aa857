//! Recording-mode bitset (spec §4.6): `LOCAL` and `LOCAL_BY_EVENT` can both
//! be active for the same stream at once (e.g. continuous recording plus
//! event-triggered recording); the stream only truly stops recording once
//! neither mode wants it anymore.

use std::ops::{BitOr, BitOrAssign, Sub, SubAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordingMode(u8);

impl RecordingMode {
    pub const NONE: RecordingMode = RecordingMode(0);
    pub const LOCAL: RecordingMode = RecordingMode(1 << 0);
    pub const LOCAL_BY_EVENT: RecordingMode = RecordingMode(1 << 1);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: RecordingMode) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn intersects(self, other: RecordingMode) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for RecordingMode {
    type Output = RecordingMode;
    fn bitor(self, rhs: RecordingMode) -> RecordingMode {
        RecordingMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for RecordingMode {
    fn bitor_assign(&mut self, rhs: RecordingMode) {
        self.0 |= rhs.0;
    }
}

/// Remove `rhs`'s bits from `self` (`a &= ~b` in the original).
impl Sub for RecordingMode {
    type Output = RecordingMode;
    fn sub(self, rhs: RecordingMode) -> RecordingMode {
        RecordingMode(self.0 & !rhs.0)
    }
}

impl SubAssign for RecordingMode {
    fn sub_assign(&mut self, rhs: RecordingMode) {
        self.0 &= !rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combining_and_removing_modes() {
        let mut mode = RecordingMode::NONE;
        mode |= RecordingMode::LOCAL;
        mode |= RecordingMode::LOCAL_BY_EVENT;
        assert!(mode.contains(RecordingMode::LOCAL));
        assert!(mode.contains(RecordingMode::LOCAL_BY_EVENT));

        mode -= RecordingMode::LOCAL;
        assert!(!mode.contains(RecordingMode::LOCAL));
        assert!(mode.contains(RecordingMode::LOCAL_BY_EVENT));
        assert!(!mode.is_empty());

        mode -= RecordingMode::LOCAL_BY_EVENT;
        assert!(mode.is_empty());
    }
}
