//! Scalar summary of the facility that shapes each invading party.

use serde::{Deserialize, Serialize};

use crate::facility::{FacilityLayout, Resource, ResourceLedger};
use crate::math::ratio_percent;

/// Which weight tables a profile pulls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileEmphasis {
    /// Corruption above threshold.
    pub corruption: bool,
    /// Wealth above threshold.
    pub wealth: bool,
    /// Knowledge above threshold.
    pub knowledge: bool,
}

impl ProfileEmphasis {
    /// No dimension stands out.
    #[must_use]
    pub const fn is_balanced(self) -> bool {
        !self.corruption && !self.wealth && !self.knowledge
    }
}

/// Facility profile, recomputed for every invasion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DungeonProfile {
    /// Corruption, 0-100.
    pub corruption: i32,
    /// Wealth, 0-100.
    pub wealth: i32,
    /// Knowledge, 0-100.
    pub knowledge: i32,
    /// Room count.
    pub size: u32,
    /// Threat, 0-100.
    pub threat_level: i32,
}

impl DungeonProfile {
    /// Create a profile, clamping the bounded dimensions.
    #[must_use]
    pub fn new(corruption: i32, wealth: i32, knowledge: i32, size: u32, threat_level: i32) -> Self {
        Self {
            corruption: corruption.clamp(0, 100),
            wealth: wealth.clamp(0, 100),
            knowledge: knowledge.clamp(0, 100),
            size,
            threat_level: threat_level.clamp(0, 100),
        }
    }

    /// Derive the profile from the facility's current state.
    ///
    /// Wealth and knowledge are gold and research as a share of their
    /// effective maxima. Threat grows with the day count and with every
    /// invasion the facility has repelled.
    #[must_use]
    pub fn compute(
        layout: &FacilityLayout,
        ledger: &impl ResourceLedger,
        day: u32,
        defender_victories: u32,
    ) -> Self {
        let corruption = ledger.level(Resource::Corruption).clamp(0, 100) as i32;
        let wealth = ratio_percent(
            ledger.level(Resource::Gold),
            ledger.maximum(Resource::Gold),
        );
        let knowledge = ratio_percent(
            ledger.level(Resource::Research),
            ledger.maximum(Resource::Research),
        );
        let threat = (day / 2).saturating_add(defender_victories.saturating_mul(5));
        Self::new(
            corruption,
            wealth,
            knowledge,
            layout.room_count() as u32,
            threat.min(100) as i32,
        )
    }

    /// Which dimensions exceed `threshold`.
    #[must_use]
    pub const fn emphasis(&self, threshold: i32) -> ProfileEmphasis {
        ProfileEmphasis {
            corruption: self.corruption > threshold,
            wealth: self.wealth > threshold,
            knowledge: self.knowledge > threshold,
        }
    }

    /// Party size bracket for this facility size, inclusive.
    #[must_use]
    pub const fn party_size_bracket(&self) -> (u32, u32) {
        match self.size {
            0..=10 => (3, 5),
            11..=25 => (6, 10),
            _ => (11, 15),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::StockLedger;

    #[test]
    fn test_size_brackets() {
        let bracket = |size| DungeonProfile::new(0, 0, 0, size, 0).party_size_bracket();
        assert_eq!(bracket(1), (3, 5));
        assert_eq!(bracket(10), (3, 5));
        assert_eq!(bracket(11), (6, 10));
        assert_eq!(bracket(25), (6, 10));
        assert_eq!(bracket(26), (11, 15));
    }

    #[test]
    fn test_emphasis_threshold_is_exclusive() {
        let profile = DungeonProfile::new(60, 61, 10, 5, 0);
        let emphasis = profile.emphasis(60);
        assert!(!emphasis.corruption);
        assert!(emphasis.wealth);
        assert!(!emphasis.knowledge);
        assert!(!emphasis.is_balanced());
        assert!(DungeonProfile::new(60, 60, 60, 5, 0).emphasis(60).is_balanced());
    }

    #[test]
    fn test_compute_from_ledger() {
        let layout = FacilityLayout::default();
        let ledger = StockLedger::new()
            .with(Resource::Gold, 700, 1000)
            .with(Resource::Research, 50, 200)
            .with(Resource::Corruption, 150, 500);
        let profile = DungeonProfile::compute(&layout, &ledger, 40, 3);
        assert_eq!(profile.wealth, 70);
        assert_eq!(profile.knowledge, 25);
        assert_eq!(profile.corruption, 100);
        assert_eq!(profile.threat_level, 35);
        assert_eq!(profile.size, 0);
    }

    #[test]
    fn test_new_clamps() {
        let profile = DungeonProfile::new(-5, 250, 50, 3, 120);
        assert_eq!(profile.corruption, 0);
        assert_eq!(profile.wealth, 100);
        assert_eq!(profile.threat_level, 100);
    }
}
