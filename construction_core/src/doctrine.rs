use bitflags::bitflags;
use construction_schema::Faction;

use crate::orders::ConstructionOrderStatus;

bitflags! {
    /// Faction-specific rules for how builders relate to their buildings.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DoctrineFlags: u8 {
        /// A worker must stay with the building until it completes; a dead
        /// builder is replaced.
        const DEDICATED_BUILDER = 0b0000_0001;
        /// The worker is free to leave once the building has started.
        const RELEASES_BUILDER = 0b0000_0010;
        /// The worker turns into the building itself.
        const METAMORPHOSIS = 0b0000_0100;
    }
}

impl DoctrineFlags {
    pub fn for_faction(faction: Faction) -> Self {
        match faction {
            Faction::Terran => DoctrineFlags::DEDICATED_BUILDER,
            Faction::Protoss => DoctrineFlags::RELEASES_BUILDER,
            Faction::Zerg => DoctrineFlags::METAMORPHOSIS,
        }
    }

    /// Whether the builder of an order in `status` is still held by that order.
    pub fn holds_builder(&self, status: ConstructionOrderStatus) -> bool {
        !(self.contains(DoctrineFlags::RELEASES_BUILDER)
            && status == ConstructionOrderStatus::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_faction_maps_to_one_policy() {
        assert_eq!(
            DoctrineFlags::for_faction(Faction::Terran),
            DoctrineFlags::DEDICATED_BUILDER
        );
        assert_eq!(
            DoctrineFlags::for_faction(Faction::Protoss),
            DoctrineFlags::RELEASES_BUILDER
        );
        assert_eq!(
            DoctrineFlags::for_faction(Faction::Zerg),
            DoctrineFlags::METAMORPHOSIS
        );
    }

    #[test]
    fn only_releasing_doctrine_frees_in_progress_builders() {
        let protoss = DoctrineFlags::for_faction(Faction::Protoss);
        assert!(protoss.holds_builder(ConstructionOrderStatus::NotStarted));
        assert!(!protoss.holds_builder(ConstructionOrderStatus::InProgress));

        let terran = DoctrineFlags::for_faction(Faction::Terran);
        assert!(terran.holds_builder(ConstructionOrderStatus::InProgress));
    }
}
