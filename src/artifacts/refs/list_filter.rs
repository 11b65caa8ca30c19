use bitflags::bitflags;

bitflags! {
    /// Which references a listing includes, by where they are stored
    ///
    /// `LOCAL` and `REMOTE` select loose files outside and inside `refs/remotes/`;
    /// `PACKED` selects references only recorded in `packed-refs`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RefListFilter: u8 {
        const LOCAL = 0b001;
        const REMOTE = 0b010;
        const PACKED = 0b100;
        const ALL = Self::LOCAL.bits() | Self::REMOTE.bits() | Self::PACKED.bits();
    }
}

impl RefListFilter {
    pub fn accepts(&self, name: &str, packed: bool) -> bool {
        if packed {
            return self.contains(RefListFilter::PACKED);
        }

        if name.starts_with(crate::artifacts::refs::REMOTES_PREFIX) {
            self.contains(RefListFilter::REMOTE)
        } else {
            self.contains(RefListFilter::LOCAL)
        }
    }
}

impl Default for RefListFilter {
    fn default() -> Self {
        RefListFilter::ALL
    }
}
