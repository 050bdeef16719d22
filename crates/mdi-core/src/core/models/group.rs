use super::atom::AtomTag;
use std::collections::BTreeSet;

/// The set of atoms that driver-supplied external forces act on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AtomGroup {
    #[default]
    All,
    Tags(BTreeSet<AtomTag>),
}

impl AtomGroup {
    pub fn from_tags<I: IntoIterator<Item = u32>>(tags: I) -> Self {
        AtomGroup::Tags(tags.into_iter().map(AtomTag).collect())
    }

    #[inline]
    pub fn contains(&self, tag: AtomTag) -> bool {
        match self {
            AtomGroup::All => true,
            AtomGroup::Tags(tags) => tags.contains(&tag),
        }
    }
}
