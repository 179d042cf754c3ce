// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pseudo-classes and compact pseudo-class sets.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;

/// A pseudo-class such as `:hover`, identified by a small index.
///
/// The well-known pseudo-classes are available as associated constants; others
/// are registered through [`PseudoClassTable::intern`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PseudoClass(u16);

impl PseudoClass {
    /// `:hover`
    pub const HOVER: Self = Self(0);
    /// `:focused`
    pub const FOCUSED: Self = Self(1);
    /// `:pressed`
    pub const PRESSED: Self = Self(2);
    /// `:armed`
    pub const ARMED: Self = Self(3);
    /// `:disabled`
    pub const DISABLED: Self = Self(4);
    /// `:selected`
    pub const SELECTED: Self = Self(5);
    /// `:focus-visible`
    pub const FOCUS_VISIBLE: Self = Self(6);
    /// `:focus-within`
    pub const FOCUS_WITHIN: Self = Self(7);

    const WELL_KNOWN: [&'static str; 8] = [
        "hover",
        "focused",
        "pressed",
        "armed",
        "disabled",
        "selected",
        "focus-visible",
        "focus-within",
    ];

    /// Returns the index of this pseudo-class.
    pub const fn index(self) -> u16 {
        self.0
    }
}

/// Name registry for pseudo-classes.
///
/// Owned by the style manager so that custom pseudo-class names stay local to
/// one scene.
#[derive(Clone)]
pub struct PseudoClassTable {
    names: Vec<String>,
    by_name: HashMap<String, PseudoClass>,
}

impl Default for PseudoClassTable {
    fn default() -> Self {
        let mut table = Self {
            names: Vec::new(),
            by_name: HashMap::new(),
        };
        for name in PseudoClass::WELL_KNOWN {
            table.intern(name);
        }
        table
    }
}

impl fmt::Debug for PseudoClassTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PseudoClassTable")
            .field("len", &self.names.len())
            .finish_non_exhaustive()
    }
}

impl PseudoClassTable {
    /// Returns the pseudo-class for `name`, registering it if needed.
    ///
    /// Names are matched case-insensitively and may carry a leading `:`.
    pub fn intern(&mut self, name: &str) -> PseudoClass {
        let name = name.trim_start_matches(':').to_ascii_lowercase();
        if let Some(pc) = self.by_name.get(&name) {
            return *pc;
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "pseudo-class counts stay far below u16::MAX."
        )]
        let pc = PseudoClass(self.names.len() as u16);
        self.names.push(name.clone());
        self.by_name.insert(name, pc);
        pc
    }

    /// Looks up an already registered pseudo-class.
    pub fn get(&self, name: &str) -> Option<PseudoClass> {
        let name = name.trim_start_matches(':').to_ascii_lowercase();
        self.by_name.get(&name).copied()
    }

    /// Returns the registered name of `pc`.
    pub fn name(&self, pc: PseudoClass) -> Option<&str> {
        self.names.get(usize::from(pc.0)).map(String::as_str)
    }
}

/// A set of pseudo-classes stored as a bitset.
///
/// Trailing zero words are trimmed so that equal sets hash equally.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct PseudoClassSet {
    words: SmallVec<[u64; 1]>,
}

impl PseudoClassSet {
    /// The empty set, usable in statics.
    pub const EMPTY: Self = Self {
        words: SmallVec::new_const(),
    };

    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set containing the given pseudo-classes.
    pub fn from_slice(pcs: &[PseudoClass]) -> Self {
        let mut set = Self::new();
        for pc in pcs {
            set.insert(*pc);
        }
        set
    }

    fn locate(pc: PseudoClass) -> (usize, u64) {
        let idx = usize::from(pc.0);
        (idx / 64, 1_u64 << (idx % 64))
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }

    /// Adds `pc`; returns `true` if it was not present.
    pub fn insert(&mut self, pc: PseudoClass) -> bool {
        let (word, bit) = Self::locate(pc);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    /// Removes `pc`; returns `true` if it was present.
    pub fn remove(&mut self, pc: PseudoClass) -> bool {
        let (word, bit) = Self::locate(pc);
        let Some(w) = self.words.get_mut(word) else {
            return false;
        };
        let present = *w & bit != 0;
        *w &= !bit;
        self.trim();
        present
    }

    /// Returns `true` if `pc` is in the set.
    pub fn contains(&self, pc: PseudoClass) -> bool {
        let (word, bit) = Self::locate(pc);
        self.words.get(word).is_some_and(|w| w & bit != 0)
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of pseudo-classes in the set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns `true` if every member of `other` is also in `self`.
    pub fn contains_all(&self, other: &Self) -> bool {
        other
            .words
            .iter()
            .enumerate()
            .all(|(i, w)| self.words.get(i).copied().unwrap_or(0) & w == *w)
    }

    /// Adds every member of `other`.
    pub fn union_with(&mut self, other: &Self) {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (dst, src) in self.words.iter_mut().zip(other.words.iter()) {
            *dst |= *src;
        }
    }

    /// Returns the members present in both sets.
    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = Self {
            words: self
                .words
                .iter()
                .zip(other.words.iter())
                .map(|(a, b)| a & b)
                .collect(),
        };
        out.trim();
        out
    }

    /// Iterates over the members in index order.
    pub fn iter(&self) -> impl Iterator<Item = PseudoClass> + '_ {
        self.words.iter().enumerate().flat_map(|(i, w)| {
            (0..64_u16).filter_map(move |bit| {
                if w & (1_u64 << bit) == 0 {
                    return None;
                }
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "pseudo-class indices fit in u16."
                )]
                let base = (i * 64) as u16;
                Some(PseudoClass(base + bit))
            })
        })
    }
}

impl fmt::Debug for PseudoClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|pc| pc.0)).finish()
    }
}
