//! Multi-phase topology catalog.
//!
//! The chip's six bucks can be strapped into one of nine phase-interleaved
//! groupings. A 4-bit configuration code read from the device at
//! initialization selects the grouping; the catalog here maps each code to
//! the set of bucks that remain independently addressable. Buck 0 is the
//! primary phase and appears in every entry.

use std::fmt;

use crate::error::{Error, Result};

/// Identifies one physical buck output (0-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuckId(usize);

impl BuckId {
    /// Number of physical bucks on the chip.
    pub const COUNT: usize = 6;

    /// Creates a buck id if the value is in range.
    pub const fn new(id: usize) -> Option<Self> {
        if id < Self::COUNT { Some(Self(id)) } else { None }
    }

    /// The buck's index, 0-5.
    pub const fn index(self) -> usize {
        self.0
    }

    /// All six buck ids in order.
    pub fn all() -> impl Iterator<Item = BuckId> {
        (0..Self::COUNT).map(BuckId)
    }
}

impl fmt::Display for BuckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buck{}", self.0)
    }
}

const B0: BuckId = BuckId(0);
const B1: BuckId = BuckId(1);
const B2: BuckId = BuckId(2);
const B3: BuckId = BuckId(3);
const B4: BuckId = BuckId(4);
const B5: BuckId = BuckId(5);

/// Catalog of valid phase configurations, indexed by configuration code.
/// Bucks not listed for an entry are slaved into another phase group and
/// must not be addressed.
static CATALOG: [&[BuckId]; 9] = [
    &[B0, B3, B5],
    &[B0, B1, B2, B3, B4, B5],
    &[B0, B2, B3, B4, B5],
    &[B0, B3, B4, B5],
    &[B0, B4, B5],
    &[B0, B5],
    &[B0],
    &[B0, B3],
    &[B0, B2, B3, B5],
];

/// One resolved phase configuration: the bucks that are independently
/// addressable under the detected hardware strapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTopology {
    code: u8,
    bucks: &'static [BuckId],
}

impl PhaseTopology {
    /// The configuration code this entry was resolved from.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Active bucks, in catalog order.
    pub fn bucks(&self) -> &'static [BuckId] {
        self.bucks
    }

    /// Number of active bucks.
    pub fn active_count(&self) -> usize {
        self.bucks.len()
    }

    /// Whether a buck participates in this configuration.
    pub fn contains(&self, id: BuckId) -> bool {
        self.bucks.contains(&id)
    }
}

/// Resolve a configuration code to its catalog entry.
///
/// Pure lookup. Codes 9-15 are undefined by the hardware and fail with
/// [`Error::InvalidConfiguration`].
pub fn resolve(code: u8) -> Result<PhaseTopology> {
    let bucks = CATALOG
        .get(code as usize)
        .copied()
        .ok_or(Error::InvalidConfiguration(code))?;
    Ok(PhaseTopology { code, bucks })
}
