//! Grouping rules and the versioned store holding them.
//!
//! Rules are replaced wholesale. Readers never see a half-written table: [RuleStore::snapshot]
//! clones two [Arc]s and the generation under one short read lock, and the tune that took the
//! snapshot keeps using it no matter how many writes happen afterwards.

use std::{collections::HashSet, mem, sync::Arc};

use parking_lot::RwLock;

/// Opaque identifier of a logical scene object, shared by every face that belongs to it.
pub type ElementId = u64;

/// Index into [Document::materials](tile_geometry::Document::materials).
pub type MaterialIndex = usize;

/// Identifier assigned to a material by the material-property service.
pub type ITwinMaterialId = u64;

/// Version of the rules held by a [RuleStore]; bumped by every write.
pub type Generation = u64;

/// iTwin materials whose elements are always isolated in their own primitives.
pub type SplitSet = HashSet<ITwinMaterialId>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("an animation may be driven by 1 or 2 timelines, not {0}")]
    TimelineCount(usize),
}

/// Elements which may share one primitive even if their source materials differ.
///
/// Identity is positional: two groups with equal fields are still different groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MaterialGroup {
    pub elements: HashSet<ElementId>,
    /// The material every merged primitive of this group is rendered with.
    pub material: MaterialIndex,
    #[cfg_attr(feature = "serde", serde(default, rename = "itwinMaterialID"))]
    pub itwin_material_id: Option<ITwinMaterialId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MaterialRules {
    pub groups: Vec<MaterialGroup>,
    pub split: SplitSet,
}

impl MaterialRules {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.split.is_empty()
    }
}

/// One or two ordered timeline indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<u32>", into = "Vec<u32>")
)]
pub struct TimelineIndices {
    indices: [u32; 2],
    len: u8,
}

impl TimelineIndices {
    pub fn new(indices: &[u32]) -> Result<Self, RuleError> {
        match *indices {
            [a] => Ok(Self {
                indices: [a, 0],
                len: 1,
            }),
            [a, b] => Ok(Self {
                indices: [a, b],
                len: 2,
            }),
            _ => Err(RuleError::TimelineCount(indices.len())),
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.indices[..self.len as usize]
    }
}

impl TryFrom<Vec<u32>> for TimelineIndices {
    type Error = RuleError;

    fn try_from(value: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TimelineIndices> for Vec<u32> {
    fn from(value: TimelineIndices) -> Self {
        value.as_slice().to_vec()
    }
}

/// What drives the animation of an [Anim4DGroup].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Anim4DId {
    /// The animation targets this one element.
    Element(ElementId),
    /// The elements are driven by these transform timelines.
    Timelines(TimelineIndices),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Anim4DGroup {
    pub elements: HashSet<ElementId>,
    pub id: Anim4DId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Anim4DRules {
    pub groups: Vec<Anim4DGroup>,
}

impl Anim4DRules {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// An immutable, consistent view of both rule tables.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    material: Arc<MaterialRules>,
    anim4d: Arc<Anim4DRules>,
    generation: Generation,
    configured: bool,
}

impl RuleSnapshot {
    /// A standalone snapshot, for callers which manage rules themselves.
    ///
    /// Its generation is 0 and it counts as configured.
    pub fn new(material: MaterialRules, anim4d: Anim4DRules) -> Self {
        Self {
            material: Arc::new(material),
            anim4d: Arc::new(anim4d),
            generation: 0,
            configured: true,
        }
    }

    #[inline]
    pub fn material(&self) -> &MaterialRules {
        &self.material
    }

    #[inline]
    pub fn anim4d(&self) -> &Anim4DRules {
        &self.anim4d
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether any rule table was ever set.
    #[inline]
    pub fn is_configured(&self) -> bool {
        self.configured
    }
}

/// Versioned, thread-safe holder of the current [MaterialRules] and [Anim4DRules].
#[derive(Debug, Default)]
pub struct RuleStore {
    current: RwLock<RuleSnapshot>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the material rules, returning the new generation.
    pub fn set_material_rules(&self, rules: MaterialRules) -> Generation {
        let rules = Arc::new(rules);
        let (old, generation) = {
            let mut current = self.current.write();
            let old = mem::replace(&mut current.material, rules);
            (old, Self::bump(&mut current))
        };
        // the last reference to a large table may be released here, outside the lock
        drop(old);
        generation
    }

    /// Replace the animation rules, returning the new generation.
    pub fn set_anim4d_rules(&self, rules: Anim4DRules) -> Generation {
        let rules = Arc::new(rules);
        let (old, generation) = {
            let mut current = self.current.write();
            let old = mem::replace(&mut current.anim4d, rules);
            (old, Self::bump(&mut current))
        };
        drop(old);
        generation
    }

    fn bump(current: &mut RuleSnapshot) -> Generation {
        current.generation += 1;
        current.configured = true;
        current.generation
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.current.read().generation
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.current.read().configured
    }

    pub fn snapshot(&self) -> RuleSnapshot {
        self.current.read().clone()
    }
}
