use std::collections::{hash_map::Entry, HashMap, HashSet};

use crate::{Anim4DGroup, ElementId, MaterialGroup, RuleSnapshot};

/// Position of a group within [MaterialRules::groups](crate::MaterialRules::groups).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialGroupId(pub usize);

/// Position of a group within [Anim4DRules::groups](crate::Anim4DRules::groups).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Anim4DGroupId(pub usize);

/// Element lookups over one [RuleSnapshot].
///
/// Elements map to group *positions*, never to group contents, so groups with identical fields
/// stay apart. An element listed by several groups of the same table belongs to the first one.
#[derive(Debug)]
pub struct GroupResolver<'rules> {
    rules: &'rules RuleSnapshot,
    material: HashMap<ElementId, usize>,
    anim4d: HashMap<ElementId, usize>,
}

impl<'rules> GroupResolver<'rules> {
    #[tracing::instrument(level = "debug", skip_all, fields(generation = rules.generation()))]
    pub fn new(rules: &'rules RuleSnapshot) -> Self {
        let material = index_groups(
            "material",
            rules.material().groups.iter().map(|g: &MaterialGroup| &g.elements),
        );
        let anim4d = index_groups(
            "anim4d",
            rules.anim4d().groups.iter().map(|g: &Anim4DGroup| &g.elements),
        );
        Self {
            rules,
            material,
            anim4d,
        }
    }

    #[inline]
    pub fn rules(&self) -> &'rules RuleSnapshot {
        self.rules
    }

    /// Whether no element belongs to any group.
    pub fn is_empty(&self) -> bool {
        self.material.is_empty() && self.anim4d.is_empty()
    }

    #[inline]
    pub fn material_group_of(&self, element: ElementId) -> Option<MaterialGroupId> {
        self.material.get(&element).copied().map(MaterialGroupId)
    }

    #[inline]
    pub fn anim4d_group_of(&self, element: ElementId) -> Option<Anim4DGroupId> {
        self.anim4d.get(&element).copied().map(Anim4DGroupId)
    }

    /// # Panics
    ///
    /// * if `id` did not come from this resolver
    #[inline]
    pub fn material_group(&self, id: MaterialGroupId) -> &'rules MaterialGroup {
        &self.rules.material().groups[id.0]
    }

    /// # Panics
    ///
    /// * if `id` did not come from this resolver
    #[inline]
    pub fn anim4d_group(&self, id: Anim4DGroupId) -> &'rules Anim4DGroup {
        &self.rules.anim4d().groups[id.0]
    }

    /// Whether `element` must be kept apart from every other element.
    ///
    /// True when its material group carries an iTwin material listed in the split set. This wins
    /// over any merging its group would otherwise allow.
    pub fn should_always_split(&self, element: ElementId) -> bool {
        let split = &self.rules.material().split;
        !split.is_empty()
            && self
                .material_group_of(element)
                .and_then(|id| self.material_group(id).itwin_material_id)
                .is_some_and(|itwin| split.contains(&itwin))
    }
}

fn index_groups<'g>(
    table: &'static str,
    groups: impl Iterator<Item = &'g HashSet<ElementId>>,
) -> HashMap<ElementId, usize> {
    let mut index = HashMap::new();
    for (position, elements) in groups.enumerate() {
        for &element in elements {
            match index.entry(element) {
                Entry::Vacant(v) => {
                    v.insert(position);
                }
                Entry::Occupied(o) => tracing::warn!(
                    table,
                    element,
                    kept = *o.get(),
                    ignored = position,
                    "element belongs to several groups; keeping the first"
                ),
            }
        }
    }
    index
}
