use std::{
    collections::BTreeMap,
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

use serde_json::Value;
use tile_geometry::{BufferError, Document, Image, Mesh};

use crate::{
    builder::OutputBuilder,
    cluster::{cluster_mesh, ClusteredMesh, PrimitiveOrigin},
    metadata::{self, ElementTable},
    Anim4DRules, Generation, GroupResolver, ITwinMaterialId, MaterialRules, RuleSnapshot,
    RuleStore, TuneError,
};

/// Construction options of a [GltfTuner].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct TunerConfig {
    /// Cluster primitives even before any rules were set.
    ///
    /// If `false`, tuning without rules returns a copy of the input.
    pub tune_without_rules: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerState {
    /// No rules were ever set.
    Uninitialized,
    Configured,
    /// At least one tune is running.
    Tuning,
}

/// Called with the distinct iTwin materials of each tuned document's element table.
pub type MaterialObserver = Box<dyn Fn(&[ITwinMaterialId]) + Send + Sync>;

/// Re-partitions the primitives of glTF documents according to the current grouping rules.
///
/// A tuner is meant to be shared: rules may be replaced from one thread while others tune. Each
/// tune works on the rules in effect when it started; compare [Tuned::generation] with
/// [GltfTuner::generation] to find out whether a result is stale.
pub struct GltfTuner {
    config: TunerConfig,
    rules: RuleStore,
    in_flight: AtomicUsize,
    observer: Option<MaterialObserver>,
}

impl fmt::Debug for GltfTuner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GltfTuner")
            .field("config", &self.config)
            .field("rules", &self.rules)
            .field("in_flight", &self.in_flight)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for GltfTuner {
    fn default() -> Self {
        Self::new(TunerConfig::default())
    }
}

/// The result of [GltfTuner::tune].
#[derive(Debug, Clone, PartialEq)]
pub struct Tuned {
    pub document: Document,
    /// Generation of the rules the document was tuned with.
    pub generation: Generation,
    /// Origin of each output primitive, per mesh.
    pub parts: Vec<Vec<PrimitiveOrigin>>,
}

impl Tuned {
    fn unchanged(doc: &Document, generation: Generation) -> Self {
        Self {
            document: doc.clone(),
            generation,
            parts: doc
                .meshes
                .iter()
                .map(|m| (0..m.primitives.len()).map(PrimitiveOrigin::pass_through).collect())
                .collect(),
        }
    }

    /// Whether the rules of `tuner` changed since this document was tuned.
    #[inline]
    pub fn is_stale(&self, tuner: &GltfTuner) -> bool {
        self.generation != tuner.generation()
    }
}

struct InFlight<'t>(&'t AtomicUsize);

impl<'t> InFlight<'t> {
    fn enter(count: &'t AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self(count)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl GltfTuner {
    pub fn new(config: TunerConfig) -> Self {
        Self {
            config,
            rules: RuleStore::new(),
            in_flight: AtomicUsize::new(0),
            observer: None,
        }
    }

    #[inline]
    pub fn config(&self) -> TunerConfig {
        self.config
    }

    #[inline]
    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn set_material_info_observer(
        &mut self,
        observer: impl Fn(&[ITwinMaterialId]) + Send + Sync + 'static,
    ) {
        self.observer = Some(Box::new(observer));
    }

    pub fn with_material_info_observer(
        mut self,
        observer: impl Fn(&[ITwinMaterialId]) + Send + Sync + 'static,
    ) -> Self {
        self.set_material_info_observer(observer);
        self
    }

    /// Replace the material rules, returning the new generation.
    pub fn set_material_rules(&self, rules: MaterialRules) -> Generation {
        let groups = rules.groups.len();
        let generation = self.rules.set_material_rules(rules);
        tracing::debug!(generation, groups, "replaced material rules");
        generation
    }

    /// Replace the animation rules, returning the new generation.
    pub fn set_anim4d_rules(&self, rules: Anim4DRules) -> Generation {
        let groups = rules.groups.len();
        let generation = self.rules.set_anim4d_rules(rules);
        tracing::debug!(generation, groups, "replaced anim4d rules");
        generation
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.rules.generation()
    }

    #[inline]
    pub fn snapshot(&self) -> RuleSnapshot {
        self.rules.snapshot()
    }

    pub fn state(&self) -> TunerState {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            TunerState::Tuning
        } else if self.rules.is_configured() {
            TunerState::Configured
        } else {
            TunerState::Uninitialized
        }
    }

    /// Tune `doc` with the current rules.
    pub fn tune(&self, doc: &Document) -> Result<Tuned, TuneError> {
        let rules = self.rules.snapshot();
        self.tune_with(doc, &rules)
    }

    /// Tune `doc` with `rules`, ignoring the rules held by this tuner.
    ///
    /// `doc` is never modified. On error, nothing is returned; there is no partially tuned
    /// document.
    #[tracing::instrument(
        skip_all,
        fields(generation = rules.generation(), meshes = doc.meshes.len())
    )]
    pub fn tune_with(&self, doc: &Document, rules: &RuleSnapshot) -> Result<Tuned, TuneError> {
        let _in_flight = InFlight::enter(&self.in_flight);

        if !rules.is_configured() && !self.config.tune_without_rules {
            // a broken table must not fail a plain copy
            match ElementTable::read(doc) {
                Ok(elements) => self.observe(elements.as_ref()),
                Err(error) => tracing::warn!(%error, "cannot report materials"),
            }
            tracing::debug!("no rules yet; copying document");
            return Ok(Tuned::unchanged(doc, rules.generation()));
        }

        let elements = ElementTable::read(doc)?;
        self.observe(elements.as_ref());

        let resolver = GroupResolver::new(rules);
        let clustered = (0..doc.meshes.len())
            .map(|mesh| cluster_mesh(doc, mesh, &resolver, elements.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if clustered.iter().all(ClusteredMesh::is_pass_through) {
            tracing::debug!("no primitive carries element IDs; copying document");
            return Ok(Tuned::unchanged(doc, rules.generation()));
        }
        let mut out = OutputBuilder::new(doc);
        // metadata goes first so its views don't move when primitives change
        let structural_metadata = metadata::relocate(&mut out)?;

        let mut meshes = Vec::with_capacity(doc.meshes.len());
        let mut parts = Vec::with_capacity(doc.meshes.len());
        for (clustered, mesh) in clustered.iter().zip(&doc.meshes) {
            let (primitives, origins) = clustered.emit(&mut out, &resolver)?;
            tracing::debug!(
                mesh = clustered.mesh(),
                before = mesh.primitives.len(),
                after = primitives.len(),
                "tuned mesh"
            );
            meshes.push(Mesh {
                name: mesh.name.clone(),
                primitives,
                weights: mesh.weights.clone(),
            });
            parts.push(origins);
        }

        let images = carry_images(doc, &mut out)?;
        let opaque = carry_opaque(doc, &mut out)?;
        let packed = out.finish();
        Ok(Tuned {
            document: Document {
                buffers: packed.buffer.into_iter().collect(),
                buffer_views: packed.buffer_views,
                accessors: packed.accessors,
                meshes,
                materials: doc.materials.clone(),
                images,
                structural_metadata,
                opaque,
            },
            generation: rules.generation(),
            parts,
        })
    }

    fn observe(&self, elements: Option<&ElementTable>) {
        if let (Some(observer), Some(table)) = (&self.observer, elements) {
            if table.materials.is_some() {
                observer(&table.distinct_materials());
            }
        }
    }
}

fn carry_images(doc: &Document, out: &mut OutputBuilder<'_>) -> Result<Vec<Image>, TuneError> {
    let mut images = Vec::with_capacity(doc.images.len());
    for (index, image) in doc.images.iter().enumerate() {
        let mut image = image.clone();
        if let Some(view) = &mut image.buffer_view {
            *view = out.carry_view(*view).map_err(|e| match e {
                BufferError::MissingView(view) => TuneError::InvalidReference {
                    image: index,
                    view,
                },
                e => e.into(),
            })?;
        }
        images.push(image);
    }
    Ok(images)
}

/// Top-level properties which may refer to accessors.
const ACCESSOR_USERS: [&str; 3] = ["animations", "nodes", "skins"];

/// The accessor references within the top-level array `property`.
fn accessor_refs<'v>(property: &str, value: &'v mut Value) -> Vec<&'v mut Value> {
    let mut refs = Vec::new();
    let Some(items) = value.as_array_mut() else {
        return refs;
    };
    for item in items {
        match property {
            "nodes" => refs.extend(
                item.pointer_mut("/extensions/EXT_mesh_gpu_instancing/attributes")
                    .and_then(Value::as_object_mut)
                    .into_iter()
                    .flat_map(|attributes| attributes.values_mut()),
            ),
            "skins" => refs.extend(item.get_mut("inverseBindMatrices")),
            "animations" => {
                let samplers = item.get_mut("samplers").and_then(Value::as_array_mut);
                for sampler in samplers.into_iter().flatten() {
                    if let Some(sampler) = sampler.as_object_mut() {
                        refs.extend(
                            sampler
                                .iter_mut()
                                .filter(|(key, _)| *key == "input" || *key == "output")
                                .map(|(_, v)| v),
                        );
                    }
                }
            }
            _ => {}
        }
    }
    refs
}

/// Copy the accessors referenced from animations, skins and instanced nodes, returning the
/// top-level properties with their references rewritten.
fn carry_opaque(
    doc: &Document,
    out: &mut OutputBuilder<'_>,
) -> Result<BTreeMap<String, String>, TuneError> {
    let mut opaque = doc.opaque.clone();
    for property in ACCESSOR_USERS {
        let Some(raw) = opaque.get_mut(property) else {
            continue;
        };
        let mut value: Value = serde_json::from_str(raw)
            .map_err(|source| TuneError::OpaqueJson { property, source })?;
        let refs = accessor_refs(property, &mut value);
        if refs.is_empty() {
            continue;
        }
        let count = refs.len();
        for reference in refs {
            let accessor = reference
                .as_u64()
                .and_then(|a| usize::try_from(a).ok())
                .ok_or_else(|| TuneError::InvalidAccessorReference {
                    property,
                    value: reference.to_string(),
                })?;
            let carried = out
                .carry_accessor(accessor, None)
                .map_err(|source| TuneError::OpaqueAccessor { property, source })?;
            *reference = Value::from(carried);
        }
        tracing::trace!(property, count, "rewrote accessor references");
        *raw = value.to_string();
    }
    Ok(opaque)
}
