//! Partitioning of a mesh's faces into output primitives.
//!
//! Every face of every primitive carrying an element channel gets a [ClusterKey]; faces with
//! equal keys end up in the same output primitive. Primitives without an element channel are
//! passed through as they are.

use std::collections::{BTreeMap, HashMap, HashSet};

use tile_geometry::{
    AccessorView, AttributeType, AttributeUsage, BufferTarget, ComponentType, Document,
    FeatureIdSet, Primitive,
};

use crate::{
    builder::{OutputBuilder, VertexLayout},
    metadata::ElementTable,
    normalize, Anim4DGroupId, Anim4DId, ElementId, GroupResolver, MaterialGroupId, MaterialIndex,
    PrimitiveRef, Topology, TuneError,
};

/// Binary layout of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeLayout {
    pub component_type: ComponentType,
    pub attribute_type: AttributeType,
    pub normalized: bool,
}

/// Everything of a feature ID set except its feature count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureIdLayout {
    pub attribute: Option<u32>,
    pub property_table: Option<usize>,
    pub null_feature_id: Option<u64>,
    pub label: Option<String>,
    pub texture: Option<String>,
}

impl From<&FeatureIdSet> for FeatureIdLayout {
    fn from(set: &FeatureIdSet) -> Self {
        Self {
            attribute: set.attribute,
            property_table: set.property_table,
            null_feature_id: set.null_feature_id,
            label: set.label.clone(),
            texture: set.texture.clone(),
        }
    }
}

/// The attributes of a primitive and their layouts, in semantic order.
///
/// Primitives with different signatures never share an output primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttributeSignature {
    pub attributes: Vec<(AttributeUsage, AttributeLayout)>,
    pub feature_ids: Vec<FeatureIdLayout>,
    /// Remaining primitive extensions, as raw JSON.
    pub extensions: BTreeMap<String, String>,
    pub extras: Option<String>,
}

impl AttributeSignature {
    /// Position of `usage` within [Self::attributes].
    pub fn slot(&self, usage: &AttributeUsage) -> Option<usize> {
        self.attributes.iter().position(|(u, _)| u == usage)
    }
}

/// Index of an [AttributeSignature] within a [ClusteredMesh].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureId(pub usize);

/// Faces with equal keys share an output primitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterKey {
    /// Set for elements which must not share a primitive with any other element.
    pub split: Option<ElementId>,
    pub material_group: Option<MaterialGroupId>,
    pub anim4d_group: Option<Anim4DGroupId>,
    /// The source primitive's material; `None` for grouped faces, whose group licenses mixing
    /// materials.
    pub material: Option<MaterialIndex>,
    pub topology: Topology,
    pub signature: SignatureId,
}

/// The faces gathered under one [ClusterKey].
#[derive(Debug, Clone)]
pub struct Cluster {
    pub key: ClusterKey,
    /// `(source, source vertex)` of each output vertex.
    pub vertices: Vec<(usize, u32)>,
    /// List-topology indices into [Self::vertices].
    pub indices: Vec<u32>,
    /// Contributing sources, in first-seen order.
    pub sources: Vec<usize>,
    remap: HashMap<(usize, u32), u32>,
    /// Exclusive bound of output vertex indices.
    limit: u32,
}

/// The largest index is the primitive restart value, so it never addresses a vertex.
const VERTEX_LIMIT: u32 = u32::MAX;

impl Cluster {
    fn new(key: ClusterKey) -> Self {
        Self {
            key,
            vertices: Vec::new(),
            indices: Vec::new(),
            sources: Vec::new(),
            remap: HashMap::new(),
            limit: VERTEX_LIMIT,
        }
    }

    /// Append a face, reusing vertices this cluster already took from the same source.
    ///
    /// Returns `None` once a new vertex could no longer be addressed by a 32-bit index.
    fn push_face(&mut self, source: usize, face: &[u32]) -> Option<()> {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
        for &v in face {
            let index = match self.remap.get(&(source, v)) {
                Some(&index) => index,
                None => {
                    let next = u32::try_from(self.vertices.len())
                        .ok()
                        .filter(|&next| next < self.limit)?;
                    self.vertices.push((source, v));
                    self.remap.insert((source, v), next);
                    next
                }
            };
            self.indices.push(index);
        }
        Some(())
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.indices.len() / self.key.topology.face_size()
    }
}

/// One output primitive of a mesh, before emission.
#[derive(Debug, Clone)]
pub enum MeshPart {
    /// Source primitive copied as is.
    PassThrough(usize),
    Cluster(Cluster),
}

/// Where an output primitive came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimitiveOrigin {
    /// Source primitives of the same mesh, in first-seen order.
    pub sources: Vec<usize>,
    pub material_group: Option<MaterialGroupId>,
    pub anim4d_group: Option<Anim4DGroupId>,
    /// What drives the animation of [Self::anim4d_group].
    pub anim4d_id: Option<Anim4DId>,
    /// The only element of a split primitive.
    pub split_element: Option<ElementId>,
}

impl PrimitiveOrigin {
    pub fn pass_through(primitive: usize) -> Self {
        Self {
            sources: vec![primitive],
            ..Default::default()
        }
    }
}

/// A source primitive which takes part in clustering.
#[derive(Debug)]
struct Source<'doc> {
    primitive: usize,
    /// Attribute accessors, in signature order.
    views: Vec<AccessorView<'doc>>,
    /// Whether each source accessor declared `min`/`max`.
    bounded: Vec<bool>,
    feature_ids: &'doc [FeatureIdSet],
    material: Option<MaterialIndex>,
}

impl<'doc> Source<'doc> {
    fn read(
        doc: &'doc Document,
        index: usize,
        primitive: &'doc Primitive,
        at: PrimitiveRef,
    ) -> Result<(Self, AttributeSignature), TuneError> {
        let position = primitive
            .position()
            .ok_or(TuneError::MissingPosition { at })?;
        let vertices = doc
            .accessor_view(position)
            .map_err(TuneError::accessor(at))?
            .len();
        let mut signature = AttributeSignature {
            attributes: Vec::with_capacity(primitive.attributes.len()),
            feature_ids: primitive.feature_ids.iter().map(Into::into).collect(),
            extensions: primitive.extensions.clone(),
            extras: primitive.extras.clone(),
        };
        let mut views = Vec::with_capacity(primitive.attributes.len());
        let mut bounded = Vec::with_capacity(primitive.attributes.len());
        for (usage, &accessor) in &primitive.attributes {
            let view = doc
                .accessor_view(accessor)
                .map_err(TuneError::accessor(at))?;
            if view.len() != vertices {
                return Err(TuneError::AttributeCountMismatch {
                    at,
                    attribute: usage.clone(),
                    expected: vertices,
                    actual: view.len(),
                });
            }
            signature.attributes.push((
                usage.clone(),
                AttributeLayout {
                    component_type: view.component_type(),
                    attribute_type: view.attribute_type(),
                    normalized: view.normalized(),
                },
            ));
            bounded.push(*usage == AttributeUsage::Position || doc.accessors[accessor].min.is_some());
            views.push(view);
        }
        let source = Self {
            primitive: index,
            views,
            bounded,
            feature_ids: &primitive.feature_ids,
            material: primitive.material,
        };
        Ok((source, signature))
    }
}

/// The clustering of one mesh.
#[derive(Debug)]
pub struct ClusteredMesh<'doc> {
    mesh: usize,
    parts: Vec<MeshPart>,
    signatures: Vec<AttributeSignature>,
    sources: Vec<Source<'doc>>,
}

/// The feature ID set of `primitive` which indexes the element table, if any.
fn element_channel(primitive: &Primitive, table: usize) -> Option<&FeatureIdSet> {
    primitive
        .feature_ids
        .iter()
        .find(|set| set.attribute.is_some() && set.property_table == Some(table))
}

/// Element of a face, looked up through the feature ID of its first vertex.
fn face_element(
    ids: &AccessorView<'_>,
    vertex: u32,
    null_feature_id: Option<u64>,
    table: &ElementTable,
) -> Option<ElementId> {
    let id = ids.scalar(vertex as usize);
    if id < 0.0 || id.fract() != 0.0 {
        return None;
    }
    let id = id as u64;
    if null_feature_id == Some(id) {
        return None;
    }
    table.element(id)
}

fn face_key(
    element: Option<ElementId>,
    resolver: &GroupResolver<'_>,
    source_material: Option<MaterialIndex>,
    topology: Topology,
    signature: SignatureId,
) -> ClusterKey {
    let Some(element) = element else {
        return ClusterKey {
            split: None,
            material_group: None,
            anim4d_group: None,
            material: source_material,
            topology,
            signature,
        };
    };
    let material_group = resolver.material_group_of(element);
    ClusterKey {
        split: resolver.should_always_split(element).then_some(element),
        material_group,
        anim4d_group: resolver.anim4d_group_of(element),
        material: match material_group {
            Some(_) => None,
            None => source_material,
        },
        topology,
        signature,
    }
}

/// Assign every face of mesh `mesh` to a cluster.
///
/// Parts come out in the order their first face (or pass-through primitive) was met.
#[tracing::instrument(level = "trace", skip(doc, resolver, elements))]
pub fn cluster_mesh<'doc>(
    doc: &'doc Document,
    mesh: usize,
    resolver: &GroupResolver<'_>,
    elements: Option<&ElementTable>,
) -> Result<ClusteredMesh<'doc>, TuneError> {
    let mut clustered = ClusteredMesh {
        mesh,
        parts: Vec::new(),
        signatures: Vec::new(),
        sources: Vec::new(),
    };
    let mut keys: HashMap<ClusterKey, usize> = HashMap::new();
    let primitives = &doc.meshes[mesh].primitives;
    // every primitive of a mesh must have the same morph targets
    let morphed = primitives.iter().any(|p| !p.targets.is_empty());
    if morphed {
        tracing::debug!(mesh, "mesh has morph targets; passing it through");
    }

    for (index, primitive) in primitives.iter().enumerate() {
        let at = PrimitiveRef::new(mesh, index);
        let Some((table, channel)) = elements
            .filter(|_| !morphed)
            .and_then(|t| element_channel(primitive, t.table).map(|c| (t, c)))
        else {
            clustered.parts.push(MeshPart::PassThrough(index));
            continue;
        };

        let normalized = normalize(doc, primitive, at)?;
        let (source, signature) = Source::read(doc, index, primitive, at)?;
        let signature_id = SignatureId(
            match clustered.signatures.iter().position(|s| *s == signature) {
                Some(i) => i,
                None => {
                    clustered.signatures.push(signature);
                    clustered.signatures.len() - 1
                }
            },
        );
        let attribute = channel.attribute.unwrap_or_default();
        let ids = clustered.signatures[signature_id.0]
            .slot(&AttributeUsage::FeatureId(attribute))
            .map(|slot| source.views[slot])
            .ok_or(TuneError::MissingFeatureIds { at, attribute })?;
        let source_slot = clustered.sources.len();
        clustered.sources.push(source);

        for face in normalized.faces() {
            let element = face_element(&ids, face[0], channel.null_feature_id, table);
            let key = face_key(
                element,
                resolver,
                primitive.material,
                normalized.topology,
                signature_id,
            );
            let part = match keys.get(&key) {
                Some(&part) => part,
                None => {
                    clustered.parts.push(MeshPart::Cluster(Cluster::new(key.clone())));
                    keys.insert(key, clustered.parts.len() - 1);
                    clustered.parts.len() - 1
                }
            };
            let MeshPart::Cluster(cluster) = &mut clustered.parts[part] else {
                unreachable!("cluster keys only index clusters")
            };
            cluster
                .push_face(source_slot, face)
                .ok_or_else(|| TuneError::TooManyVertices {
                    at,
                    vertices: cluster.vertex_count() + 1,
                })?;
        }
    }
    Ok(clustered)
}

impl<'doc> ClusteredMesh<'doc> {
    #[inline]
    pub fn mesh(&self) -> usize {
        self.mesh
    }

    #[inline]
    pub fn parts(&self) -> &[MeshPart] {
        &self.parts
    }

    #[inline]
    pub fn signature(&self, id: SignatureId) -> &AttributeSignature {
        &self.signatures[id.0]
    }

    /// Whether no primitive of the mesh took part in clustering.
    pub fn is_pass_through(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source primitive index of each source of `cluster`.
    pub fn source_primitives(&self, cluster: &Cluster) -> Vec<usize> {
        cluster
            .sources
            .iter()
            .map(|&s| self.sources[s].primitive)
            .collect()
    }

    /// Write every part into `out`, returning the new primitives and their origins.
    pub fn emit(
        &self,
        out: &mut OutputBuilder<'doc>,
        resolver: &GroupResolver<'_>,
    ) -> Result<(Vec<Primitive>, Vec<PrimitiveOrigin>), TuneError> {
        let mut primitives = Vec::with_capacity(self.parts.len());
        let mut origins = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            match part {
                MeshPart::PassThrough(index) => {
                    primitives.push(self.carry(out, *index)?);
                    origins.push(PrimitiveOrigin::pass_through(*index));
                }
                MeshPart::Cluster(cluster) => {
                    let material = self.material(cluster, resolver, out.source())?;
                    primitives.push(self.emit_cluster(out, cluster, material)?);
                    let key = &cluster.key;
                    origins.push(PrimitiveOrigin {
                        sources: self.source_primitives(cluster),
                        material_group: key.material_group,
                        anim4d_group: key.anim4d_group,
                        anim4d_id: key.anim4d_group.map(|g| resolver.anim4d_group(g).id),
                        split_element: key.split,
                    });
                }
            }
        }
        Ok((primitives, origins))
    }

    fn carry(&self, out: &mut OutputBuilder<'doc>, index: usize) -> Result<Primitive, TuneError> {
        let at = PrimitiveRef::new(self.mesh, index);
        let mut primitive = out.source().meshes[self.mesh].primitives[index].clone();
        for accessor in primitive.attributes.values_mut() {
            *accessor = out
                .carry_accessor(*accessor, Some(BufferTarget::Array))
                .map_err(TuneError::accessor(at))?;
        }
        if let Some(accessor) = &mut primitive.indices {
            *accessor = out
                .carry_accessor(*accessor, Some(BufferTarget::ElementArray))
                .map_err(TuneError::accessor(at))?;
        }
        for accessor in primitive.targets.iter_mut().flat_map(|t| t.values_mut()) {
            *accessor = out
                .carry_accessor(*accessor, Some(BufferTarget::Array))
                .map_err(TuneError::accessor(at))?;
        }
        Ok(primitive)
    }

    /// The material shared by every source of `cluster`, or, if the sources disagree, the
    /// material of its group.
    fn material(
        &self,
        cluster: &Cluster,
        resolver: &GroupResolver<'_>,
        doc: &Document,
    ) -> Result<Option<MaterialIndex>, TuneError> {
        let mut materials = cluster.sources.iter().map(|&s| self.sources[s].material);
        let first = materials.next().unwrap_or(cluster.key.material);
        if materials.all(|m| m == first) {
            return Ok(first);
        }
        let Some(id) = cluster.key.material_group else {
            return Ok(cluster.key.material);
        };
        let material = resolver.material_group(id).material;
        if material >= doc.materials.len() {
            return Err(TuneError::MaterialOutOfRange {
                group: id.0,
                material,
                available: doc.materials.len(),
            });
        }
        Ok(Some(material))
    }

    fn emit_cluster(
        &self,
        out: &mut OutputBuilder<'doc>,
        cluster: &Cluster,
        material: Option<MaterialIndex>,
    ) -> Result<Primitive, TuneError> {
        let signature = self.signature(cluster.key.signature);
        let mut attributes = BTreeMap::new();
        for (slot, (usage, layout)) in signature.attributes.iter().enumerate() {
            let element_size = layout.attribute_type.size_bytes(layout.component_type);
            let mut bytes = Vec::with_capacity(cluster.vertex_count() * element_size);
            for &(source, vertex) in &cluster.vertices {
                bytes.extend_from_slice(self.sources[source].views[slot].element(vertex as usize));
            }
            let accessor = out.push_vertices(
                &bytes,
                VertexLayout {
                    component_type: layout.component_type,
                    attribute_type: layout.attribute_type,
                    normalized: layout.normalized,
                    bounds: cluster
                        .sources
                        .iter()
                        .any(|&s| self.sources[s].bounded[slot]),
                },
            );
            attributes.insert(usage.clone(), accessor);
        }

        let indices = out.push_indices(&cluster.indices).ok_or_else(|| {
            let first = cluster.sources.first().map_or(0, |&s| self.sources[s].primitive);
            TuneError::TooManyVertices {
                at: PrimitiveRef::new(self.mesh, first),
                vertices: cluster.vertex_count(),
            }
        })?;

        let feature_ids = signature
            .feature_ids
            .iter()
            .enumerate()
            .map(|(i, layout)| FeatureIdSet {
                feature_count: self.feature_count(cluster, signature, i, layout),
                attribute: layout.attribute,
                property_table: layout.property_table,
                null_feature_id: layout.null_feature_id,
                label: layout.label.clone(),
                texture: layout.texture.clone(),
            })
            .collect();

        tracing::trace!(
            mesh = self.mesh,
            vertices = cluster.vertex_count(),
            faces = cluster.face_count(),
            sources = cluster.sources.len(),
            "emitted cluster"
        );
        Ok(Primitive {
            attributes,
            indices: Some(indices),
            mode: cluster.key.topology.mode().to_gltf(),
            material,
            feature_ids,
            targets: Vec::new(),
            extensions: signature.extensions.clone(),
            extras: signature.extras.clone(),
        })
    }

    /// Distinct non-null IDs of an attribute-backed set among the cluster's vertices; for other
    /// sets, the largest count declared by a source.
    fn feature_count(
        &self,
        cluster: &Cluster,
        signature: &AttributeSignature,
        set: usize,
        layout: &FeatureIdLayout,
    ) -> u64 {
        let slot = layout
            .attribute
            .and_then(|n| signature.slot(&AttributeUsage::FeatureId(n)));
        match slot {
            Some(slot) => {
                let null = layout.null_feature_id.map(|n| n as f64);
                let distinct: HashSet<u64> = cluster
                    .vertices
                    .iter()
                    .map(|&(source, vertex)| self.sources[source].views[slot].scalar(vertex as usize))
                    .filter(|&id| Some(id) != null)
                    .map(f64::to_bits)
                    .collect();
                distinct.len() as u64
            }
            None => cluster
                .sources
                .iter()
                .map(|&s| self.sources[s].feature_ids[set].feature_count)
                .max()
                .unwrap_or(0),
        }
    }
}
