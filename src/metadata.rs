//! Element lookups and relocation of `EXT_structural_metadata` property tables.

use std::collections::HashSet;

use tile_geometry::{
    Document, MetadataComponent, MetadataError, PropertyTableProperty, StructuralMetadata,
};

use crate::{builder::OutputBuilder, ElementId, ITwinMaterialId, TuneError};

/// Class of the property table mapping feature IDs to elements.
pub const ELEMENT_CLASS: &str = "element";
/// Column of the element table holding [ElementId]s.
pub const ELEMENT_PROPERTY: &str = "element";
/// Optional column of the element table holding each element's iTwin material.
pub const MATERIAL_PROPERTY: &str = "material";

/// The decoded element table of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTable {
    /// Index of the table within the document's property tables.
    pub table: usize,
    /// Element of each feature ID.
    pub elements: Vec<ElementId>,
    /// iTwin material of each feature ID, if the table has such a column.
    pub materials: Option<Vec<ITwinMaterialId>>,
}

impl ElementTable {
    /// Decode the first table of class [ELEMENT_CLASS], if any.
    pub fn read(doc: &Document) -> Result<Option<Self>, TuneError> {
        let Some(table) = doc
            .structural_metadata
            .as_ref()
            .and_then(|m| m.table_of_class(ELEMENT_CLASS))
        else {
            return Ok(None);
        };
        let elements = doc.read_integer_column(table, ELEMENT_PROPERTY)?;
        let materials = match doc.read_integer_column(table, MATERIAL_PROPERTY) {
            Ok(materials) => Some(materials),
            Err(MetadataError::MissingProperty { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Self {
            table,
            elements,
            materials,
        }))
    }

    /// The element of feature ID `feature_id`; `None` past the end of the table.
    #[inline]
    pub fn element(&self, feature_id: u64) -> Option<ElementId> {
        self.elements
            .get(usize::try_from(feature_id).ok()?)
            .copied()
    }

    /// Every distinct iTwin material of the table, in first-seen order.
    pub fn distinct_materials(&self) -> Vec<ITwinMaterialId> {
        let Some(materials) = &self.materials else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        materials
            .iter()
            .copied()
            .filter(|m| seen.insert(*m))
            .collect()
    }
}

/// Copy every buffer view referenced by the source's property tables into `out`, in table and
/// property order, and return the tables re-pointed at the copies.
///
/// Each column is checked against its table's row count first; relocation never changes the
/// length of a column.
pub fn relocate(out: &mut OutputBuilder<'_>) -> Result<Option<StructuralMetadata>, TuneError> {
    let source = out.source();
    let Some(metadata) = &source.structural_metadata else {
        return Ok(None);
    };
    let mut relocated = metadata.clone();
    for (index, table) in relocated.property_tables.iter_mut().enumerate() {
        let count = table.count;
        for (name, property) in table.properties.iter_mut() {
            check_layout(source, index, count, name, property)?;
            for view in property.views_mut() {
                *view = out.carry_view(*view)?;
            }
        }
        tracing::trace!(table = index, class = %table.class, "relocated property table");
    }
    Ok(Some(relocated))
}

fn check_layout(
    doc: &Document,
    table: usize,
    count: usize,
    name: &str,
    property: &PropertyTableProperty,
) -> Result<(), TuneError> {
    let malformed = |expected, actual| TuneError::MalformedPropertyTable {
        table,
        property: name.to_owned(),
        expected,
        actual,
    };
    // array offsets index rows; string offsets only do so for non-array strings
    if let Some(offsets) = property.array_offsets.or(property.string_offsets) {
        let size = property
            .offset_component
            .size()
            .ok_or_else(|| malformed(0, 0))?;
        let actual = doc.view_bytes(offsets)?.len();
        let expected = (count + 1) * size;
        if actual != expected {
            return Err(malformed(expected, actual));
        }
        return Ok(());
    }
    let actual = doc.view_bytes(property.values)?.len();
    let values = count * property.components;
    let expected = match (property.component.size(), property.component) {
        (Some(size), _) => values * size,
        (None, MetadataComponent::Boolean) => values.div_ceil(8),
        (None, _) => return Ok(()),
    };
    if actual != expected {
        return Err(malformed(expected, actual));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use tile_geometry::DocumentBuilder;

    use super::*;

    #[test]
    fn materials_are_deduplicated_in_order() {
        let table = ElementTable {
            table: 0,
            elements: vec![1, 2, 3, 4],
            materials: Some(vec![9, 7, 9, 8]),
        };
        assert_eq!(table.distinct_materials(), vec![9, 7, 8]);
        assert_eq!(table.element(3), Some(4));
        assert_eq!(table.element(4), None);
    }

    #[test]
    fn short_column_is_rejected() {
        let elements: &[u64] = &[1, 2, 3];
        let mut b = DocumentBuilder::new();
        b.property_table(ELEMENT_CLASS, &[(ELEMENT_PROPERTY, elements)]);
        let mut doc = b.build();
        doc.structural_metadata.as_mut().unwrap().property_tables[0].count = 4;
        let mut out = OutputBuilder::new(&doc);
        assert!(matches!(
            relocate(&mut out),
            Err(TuneError::MalformedPropertyTable {
                expected: 32,
                actual: 24,
                ..
            })
        ));
    }
}
