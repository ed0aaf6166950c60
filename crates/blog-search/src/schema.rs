//! Tantivy schema derived from an entity's searchable fields.
//!
//! Every index has:
//! - id: u64 (INDEXED | STORED | FAST), the entity's primary key
//! - one TEXT field per searchable field

use std::collections::BTreeMap;

use tantivy::schema::{Field, FieldType, Schema, FAST, INDEXED, STORED, TEXT};
use tantivy::TantivyDocument;

use blog_types::IndexDocument;

use crate::error::SearchError;

/// Name of the primary key field
pub const ID_FIELD: &str = "id";

/// Schema field handles for one entity index
#[derive(Debug, Clone)]
pub struct EntitySchema {
    schema: Schema,
    /// Entity id (u64, INDEXED | STORED | FAST)
    pub id: Field,
    text_fields: BTreeMap<String, Field>,
}

impl EntitySchema {
    /// Build a schema for the given searchable fields.
    pub fn build(searchable_fields: &[&str]) -> Result<Self, SearchError> {
        if searchable_fields.is_empty() {
            return Err(SearchError::SchemaMismatch(
                "an index needs at least one searchable field".into(),
            ));
        }

        let mut schema_builder = Schema::builder();
        let id = schema_builder.add_u64_field(ID_FIELD, INDEXED | STORED | FAST);

        let mut text_fields = BTreeMap::new();
        for name in searchable_fields {
            if *name == ID_FIELD {
                return Err(SearchError::SchemaMismatch(format!(
                    "{} is reserved for the primary key",
                    ID_FIELD
                )));
            }
            if text_fields.contains_key(*name) {
                continue;
            }
            let field = schema_builder.add_text_field(name, TEXT);
            text_fields.insert(name.to_string(), field);
        }

        Ok(Self {
            schema: schema_builder.build(),
            id,
            text_fields,
        })
    }

    /// Create an EntitySchema from an existing Tantivy Schema
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let id = schema
            .get_field(ID_FIELD)
            .map_err(|_| SearchError::SchemaMismatch("missing id field".into()))?;
        if !matches!(schema.get_field_entry(id).field_type(), FieldType::U64(_)) {
            return Err(SearchError::SchemaMismatch("id field is not u64".into()));
        }

        let text_fields = schema
            .fields()
            .filter(|(_, entry)| matches!(entry.field_type(), FieldType::Str(_)))
            .map(|(field, entry)| (entry.name().to_string(), field))
            .collect();

        Ok(Self {
            schema,
            id,
            text_fields,
        })
    }

    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Handles of all text fields, for multi-field queries
    pub fn text_fields(&self) -> Vec<Field> {
        self.text_fields.values().copied().collect()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.text_fields.keys().map(String::as_str)
    }

    /// Fail if any of the given fields is missing from this schema.
    pub fn ensure_fields<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), SearchError> {
        for name in names {
            if !self.text_fields.contains_key(name) {
                return Err(SearchError::SchemaMismatch(format!(
                    "missing {} field",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Convert an IndexDocument into a Tantivy document.
    pub fn to_document(&self, doc: &IndexDocument) -> Result<TantivyDocument, SearchError> {
        let mut tantivy_doc = TantivyDocument::default();
        tantivy_doc.add_u64(self.id, doc.id);
        for (name, value) in &doc.fields {
            let field = self
                .text_fields
                .get(name)
                .ok_or_else(|| SearchError::SchemaMismatch(format!("missing {} field", name)))?;
            tantivy_doc.add_text(*field, value);
        }
        Ok(tantivy_doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_schema() {
        let schema = EntitySchema::build(&["body"]).unwrap();
        assert!(schema.schema().get_field("id").is_ok());
        assert!(schema.schema().get_field("body").is_ok());
        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["body"]);
    }

    #[test]
    fn test_reserved_and_empty_fields() {
        assert!(EntitySchema::build(&[]).is_err());
        assert!(EntitySchema::build(&["id"]).is_err());
    }

    #[test]
    fn test_from_schema() {
        let original = EntitySchema::build(&["title", "body"]).unwrap();
        let rebuilt = EntitySchema::from_schema(original.schema().clone()).unwrap();
        assert_eq!(rebuilt.id, original.id);
        assert_eq!(rebuilt.text_fields(), original.text_fields());
    }

    #[test]
    fn test_ensure_fields() {
        let schema = EntitySchema::build(&["body"]).unwrap();
        assert!(schema.ensure_fields(["body"]).is_ok());
        assert!(matches!(
            schema.ensure_fields(["body", "title"]),
            Err(SearchError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let schema = EntitySchema::build(&["body"]).unwrap();
        let doc = IndexDocument::new(1).with_field("title", "x");
        assert!(schema.to_document(&doc).is_err());
    }
}
