//! Referential integrity checks
//!
//! Foreign keys are validated against parent tables on every insert and
//! update, and deletes are refused while any child row still points at the
//! target. Both checks run inside the caller's session so they see the
//! same snapshot the write will be applied to.

use tracing::debug;

use crate::error::{Result, TableError};
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::storage::Session;
use crate::value::{FieldMap, Row};

#[derive(Debug, Clone, Copy)]
pub struct IntegrityChecker<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> IntegrityChecker<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Every foreign key in `fields` must match a parent row.
    ///
    /// NULL foreign keys (nullable columns only) are not checked.
    pub async fn validate_foreign_keys(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
        fields: &FieldMap,
    ) -> Result<()> {
        for fk in schema.foreign_keys {
            let Some(value) = fields.get(fk.column).filter(|v| !v.is_null()) else {
                continue;
            };

            let parent = self.registry.resolve(fk.references_table)?;
            debug!(
                table = schema.name,
                column = fk.column,
                parent = parent.name,
                value = %value,
                "checking foreign key"
            );

            let found = session
                .find_by_column(parent, fk.references_column, value)
                .await?;
            if found.is_none() {
                return Err(TableError::ForeignKeyViolation {
                    table: parent.name.to_owned(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Refuse to delete `record` while any row in another table references it.
    ///
    /// Stops at the first dependent table found.
    pub async fn validate_no_dependents(
        &self,
        session: &mut dyn Session,
        schema: &EntitySchema,
        record: &Row,
    ) -> Result<()> {
        for (child, fk) in self.registry.dependents_of(schema.name) {
            let Some(idx) = schema.column_index(fk.references_column) else {
                continue;
            };
            let key = &record[idx];

            debug!(
                table = schema.name,
                dependent = child.name,
                column = fk.column,
                value = %key,
                "checking dependents"
            );

            if session.find_by_column(child, fk.column, key).await?.is_some() {
                return Err(TableError::DependentRecordExists {
                    table: child.name.to_owned(),
                });
            }
        }
        Ok(())
    }
}
