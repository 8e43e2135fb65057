use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::column::PgColumn;
use crate::error::Error;
use crate::message::DataRow;
use crate::statement::PgStatementMetadata;
use crate::types::{decode_with, PgTypeRegistry, PgValue};
use crate::value::PgValueRef;

/// A single row of a result set.
///
/// Column metadata (names, types, the name→index map) is shared between
/// every row of the same result set through one `Arc`. Field access is O(1)
/// both positionally and by name.
#[derive(Clone)]
pub struct PgRow {
    pub(crate) data: DataRow,
    pub(crate) metadata: Arc<PgStatementMetadata>,
    pub(crate) registry: PgTypeRegistry,
}

impl PgRow {
    /// The number of columns.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The columns of this result set, in output order.
    pub fn columns(&self) -> &[PgColumn] {
        &self.metadata.columns
    }

    /// The index of the column with the given name.
    pub fn column_index(&self, name: &str) -> Result<usize, Error> {
        self.metadata
            .column_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::ColumnNotFound(name.to_owned()))
    }

    /// The raw, undecoded value at `index`.
    pub fn try_get_raw(&self, index: usize) -> Result<PgValueRef<'_>, Error> {
        let column = self
            .metadata
            .columns
            .get(index)
            .ok_or(Error::ColumnIndexOutOfBounds {
                index,
                len: self.metadata.columns.len(),
            })?;

        Ok(PgValueRef::new(
            self.data.get(index),
            column.format,
            column.type_info.clone(),
        ))
    }

    /// Decode the value at `index`.
    pub fn try_get(&self, index: usize) -> Result<PgValue, Error> {
        decode_with(&self.registry, self.try_get_raw(index)?)
    }

    /// Decode the value of the named column.
    pub fn try_get_by_name(&self, name: &str) -> Result<PgValue, Error> {
        self.try_get(self.column_index(name)?)
    }

    /// Decode the value at `index`, panicking on failure.
    pub fn get(&self, index: usize) -> PgValue {
        self.try_get(index)
            .unwrap_or_else(|e| panic!("error decoding column {index}: {e}"))
    }

    /// Iterate `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Result<PgValue, Error>)> + '_ {
        self.metadata
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| (column.name(), self.try_get(index)))
    }
}

impl PartialEq for PgRow {
    /// Rows compare element-wise on their decoded values.
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }

        (0..self.len()).all(|i| match (self.try_get(i), other.try_get(i)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        })
    }
}

impl Debug for PgRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PgRow ")?;

        let mut map = f.debug_map();
        for (name, value) in self.iter() {
            match value {
                Ok(value) => map.entry(&name, &value),
                Err(error) => map.entry(&name, &format!("<decode error: {error}>")),
            };
        }
        map.finish()
    }
}
