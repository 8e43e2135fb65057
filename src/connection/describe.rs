use std::sync::Arc;

use futures_core::future::BoxFuture;

use crate::error::Error;
use crate::type_info::{Oid, PgCustomType, PgTypeInfo, PgTypeKind};
use crate::types::PgValue;
use crate::PgConnection;

// Runtime type introspection.
//
// When a statement mentions a type the registry has never seen, its
// structure is read from the system catalogs and a codec is synthesized
// from it. The catalog queries themselves only produce builtin types
// (name, "char", oid), so resolution always bottoms out.

impl PgConnection {
    /// Resolve an OID to full type information, introspecting on a miss.
    pub(crate) async fn resolve_type_info(&mut self, oid: Oid) -> Result<PgTypeInfo, Error> {
        if let Some(info) = self.registry.resolve_oid(oid) {
            return Ok(info);
        }

        if let Some(info) = self
            .shared_types
            .as_ref()
            .and_then(|shared| shared.resolve_oid(oid))
        {
            self.registry.insert_type(info.clone());
            return Ok(info);
        }

        if self.types_in_resolution.contains(&oid) {
            // cycle in the type graph; hand back a lazy reference that the
            // registry can resolve once the outer type has been recorded
            return Ok(PgTypeInfo(crate::type_info::PgType::DeclareWithOid(oid)));
        }

        self.types_in_resolution.push(oid);
        let result = self.fetch_type_by_oid(oid).await;
        self.types_in_resolution.pop();

        let info = result?;

        self.registry.insert_type(info.clone());

        if let Some(shared) = &self.shared_types {
            shared.insert_type(info.clone());
        }

        Ok(info)
    }

    fn fetch_type_by_oid(&mut self, oid: Oid) -> BoxFuture<'_, Result<PgTypeInfo, Error>> {
        Box::pin(async move {
            let row = self
                .fetch_row(
                    "SELECT typname::text, typtype::text, typcategory::text, \
                            typrelid::int8, typelem::int8, typbasetype::int8 \
                     FROM pg_catalog.pg_type WHERE oid = $1::oid",
                    &[PgValue::Int8(i64::from(oid.0))],
                )
                .await?
                .ok_or(Error::TypeNotFound {
                    type_name: format!("oid {oid}"),
                })?;

            let name = text_field(&row, 0)?;
            let typtype = text_field(&row, 1)?;
            let typcategory = text_field(&row, 2)?;
            let relation_id = int_field(&row, 3)?;
            let element = int_field(&row, 4)?;
            let base_type = int_field(&row, 5)?;

            let kind = match (typtype.as_str(), typcategory.as_str()) {
                // array of anything, builtin or custom
                (_, "A") if element != 0 => {
                    let element = self.resolve_type_info(Oid(element as u32)).await?;
                    PgTypeKind::Array(element)
                }

                ("e", _) => self.fetch_enum_kind(oid).await?,

                ("c", _) => self.fetch_composite_kind(relation_id as u32).await?,

                ("r", _) => self.fetch_range_kind(oid).await?,

                ("d", _) => {
                    let base = self.resolve_type_info(Oid(base_type as u32)).await?;
                    PgTypeKind::Domain(base)
                }

                ("p", _) => {
                    return Err(Error::TypeNotFound {
                        type_name: format!("{name} (pseudo-type)"),
                    });
                }

                _ => PgTypeKind::Simple,
            };

            Ok(PgCustomType { oid, name, kind }.into())
        })
    }

    async fn fetch_enum_kind(&mut self, oid: Oid) -> Result<PgTypeKind, Error> {
        let rows = self
            .fetch(
                "SELECT enumlabel::text \
                 FROM pg_catalog.pg_enum \
                 WHERE enumtypid = $1::oid \
                 ORDER BY enumsortorder",
                &[PgValue::Int8(i64::from(oid.0))],
            )
            .await?;

        let labels = rows
            .iter()
            .map(|row| text_field(row, 0))
            .collect::<Result<Vec<String>, Error>>()?;

        Ok(PgTypeKind::Enum(Arc::from(labels)))
    }

    async fn fetch_composite_kind(&mut self, relation_id: u32) -> Result<PgTypeKind, Error> {
        let rows = self
            .fetch(
                "SELECT attname::text, atttypid::int8 \
                 FROM pg_catalog.pg_attribute \
                 WHERE attrelid = $1::oid \
                   AND NOT attisdropped \
                   AND attnum > 0 \
                 ORDER BY attnum",
                &[PgValue::Int8(i64::from(relation_id))],
            )
            .await?;

        let mut fields = Vec::with_capacity(rows.len());

        for row in &rows {
            let field_name = text_field(row, 0)?;
            let field_oid = int_field(row, 1)?;

            let field_type = self.resolve_type_info(Oid(field_oid as u32)).await?;

            fields.push((field_name, field_type));
        }

        Ok(PgTypeKind::Composite(Arc::from(fields)))
    }

    async fn fetch_range_kind(&mut self, oid: Oid) -> Result<PgTypeKind, Error> {
        let element = self
            .fetch_val(
                "SELECT rngsubtype::int8 \
                 FROM pg_catalog.pg_range \
                 WHERE rngtypid = $1::oid",
                &[PgValue::Int8(i64::from(oid.0))],
            )
            .await?
            .as_i64()
            .ok_or_else(|| err_protocol!("pg_range returned a non-integer subtype"))?;

        let element = self.resolve_type_info(Oid(element as u32)).await?;

        Ok(PgTypeKind::Range(element))
    }

    /// Resolve a type name to its OID, consulting caches first.
    pub(crate) async fn fetch_oid_by_name(&mut self, name: &str) -> Result<Oid, Error> {
        if let Some(oid) = self.registry.oid_for_name(name) {
            return Ok(oid);
        }

        if let Some(oid) = self
            .shared_types
            .as_ref()
            .and_then(|shared| shared.oid_for_name(name))
        {
            return Ok(oid);
        }

        let oid = self
            .fetch_row(
                "SELECT oid::int8 FROM pg_catalog.pg_type WHERE typname = $1::text",
                &[PgValue::Text(name.to_owned())],
            )
            .await?
            .ok_or(Error::TypeNotFound {
                type_name: name.to_owned(),
            })?
            .try_get(0)?
            .as_i64()
            .ok_or_else(|| err_protocol!("pg_type returned a non-integer oid"))?;

        let oid = Oid(oid as u32);

        // introspect eagerly so the codec is ready when the oid is used
        self.resolve_type_info(oid).await?;

        Ok(oid)
    }
}

fn text_field(row: &crate::PgRow, index: usize) -> Result<String, Error> {
    row.try_get(index)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| err_protocol!("catalog query returned a non-text field"))
}

fn int_field(row: &crate::PgRow, index: usize) -> Result<i64, Error> {
    row.try_get(index)?
        .as_i64()
        .ok_or_else(|| err_protocol!("catalog query returned a non-integer field"))
}
