use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::Error;
use crate::type_info::{Oid, PgTypeInfo};
use crate::types::{IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

type EncodeFn = dyn Fn(&PgValue, &mut Vec<u8>) -> Result<IsNull, Error> + Send + Sync;
type DecodeFn = dyn Fn(&PgValueRef<'_>) -> Result<PgValue, Error> + Send + Sync;

/// A user-registered codec overriding the builtin handling for one type.
pub(crate) struct PgCodec {
    pub encode: Box<EncodeFn>,
    pub decode: Box<DecodeFn>,
    pub format: PgValueFormat,
}

/// Maps type OIDs to structure and codecs.
///
/// Builtin scalars are compiled in; entries here are introspected custom
/// types and user-registered codec overrides. Every connection carries its
/// own registry, seeded from the process-wide default at connect time;
/// registering on a connection therefore never affects its siblings
/// (copy-on-write at connection granularity).
#[derive(Clone, Default)]
pub struct PgTypeRegistry {
    types: HashMap<Oid, PgTypeInfo>,
    oids_by_name: HashMap<String, Oid>,
    codecs: HashMap<Oid, Arc<PgCodec>>,
}

impl PgTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the process-wide default registry.
    pub(crate) fn global_snapshot() -> Self {
        global().read().expect("type registry lock poisoned").clone()
    }

    /// Register a codec override on the process-wide default registry;
    /// connections established afterwards inherit it.
    pub fn register_global_codec(
        oid: Oid,
        format: PgValueFormat,
        encode: impl Fn(&PgValue, &mut Vec<u8>) -> Result<IsNull, Error> + Send + Sync + 'static,
        decode: impl Fn(&PgValueRef<'_>) -> Result<PgValue, Error> + Send + Sync + 'static,
    ) {
        global()
            .write()
            .expect("type registry lock poisoned")
            .insert_codec(oid, format, encode, decode);
    }

    pub(crate) fn insert_codec(
        &mut self,
        oid: Oid,
        format: PgValueFormat,
        encode: impl Fn(&PgValue, &mut Vec<u8>) -> Result<IsNull, Error> + Send + Sync + 'static,
        decode: impl Fn(&PgValueRef<'_>) -> Result<PgValue, Error> + Send + Sync + 'static,
    ) {
        self.codecs.insert(
            oid,
            Arc::new(PgCodec {
                encode: Box::new(encode),
                decode: Box::new(decode),
                format,
            }),
        );
    }

    pub(crate) fn custom_codec(&self, oid: Oid) -> Option<Arc<PgCodec>> {
        self.codecs.get(&oid).cloned()
    }

    /// Record an introspected type.
    pub(crate) fn insert_type(&mut self, type_info: PgTypeInfo) {
        if let Some(oid) = type_info.oid() {
            self.oids_by_name.insert(type_info.name().to_owned(), oid);
            self.types.insert(oid, type_info);
        }
    }

    /// Resolve an OID to full type information, builtin or introspected.
    pub(crate) fn resolve_oid(&self, oid: Oid) -> Option<PgTypeInfo> {
        if let Some(ty) = crate::type_info::PgType::try_from_oid(oid) {
            return Some(PgTypeInfo(ty));
        }

        self.types.get(&oid).cloned()
    }

    pub(crate) fn oid_for_name(&self, name: &str) -> Option<Oid> {
        self.oids_by_name.get(name).copied()
    }
}

impl std::fmt::Debug for PgTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTypeRegistry")
            .field("types", &self.types.len())
            .field("codecs", &self.codecs.len())
            .finish()
    }
}

fn global() -> &'static RwLock<PgTypeRegistry> {
    static GLOBAL: OnceLock<RwLock<PgTypeRegistry>> = OnceLock::new();

    GLOBAL.get_or_init(|| RwLock::new(PgTypeRegistry::new()))
}

/// Introspected type information shared between the connections of a pool.
///
/// Read-mostly; writers serialize on the lock only when a connection meets a
/// type the pool has never seen.
#[derive(Default)]
pub(crate) struct SharedTypeCache {
    inner: RwLock<PgTypeRegistry>,
}

impl SharedTypeCache {
    pub fn resolve_oid(&self, oid: Oid) -> Option<PgTypeInfo> {
        self.inner
            .read()
            .expect("type cache lock poisoned")
            .types
            .get(&oid)
            .cloned()
    }

    pub fn oid_for_name(&self, name: &str) -> Option<Oid> {
        self.inner
            .read()
            .expect("type cache lock poisoned")
            .oid_for_name(name)
    }

    pub fn insert_type(&self, type_info: PgTypeInfo) {
        self.inner
            .write()
            .expect("type cache lock poisoned")
            .insert_type(type_info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_info::{PgCustomType, PgTypeKind};

    #[test]
    fn resolves_builtins_without_entries() {
        let registry = PgTypeRegistry::new();

        assert_eq!(registry.resolve_oid(Oid(23)), Some(PgTypeInfo::INT4));
        assert!(registry.resolve_oid(Oid(777_777)).is_none());
    }

    #[test]
    fn introspected_types_resolve_by_oid_and_name() {
        let mut registry = PgTypeRegistry::new();

        registry.insert_type(
            PgCustomType {
                oid: Oid(70_000),
                name: "mood".to_owned(),
                kind: PgTypeKind::Enum(Arc::from(vec![
                    "sad".to_owned(),
                    "ok".to_owned(),
                    "happy".to_owned(),
                ])),
            }
            .into(),
        );

        assert!(registry.resolve_oid(Oid(70_000)).is_some());
        assert_eq!(registry.oid_for_name("mood"), Some(Oid(70_000)));
    }

    #[test]
    fn custom_codec_wins_on_lookup() {
        let mut registry = PgTypeRegistry::new();

        registry.insert_codec(
            Oid(114),
            PgValueFormat::Text,
            |_, _| Ok(IsNull::No),
            |_| Ok(PgValue::Null),
        );

        assert!(registry.custom_codec(Oid(114)).is_some());
        assert!(registry.custom_codec(Oid(3802)).is_none());
    }
}
