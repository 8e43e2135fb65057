use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hashlink::LruCache;

use crate::column::PgColumn;
use crate::type_info::PgTypeInfo;

/// A prepared statement on a specific connection.
///
/// Holds the server-assigned name together with the typed input and output
/// metadata discovered at `Parse`/`Describe` time. The handle is shared
/// between the caller and the connection's statement cache.
#[derive(Debug)]
pub struct PgStatement {
    pub(crate) id: StatementId,
    pub(crate) sql: String,
    pub(crate) metadata: Arc<PgStatementMetadata>,
}

impl PgStatement {
    /// The SQL text this statement was prepared from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The parameter types the server expects, in placeholder order.
    pub fn parameters(&self) -> &[PgTypeInfo] {
        &self.metadata.parameters
    }

    /// The columns this statement produces, in output order.
    pub fn columns(&self) -> &[PgColumn] {
        &self.metadata.columns
    }
}

#[derive(Debug, Default)]
pub(crate) struct PgStatementMetadata {
    pub(crate) parameters: Vec<PgTypeInfo>,
    pub(crate) columns: Vec<PgColumn>,
    pub(crate) column_names: HashMap<String, usize>,
}

/// Identifier for a prepared statement on one connection.
///
/// `None` is the unnamed statement, re-parsed by every use. Named statements
/// render as `pglane_s_<n>`; formatting avoids `format!` machinery on the
/// hot path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct StatementId(Option<NonZeroU32>);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct PortalId(Option<NonZeroU32>);

impl StatementId {
    pub const UNNAMED: Self = StatementId(None);

    pub const NAMED_START: Self = StatementId(Some(NonZeroU32::MIN));

    const PREFIX: &'static str = "pglane_s_";

    pub fn next(&self) -> Self {
        StatementId(self.0.map(|id| id.checked_add(1).unwrap_or(NonZeroU32::MIN)))
    }

    pub fn is_named(&self) -> bool {
        self.0.is_some()
    }

    /// Write the statement name into a message body, with NUL terminator.
    pub fn put_name(&self, buf: &mut Vec<u8>) {
        put_name(Self::PREFIX, self.0, buf);
    }
}

impl PortalId {
    /// Selects the unnamed portal, rebound by every `Bind`.
    pub const UNNAMED: Self = PortalId(None);

    pub const NAMED_START: Self = PortalId(Some(NonZeroU32::MIN));

    const PREFIX: &'static str = "pglane_p_";

    pub fn next(&self) -> Self {
        PortalId(self.0.map(|id| id.checked_add(1).unwrap_or(NonZeroU32::MIN)))
    }

    pub fn put_name(&self, buf: &mut Vec<u8>) {
        put_name(Self::PREFIX, self.0, buf);
    }
}

fn put_name(prefix: &str, id: Option<NonZeroU32>, buf: &mut Vec<u8>) {
    if let Some(id) = id {
        buf.extend_from_slice(prefix.as_bytes());
        buf.extend_from_slice(itoa::Buffer::new().format(id.get()).as_bytes());
    }

    buf.push(0);
}

/// Per-connection cache of prepared statements, bounded and LRU-evicting.
///
/// Eviction does not talk to the server itself; evicted statements are
/// parked until the connection drains them with `Close` messages.
pub(crate) struct StatementCache {
    inner: LruCache<String, CachedStatement>,
    capacity: usize,
    max_lifetime: Option<Duration>,
    evicted: Vec<Arc<PgStatement>>,
}

struct CachedStatement {
    statement: Arc<PgStatement>,
    since: Instant,
}

impl StatementCache {
    pub fn new(capacity: usize, max_lifetime: Option<Duration>) -> Self {
        StatementCache {
            // `LruCache` cannot be told "zero"; the capacity gate below
            // makes the inner map unreachable in that configuration
            inner: LruCache::new(capacity.max(1)),
            capacity,
            max_lifetime,
            evicted: Vec::new(),
        }
    }

    /// Statement caching is disabled entirely at capacity 0; only the
    /// unnamed statement is used then.
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn len(&self) -> usize {
        if self.is_enabled() {
            self.inner.len()
        } else {
            0
        }
    }

    pub fn get(&mut self, sql: &str) -> Option<Arc<PgStatement>> {
        if !self.is_enabled() {
            return None;
        }

        let expired = match self.inner.get(sql) {
            Some(cached) => match self.max_lifetime {
                Some(lifetime) => cached.since.elapsed() >= lifetime,
                None => false,
            },
            None => return None,
        };

        if expired {
            if let Some(cached) = self.inner.remove(sql) {
                self.evicted.push(cached.statement);
            }
            return None;
        }

        self.inner.get(sql).map(|c| Arc::clone(&c.statement))
    }

    pub fn insert(&mut self, sql: &str, statement: Arc<PgStatement>) {
        if !self.is_enabled() {
            return;
        }

        if self.inner.len() >= self.capacity && !self.inner.contains_key(sql) {
            if let Some((_, cached)) = self.inner.remove_lru() {
                self.evicted.push(cached.statement);
            }
        }

        if let Some(previous) = self.inner.insert(
            sql.to_owned(),
            CachedStatement {
                statement,
                since: Instant::now(),
            },
        ) {
            self.evicted.push(previous.statement);
        }
    }

    /// Take every statement that fell out of the cache since the last call;
    /// each one still holds server-side memory until `Close` is sent.
    pub fn take_evicted(&mut self) -> Vec<Arc<PgStatement>> {
        std::mem::take(&mut self.evicted)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
        self.evicted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(n: u32) -> Arc<PgStatement> {
        Arc::new(PgStatement {
            id: StatementId(NonZeroU32::new(n)),
            sql: format!("SELECT {n}"),
            metadata: Arc::new(PgStatementMetadata::default()),
        })
    }

    #[test]
    fn statement_names_render_with_prefix() {
        let mut buf = Vec::new();
        StatementId::NAMED_START.put_name(&mut buf);
        assert_eq!(buf, b"pglane_s_1\0");

        buf.clear();
        StatementId::UNNAMED.put_name(&mut buf);
        assert_eq!(buf, b"\0");
    }

    #[test]
    fn cache_never_exceeds_capacity() {
        let mut cache = StatementCache::new(2, None);

        cache.insert("a", stmt(1));
        cache.insert("b", stmt(2));
        cache.insert("c", stmt(3));

        assert_eq!(cache.len(), 2);

        // `a` was least recently used
        let evicted = cache.take_evicted();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].sql, "SELECT 1");

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn get_refreshes_recency() {
        let mut cache = StatementCache::new(2, None);

        cache.insert("a", stmt(1));
        cache.insert("b", stmt(2));

        // touch `a` so `b` becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.insert("c", stmt(3));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let mut cache = StatementCache::new(0, None);

        cache.insert("a", stmt(1));

        assert!(!cache.is_enabled());
        assert_eq!(cache.len(), 0);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn expired_statements_are_parked_for_closing() {
        let mut cache = StatementCache::new(4, Some(Duration::ZERO));

        cache.insert("a", stmt(1));

        assert!(cache.get("a").is_none());
        assert_eq!(cache.take_evicted().len(), 1);
    }
}
