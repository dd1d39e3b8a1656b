//! Bucket resolution
//!
//! The catalog collaborator mapping a statement's database and retention
//! policy to the opaque bucket scanned by the source node.

use crate::graph::BucketId;

/// Resolves database/retention policy pairs to buckets
pub trait BucketLookup {
    fn lookup(&self, database: &str, retention_policy: Option<&str>) -> Option<BucketId>;
}

impl<F> BucketLookup for F
where
    F: Fn(&str, Option<&str>) -> Option<BucketId>,
{
    fn lookup(&self, database: &str, retention_policy: Option<&str>) -> Option<BucketId> {
        self(database, retention_policy)
    }
}

/// One database/retention policy to bucket mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketMapping {
    pub database: String,
    /// `None` matches every retention policy of the database
    pub retention_policy: Option<String>,
    pub bucket: BucketId,
}

/// Fixed mapping table, usually loaded from configuration
///
/// An exact database and retention policy match wins, then a mapping without
/// retention policy. A statement without retention policy takes the first
/// mapping of its database.
#[derive(Debug, Clone, Default)]
pub struct StaticBuckets {
    mappings: Vec<BucketMapping>,
}

impl StaticBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a mapping
    pub fn with(
        mut self,
        database: impl Into<String>,
        retention_policy: Option<&str>,
        bucket: impl Into<String>,
    ) -> Self {
        self.insert(BucketMapping {
            database: database.into(),
            retention_policy: retention_policy.map(str::to_string),
            bucket: BucketId::new(bucket),
        });
        self
    }

    pub fn insert(&mut self, mapping: BucketMapping) {
        self.mappings.push(mapping);
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl BucketLookup for StaticBuckets {
    fn lookup(&self, database: &str, retention_policy: Option<&str>) -> Option<BucketId> {
        let mut candidates = self.mappings.iter().filter(|m| m.database == database);

        let found = match retention_policy {
            Some(rp) => {
                let candidates: Vec<_> = candidates.collect();
                candidates
                    .iter()
                    .find(|m| m.retention_policy.as_deref() == Some(rp))
                    .or_else(|| candidates.iter().find(|m| m.retention_policy.is_none()))
                    .copied()
            }
            None => candidates.next(),
        };

        found.map(|m| m.bucket.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buckets() -> StaticBuckets {
        StaticBuckets::new()
            .with("telegraf", Some("autogen"), "b-auto")
            .with("telegraf", Some("weekly"), "b-week")
            .with("db0", None, "b-db0")
    }

    #[test]
    fn test_exact_match() {
        let b = buckets();
        assert_eq!(b.lookup("telegraf", Some("weekly")), Some(BucketId::new("b-week")));
        assert_eq!(b.lookup("telegraf", Some("autogen")), Some(BucketId::new("b-auto")));
    }

    #[test]
    fn test_wildcard_retention_policy() {
        let b = buckets();
        assert_eq!(b.lookup("db0", Some("anything")), Some(BucketId::new("b-db0")));
        assert_eq!(b.lookup("db0", None), Some(BucketId::new("b-db0")));
    }

    #[test]
    fn test_missing_retention_policy_takes_first() {
        assert_eq!(buckets().lookup("telegraf", None), Some(BucketId::new("b-auto")));
    }

    #[test]
    fn test_not_found() {
        let b = buckets();
        assert_eq!(b.lookup("telegraf", Some("daily")), None);
        assert_eq!(b.lookup("other", None), None);
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn test_closure_lookup() {
        let lookup = |db: &str, _rp: Option<&str>| Some(BucketId::new(format!("{}-bucket", db)));
        assert_eq!(lookup.lookup("db0", None), Some(BucketId::new("db0-bucket")));
    }
}
