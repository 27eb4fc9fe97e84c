use std::fmt;

/// Generation shipped with this build.
pub const CURRENT_GENERATION: &str = "v1.2.0";

const PREFIX: &str = "todolist";

/// Cache partitions that exist within one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    /// Pre-warmed and cache-first assets.
    Static,
    /// Network-first and stale-while-revalidate responses.
    Dynamic,
    /// Catch-all partition kept for pages that cache explicitly.
    General,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [
        PartitionKind::Static,
        PartitionKind::Dynamic,
        PartitionKind::General,
    ];
}

/// A version epoch and the partition names it recognizes.
///
/// Activation deletes every stored partition whose name is not returned by
/// [`CacheGeneration::partition_names`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheGeneration {
    version: String,
}

impl CacheGeneration {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    pub fn current() -> Self {
        Self::new(CURRENT_GENERATION)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn partition(&self, kind: PartitionKind) -> String {
        match kind {
            PartitionKind::Static => format!("{PREFIX}-static-{}", self.version),
            PartitionKind::Dynamic => format!("{PREFIX}-dynamic-{}", self.version),
            PartitionKind::General => format!("{PREFIX}-{}", self.version),
        }
    }

    pub fn partition_names(&self) -> Vec<String> {
        PartitionKind::ALL
            .iter()
            .map(|kind| self.partition(*kind))
            .collect()
    }

    pub fn recognizes(&self, name: &str) -> bool {
        PartitionKind::ALL
            .iter()
            .any(|kind| self.partition(*kind) == name)
    }

    /// Names from `existing` that this generation does not recognize.
    pub fn stale<'a, I>(&self, existing: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        existing
            .into_iter()
            .filter(|name| !self.recognizes(name))
            .cloned()
            .collect()
    }
}

impl Default for CacheGeneration {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for CacheGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version)
    }
}
