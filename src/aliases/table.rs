//! Static bidirectional name table.
//!
//! # Responsibilities
//! - Load `[canonical, alias]` pairs from the side file once at startup
//! - Resolve a name given in either form to its full pair
//! - Fall back to identity when disabled or when nothing matches
//!
//! # Design Decisions
//! - Two hash indexes (canonical → entry, public → entry) give O(1) lookups
//! - A name can match several entries; the earliest entry in file order wins,
//!   whichever side it matched on
//! - Load failures are never fatal: the table simply stays disabled

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

/// Errors raised while reading the alias file.
#[derive(Debug, Error)]
pub enum AliasError {
    #[error("failed to read alias file: {0}")]
    Io(#[from] std::io::Error),

    #[error("alias file is not a JSON array of [canonical, alias] pairs: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One `(canonical, public)` mapping as listed in the side file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub canonical: String,
    pub public: String,
}

/// Outcome of a lookup: the upstream name and the name exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamePair<'a> {
    pub canonical: &'a str,
    pub public: &'a str,
}

impl<'a> NamePair<'a> {
    fn identity(name: &'a str) -> Self {
        Self {
            canonical: name,
            public: name,
        }
    }
}

/// Read-only alias table shared by every request.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    enabled: bool,
    entries: Vec<AliasEntry>,
    by_canonical: HashMap<String, usize>,
    by_public: HashMap<String, usize>,
}

impl AliasTable {
    /// A table that maps every name to itself.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build an enabled table from entries in file order.
    pub fn from_entries(entries: Vec<AliasEntry>) -> Self {
        let mut by_canonical = HashMap::with_capacity(entries.len());
        let mut by_public = HashMap::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            by_canonical.entry(entry.canonical.clone()).or_insert(index);
            by_public.entry(entry.public.clone()).or_insert(index);
        }

        Self {
            enabled: true,
            entries,
            by_canonical,
            by_public,
        }
    }

    /// Parse the alias file.
    pub fn try_load(path: &Path) -> Result<Self, AliasError> {
        let content = fs::read(path)?;
        let pairs: Vec<(String, String)> = serde_json::from_slice(&content)?;

        Ok(Self::from_entries(
            pairs
                .into_iter()
                .map(|(canonical, public)| AliasEntry { canonical, public })
                .collect(),
        ))
    }

    /// Load the alias file, leaving aliasing disabled if it cannot be used.
    pub fn load(path: &Path) -> Self {
        tracing::info!(path = %path.display(), "Loading alias table");

        match Self::try_load(path) {
            Ok(table) => {
                tracing::info!(entries = table.len(), "Alias table loaded");
                table
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Alias table unavailable, names pass through unchanged"
                );
                Self::disabled()
            }
        }
    }

    /// Resolve a name given either as canonical or public form.
    pub fn resolve<'a>(&'a self, name: &'a str) -> NamePair<'a> {
        if !self.enabled {
            return NamePair::identity(name);
        }

        let hit = match (self.by_canonical.get(name), self.by_public.get(name)) {
            (Some(&a), Some(&b)) => Some(a.min(b)),
            (Some(&a), None) | (None, Some(&a)) => Some(a),
            (None, None) => None,
        };

        match hit {
            Some(index) => {
                let entry = &self.entries[index];
                NamePair {
                    canonical: &entry.canonical,
                    public: &entry.public,
                }
            }
            None => NamePair::identity(name),
        }
    }

    /// Public name for an upstream (canonical) name.
    pub fn public_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.resolve(canonical).public
    }

    /// Canonical name for whatever a client asked for.
    pub fn canonical_name<'a>(&'a self, requested: &'a str) -> &'a str {
        self.resolve(requested).canonical
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
