//! Symbol name resolution

use crate::Symbol;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The same name mapped twice
    #[error("duplicate symbol name {name}")]
    DuplicateName {
        /// Offending name
        name: String,
    },
    /// The same id mapped twice
    #[error("duplicate symbol id {id}")]
    DuplicateId {
        /// Offending id
        id: Symbol,
    },
}

/// Resolves venue symbol names to internal ids
pub trait SymbolRegistry: Send + Sync {
    /// Id for `name`, if known
    fn resolve(&self, name: &str) -> Option<Symbol>;

    /// Name for `id`, if known
    fn name_of(&self, id: Symbol) -> Option<&str>;
}

/// Fixed registry built once from configuration
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    by_name: FxHashMap<String, Symbol>,
    by_id: FxHashMap<Symbol, String>,
}

impl StaticRegistry {
    /// Build from `(name, id)` pairs, rejecting duplicates either way
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut registry = Self::default();
        for (name, id) in pairs {
            let name = name.into();
            let symbol = Symbol::new(id);
            if registry.by_id.contains_key(&symbol) {
                return Err(RegistryError::DuplicateId { id: symbol });
            }
            if registry.by_name.contains_key(&name) {
                return Err(RegistryError::DuplicateName { name });
            }
            registry.by_name.insert(name.clone(), symbol);
            registry.by_id.insert(symbol, name);
        }
        Ok(registry)
    }

    /// Number of registered symbols
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl SymbolRegistry for StaticRegistry {
    fn resolve(&self, name: &str) -> Option<Symbol> {
        self.by_name.get(name).copied()
    }

    fn name_of(&self, id: Symbol) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }
}
