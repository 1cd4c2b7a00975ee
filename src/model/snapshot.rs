//! Snapshots of a parsed code base.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ast::{Alias, ClassDef, ImportDecl};
use crate::core::{Error, Result};

/// Identity of a source file: its path relative to the library root,
/// always with `/` separators.
pub type FileId = String;

/// A top-level declaration of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Class(ClassDef),
    Import(ImportDecl),
}

impl Declaration {
    pub fn as_class(&self) -> Option<&ClassDef> {
        match self {
            Self::Class(c) => Some(c),
            Self::Import(_) => None,
        }
    }

    pub fn as_class_mut(&mut self) -> Option<&mut ClassDef> {
        match self {
            Self::Class(c) => Some(c),
            Self::Import(_) => None,
        }
    }
}

/// The declarations of one file, with the alias table derived from its
/// imports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub declarations: Vec<Declaration>,
    pub aliases: Vec<Alias>,
}

impl Container {
    pub fn new(declarations: Vec<Declaration>) -> Self {
        let mut container = Self {
            declarations,
            aliases: Vec::new(),
        };
        container.rebuild_aliases();
        container
    }

    /// Recompute the alias table from the import declarations.
    pub fn rebuild_aliases(&mut self) {
        self.aliases = self
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Import(import) => Some(import.names.iter().cloned()),
                Declaration::Class(_) => None,
            })
            .flatten()
            .collect();
    }

    /// Classes with their declaration index.
    pub fn classes(&self) -> impl Iterator<Item = (usize, &ClassDef)> {
        self.declarations
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.as_class().map(|c| (i, c)))
    }

    /// Whether some import in this file binds `local`.
    pub fn imports(&self, local: &str) -> bool {
        self.declarations.iter().any(|d| match d {
            Declaration::Import(import) => import.binds(local),
            Declaration::Class(_) => false,
        })
    }

    /// Whether `name` is visible here as a class declaration or an import.
    pub fn binds(&self, name: &str) -> bool {
        self.imports(name) || self.classes().any(|(_, c)| c.name == name)
    }

    /// Insert an import ahead of the first class declaration.
    pub fn add_import(&mut self, import: ImportDecl) {
        let index = self
            .declarations
            .iter()
            .position(|d| matches!(d, Declaration::Class(_)))
            .unwrap_or(self.declarations.len());
        self.declarations.insert(index, Declaration::Import(import));
        self.rebuild_aliases();
    }
}

/// Handle of a top-level class: file plus declaration index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: FileId,
    pub index: usize,
}

impl Location {
    pub fn new(file: impl Into<FileId>, index: usize) -> Self {
        Self {
            file: file.into(),
            index,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file, self.index)
    }
}

/// A complete copy of the parsed code base. `Clone` is a deep copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub containers: BTreeMap<FileId, Container>,
}

impl Snapshot {
    pub fn new(containers: BTreeMap<FileId, Container>) -> Self {
        Self { containers }
    }

    /// Every class in deterministic (file, index) order.
    pub fn classes(&self) -> impl Iterator<Item = (Location, &ClassDef)> {
        self.containers.iter().flat_map(|(file, container)| {
            container
                .classes()
                .map(move |(index, class)| (Location::new(file.clone(), index), class))
        })
    }

    /// Locations of every class.
    pub fn class_locations(&self) -> Vec<Location> {
        self.classes().map(|(loc, _)| loc).collect()
    }

    pub fn class_count(&self) -> usize {
        self.containers.values().map(|c| c.classes().count()).sum()
    }

    pub fn container(&self, file: &str) -> Option<&Container> {
        self.containers.get(file)
    }

    pub fn container_mut(&mut self, file: &str) -> Option<&mut Container> {
        self.containers.get_mut(file)
    }

    /// The class at `loc`.
    ///
    /// A missing file or out-of-range index is a stale location
    /// ([`Error::InvalidLocation`]); an index naming an import is
    /// [`Error::NotAClass`].
    pub fn class_at(&self, loc: &Location) -> Result<&ClassDef> {
        let decl = self.declaration(loc)?;
        decl.as_class().ok_or_else(|| Error::NotAClass {
            file: loc.file.clone(),
            index: loc.index,
        })
    }

    pub fn class_at_mut(&mut self, loc: &Location) -> Result<&mut ClassDef> {
        let container = self
            .containers
            .get_mut(&loc.file)
            .ok_or_else(|| Error::invalid_location(&loc.file, loc.index, "unknown file"))?;
        let decl = container
            .declarations
            .get_mut(loc.index)
            .ok_or_else(|| Error::invalid_location(&loc.file, loc.index, "index out of range"))?;
        decl.as_class_mut().ok_or_else(|| Error::NotAClass {
            file: loc.file.clone(),
            index: loc.index,
        })
    }

    /// Like [`Snapshot::class_at`] but `None` for anything that is not a class.
    pub fn get_class(&self, loc: &Location) -> Option<&ClassDef> {
        self.class_at(loc).ok()
    }

    pub fn get_class_mut(&mut self, loc: &Location) -> Option<&mut ClassDef> {
        self.class_at_mut(loc).ok()
    }

    fn declaration(&self, loc: &Location) -> Result<&Declaration> {
        let container = self
            .containers
            .get(&loc.file)
            .ok_or_else(|| Error::invalid_location(&loc.file, loc.index, "unknown file"))?;
        container
            .declarations
            .get(loc.index)
            .ok_or_else(|| Error::invalid_location(&loc.file, loc.index, "index out of range"))
    }

    /// Locations of every class named `name`, across all files.
    pub fn find_classes(&self, name: &str) -> Vec<Location> {
        self.classes()
            .filter(|(_, c)| c.name == name)
            .map(|(loc, _)| loc)
            .collect()
    }

    /// Whether any file declares a class called `name`.
    pub fn has_class(&self, name: &str) -> bool {
        self.classes().any(|(_, c)| c.name == name)
    }
}

/// Dotted module name of a file id: `pkg/shapes.py` becomes `pkg.shapes`.
pub fn module_name(file: &str) -> String {
    file.strip_suffix(".py")
        .unwrap_or(file)
        .replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ast::Stmt;

    fn sample() -> Snapshot {
        let mut containers = BTreeMap::new();
        containers.insert(
            "pkg/shapes.py".to_string(),
            Container::new(vec![
                Declaration::Import(ImportDecl::from_import("abc", "ABC")),
                Declaration::Class(ClassDef::new("Shape", vec![], vec![Stmt::Pass])),
            ]),
        );
        Snapshot::new(containers)
    }

    #[test]
    fn test_class_at_errors() {
        let snapshot = sample();
        assert_eq!(
            snapshot.class_at(&Location::new("pkg/shapes.py", 1)).unwrap().name,
            "Shape"
        );
        let err = snapshot.class_at(&Location::new("pkg/shapes.py", 0)).unwrap_err();
        assert!(matches!(err, Error::NotAClass { .. }));
        let err = snapshot.class_at(&Location::new("pkg/shapes.py", 9)).unwrap_err();
        assert!(err.is_stale_location());
        let err = snapshot.class_at(&Location::new("missing.py", 0)).unwrap_err();
        assert!(err.is_stale_location());
    }

    #[test]
    fn test_clone_is_isolated() {
        let base = sample();
        let mut copy = base.clone();
        copy.class_at_mut(&Location::new("pkg/shapes.py", 1))
            .unwrap()
            .name = "Renamed".into();
        assert_eq!(
            base.class_at(&Location::new("pkg/shapes.py", 1)).unwrap().name,
            "Shape"
        );
        assert_ne!(base, copy);
    }

    #[test]
    fn test_add_import_goes_before_first_class() {
        let mut snapshot = sample();
        let container = snapshot.container_mut("pkg/shapes.py").unwrap();
        container.add_import(ImportDecl::from_import("pkg.base", "Base"));
        assert!(matches!(container.declarations[1], Declaration::Import(_)));
        assert!(matches!(container.declarations[2], Declaration::Class(_)));
        assert!(container.imports("Base"));
        assert_eq!(container.aliases.len(), 2);
    }

    #[test]
    fn test_module_name() {
        assert_eq!(module_name("pkg/shapes.py"), "pkg.shapes");
        assert_eq!(module_name("top.py"), "top");
    }
}
