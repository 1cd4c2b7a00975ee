//! Class relationship resolution.
//!
//! Edges are recomputed from the snapshot on every query so they can never
//! go stale after a transformation mutates a copy.

use std::collections::HashSet;

use super::ast::Expr;
use super::snapshot::{Container, Location, Snapshot};

/// Canonical class name for a locally visible name: the imported original
/// when `name` is an `as` alias, otherwise `name` itself.
pub fn resolve_alias<'a>(container: &'a Container, name: &'a str) -> &'a str {
    container
        .aliases
        .iter()
        .find(|alias| alias.asname.as_deref() == Some(name))
        .map(|alias| alias.name.rsplit('.').next().unwrap_or(&alias.name))
        .unwrap_or(name)
}

/// Names of base-class expressions. Calls, subscripts and other
/// expressions are skipped.
pub fn base_names(bases: &[Expr]) -> impl Iterator<Item = &str> {
    bases.iter().filter_map(Expr::base_name)
}

/// Resolved base names of the class at `loc`.
pub fn resolved_bases(snapshot: &Snapshot, loc: &Location) -> Vec<String> {
    let (Some(container), Some(class)) = (snapshot.container(&loc.file), snapshot.get_class(loc))
    else {
        return Vec::new();
    };
    base_names(&class.bases)
        .map(|name| resolve_alias(container, name).to_string())
        .collect()
}

/// Classes with a resolved base equal to `name`.
pub fn direct_subclasses(snapshot: &Snapshot, name: &str) -> Vec<Location> {
    let mut out = Vec::new();
    for (file, container) in &snapshot.containers {
        for (index, class) in container.classes() {
            if class.name == name {
                continue;
            }
            if base_names(&class.bases).any(|b| resolve_alias(container, b) == name) {
                out.push(Location::new(file.clone(), index));
            }
        }
    }
    out
}

/// Subclasses of the class at `loc`.
pub fn subclasses_of(snapshot: &Snapshot, loc: &Location) -> Vec<Location> {
    snapshot
        .get_class(loc)
        .map(|class| direct_subclasses(snapshot, &class.name))
        .unwrap_or_default()
}

/// Class declarations matching the resolved bases of the class at `loc`,
/// in base order.
pub fn direct_superclasses(snapshot: &Snapshot, loc: &Location) -> Vec<Location> {
    let mut out = Vec::new();
    for base in resolved_bases(snapshot, loc) {
        for found in snapshot.find_classes(&base) {
            if &found != loc && !out.contains(&found) {
                out.push(found);
            }
        }
    }
    out
}

/// Transitive closure of [`direct_subclasses`]. Cyclic input
/// terminates through the visited set.
pub fn all_descendants(snapshot: &Snapshot, loc: &Location) -> Vec<Location> {
    descendants_until(snapshot, loc, |_, _| false)
}

/// Descendants of `loc`, not descending past (and not including) classes
/// for which `stop` returns true.
pub fn descendants_until<F>(snapshot: &Snapshot, loc: &Location, mut stop: F) -> Vec<Location>
where
    F: FnMut(&Snapshot, &Location) -> bool,
{
    let mut visited: HashSet<Location> = HashSet::new();
    visited.insert(loc.clone());
    let mut out = Vec::new();
    let mut frontier = vec![loc.clone()];
    while let Some(current) = frontier.pop() {
        for sub in subclasses_of(snapshot, &current) {
            if !visited.insert(sub.clone()) {
                continue;
            }
            if stop(snapshot, &sub) {
                continue;
            }
            out.push(sub.clone());
            frontier.push(sub);
        }
    }
    out
}

/// Direct subclasses of `superclass`.
pub fn siblings(snapshot: &Snapshot, superclass: &Location) -> Vec<Location> {
    subclasses_of(snapshot, superclass)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::ast::{Alias, ClassDef, ImportDecl, Stmt};
    use crate::model::snapshot::Declaration;

    fn class(name: &str, bases: &[&str]) -> Declaration {
        Declaration::Class(ClassDef::new(
            name,
            bases.iter().map(|b| Expr::name(*b)).collect(),
            vec![Stmt::Pass],
        ))
    }

    fn snapshot() -> Snapshot {
        let mut containers = BTreeMap::new();
        containers.insert(
            "a.py".to_string(),
            Container::new(vec![class("A", &[]), class("B", &["A"])]),
        );
        containers.insert(
            "c.py".to_string(),
            Container::new(vec![
                Declaration::Import(ImportDecl {
                    module: Some("a".into()),
                    names: vec![Alias {
                        name: "B".into(),
                        asname: Some("Bee".into()),
                    }],
                }),
                class("C", &["Bee"]),
            ]),
        );
        Snapshot::new(containers)
    }

    #[test]
    fn test_alias_resolution() {
        let snap = snapshot();
        let container = snap.container("c.py").unwrap();
        assert_eq!(resolve_alias(container, "Bee"), "B");
        assert_eq!(resolve_alias(container, "Other"), "Other");
    }

    #[test]
    fn test_subclasses_cross_files_through_aliases() {
        let snap = snapshot();
        assert_eq!(direct_subclasses(&snap, "B"), vec![Location::new("c.py", 1)]);
        assert_eq!(
            direct_superclasses(&snap, &Location::new("c.py", 1)),
            vec![Location::new("a.py", 1)]
        );
        let mut all = all_descendants(&snap, &Location::new("a.py", 0));
        all.sort();
        assert_eq!(all, vec![Location::new("a.py", 1), Location::new("c.py", 1)]);
    }

    #[test]
    fn test_cyclic_hierarchy_terminates() {
        let mut containers = BTreeMap::new();
        containers.insert(
            "loop.py".to_string(),
            Container::new(vec![class("X", &["Y"]), class("Y", &["X"])]),
        );
        let snap = Snapshot::new(containers);
        let all = all_descendants(&snap, &Location::new("loop.py", 0));
        assert_eq!(all, vec![Location::new("loop.py", 1)]);
    }

    #[test]
    fn test_descendants_until_stops_below_boundary() {
        let snap = snapshot();
        let stop_at = Location::new("a.py", 1);
        let below = descendants_until(&snap, &Location::new("a.py", 0), |_, l| l == &stop_at);
        assert!(below.is_empty());
    }

    #[test]
    fn test_non_name_bases_skipped() {
        let bases = vec![
            Expr::call(Expr::name("factory")),
            Expr::attribute(Expr::name("mod"), "Base"),
        ];
        assert_eq!(base_names(&bases).collect::<Vec<_>>(), vec!["Base"]);
    }
}
