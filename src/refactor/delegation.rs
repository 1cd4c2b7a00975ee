//! Swap between inheriting from a class and holding an instance of it.

use rand::RngCore;
use tracing::debug;

use super::rewrite::{inject_field, movable_fields, DelegateCollapser, DelegateRouter};
use super::{pick, Attempt, RefactoringKind, Transformation};
use crate::core::Result;
use crate::model::resolve::resolve_alias;
use crate::model::visit::walk_body_mut;
use crate::model::{Assign, ClassDef, Expr, Location, Stmt};

/// Attribute holding the delegate that replaces `base`: `riwd_` plus the
/// dotted base with dots turned into underscores.
fn delegate_name(base: &Expr) -> Option<String> {
    base.dotted().map(|d| format!("riwd_{}", d.replace('.', "_")))
}

fn field_names(fields: &[Assign]) -> Vec<String> {
    fields
        .iter()
        .filter_map(|f| f.field_name().map(str::to_string))
        .collect()
}

/// Drop one base class and hold an instance of it in a `riwd_*` field,
/// routing the inherited members the target uses through that field.
pub struct ReplaceInheritanceWithDelegation {
    /// Base expression with the superclass it resolves to.
    candidates: Vec<(Expr, Location)>,
}

impl ReplaceInheritanceWithDelegation {
    pub fn new(attempt: &Attempt<'_>) -> Result<Self> {
        let target = attempt.target()?;
        let Some(container) = attempt.result.container(&attempt.target.file) else {
            return Ok(Self {
                candidates: Vec::new(),
            });
        };

        let mut candidates = Vec::new();
        for base in &target.bases {
            let Some(name) = base.base_name() else {
                continue;
            };
            let resolved = resolve_alias(container, name);
            let superclass = attempt
                .superclasses
                .iter()
                .find(|loc| attempt.result.get_class(loc).is_some_and(|c| c.name == resolved));
            let Some(superclass) = superclass else {
                continue;
            };
            let free = delegate_name(base).is_some_and(|d| !target.defines_field(&d));
            if free {
                candidates.push((base.clone(), superclass.clone()));
            }
        }
        Ok(Self { candidates })
    }
}

impl Transformation for ReplaceInheritanceWithDelegation {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::ReplaceInheritanceWithDelegation
    }

    fn is_possible(&self, _attempt: &Attempt<'_>) -> bool {
        !self.candidates.is_empty()
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()> {
        let Some((base, superclass)) = pick(&self.candidates, rng).cloned() else {
            return Ok(());
        };
        let Some(delegate) = delegate_name(&base) else {
            return Ok(());
        };

        let parent = attempt.class(&superclass)?;
        let inherited_methods: Vec<String> =
            parent.normal_methods().map(|m| m.name.clone()).collect();
        let inherited_fields = field_names(&movable_fields(parent));

        let target = attempt.target_mut()?;
        let own_methods: Vec<String> = target.normal_methods().map(|m| m.name.clone()).collect();
        let own_fields = field_names(&movable_fields(target));
        let members: Vec<String> = inherited_methods
            .into_iter()
            .filter(|m| !own_methods.contains(m))
            .chain(
                inherited_fields
                    .into_iter()
                    .filter(|f| !own_fields.contains(f)),
            )
            .collect();

        walk_body_mut(
            &mut DelegateRouter {
                delegate: &delegate,
                members: &members,
            },
            &mut target.body,
        );
        if let Some(index) = target.bases.iter().position(|b| *b == base) {
            target.bases.remove(index);
        }
        inject_delegate(target, Assign::self_field(&delegate, Expr::call(base)));
        debug!(delegate = %delegate, routed = members.len(), "Replaced inheritance with delegation");
        Ok(())
    }
}

/// Put the delegate assignment after the `super().__init__()` call, or first
/// in an initializer without one.
fn inject_delegate(target: &mut ClassDef, field: Assign) {
    if target.init().is_some() {
        inject_field(target, field);
    } else {
        target.init_or_insert(false).body.push(Stmt::Assign(field));
    }
}

/// Turn a `self.<a> = Known(...)` field into a base class, collapsing
/// `self.<a>` into `self`.
pub struct ReplaceDelegationWithInheritance {
    /// Initializer statement index, field name, and the class expression.
    delegations: Vec<(usize, String, Expr)>,
}

impl ReplaceDelegationWithInheritance {
    pub fn new(attempt: &Attempt<'_>) -> Result<Self> {
        let target = attempt.target()?;
        let (Some(init), Some(container)) = (
            target.init(),
            attempt.result.container(&attempt.target.file),
        ) else {
            return Ok(Self {
                delegations: Vec::new(),
            });
        };

        let mut delegations = Vec::new();
        for (index, stmt) in init.body.iter().enumerate() {
            let Some(assign) = stmt.as_assign() else {
                continue;
            };
            let (Some(field), Expr::Call { func, .. }) = (assign.field_name(), &assign.value)
            else {
                continue;
            };
            if assign.targets.len() != 1 {
                continue;
            }
            let Some(name) = func.base_name() else {
                continue;
            };
            let resolved = resolve_alias(container, name);
            let already_base = target
                .bases
                .iter()
                .filter_map(Expr::base_name)
                .any(|b| resolve_alias(container, b) == resolved);
            if resolved != target.name && !already_base && attempt.result.has_class(resolved) {
                delegations.push((index, field.to_string(), (**func).clone()));
            }
        }
        Ok(Self { delegations })
    }
}

impl Transformation for ReplaceDelegationWithInheritance {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::ReplaceDelegationWithInheritance
    }

    fn is_possible(&self, _attempt: &Attempt<'_>) -> bool {
        !self.delegations.is_empty()
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()> {
        let Some((index, field, class_expr)) = pick(&self.delegations, rng).cloned() else {
            return Ok(());
        };
        let target = attempt.target_mut()?;
        if let Some(init) = target.init_mut() {
            if index < init.body.len() {
                init.body.remove(index);
            }
        }
        target.bases.push(class_expr);
        walk_body_mut(&mut DelegateCollapser { delegate: &field }, &mut target.body);
        debug!(field = %field, "Replaced delegation with inheritance");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Snapshot;
    use crate::parser::parse_sources;
    use crate::refactor::build;
    use crate::refactor::rewrite::references_field;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(kind: RefactoringKind, snap: &Snapshot, index: usize) -> Snapshot {
        let mut refactor = build(kind, snap, &Location::new("m.py", index)).unwrap();
        refactor.perform(&mut StdRng::seed_from_u64(21)).unwrap();
        refactor.into_result()
    }

    fn class(snap: &Snapshot, index: usize) -> &ClassDef {
        snap.class_at(&Location::new("m.py", index)).unwrap()
    }

    const LOGGER: &str = r#"
class Logger:
    def __init__(self):
        self.level = 1

    def log(self, msg):
        return msg


class Service(Logger):
    def __init__(self):
        super().__init__()
        self.name = "svc"

    def run(self):
        self.log(self.name)
        return self.level
"#;

    #[test]
    fn test_inheritance_to_delegation() {
        let snap = parse_sources([("m.py", LOGGER)]).unwrap();
        let result = run(RefactoringKind::ReplaceInheritanceWithDelegation, &snap, 1);
        let service = class(&result, 1);
        assert!(service.bases.is_empty());

        let init = service.init().unwrap();
        assert!(init.body[0].is_super_init_call());
        assert_eq!(
            init.body[1],
            Stmt::Assign(Assign::self_field(
                "riwd_Logger",
                Expr::call(Expr::name("Logger"))
            ))
        );
        assert!(!references_field(service, "level"));
        assert!(references_field(service, "name"));
        assert!(references_field(service, "riwd_Logger"));
    }

    #[test]
    fn test_delegation_to_inheritance() {
        let snap = parse_sources([(
            "m.py",
            r#"
class Engine:
    def start(self):
        return True


class Car:
    def __init__(self):
        self.engine = Engine()
        self.wheels = 4

    def drive(self):
        return self.engine.start()
"#,
        )])
        .unwrap();
        let result = run(RefactoringKind::ReplaceDelegationWithInheritance, &snap, 1);
        let car = class(&result, 1);
        assert_eq!(car.bases, vec![Expr::name("Engine")]);
        assert!(!car.defines_field("engine"));
        assert!(car.defines_field("wheels"));
        assert!(!references_field(car, "engine"));
    }

    #[test]
    fn test_delegation_round_trip_restores_inheritance() {
        let snap = parse_sources([("m.py", LOGGER)]).unwrap();
        let delegated = run(RefactoringKind::ReplaceInheritanceWithDelegation, &snap, 1);
        let restored = run(
            RefactoringKind::ReplaceDelegationWithInheritance,
            &delegated,
            1,
        );
        assert_eq!(restored, snap);
    }

    #[test]
    fn test_delegation_ignores_unknown_and_self_classes() {
        let snap = parse_sources([(
            "m.py",
            r#"
class Node:
    def __init__(self):
        self.next = Node()
        self.items = list()
"#,
        )])
        .unwrap();
        let refactor = build(
            RefactoringKind::ReplaceDelegationWithInheritance,
            &snap,
            &Location::new("m.py", 0),
        )
        .unwrap();
        assert!(!refactor.is_possible());
    }

    #[test]
    fn test_inheritance_requires_known_base() {
        let snap = parse_sources([("m.py", "class Local(Exception):\n    pass\n")]).unwrap();
        let refactor = build(
            RefactoringKind::ReplaceInheritanceWithDelegation,
            &snap,
            &Location::new("m.py", 0),
        )
        .unwrap();
        assert!(!refactor.is_possible());
    }
}
