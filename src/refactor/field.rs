//! Field-level refactorings: push down, pull up, and the access ladder.
//!
//! Fields are the single-target `self.<x> = value` assignments at the top
//! level of `__init__`.

use rand::RngCore;
use tracing::debug;

use super::rewrite::{
    carry_params, field_used_outside_init, init_names_read, inject_field, is_portable_value,
    movable_fields, references_field, remove_field, FieldRenamer,
};
use super::{pick, Attempt, RefactoringKind, Transformation};
use crate::core::Result;
use crate::model::resolve::{descendants_until, siblings};
use crate::model::{Assign, ClassDef, Location, Stmt};

/// Fields whose value can be re-evaluated in a different initializer. The
/// superclass constructor never receives the target's parameters, so a
/// pulled-up value must not read them.
fn portable_fields(class: &ClassDef) -> Vec<Assign> {
    let Some(init) = class.init() else {
        return Vec::new();
    };
    movable_fields(class)
        .into_iter()
        .filter(|f| is_portable_value(&f.value, init))
        .collect()
}

/// Fields whose value reads no initializer locals besides its parameters.
/// Parameters travel with the field into the receiving initializer.
fn pushable_fields(class: &ClassDef) -> Vec<Assign> {
    let Some(init) = class.init() else {
        return Vec::new();
    };
    let params = init.param_names();
    movable_fields(class)
        .into_iter()
        .filter(|f| {
            init_names_read(&f.value, init)
                .iter()
                .all(|name| params.contains(name))
        })
        .collect()
}

fn field_name(field: &Assign) -> &str {
    field.field_name().unwrap_or_default()
}

/// Move a field the target itself never uses outside `__init__` into the
/// subclasses that use it.
pub struct PushDownField {
    fields: Vec<Assign>,
    /// Parameters of the target's initializer.
    params: Vec<String>,
}

impl PushDownField {
    pub fn new(attempt: &Attempt<'_>) -> Result<Self> {
        let target = attempt.target()?;
        let fields = pushable_fields(target)
            .into_iter()
            .filter(|f| !field_used_outside_init(target, field_name(f)))
            .collect();
        let params = target
            .init()
            .map(|init| init.param_names())
            .unwrap_or_default();
        Ok(Self { fields, params })
    }
}

impl Transformation for PushDownField {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::PushDownField
    }

    fn is_possible(&self, attempt: &Attempt<'_>) -> bool {
        !self.fields.is_empty() && !attempt.subclasses.is_empty()
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()> {
        let Some(field) = pick(&self.fields, rng).cloned() else {
            return Ok(());
        };
        let name = field_name(&field).to_string();

        let receivers: Vec<Location> = attempt
            .subclasses
            .iter()
            .filter(|loc| {
                attempt
                    .class(loc)
                    .is_ok_and(|sub| references_field(sub, &name) && !sub.defines_field(&name))
            })
            .cloned()
            .collect();
        if receivers.is_empty() {
            return Ok(());
        }

        let read: Vec<String> = attempt
            .target()?
            .init()
            .map(|init| init_names_read(&field.value, init))
            .unwrap_or_default();
        for loc in &receivers {
            let receiver = attempt.class_mut(loc)?;
            // A fresh initializer keeps the inherited constructor signature.
            let carried = if receiver.init().is_none() {
                &self.params
            } else {
                &read
            };
            carry_params(receiver, carried);
            inject_field(receiver, field.clone());
        }
        remove_field(attempt.target_mut()?, &name, Some(&field.value));
        debug!(field = %name, subclasses = receivers.len(), "Pushed down field");
        Ok(())
    }
}

/// Move a field into the first superclass, removing same-valued copies
/// from the superclass's other subclasses.
pub struct PullUpField {
    superclass: Option<Location>,
    fields: Vec<Assign>,
}

impl PullUpField {
    pub fn new(attempt: &Attempt<'_>) -> Result<Self> {
        let Some(superclass) = attempt.superclasses.first().cloned() else {
            return Ok(Self {
                superclass: None,
                fields: Vec::new(),
            });
        };
        let parent = attempt.class(&superclass)?;
        let fields = portable_fields(attempt.target()?)
            .into_iter()
            .filter(|f| !f.value.mentions_self())
            .filter(|f| !parent.defines_field(field_name(f)))
            .collect();
        Ok(Self {
            superclass: Some(superclass),
            fields,
        })
    }
}

impl Transformation for PullUpField {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::PullUpField
    }

    fn is_possible(&self, _attempt: &Attempt<'_>) -> bool {
        self.superclass.is_some() && !self.fields.is_empty()
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()> {
        let (Some(superclass), Some(field)) =
            (self.superclass.clone(), pick(&self.fields, rng).cloned())
        else {
            return Ok(());
        };
        let name = field_name(&field).to_string();

        let holders = siblings(&attempt.result, &superclass);
        for loc in &holders {
            remove_field(attempt.class_mut(loc)?, &name, Some(&field.value));
        }

        let parent = attempt.class_mut(&superclass)?;
        let has_bases = !parent.bases.is_empty();
        parent
            .init_or_insert(has_bases)
            .body
            .push(Stmt::Assign(field));
        debug!(field = %name, "Pulled up field");
        Ok(())
    }
}

/// Which way a field moves on the underscore ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ladder {
    /// `x` -> `_x` -> `__x`
    Increase,
    /// `__x` -> `_x` -> `x`
    Decrease,
}

impl Ladder {
    fn renamed(self, name: &str) -> String {
        match self {
            Self::Increase => format!("_{name}"),
            Self::Decrease => name.strip_prefix('_').unwrap_or(name).to_string(),
        }
    }
}

/// Rename a field one step along the underscore ladder, in the target and
/// every descendant down to the first one whose initializer redefines it.
pub struct FieldAccess {
    ladder: Ladder,
    fields: Vec<String>,
}

impl FieldAccess {
    pub fn increase(attempt: &Attempt<'_>) -> Result<Self> {
        Self::new(attempt, Ladder::Increase)
    }

    pub fn decrease(attempt: &Attempt<'_>) -> Result<Self> {
        Self::new(attempt, Ladder::Decrease)
    }

    fn new(attempt: &Attempt<'_>, ladder: Ladder) -> Result<Self> {
        let target = attempt.target()?;
        let mut fields: Vec<String> = Vec::new();
        for field in target.instance_fields() {
            let Some(name) = field.field_name() else {
                continue;
            };
            let eligible = match ladder {
                Ladder::Increase => !name.starts_with("__"),
                Ladder::Decrease => name.starts_with('_'),
            };
            if eligible
                && !target.defines_field(&ladder.renamed(name))
                && !fields.iter().any(|f| f == name)
            {
                fields.push(name.to_string());
            }
        }
        Ok(Self { ladder, fields })
    }
}

impl Transformation for FieldAccess {
    fn kind(&self) -> RefactoringKind {
        match self.ladder {
            Ladder::Increase => RefactoringKind::IncreaseFieldAccess,
            Ladder::Decrease => RefactoringKind::DecreaseFieldAccess,
        }
    }

    fn is_possible(&self, _attempt: &Attempt<'_>) -> bool {
        !self.fields.is_empty()
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()> {
        let Some(old) = pick(&self.fields, rng) else {
            return Ok(());
        };
        let new = self.ladder.renamed(old);

        let mut scope = vec![attempt.target.clone()];
        scope.extend(descendants_until(&attempt.result, &attempt.target, |snap, loc| {
            snap.get_class(loc).is_some_and(|c| c.defines_field(old))
        }));

        let mut renamer = FieldRenamer { old, new: &new };
        for loc in &scope {
            renamer.rename_in(attempt.class_mut(loc)?);
        }
        debug!(old = %old, new = %new, classes = scope.len(), "Renamed field");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Expr, Snapshot};
    use crate::parser::parse_sources;
    use crate::refactor::build;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn snapshot(source: &str) -> Snapshot {
        parse_sources([("m.py", source)]).unwrap()
    }

    fn run(kind: RefactoringKind, snap: &Snapshot, index: usize) -> Snapshot {
        let mut refactor = build(kind, snap, &Location::new("m.py", index)).unwrap();
        refactor.perform(&mut StdRng::seed_from_u64(11)).unwrap();
        refactor.into_result()
    }

    fn class<'s>(snap: &'s Snapshot, index: usize) -> &'s ClassDef {
        snap.class_at(&Location::new("m.py", index)).unwrap()
    }

    #[test]
    fn test_push_down_field_into_user() {
        let snap = snapshot(
            r#"
class Base:
    def __init__(self):
        self.cache = {}


class User(Base):
    def lookup(self, key):
        return self.cache[key]


class Bystander(Base):
    def __init__(self):
        super().__init__()
"#,
        );
        let result = run(RefactoringKind::PushDownField, &snap, 0);
        assert!(!class(&result, 0).defines_field("cache"));
        let user = class(&result, 1);
        let init = user.init().unwrap();
        assert!(init.body[0].is_super_init_call());
        assert_eq!(init.body[1].field_name(), Some("cache"));
        assert!(!class(&result, 2).defines_field("cache"));
    }

    #[test]
    fn test_push_down_field_carries_init_parameter() {
        let snap = snapshot(
            r#"
class Base:
    def __init__(self, v):
        self.v = v


class Sub(Base):
    def use(self):
        return self.v
"#,
        );
        let refactor = build(
            RefactoringKind::PushDownField,
            &snap,
            &Location::new("m.py", 0),
        )
        .unwrap();
        assert!(refactor.is_possible());

        let result = run(RefactoringKind::PushDownField, &snap, 0);
        assert!(!class(&result, 0).defines_field("v"));
        let sub = class(&result, 1);
        assert!(sub.defines_field("v"));
        let init = sub.init().unwrap();
        assert_eq!(init.param_names(), vec!["v".to_string()]);
        let Stmt::Expr(Expr::Call { args, .. }) = &init.body[0] else {
            panic!("expected super().__init__(v)");
        };
        assert_eq!(args, &vec![Expr::name("v")]);
    }

    #[test]
    fn test_push_down_field_adds_parameter_to_existing_init() {
        let snap = snapshot(
            r#"
class Base:
    def __init__(self, v):
        self.v = v


class Sub(Base):
    def __init__(self, w=0):
        super().__init__(1)
        self.w = w

    def use(self):
        return self.v + self.w
"#,
        );
        let result = run(RefactoringKind::PushDownField, &snap, 0);
        let init = class(&result, 1).init().unwrap();
        assert_eq!(init.param_names(), vec!["v".to_string(), "w".to_string()]);
        assert_eq!(init.body[1].field_name(), Some("v"));
    }

    #[test]
    fn test_push_down_field_requires_unused_local_free_field() {
        let snap = snapshot(
            r#"
class Base:
    def __init__(self, size):
        scale = size * 2
        self.size = scale
        self.label = "x"

    def describe(self):
        return self.label


class User(Base):
    def grow(self):
        return self.size + len(self.label)
"#,
        );
        let refactor = build(
            RefactoringKind::PushDownField,
            &snap,
            &Location::new("m.py", 0),
        )
        .unwrap();
        assert!(!refactor.is_possible());
    }

    #[test]
    fn test_pull_up_field_merges_identical_siblings() {
        let snap = snapshot(
            r#"
class Base(Root):
    pass


class Left(Base):
    def __init__(self):
        self.limit = 10


class Right(Base):
    def __init__(self):
        self.limit = 10
"#,
        );
        let result = run(RefactoringKind::PullUpField, &snap, 1);
        let base = class(&result, 0);
        let init = base.init().unwrap();
        assert!(init.body[0].is_super_init_call());
        assert_eq!(
            init.body[1],
            Stmt::Assign(Assign::self_field("limit", Expr::Constant("10".into())))
        );
        assert!(!class(&result, 1).defines_field("limit"));
        assert!(!class(&result, 2).defines_field("limit"));
        assert_eq!(class(&result, 1).init().unwrap().body, vec![Stmt::Pass]);
    }

    #[test]
    fn test_pull_up_field_keeps_differing_override() {
        let snap = snapshot(
            r#"
class Base:
    pass


class Left(Base):
    def __init__(self):
        self.limit = 10


class Middle(Base):
    def __init__(self):
        self.limit = 10


class Right(Base):
    def __init__(self):
        self.limit = 20
"#,
        );
        let result = run(RefactoringKind::PullUpField, &snap, 1);
        assert_eq!(
            class(&result, 0).field("limit").unwrap().value,
            Expr::Constant("10".into())
        );
        assert!(!class(&result, 1).defines_field("limit"));
        assert!(!class(&result, 2).defines_field("limit"));
        assert_eq!(
            class(&result, 3).field("limit").unwrap().value,
            Expr::Constant("20".into())
        );
    }

    #[test]
    fn test_pull_up_field_skips_parameter_values() {
        let snap = snapshot(
            r#"
class Base:
    pass


class Left(Base):
    def __init__(self, limit):
        self.limit = limit
"#,
        );
        let refactor = build(
            RefactoringKind::PullUpField,
            &snap,
            &Location::new("m.py", 1),
        )
        .unwrap();
        assert!(!refactor.is_possible());
    }

    #[test]
    fn test_field_rename_stops_at_redefinition() {
        let snap = snapshot(
            r#"
class A:
    def __init__(self):
        self._x = 1

    def get(self):
        return self._x


class B(A):
    def __init__(self):
        super().__init__()
        self._x = 2


class C(B):
    def show(self):
        return self._x
"#,
        );
        let result = run(RefactoringKind::DecreaseFieldAccess, &snap, 0);
        assert!(class(&result, 0).defines_field("x"));
        assert!(references_field(class(&result, 0), "x"));
        assert!(!references_field(class(&result, 0), "_x"));
        assert!(class(&result, 1).defines_field("_x"));
        assert!(references_field(class(&result, 2), "_x"));
    }

    #[test]
    fn test_field_access_round_trip() {
        let snap = snapshot(
            r#"
class A:
    def __init__(self):
        self.count = 0

    def bump(self):
        self.count = self.count + 1


class B(A):
    def read(self):
        return self.count
"#,
        );
        let increased = run(RefactoringKind::IncreaseFieldAccess, &snap, 0);
        assert!(references_field(class(&increased, 1), "_count"));
        let restored = run(RefactoringKind::DecreaseFieldAccess, &increased, 0);
        assert_eq!(restored, snap);
    }
}
