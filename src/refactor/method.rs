//! Method-level refactorings: push down, pull up, and the access ladder.

use rand::RngCore;
use tracing::debug;

use super::rewrite::{add_member, references_member, remove_method, MethodRenamer};
use super::{pick, Attempt, RefactoringKind, Transformation};
use crate::core::Result;
use crate::model::resolve::{descendants_until, siblings};
use crate::model::{FunctionDef, Location, Stmt};

fn normal_methods(attempt: &Attempt<'_>) -> Result<Vec<FunctionDef>> {
    Ok(attempt.target()?.normal_methods().cloned().collect())
}

/// Move a method from the target into the direct subclasses that use it.
pub struct PushDownMethod {
    methods: Vec<FunctionDef>,
}

impl PushDownMethod {
    pub fn new(attempt: &Attempt<'_>) -> Result<Self> {
        Ok(Self {
            methods: normal_methods(attempt)?,
        })
    }
}

impl Transformation for PushDownMethod {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::PushDownMethod
    }

    fn is_possible(&self, attempt: &Attempt<'_>) -> bool {
        !self.methods.is_empty() && !attempt.subclasses.is_empty()
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()> {
        let Some(method) = pick(&self.methods, rng).cloned() else {
            return Ok(());
        };

        let target = attempt.target_mut()?;
        let Some(index) = target.method_index(&method.name) else {
            return Ok(());
        };
        target.body.remove(index);
        if references_member(target, &method.name) {
            debug!(method = %method.name, "Method still used by its class, not pushing down");
            target.body.insert(index, Stmt::FunctionDef(method));
            return Ok(());
        }

        let receivers: Vec<Location> = attempt
            .subclasses
            .iter()
            .filter(|loc| {
                attempt.class(loc).is_ok_and(|sub| {
                    references_member(sub, &method.name) && !sub.defines_method(&method.name)
                })
            })
            .cloned()
            .collect();

        if receivers.is_empty() {
            attempt
                .target_mut()?
                .body
                .insert(index, Stmt::FunctionDef(method));
            return Ok(());
        }
        for loc in &receivers {
            add_member(attempt.class_mut(loc)?, Stmt::FunctionDef(method.clone()));
        }
        Ok(())
    }
}

/// Move a method into a superclass, deleting identical copies from the
/// superclass's other subclasses.
pub struct PullUpMethod {
    methods: Vec<FunctionDef>,
}

impl PullUpMethod {
    pub fn new(attempt: &Attempt<'_>) -> Result<Self> {
        Ok(Self {
            methods: normal_methods(attempt)?,
        })
    }
}

impl Transformation for PullUpMethod {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::PullUpMethod
    }

    fn is_possible(&self, attempt: &Attempt<'_>) -> bool {
        !self.methods.is_empty() && !attempt.superclasses.is_empty()
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()> {
        let (Some(method), Some(superclass)) = (
            pick(&self.methods, rng).cloned(),
            pick(&attempt.superclasses, rng).cloned(),
        ) else {
            return Ok(());
        };
        if attempt.class(&superclass)?.defines_method(&method.name) {
            return Ok(());
        }

        let mut holders = vec![attempt.target.clone()];
        for sibling in siblings(&attempt.result, &superclass) {
            if holders.contains(&sibling) {
                continue;
            }
            let same = attempt
                .class(&sibling)?
                .method(&method.name)
                .is_some_and(|m| *m == method);
            if same {
                holders.push(sibling);
            }
        }
        for loc in &holders {
            remove_method(attempt.class_mut(loc)?, &method.name);
        }
        debug!(method = %method.name, removed = holders.len(), "Pulled up method");
        add_member(attempt.class_mut(&superclass)?, Stmt::FunctionDef(method));
        Ok(())
    }
}

/// Which way a name moves on the underscore ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ladder {
    /// `foo` -> `_foo` -> `__foo`
    Decrease,
    /// `__foo` -> `_foo` -> `foo`
    Increase,
}

impl Ladder {
    fn renamed(self, name: &str) -> String {
        match self {
            Self::Decrease => format!("_{name}"),
            Self::Increase => name.strip_prefix('_').unwrap_or(name).to_string(),
        }
    }
}

/// Rename a method one step along the underscore ladder, in the target
/// and every descendant down to the first one that redefines the name.
pub struct MethodAccess {
    ladder: Ladder,
    methods: Vec<FunctionDef>,
}

impl MethodAccess {
    pub fn decrease(attempt: &Attempt<'_>) -> Result<Self> {
        Self::new(attempt, Ladder::Decrease)
    }

    pub fn increase(attempt: &Attempt<'_>) -> Result<Self> {
        Self::new(attempt, Ladder::Increase)
    }

    fn new(attempt: &Attempt<'_>, ladder: Ladder) -> Result<Self> {
        let target = attempt.target()?;
        let methods = target
            .normal_methods()
            .filter(|m| match ladder {
                Ladder::Decrease => !m.name.starts_with("__"),
                Ladder::Increase => m.name.starts_with('_'),
            })
            .filter(|m| !target.defines_method(&ladder.renamed(&m.name)))
            .cloned()
            .collect();
        Ok(Self { ladder, methods })
    }
}

impl Transformation for MethodAccess {
    fn kind(&self) -> RefactoringKind {
        match self.ladder {
            Ladder::Decrease => RefactoringKind::DecreaseMethodAccess,
            Ladder::Increase => RefactoringKind::IncreaseMethodAccess,
        }
    }

    fn is_possible(&self, _attempt: &Attempt<'_>) -> bool {
        !self.methods.is_empty()
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()> {
        let Some(method) = pick(&self.methods, rng) else {
            return Ok(());
        };
        let old = method.name.as_str();
        let new = self.ladder.renamed(old);

        let mut scope = vec![attempt.target.clone()];
        scope.extend(descendants_until(&attempt.result, &attempt.target, |snap, loc| {
            snap.get_class(loc).is_some_and(|c| c.defines_method(old))
        }));
        for loc in &scope {
            if attempt.class(loc)?.defines_method(&new) {
                debug!(old, new = %new, class = %loc, "Rename would collide, skipping");
                return Ok(());
            }
        }

        let mut renamer = MethodRenamer {
            old,
            new: &new,
            property: method.is_property(),
        };
        for loc in &scope {
            renamer.rename_in(attempt.class_mut(loc)?);
        }
        Ok(())
    }
}
