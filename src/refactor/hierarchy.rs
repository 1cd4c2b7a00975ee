//! Class-level refactorings: extract and collapse hierarchies, and toggle
//! superclass abstraction.

use rand::RngCore;
use tracing::debug;

use super::rewrite::{
    add_member, ensure_super_init, inject_field, movable_fields, references_field, remove_field,
    remove_method,
};
use super::{pick, Attempt, RefactoringKind, Transformation};
use crate::core::{Error, Result};
use crate::model::resolve::resolve_alias;
use crate::model::{
    module_name, Assign, ClassDef, Declaration, Expr, FunctionDef, Location, Snapshot, Stmt,
};

/// Share of the seed pair's features another subclass must carry to join
/// an extracted group.
const GROUP_OVERLAP: f64 = 0.3;

/// A feature a subclass may share with its siblings.
#[derive(Debug, Clone, PartialEq)]
enum Feature {
    Method(FunctionDef),
    Field(Assign),
}

fn features(class: &ClassDef) -> Vec<Feature> {
    let methods = class
        .methods()
        .filter(|m| !m.is_init())
        .cloned()
        .map(Feature::Method);
    let fields = movable_fields(class).into_iter().map(Feature::Field);
    methods.chain(fields).collect()
}

fn common(a: &[Feature], b: &[Feature]) -> Vec<Feature> {
    a.iter().filter(|f| b.contains(f)).cloned().collect()
}

/// Replace every base of `class` that resolves to `old` with `new`.
fn repoint_bases(snapshot: &mut Snapshot, loc: &Location, old: &str, new: &str) -> Result<()> {
    let resolved: Vec<bool> = {
        let container = snapshot
            .container(&loc.file)
            .ok_or_else(|| Error::invalid_location(&loc.file, loc.index, "unknown file"))?;
        let class = snapshot.class_at(loc)?;
        class
            .bases
            .iter()
            .map(|b| b.base_name().is_some_and(|n| resolve_alias(container, n) == old))
            .collect()
    };
    let class = snapshot.class_at_mut(loc)?;
    for (base, matches) in class.bases.iter_mut().zip(resolved) {
        if matches {
            *base = Expr::name(new);
        }
    }
    Ok(())
}

/// Declarations of the file holding the target.
fn target_declarations<'s>(attempt: &'s mut Attempt<'_>) -> Result<&'s mut Vec<Declaration>> {
    let Location { file, index } = &attempt.target;
    attempt
        .result
        .containers
        .get_mut(file)
        .map(|c| &mut c.declarations)
        .ok_or_else(|| Error::invalid_location(file, *index, "unknown file"))
}

/// Factor the features shared by a group of subclasses into a new
/// intermediate class.
pub struct ExtractHierarchy;

impl ExtractHierarchy {
    pub fn new(_attempt: &Attempt<'_>) -> Self {
        Self
    }

    /// Seed pair with the most shared features, grown by every other
    /// subclass that still shares enough of them.
    fn group(
        attempt: &Attempt<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<(Vec<Location>, Vec<Feature>)> {
        let mut candidates = Vec::with_capacity(attempt.subclasses.len());
        for loc in &attempt.subclasses {
            candidates.push((loc.clone(), features(attempt.class(loc)?)));
        }

        let mut best: Vec<(usize, usize, Vec<Feature>)> = Vec::new();
        let mut best_score = 0;
        for i in 0..candidates.len() {
            for j in i + 1..candidates.len() {
                let shared = common(&candidates[i].1, &candidates[j].1);
                if shared.len() > best_score || best.is_empty() {
                    best_score = shared.len();
                    best.clear();
                }
                if shared.len() == best_score {
                    best.push((i, j, shared));
                }
            }
        }
        let Some((i, j, seed)) = pick(&best, rng).cloned() else {
            return Ok((Vec::new(), Vec::new()));
        };

        let mut group = vec![candidates[i].0.clone(), candidates[j].0.clone()];
        let mut shared = seed;
        let threshold = GROUP_OVERLAP * best_score as f64;
        for (k, (loc, own)) in candidates.iter().enumerate() {
            if k == i || k == j || shared.is_empty() {
                continue;
            }
            let overlap = common(&shared, own);
            if !overlap.is_empty() && overlap.len() as f64 >= threshold {
                group.push(loc.clone());
                shared = overlap;
            }
        }
        Ok((group, shared))
    }

    fn fresh_name(snapshot: &Snapshot, target: &str) -> String {
        let base = format!("Sub{target}");
        if !snapshot.has_class(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}{n}"))
            .find(|name| !snapshot.has_class(name))
            .unwrap_or(base)
    }
}

impl Transformation for ExtractHierarchy {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::ExtractHierarchy
    }

    fn is_possible(&self, attempt: &Attempt<'_>) -> bool {
        attempt.subclasses.len() >= 2
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()> {
        let (group, shared) = Self::group(attempt, rng)?;
        if group.is_empty() {
            return Ok(());
        }
        let name = Self::fresh_name(&attempt.result, &attempt.target_name);

        let mut init_body = vec![Stmt::super_init_call()];
        let mut body = Vec::new();
        for feature in &shared {
            match feature {
                Feature::Field(assign) => init_body.push(Stmt::Assign(assign.clone())),
                Feature::Method(method) => body.push(Stmt::FunctionDef(method.clone())),
            }
        }
        body.insert(0, Stmt::FunctionDef(FunctionDef::init(init_body)));
        let extracted = ClassDef::new(name.clone(), vec![Expr::name(&attempt.target_name)], body);

        let target_module = module_name(&attempt.target.file);
        let target_name = attempt.target_name.clone();
        for member in &group {
            repoint_bases(&mut attempt.result, member, &target_name, &name)?;
            let class = attempt.class_mut(member)?;
            for feature in &shared {
                match feature {
                    Feature::Method(method) => {
                        if class.method(&method.name) == Some(method) {
                            remove_method(class, &method.name);
                        }
                    }
                    Feature::Field(assign) => {
                        if let Some(field) = assign.field_name() {
                            remove_field(class, field, Some(&assign.value));
                        }
                    }
                }
            }
            ensure_super_init(class);
            if member.file != attempt.target.file {
                attempt.queue_import(&member.file, &target_module, &name);
            }
        }

        let index = attempt.target.index;
        target_declarations(attempt)?.insert(index + 1, Declaration::Class(extracted));
        debug!(class = %name, members = group.len(), features = shared.len(), "Extracted hierarchy");
        Ok(())
    }
}

/// Merge the target into its subclasses and delete it.
pub struct CollapseHierarchy {
    parent: Option<Location>,
}

impl CollapseHierarchy {
    pub fn new(attempt: &Attempt<'_>) -> Self {
        Self {
            parent: attempt.superclasses.first().cloned(),
        }
    }
}

impl Transformation for CollapseHierarchy {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::CollapseHierarchy
    }

    fn is_possible(&self, attempt: &Attempt<'_>) -> bool {
        self.parent.is_some() && !attempt.subclasses.is_empty()
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, _rng: &mut dyn RngCore) -> Result<()> {
        let Some(parent) = self.parent.clone() else {
            return Ok(());
        };
        let parent_name = attempt.class(&parent)?.name.clone();
        let parent_module = module_name(&parent.file);
        let target = attempt.target()?.clone();
        let target_fields = movable_fields(&target);
        let target_name = attempt.target_name.clone();

        for sub in attempt.subclasses.clone() {
            repoint_bases(&mut attempt.result, &sub, &target_name, &parent_name)?;
            if sub.file != parent.file {
                attempt.queue_import(&sub.file, &parent_module, &parent_name);
            }

            let class = attempt.class_mut(&sub)?;
            let had_init = class.init().is_some();
            for method in target.methods() {
                if !class.defines_method(&method.name) {
                    add_member(class, Stmt::FunctionDef(method.clone()));
                }
            }
            if had_init {
                for field in &target_fields {
                    let Some(name) = field.field_name() else {
                        continue;
                    };
                    if references_field(class, name) && !class.defines_field(name) {
                        inject_field(class, field.clone());
                    }
                }
            }
        }

        let index = attempt.target.index;
        target_declarations(attempt)?.remove(index);
        debug!(class = %target_name, into = %parent_name, "Collapsed hierarchy");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abstraction {
    Abstract,
    Concrete,
}

/// Add or drop `ABC` on one of the target's superclasses, only where that
/// agrees with the presence of `@abstractmethod` methods.
pub struct SuperclassAbstraction {
    goal: Abstraction,
    candidates: Vec<Location>,
}

impl SuperclassAbstraction {
    pub fn make_abstract(attempt: &Attempt<'_>) -> Result<Self> {
        Self::new(attempt, Abstraction::Abstract)
    }

    pub fn make_concrete(attempt: &Attempt<'_>) -> Result<Self> {
        Self::new(attempt, Abstraction::Concrete)
    }

    fn new(attempt: &Attempt<'_>, goal: Abstraction) -> Result<Self> {
        let mut candidates = Vec::new();
        for loc in &attempt.superclasses {
            let is_abstract = attempt.class(loc)?.is_abstract_base();
            if is_abstract == (goal == Abstraction::Concrete) {
                candidates.push(loc.clone());
            }
        }
        Ok(Self { goal, candidates })
    }
}

impl Transformation for SuperclassAbstraction {
    fn kind(&self) -> RefactoringKind {
        match self.goal {
            Abstraction::Abstract => RefactoringKind::MakeSuperclassAbstract,
            Abstraction::Concrete => RefactoringKind::MakeSuperclassConcrete,
        }
    }

    fn is_possible(&self, _attempt: &Attempt<'_>) -> bool {
        !self.candidates.is_empty()
    }

    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()> {
        let Some(loc) = pick(&self.candidates, rng).cloned() else {
            return Ok(());
        };
        let class = attempt.class_mut(&loc)?;
        match self.goal {
            Abstraction::Abstract => {
                if class.has_abstract_method() {
                    class.bases.push(Expr::name("ABC"));
                    attempt.queue_import(&loc.file, "abc", "ABC");
                }
            }
            Abstraction::Concrete => {
                if !class.has_abstract_method() {
                    class.remove_abstract_base();
                }
            }
        }
        Ok(())
    }
}
