//! Refactoring catalogue.
//!
//! Every refactoring runs against an [`Attempt`]: a borrowed base snapshot
//! plus an owned deep copy that the transformation mutates. The base is
//! never touched, so rejecting an attempt is just dropping the copy.

mod delegation;
mod field;
mod hierarchy;
mod method;
pub mod rewrite;

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Error, Result};
use crate::model::resolve::{direct_subclasses, direct_superclasses};
use crate::model::{ClassDef, FileId, ImportDecl, Location, Snapshot};

pub use delegation::{ReplaceDelegationWithInheritance, ReplaceInheritanceWithDelegation};
pub use field::{FieldAccess, PullUpField, PushDownField};
pub use hierarchy::{CollapseHierarchy, ExtractHierarchy, SuperclassAbstraction};
pub use method::{MethodAccess, PullUpMethod, PushDownMethod};

/// The fourteen transformation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RefactoringKind {
    PushDownMethod,
    PullUpMethod,
    DecreaseMethodAccess,
    IncreaseMethodAccess,
    PushDownField,
    PullUpField,
    IncreaseFieldAccess,
    DecreaseFieldAccess,
    ExtractHierarchy,
    CollapseHierarchy,
    MakeSuperclassAbstract,
    MakeSuperclassConcrete,
    ReplaceInheritanceWithDelegation,
    ReplaceDelegationWithInheritance,
}

impl RefactoringKind {
    pub const ALL: [RefactoringKind; 14] = [
        Self::PushDownMethod,
        Self::PullUpMethod,
        Self::DecreaseMethodAccess,
        Self::IncreaseMethodAccess,
        Self::PushDownField,
        Self::PullUpField,
        Self::IncreaseFieldAccess,
        Self::DecreaseFieldAccess,
        Self::ExtractHierarchy,
        Self::CollapseHierarchy,
        Self::MakeSuperclassAbstract,
        Self::MakeSuperclassConcrete,
        Self::ReplaceInheritanceWithDelegation,
        Self::ReplaceDelegationWithInheritance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PushDownMethod => "PushDownMethod",
            Self::PullUpMethod => "PullUpMethod",
            Self::DecreaseMethodAccess => "DecreaseMethodAccess",
            Self::IncreaseMethodAccess => "IncreaseMethodAccess",
            Self::PushDownField => "PushDownField",
            Self::PullUpField => "PullUpField",
            Self::IncreaseFieldAccess => "IncreaseFieldAccess",
            Self::DecreaseFieldAccess => "DecreaseFieldAccess",
            Self::ExtractHierarchy => "ExtractHierarchy",
            Self::CollapseHierarchy => "CollapseHierarchy",
            Self::MakeSuperclassAbstract => "MakeSuperclassAbstract",
            Self::MakeSuperclassConcrete => "MakeSuperclassConcrete",
            Self::ReplaceInheritanceWithDelegation => "ReplaceInheritanceWithDelegation",
            Self::ReplaceDelegationWithInheritance => "ReplaceDelegationWithInheritance",
        }
    }

    /// One-line description for the `catalogue` command.
    pub fn description(&self) -> &'static str {
        match self {
            Self::PushDownMethod => "Move a method into the subclasses that use it",
            Self::PullUpMethod => "Move a method shared by siblings into their superclass",
            Self::DecreaseMethodAccess => "Prefix a method name with an underscore",
            Self::IncreaseMethodAccess => "Strip one leading underscore from a method name",
            Self::PushDownField => "Move an initializer field into the subclasses that use it",
            Self::PullUpField => "Move an initializer field into the superclass",
            Self::IncreaseFieldAccess => "Prefix a field name with an underscore",
            Self::DecreaseFieldAccess => "Strip one leading underscore from a field name",
            Self::ExtractHierarchy => "Factor features shared by subclasses into a new class",
            Self::CollapseHierarchy => "Merge a class into its subclasses and remove it",
            Self::MakeSuperclassAbstract => "Derive a superclass with abstract methods from ABC",
            Self::MakeSuperclassConcrete => "Drop ABC from a superclass without abstract methods",
            Self::ReplaceInheritanceWithDelegation => "Turn a base class into a delegate field",
            Self::ReplaceDelegationWithInheritance => "Turn a delegate field into a base class",
        }
    }
}

impl fmt::Display for RefactoringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefactoringKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidArgument(format!("unknown refactoring: {s}")))
    }
}

/// Working state of one refactoring: the untouched base and the copy
/// being transformed.
pub struct Attempt<'a> {
    base: &'a Snapshot,
    pub result: Snapshot,
    pub target: Location,
    pub target_name: String,
    /// Direct subclasses of the target, computed before any mutation.
    pub subclasses: Vec<Location>,
    /// Resolved direct superclasses of the target, in base order.
    pub superclasses: Vec<Location>,
    pending_imports: Vec<(FileId, ImportDecl)>,
}

impl<'a> Attempt<'a> {
    /// Deep-copy `base` and resolve the target.
    pub fn new(base: &'a Snapshot, target: &Location) -> Result<Self> {
        let target_name = base.class_at(target)?.name.clone();
        Ok(Self {
            base,
            result: base.clone(),
            target: target.clone(),
            subclasses: direct_subclasses(base, &target_name),
            superclasses: direct_superclasses(base, target),
            target_name,
            pending_imports: Vec::new(),
        })
    }

    pub fn base(&self) -> &'a Snapshot {
        self.base
    }

    /// The target class in the working copy.
    pub fn target(&self) -> Result<&ClassDef> {
        self.result.class_at(&self.target)
    }

    pub fn target_mut(&mut self) -> Result<&mut ClassDef> {
        self.result.class_at_mut(&self.target)
    }

    pub fn class(&self, loc: &Location) -> Result<&ClassDef> {
        self.result.class_at(loc)
    }

    pub fn class_mut(&mut self, loc: &Location) -> Result<&mut ClassDef> {
        self.result.class_at_mut(loc)
    }

    /// Queue `from <module> import <name>` for `file` unless `name` is
    /// already bound there. Imports are inserted after the transformation
    /// so that declaration indices stay valid while it runs.
    pub fn queue_import(&mut self, file: &str, module: &str, name: &str) {
        let bound = self
            .result
            .container(file)
            .is_some_and(|c| c.binds(name));
        let queued = self
            .pending_imports
            .iter()
            .any(|(f, import)| f == file && import.binds(name));
        if !bound && !queued {
            self.pending_imports
                .push((file.to_string(), ImportDecl::from_import(module, name)));
        }
    }

    fn finish(&mut self) {
        for (file, import) in self.pending_imports.drain(..) {
            if let Some(container) = self.result.container_mut(&file) {
                container.add_import(import);
            }
        }
        for container in self.result.containers.values_mut() {
            for decl in &mut container.declarations {
                if let Some(class) = decl.as_class_mut() {
                    class.ensure_bodies();
                }
            }
        }
    }
}

/// A transformation type: a precondition plus a mutation of the working
/// copy.
pub trait Transformation {
    fn kind(&self) -> RefactoringKind;

    /// Pure precondition check.
    fn is_possible(&self, attempt: &Attempt<'_>) -> bool;

    /// Mutate `attempt.result`. Only called when `is_possible` holds; may
    /// still decide to leave the copy unchanged.
    fn apply(&mut self, attempt: &mut Attempt<'_>, rng: &mut dyn RngCore) -> Result<()>;
}

/// A prepared refactoring of one target class.
pub struct Refactor<'a> {
    attempt: Attempt<'a>,
    transformation: Box<dyn Transformation>,
}

impl<'a> Refactor<'a> {
    pub fn kind(&self) -> RefactoringKind {
        self.transformation.kind()
    }

    pub fn target(&self) -> &Location {
        &self.attempt.target
    }

    pub fn is_possible(&self) -> bool {
        self.transformation.is_possible(&self.attempt)
    }

    /// Apply the transformation to the working copy. A no-op when the
    /// precondition fails.
    pub fn perform(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        if !self.is_possible() {
            return Ok(());
        }
        debug!(kind = %self.kind(), target = %self.attempt.target, "Performing refactoring");
        self.transformation.apply(&mut self.attempt, rng)?;
        self.attempt.finish();
        Ok(())
    }

    pub fn base(&self) -> &'a Snapshot {
        self.attempt.base
    }

    pub fn result(&self) -> &Snapshot {
        &self.attempt.result
    }

    /// Keep the transformed copy.
    pub fn into_result(self) -> Snapshot {
        self.attempt.result
    }

    /// Discard the transformed copy and hand back the base.
    pub fn undo(self) -> &'a Snapshot {
        self.attempt.base
    }
}

/// Prepare a refactoring of `kind` for the class at `location`.
///
/// A stale location yields [`Error::InvalidLocation`]; a location naming
/// an import yields [`Error::NotAClass`].
pub fn build<'a>(
    kind: RefactoringKind,
    base: &'a Snapshot,
    location: &Location,
) -> Result<Refactor<'a>> {
    let attempt = Attempt::new(base, location)?;
    let transformation: Box<dyn Transformation> = match kind {
        RefactoringKind::PushDownMethod => Box::new(PushDownMethod::new(&attempt)?),
        RefactoringKind::PullUpMethod => Box::new(PullUpMethod::new(&attempt)?),
        RefactoringKind::DecreaseMethodAccess => Box::new(MethodAccess::decrease(&attempt)?),
        RefactoringKind::IncreaseMethodAccess => Box::new(MethodAccess::increase(&attempt)?),
        RefactoringKind::PushDownField => Box::new(PushDownField::new(&attempt)?),
        RefactoringKind::PullUpField => Box::new(PullUpField::new(&attempt)?),
        RefactoringKind::IncreaseFieldAccess => Box::new(FieldAccess::increase(&attempt)?),
        RefactoringKind::DecreaseFieldAccess => Box::new(FieldAccess::decrease(&attempt)?),
        RefactoringKind::ExtractHierarchy => Box::new(ExtractHierarchy::new(&attempt)),
        RefactoringKind::CollapseHierarchy => Box::new(CollapseHierarchy::new(&attempt)),
        RefactoringKind::MakeSuperclassAbstract => {
            Box::new(SuperclassAbstraction::make_abstract(&attempt)?)
        }
        RefactoringKind::MakeSuperclassConcrete => {
            Box::new(SuperclassAbstraction::make_concrete(&attempt)?)
        }
        RefactoringKind::ReplaceInheritanceWithDelegation => {
            Box::new(ReplaceInheritanceWithDelegation::new(&attempt)?)
        }
        RefactoringKind::ReplaceDelegationWithInheritance => {
            Box::new(ReplaceDelegationWithInheritance::new(&attempt)?)
        }
    };
    Ok(Refactor {
        attempt,
        transformation,
    })
}

/// Uniform choice, `None` for an empty slice.
pub(crate) fn pick<'t, T>(items: &'t [T], rng: &mut dyn RngCore) -> Option<&'t T> {
    items.choose(rng)
}
