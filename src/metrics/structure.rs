//! Class-local structure the cohesion and coupling formulas read from.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::visit::{walk_expr, walk_function, AttributeCollector, Visitor};
use crate::model::{ClassDef, Expr, FunctionDef, Stmt};

/// Receivers never counted as coupling.
const NON_COUPLING_RECEIVERS: &[&str] = &["self", "cls", "super"];

/// Field usage of one normal (non-dunder) method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodUsage {
    pub name: String,
    /// `I(i)`: instance fields the method reads or writes through `self`.
    pub fields: Vec<String>,
}

/// Structure of one class as the metric formulas see it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassStructure {
    pub name: String,
    /// Normal methods in body order; `k` is their count.
    pub methods: Vec<MethodUsage>,
    /// `A`: instance fields assigned through `self` in any method.
    pub fields: Vec<String>,
    /// Total methods, dunder ones included.
    pub method_count: usize,
    /// Distinct receivers `X` of `X.m(...)` calls.
    pub receivers: BTreeSet<String>,
    /// Distinct `X.m` call targets.
    pub external_calls: BTreeSet<String>,
}

impl ClassStructure {
    pub fn from_class(class: &ClassDef) -> Self {
        let fields = assigned_fields(class);

        let methods = class
            .normal_methods()
            .map(|method| {
                let used = AttributeCollector::collect_function(method).self_attrs();
                MethodUsage {
                    name: method.name.clone(),
                    fields: fields
                        .iter()
                        .filter(|f| used.contains(f))
                        .cloned()
                        .collect(),
                }
            })
            .collect();

        let mut calls = CallCollector::default();
        for method in class.methods() {
            walk_function(&mut calls, method);
        }
        let excluded = |receiver: &str| {
            receiver == class.name || NON_COUPLING_RECEIVERS.contains(&receiver)
        };
        let receivers = calls
            .calls
            .iter()
            .filter(|(r, _)| !excluded(r))
            .map(|(r, _)| r.clone())
            .collect();
        let external_calls = calls
            .calls
            .iter()
            .filter(|(r, _)| !excluded(r))
            .map(|(r, m)| format!("{r}.{m}"))
            .collect();

        Self {
            name: class.name.clone(),
            methods,
            fields,
            method_count: class.methods().count(),
            receivers,
            external_calls,
        }
    }

    /// Number of normal methods.
    pub fn k(&self) -> usize {
        self.methods.len()
    }

    /// Number of instance fields.
    pub fn l(&self) -> usize {
        self.fields.len()
    }

    /// `I(i)` of the i-th normal method.
    pub fn usage(&self, i: usize) -> &[String] {
        &self.methods[i].fields
    }

    /// Number of normal methods touching `field`.
    pub fn methods_referencing(&self, field: &str) -> usize {
        self.methods
            .iter()
            .filter(|m| m.fields.iter().any(|f| f == field))
            .count()
    }
}

/// `self.<x>` assignment targets across every method, in first-seen order.
fn assigned_fields(class: &ClassDef) -> Vec<String> {
    let mut collector = FieldTargets::default();
    for method in class.methods() {
        collector.visit_function(method);
    }
    collector.fields
}

#[derive(Default)]
struct FieldTargets {
    fields: Vec<String>,
}

impl FieldTargets {
    fn visit_function(&mut self, f: &FunctionDef) {
        walk_function(self, f);
    }

    fn record(&mut self, target: &Expr) {
        match target {
            Expr::Compound { children, .. } => {
                for child in children {
                    self.record(child);
                }
            }
            _ => {
                if let Some(attr) = target.as_self_attr() {
                    if !self.fields.iter().any(|f| f == attr) {
                        self.fields.push(attr.to_string());
                    }
                }
            }
        }
    }
}

impl Visitor for FieldTargets {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let Stmt::Assign(assign) = stmt {
            for target in &assign.targets {
                self.record(target);
            }
        }
        crate::model::visit::walk_stmt(self, stmt);
    }
}

/// Collects `Name.attr(...)` calls as `(receiver, attr)` pairs.
#[derive(Default)]
struct CallCollector {
    calls: Vec<(String, String)>,
}

impl Visitor for CallCollector {
    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Call { func, .. } = expr {
            if let Expr::Attribute { value, attr } = func.as_ref() {
                if let Expr::Name(receiver) = value.as_ref() {
                    self.calls.push((receiver.clone(), attr.clone()));
                }
            }
        }
        walk_expr(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn structure(source: &str) -> ClassStructure {
        let container = parse_source("m.py", source).unwrap().unwrap();
        let class = container.classes().next().unwrap().1;
        ClassStructure::from_class(class)
    }

    #[test]
    fn test_fields_and_usage() {
        let s = structure(
            r#"
class Account:
    def __init__(self):
        self.balance = 0
        self.owner = None

    def deposit(self, amount):
        self.balance = self.balance + amount

    def describe(self):
        return self.owner

    def reset(self):
        self.history = []
"#,
        );
        assert_eq!(s.k(), 3);
        assert_eq!(s.method_count, 4);
        assert_eq!(s.fields, vec!["balance", "owner", "history"]);
        assert_eq!(s.usage(0), ["balance".to_string()]);
        assert_eq!(s.usage(1), ["owner".to_string()]);
        assert_eq!(s.methods_referencing("balance"), 1);
    }

    #[test]
    fn test_coupling_receivers_exclude_self_and_own_name() {
        let s = structure(
            r#"
class Renderer:
    def draw(self, screen):
        screen.refresh()
        screen.clear()
        self.flush()
        Renderer.helper()
        Palette.lookup("red")
        super().draw(screen)
"#,
        );
        assert_eq!(
            s.receivers.iter().cloned().collect::<Vec<_>>(),
            vec!["Palette".to_string(), "screen".to_string()]
        );
        assert_eq!(s.external_calls.len(), 3);
    }

    #[test]
    fn test_tuple_targets_count_as_fields() {
        let s = structure(
            r#"
class Pair:
    def __init__(self):
        self.left, self.right = 1, 2
"#,
        );
        assert_eq!(s.fields, vec!["left", "right"]);
        assert_eq!(s.k(), 0);
    }
}
