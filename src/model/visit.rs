//! Traversal over statements and expressions.
//!
//! `Visitor` walks a tree read-only; `VisitorMut` walks it mutably so
//! rewrites can replace expressions in place. Override the `visit_*` hook
//! and call the matching `walk_*` function to keep descending.

use super::ast::{ClassDef, Expr, FunctionDef, Stmt};

/// Read-only traversal.
pub trait Visitor {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

/// Mutable traversal.
pub trait VisitorMut {
    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::FunctionDef(f) => walk_function(v, f),
        Stmt::ClassDef(c) => walk_class(v, c),
        Stmt::Assign(assign) => {
            for target in &assign.targets {
                v.visit_expr(target);
            }
            v.visit_expr(&assign.value);
        }
        Stmt::Expr(e) => v.visit_expr(e),
        Stmt::Return(value) => {
            if let Some(e) = value {
                v.visit_expr(e);
            }
        }
        Stmt::Pass | Stmt::Import(_) => {}
        Stmt::Compound { exprs, blocks, .. } => {
            for e in exprs {
                v.visit_expr(e);
            }
            for block in blocks {
                walk_body(v, block);
            }
        }
    }
}

pub fn walk_body<V: Visitor + ?Sized>(v: &mut V, body: &[Stmt]) {
    for stmt in body {
        v.visit_stmt(stmt);
    }
}

pub fn walk_function<V: Visitor + ?Sized>(v: &mut V, f: &FunctionDef) {
    for d in &f.decorators {
        v.visit_expr(d);
    }
    for p in &f.params {
        v.visit_expr(p);
    }
    if let Some(r) = &f.returns {
        v.visit_expr(r);
    }
    walk_body(v, &f.body);
}

pub fn walk_class<V: Visitor + ?Sized>(v: &mut V, c: &ClassDef) {
    for d in &c.decorators {
        v.visit_expr(d);
    }
    for b in &c.bases {
        v.visit_expr(b);
    }
    for kw in &c.keywords {
        v.visit_expr(&kw.value);
    }
    walk_body(v, &c.body);
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match expr {
        Expr::Name(_) | Expr::Constant(_) => {}
        Expr::Attribute { value, .. } => v.visit_expr(value),
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            v.visit_expr(func);
            for a in args {
                v.visit_expr(a);
            }
            for kw in keywords {
                v.visit_expr(&kw.value);
            }
        }
        Expr::Compound { children, .. } => {
            for c in children {
                v.visit_expr(c);
            }
        }
    }
}

pub fn walk_stmt_mut<V: VisitorMut + ?Sized>(v: &mut V, stmt: &mut Stmt) {
    match stmt {
        Stmt::FunctionDef(f) => walk_function_mut(v, f),
        Stmt::ClassDef(c) => {
            for b in &mut c.bases {
                v.visit_expr_mut(b);
            }
            for kw in &mut c.keywords {
                v.visit_expr_mut(&mut kw.value);
            }
            walk_body_mut(v, &mut c.body);
        }
        Stmt::Assign(assign) => {
            for target in &mut assign.targets {
                v.visit_expr_mut(target);
            }
            v.visit_expr_mut(&mut assign.value);
        }
        Stmt::Expr(e) => v.visit_expr_mut(e),
        Stmt::Return(value) => {
            if let Some(e) = value {
                v.visit_expr_mut(e);
            }
        }
        Stmt::Pass | Stmt::Import(_) => {}
        Stmt::Compound { exprs, blocks, .. } => {
            for e in exprs {
                v.visit_expr_mut(e);
            }
            for block in blocks {
                walk_body_mut(v, block);
            }
        }
    }
}

pub fn walk_body_mut<V: VisitorMut + ?Sized>(v: &mut V, body: &mut [Stmt]) {
    for stmt in body {
        v.visit_stmt_mut(stmt);
    }
}

pub fn walk_function_mut<V: VisitorMut + ?Sized>(v: &mut V, f: &mut FunctionDef) {
    for d in &mut f.decorators {
        v.visit_expr_mut(d);
    }
    for p in &mut f.params {
        v.visit_expr_mut(p);
    }
    if let Some(r) = &mut f.returns {
        v.visit_expr_mut(r);
    }
    walk_body_mut(v, &mut f.body);
}

pub fn walk_expr_mut<V: VisitorMut + ?Sized>(v: &mut V, expr: &mut Expr) {
    match expr {
        Expr::Name(_) | Expr::Constant(_) => {}
        Expr::Attribute { value, .. } => v.visit_expr_mut(value),
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            v.visit_expr_mut(func);
            for a in args {
                v.visit_expr_mut(a);
            }
            for kw in keywords {
                v.visit_expr_mut(&mut kw.value);
            }
        }
        Expr::Compound { children, .. } => {
            for c in children {
                v.visit_expr_mut(c);
            }
        }
    }
}

/// Collects attribute names accessed anywhere in a tree.
#[derive(Default)]
pub struct AttributeCollector {
    /// `(receiver is self, attr, used as call target)`
    pub accesses: Vec<(bool, String, bool)>,
}

impl AttributeCollector {
    pub fn collect_body(body: &[Stmt]) -> Self {
        let mut collector = Self::default();
        walk_body(&mut collector, body);
        collector
    }

    pub fn collect_function(f: &FunctionDef) -> Self {
        let mut collector = Self::default();
        walk_function(&mut collector, f);
        collector
    }

    /// Whether `.name` is accessed anywhere, on any receiver.
    pub fn accesses(&self, name: &str) -> bool {
        self.accesses.iter().any(|(_, attr, _)| attr == name)
    }

    /// Whether `.name(...)` is called anywhere.
    pub fn calls(&self, name: &str) -> bool {
        self.accesses
            .iter()
            .any(|(_, attr, call)| *call && attr == name)
    }

    /// Distinct `self.<x>` attribute names, in first-seen order.
    pub fn self_attrs(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (on_self, attr, _) in &self.accesses {
            if *on_self && !out.contains(attr) {
                out.push(attr.clone());
            }
        }
        out
    }
}

impl Visitor for AttributeCollector {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Attribute { value, attr } => {
                self.accesses
                    .push((value.is_name("self"), attr.clone(), false));
            }
            Expr::Call { func, .. } => {
                if let Expr::Attribute { value, attr } = func.as_ref() {
                    // recorded as a call; the walk below records the plain access too
                    self.accesses
                        .push((value.is_name("self"), attr.clone(), true));
                }
            }
            _ => {}
        }
        walk_expr(self, expr);
    }
}
