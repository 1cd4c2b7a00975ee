//! Tree rewrites and occurrence queries shared by the transformations.

use crate::model::visit::{
    walk_body, walk_body_mut, walk_expr, walk_expr_mut, walk_stmt_mut, AttributeCollector,
    Visitor, VisitorMut,
};
use crate::model::{Assign, ClassDef, Expr, FunctionDef, Stmt};

/// Whether `.name` is accessed anywhere in the class, on any receiver.
pub fn references_member(class: &ClassDef, name: &str) -> bool {
    AttributeCollector::collect_body(&class.body).accesses(name)
}

/// Whether `self.<field>` appears anywhere in the class.
pub fn references_field(class: &ClassDef, field: &str) -> bool {
    let mut finder = SelfAttrFinder { field, found: false };
    walk_body(&mut finder, &class.body);
    finder.found
}

/// Whether `self.<field>` appears in any method other than `__init__`.
pub fn field_used_outside_init(class: &ClassDef, field: &str) -> bool {
    class.methods().filter(|m| !m.is_init()).any(|m| {
        let mut finder = SelfAttrFinder { field, found: false };
        crate::model::visit::walk_function(&mut finder, m);
        finder.found
    })
}

struct SelfAttrFinder<'n> {
    field: &'n str,
    found: bool,
}

impl Visitor for SelfAttrFinder<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if expr.as_self_attr() == Some(self.field) {
            self.found = true;
        }
        walk_expr(self, expr);
    }
}

/// Parameters and locals of `init` that `value` reads.
pub fn init_names_read(value: &Expr, init: &FunctionDef) -> Vec<String> {
    let locals = init.local_names();
    let mut read: Vec<String> = Vec::new();
    value.for_each(&mut |e| {
        if let Expr::Name(id) = e {
            if locals.contains(id) && !read.contains(id) {
                read.push(id.clone());
            }
        }
    });
    read
}

/// Whether a field value can be evaluated in another initializer: it must
/// not read the initializer's parameters or locals.
pub fn is_portable_value(value: &Expr, init: &FunctionDef) -> bool {
    init_names_read(value, init).is_empty()
}

/// Declare `names` as initializer parameters, ahead of the first defaulted
/// or splat parameter. An initializer created here also passes them to its
/// `super().__init__()` call.
pub fn carry_params(class: &mut ClassDef, names: &[String]) {
    let created = class.init().is_none();
    let init = class.init_or_insert(true);
    let known = init.param_names();
    let missing: Vec<&String> = names.iter().filter(|n| !known.contains(n)).collect();
    if missing.is_empty() {
        return;
    }
    let at = init
        .params
        .iter()
        .position(|p| !matches!(p, Expr::Name(_)))
        .unwrap_or(init.params.len());
    for (offset, name) in missing.iter().enumerate() {
        init.params.insert(at + offset, Expr::name(name.as_str()));
    }
    if !created {
        return;
    }
    let super_call = init.body.iter_mut().find(|s| s.is_super_init_call());
    if let Some(Stmt::Expr(Expr::Call { args, .. })) = super_call {
        args.extend(missing.iter().map(|n| Expr::name(n.as_str())));
    }
}

/// Single-target instance fields of a class, first definition per name.
pub fn movable_fields(class: &ClassDef) -> Vec<Assign> {
    let mut out: Vec<Assign> = Vec::new();
    for field in class.instance_fields() {
        if field.targets.len() != 1 {
            continue;
        }
        if out.iter().any(|f| f.field_name() == field.field_name()) {
            continue;
        }
        out.push(field.clone());
    }
    out
}

/// Append a member to a class body, replacing a lone `pass`.
pub fn add_member(class: &mut ClassDef, stmt: Stmt) {
    if class.body == [Stmt::Pass] {
        class.body.clear();
    }
    class.body.push(stmt);
}

/// Remove the top-level method called `name`, returning it.
pub fn remove_method(class: &mut ClassDef, name: &str) -> Option<FunctionDef> {
    let index = class.method_index(name)?;
    match class.body.remove(index) {
        Stmt::FunctionDef(f) => Some(f),
        _ => None,
    }
}

/// Insert a field assignment into the class initializer right after its
/// `super().__init__()` call, creating the initializer when missing.
pub fn inject_field(class: &mut ClassDef, field: Assign) {
    let init = class.init_or_insert(true);
    let index = init
        .body
        .iter()
        .position(Stmt::is_super_init_call)
        .map(|i| i + 1)
        .unwrap_or(0);
    init.body.insert(index, Stmt::Assign(field));
}

/// Remove top-level initializer assignments to `self.<field>`. With
/// `value`, only assignments of that exact value are removed.
pub fn remove_field(class: &mut ClassDef, field: &str, value: Option<&Expr>) -> bool {
    let Some(init) = class.init_mut() else {
        return false;
    };
    let before = init.body.len();
    init.body.retain(|stmt| match stmt.as_assign() {
        Some(assign) if assign.field_name() == Some(field) => {
            value.is_some_and(|v| &assign.value != v)
        }
        _ => true,
    });
    init.body.len() != before
}

/// Make sure an existing initializer starts by calling `super().__init__()`.
pub fn ensure_super_init(class: &mut ClassDef) {
    if let Some(init) = class.init_mut() {
        if !init.body.iter().any(Stmt::is_super_init_call) {
            init.body.insert(0, Stmt::super_init_call());
        }
    }
}

/// Renames a method: its definitions, every `.old(...)` call, and `self.old`
/// or `cls.old` loads. Property accessors also rename every `.old` load.
pub struct MethodRenamer<'n> {
    pub old: &'n str,
    pub new: &'n str,
    pub property: bool,
}

impl MethodRenamer<'_> {
    pub fn rename_in(&mut self, class: &mut ClassDef) {
        walk_body_mut(self, &mut class.body);
    }
}

impl VisitorMut for MethodRenamer<'_> {
    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        if let Stmt::FunctionDef(f) = stmt {
            if f.name == self.old {
                f.name = self.new.to_string();
            }
        }
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Call { func, .. } => {
                if let Expr::Attribute { attr, .. } = func.as_mut() {
                    if attr == self.old {
                        *attr = self.new.to_string();
                    }
                }
            }
            Expr::Attribute { value, attr } => {
                let on_instance = value.is_name("self") || value.is_name("cls");
                if attr == self.old && (self.property || on_instance) {
                    *attr = self.new.to_string();
                }
            }
            _ => {}
        }
        walk_expr_mut(self, expr);
    }
}

/// Renames `self.old` to `self.new`.
pub struct FieldRenamer<'n> {
    pub old: &'n str,
    pub new: &'n str,
}

impl FieldRenamer<'_> {
    pub fn rename_in(&mut self, class: &mut ClassDef) {
        walk_body_mut(self, &mut class.body);
    }
}

impl VisitorMut for FieldRenamer<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if let Expr::Attribute { value, attr } = expr {
            if value.is_name("self") && attr == self.old {
                *attr = self.new.to_string();
            }
        }
        walk_expr_mut(self, expr);
    }
}

/// Routes `self.<member>` through a delegate: `self.<delegate>.<member>`.
pub struct DelegateRouter<'n> {
    pub delegate: &'n str,
    pub members: &'n [String],
}

impl VisitorMut for DelegateRouter<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if let Expr::Attribute { value, attr } = expr {
            if value.is_name("self") && self.members.iter().any(|m| m == attr) {
                **value = Expr::self_attr(self.delegate);
                // the receiver is now `self.<delegate>`, nothing below to rewrite
                return;
            }
        }
        walk_expr_mut(self, expr);
    }
}

/// Collapses `self.<delegate>` into `self`.
pub struct DelegateCollapser<'n> {
    pub delegate: &'n str,
}

impl VisitorMut for DelegateCollapser<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if expr.as_self_attr() == Some(self.delegate) {
            *expr = Expr::name("self");
            return;
        }
        walk_expr_mut(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn class(source: &str) -> ClassDef {
        parse_source("m.py", source)
            .unwrap()
            .unwrap()
            .declarations
            .into_iter()
            .find_map(|d| d.as_class().cloned())
            .unwrap()
    }

    const WIDGET: &str = r#"
class Widget:
    def __init__(self, size):
        super().__init__()
        self.size = size
        self.color = "red"

    def draw(self, canvas):
        canvas.draw(self.color)
        return self.render()

    def render(self):
        callback = self.render
        return callback
"#;

    #[test]
    fn test_method_renamer_covers_defs_calls_and_self_loads() {
        let mut widget = class(WIDGET);
        MethodRenamer {
            old: "render",
            new: "_render",
            property: false,
        }
        .rename_in(&mut widget);
        assert!(widget.defines_method("_render"));
        assert!(!references_member(&widget, "render"));
    }

    #[test]
    fn test_method_renamer_renames_calls_on_any_receiver() {
        let mut widget = class(WIDGET);
        MethodRenamer {
            old: "draw",
            new: "_draw",
            property: false,
        }
        .rename_in(&mut widget);
        // canvas.draw(...) is a call on `.draw` and is renamed too
        assert!(widget.defines_method("_draw"));
        assert!(!references_member(&widget, "draw"));
    }

    #[test]
    fn test_field_helpers() {
        let mut widget = class(WIDGET);
        assert!(field_used_outside_init(&widget, "color"));
        assert!(!field_used_outside_init(&widget, "size"));

        let init = widget.init().unwrap().clone();
        let fields = movable_fields(&widget);
        assert_eq!(fields.len(), 2);
        assert!(!is_portable_value(&fields[0].value, &init));
        assert!(is_portable_value(&fields[1].value, &init));

        assert!(!remove_field(
            &mut widget,
            "color",
            Some(&Expr::Constant("\"blue\"".into()))
        ));
        assert!(remove_field(&mut widget, "color", None));
        assert!(!widget.defines_field("color"));

        inject_field(
            &mut widget,
            Assign::self_field("color", Expr::Constant("\"green\"".into())),
        );
        let init = widget.init().unwrap();
        assert!(init.body[0].is_super_init_call());
        assert_eq!(init.body[1].field_name(), Some("color"));
    }

    #[test]
    fn test_carry_params() {
        let mut widget = class(WIDGET);
        let names = vec!["size".to_string(), "scale".to_string()];
        carry_params(&mut widget, &names);
        let init = widget.init().unwrap();
        assert_eq!(
            init.params,
            vec![Expr::name("self"), Expr::name("size"), Expr::name("scale")]
        );
        assert_eq!(init.body[0], Stmt::super_init_call());

        let mut bare = class("class Bare(Widget):\n    pass\n");
        carry_params(&mut bare, &names[..1]);
        let init = bare.init().unwrap();
        assert_eq!(init.param_names(), vec!["size".to_string()]);
        let Stmt::Expr(Expr::Call { args, .. }) = &init.body[0] else {
            panic!("expected super().__init__(size)");
        };
        assert_eq!(args, &vec![Expr::name("size")]);
    }

    #[test]
    fn test_delegate_router_and_collapser() {
        let mut widget = class(WIDGET);
        let members = vec!["color".to_string()];
        walk_body_mut(
            &mut DelegateRouter {
                delegate: "riwd_Base",
                members: &members,
            },
            &mut widget.body,
        );
        assert!(!references_field(&widget, "color"));
        assert!(references_field(&widget, "riwd_Base"));

        walk_body_mut(
            &mut DelegateCollapser {
                delegate: "riwd_Base",
            },
            &mut widget.body,
        );
        assert!(references_field(&widget, "color"));
        assert!(!references_field(&widget, "riwd_Base"));
    }

    #[test]
    fn test_add_member_replaces_pass() {
        let mut empty = class("class Empty:\n    pass\n");
        add_member(&mut empty, Stmt::FunctionDef(FunctionDef::init(vec![Stmt::Pass])));
        assert_eq!(empty.body.len(), 1);
        assert!(empty.init().is_some());
        assert!(remove_method(&mut empty, "__init__").is_some());
        assert!(empty.body.is_empty());
    }

    #[test]
    fn test_ensure_super_init() {
        let mut c = class("class C(B):\n    def __init__(self):\n        self.x = 1\n");
        ensure_super_init(&mut c);
        ensure_super_init(&mut c);
        let init = c.init().unwrap();
        assert!(init.body[0].is_super_init_call());
        assert_eq!(init.body.len(), 2);
    }
}
