//! Owned Python syntax model.
//!
//! The refactoring engine needs trees it can clone, compare and rewrite,
//! which tree-sitter's read-only trees cannot offer. The parser lowers each
//! file into these types. Source positions are deliberately absent: two
//! methods are "structurally identical" exactly when they compare equal.

/// Decorator names that mark a method as a property accessor.
const PROPERTY_DECORATORS: &[&str] = &["property", "cached_property"];

/// Accessor suffixes of `@<name>.setter` style decorators.
const PROPERTY_ACCESSORS: &[&str] = &["setter", "getter", "deleter"];

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A bare identifier.
    Name(String),
    /// `value.attr`
    Attribute { value: Box<Expr>, attr: String },
    /// `func(args, keywords)`
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    /// A literal, kept as its source text.
    Constant(String),
    /// Any other expression. `tokens` keeps operators and keywords so that
    /// `a + b` and `a - b` stay distinct.
    Compound {
        kind: String,
        tokens: Vec<String>,
        children: Vec<Expr>,
    },
}

/// A keyword argument (`name=value`) or a `**mapping` splat when `arg` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

impl Expr {
    /// `name`
    pub fn name(id: impl Into<String>) -> Self {
        Self::Name(id.into())
    }

    /// `value.attr`
    pub fn attribute(value: Expr, attr: impl Into<String>) -> Self {
        Self::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
    }

    /// `self.attr`
    pub fn self_attr(attr: impl Into<String>) -> Self {
        Self::attribute(Self::name("self"), attr)
    }

    /// `func()` with no arguments.
    pub fn call(func: Expr) -> Self {
        Self::Call {
            func: Box::new(func),
            args: Vec::new(),
            keywords: Vec::new(),
        }
    }

    /// Attribute name when this is `self.<attr>`.
    pub fn as_self_attr(&self) -> Option<&str> {
        match self {
            Self::Attribute { value, attr } if value.is_name("self") => Some(attr),
            _ => None,
        }
    }

    /// Whether this is the bare identifier `id`.
    pub fn is_name(&self, id: &str) -> bool {
        matches!(self, Self::Name(name) if name == id)
    }

    /// Name used when resolving a base-class expression: the identifier of a
    /// simple name, or the final attribute of a dotted reference.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Self::Name(id) => Some(id),
            Self::Attribute { attr, .. } => Some(attr),
            _ => None,
        }
    }

    /// Full dotted form of a name or attribute chain (`abc.ABC`).
    pub fn dotted(&self) -> Option<String> {
        match self {
            Self::Name(id) => Some(id.clone()),
            Self::Attribute { value, attr } => value.dotted().map(|v| format!("{v}.{attr}")),
            _ => None,
        }
    }

    /// Whether `self.<anything>` or bare `self` appears anywhere inside.
    pub fn mentions_self(&self) -> bool {
        let mut found = false;
        self.for_each(&mut |e| {
            if e.is_name("self") {
                found = true;
            }
        });
        found
    }

    /// Visit this expression and every sub-expression, pre-order.
    pub fn for_each(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Self::Name(_) | Self::Constant(_) => {}
            Self::Attribute { value, .. } => value.for_each(f),
            Self::Call {
                func,
                args,
                keywords,
            } => {
                func.for_each(f);
                for arg in args {
                    arg.for_each(f);
                }
                for kw in keywords {
                    kw.value.for_each(f);
                }
            }
            Self::Compound { children, .. } => {
                for child in children {
                    child.for_each(f);
                }
            }
        }
    }
}

/// An assignment statement. Chained assignments keep every target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assign {
    pub targets: Vec<Expr>,
    pub value: Expr,
}

impl Assign {
    /// `self.<attr> = value`
    pub fn self_field(attr: impl Into<String>, value: Expr) -> Self {
        Self {
            targets: vec![Expr::self_attr(attr)],
            value,
        }
    }

    /// Field name when the first target is `self.<name>`.
    pub fn field_name(&self) -> Option<&str> {
        self.targets.first().and_then(Expr::as_self_attr)
    }
}

/// An import statement: `import a.b as c` or `from m import x as y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Source module for `from` imports; `None` for plain `import`.
    pub module: Option<String>,
    pub names: Vec<Alias>,
}

/// One imported name with its optional local alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl ImportDecl {
    /// `from module import name`
    pub fn from_import(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            names: vec![Alias {
                name: name.into(),
                asname: None,
            }],
        }
    }

    /// Whether this import makes `local` available in the importing module.
    pub fn binds(&self, local: &str) -> bool {
        self.names.iter().any(|alias| match &alias.asname {
            Some(asname) => asname == local,
            None => alias.name == local,
        })
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Assign(Assign),
    Expr(Expr),
    Return(Option<Expr>),
    Pass,
    Import(ImportDecl),
    /// Every other statement (`if`, `for`, `try`, `with`, `raise`, augmented
    /// and annotated assignments, ...). `blocks` holds nested bodies and
    /// clauses in source order.
    Compound {
        kind: String,
        tokens: Vec<String>,
        exprs: Vec<Expr>,
        blocks: Vec<Vec<Stmt>>,
    },
}

impl Stmt {
    /// `super().__init__()`
    pub fn super_init_call() -> Self {
        Self::Expr(Expr::call(Expr::attribute(
            Expr::call(Expr::name("super")),
            "__init__",
        )))
    }

    /// Whether this statement is a bare `super().__init__(...)` call.
    pub fn is_super_init_call(&self) -> bool {
        let Self::Expr(Expr::Call { func, .. }) = self else {
            return false;
        };
        let Expr::Attribute { value, attr } = func.as_ref() else {
            return false;
        };
        if attr != "__init__" {
            return false;
        }
        matches!(value.as_ref(), Expr::Call { func, .. } if func.is_name("super"))
    }

    /// Assignment payload, if any.
    pub fn as_assign(&self) -> Option<&Assign> {
        match self {
            Self::Assign(assign) => Some(assign),
            _ => None,
        }
    }

    /// Field name when this is `self.<name> = ...`.
    pub fn field_name(&self) -> Option<&str> {
        self.as_assign().and_then(Assign::field_name)
    }
}

/// How a method is exposed, derived from its name and decorators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Specially named `__x__` method.
    Dunder,
    Property,
    Static,
    Class,
    Normal,
}

/// A function or method definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Expr>,
    pub decorators: Vec<Expr>,
    pub returns: Option<Expr>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
}

impl FunctionDef {
    /// `def __init__(self): <body>`
    pub fn init(body: Vec<Stmt>) -> Self {
        Self {
            name: "__init__".to_string(),
            params: vec![Expr::name("self")],
            decorators: Vec::new(),
            returns: None,
            body,
            is_async: false,
        }
    }

    /// Whether the name has the `__x__` shape.
    pub fn is_dunder(&self) -> bool {
        is_dunder(&self.name)
    }

    pub fn is_init(&self) -> bool {
        self.name == "__init__"
    }

    pub fn kind(&self) -> MethodKind {
        if self.is_dunder() {
            return MethodKind::Dunder;
        }
        if self.is_property() {
            return MethodKind::Property;
        }
        if self.has_decorator("staticmethod") {
            return MethodKind::Static;
        }
        if self.has_decorator("classmethod") {
            return MethodKind::Class;
        }
        MethodKind::Normal
    }

    /// `@property`, `@cached_property` or `@x.setter` style accessors.
    pub fn is_property(&self) -> bool {
        self.decorators.iter().any(|d| match d {
            Expr::Name(id) => PROPERTY_DECORATORS.contains(&id.as_str()),
            Expr::Attribute { attr, .. } => {
                PROPERTY_ACCESSORS.contains(&attr.as_str())
                    || PROPERTY_DECORATORS.contains(&attr.as_str())
            }
            _ => false,
        })
    }

    /// `@abstractmethod` or `@abc.abstractmethod`.
    pub fn is_abstract(&self) -> bool {
        self.decorators.iter().any(|d| match d {
            Expr::Name(id) => id == "abstractmethod",
            Expr::Attribute { value, attr } => value.is_name("abc") && attr == "abstractmethod",
            _ => false,
        })
    }

    fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| d.base_name() == Some(name))
    }

    /// Parameter names other than `self`. The bound name of a defaulted,
    /// typed or splat parameter is its first identifier.
    pub fn param_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for param in &self.params {
            let mut first = None;
            param.for_each(&mut |e| {
                if let (None, Expr::Name(id)) = (&first, e) {
                    first = Some(id.clone());
                }
            });
            if let Some(id) = first {
                if id != "self" && !names.contains(&id) {
                    names.push(id);
                }
            }
        }
        names
    }

    /// Names bound locally: parameters and plain-name assignment targets.
    pub fn local_names(&self) -> Vec<String> {
        let mut names = self.param_names();
        for stmt in &self.body {
            if let Stmt::Assign(assign) = stmt {
                for target in &assign.targets {
                    if let Expr::Name(id) = target {
                        if !names.contains(id) {
                            names.push(id.clone());
                        }
                    }
                }
            }
        }
        names
    }
}

/// Whether a name has the `__x__` shape reserved for special methods.
pub fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// A class definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub keywords: Vec<Keyword>,
    pub decorators: Vec<Expr>,
    pub body: Vec<Stmt>,
}

impl ClassDef {
    /// A new class with the given bases and body.
    pub fn new(name: impl Into<String>, bases: Vec<Expr>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            bases,
            keywords: Vec::new(),
            decorators: Vec::new(),
            body,
        }
    }

    /// Methods defined directly in the class body.
    pub fn methods(&self) -> impl Iterator<Item = &FunctionDef> {
        self.body.iter().filter_map(|stmt| match stmt {
            Stmt::FunctionDef(f) => Some(f),
            _ => None,
        })
    }

    /// Mutable access to the methods defined directly in the class body.
    pub fn methods_mut(&mut self) -> impl Iterator<Item = &mut FunctionDef> {
        self.body.iter_mut().filter_map(|stmt| match stmt {
            Stmt::FunctionDef(f) => Some(f),
            _ => None,
        })
    }

    /// Methods whose names are not `__x__`.
    pub fn normal_methods(&self) -> impl Iterator<Item = &FunctionDef> {
        self.methods().filter(|m| !m.is_dunder())
    }

    pub fn method(&self, name: &str) -> Option<&FunctionDef> {
        self.methods().find(|m| m.name == name)
    }

    pub fn defines_method(&self, name: &str) -> bool {
        self.method(name).is_some()
    }

    /// Body index of the method called `name`.
    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.body
            .iter()
            .position(|stmt| matches!(stmt, Stmt::FunctionDef(f) if f.name == name))
    }

    pub fn init(&self) -> Option<&FunctionDef> {
        self.method("__init__")
    }

    pub fn init_mut(&mut self) -> Option<&mut FunctionDef> {
        self.methods_mut().find(|m| m.is_init())
    }

    /// The initializer, created as `def __init__(self)` at the top of the
    /// body (replacing a lone `pass`) when missing. `super_call` seeds a new
    /// initializer with `super().__init__()`.
    pub fn init_or_insert(&mut self, super_call: bool) -> &mut FunctionDef {
        let index = match self.method_index("__init__") {
            Some(index) => index,
            None => {
                let body = if super_call {
                    vec![Stmt::super_init_call()]
                } else {
                    Vec::new()
                };
                if self.body == [Stmt::Pass] {
                    self.body.clear();
                }
                self.body.insert(0, Stmt::FunctionDef(FunctionDef::init(body)));
                0
            }
        };
        match &mut self.body[index] {
            Stmt::FunctionDef(f) => f,
            _ => unreachable!("method_index only returns function definitions"),
        }
    }

    /// Instance fields: top-level `self.<x> = ...` assignments in `__init__`.
    pub fn instance_fields(&self) -> Vec<&Assign> {
        self.init()
            .map(|init| {
                init.body
                    .iter()
                    .filter_map(Stmt::as_assign)
                    .filter(|a| a.field_name().is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The initializer assignment defining `field`, if any.
    pub fn field(&self, field: &str) -> Option<&Assign> {
        self.instance_fields()
            .into_iter()
            .find(|a| a.field_name() == Some(field))
    }

    /// Whether `__init__` assigns `self.<field>` at its top level.
    pub fn defines_field(&self, field: &str) -> bool {
        self.init().is_some_and(|init| {
            init.body.iter().filter_map(Stmt::as_assign).any(|a| {
                a.targets.iter().any(|t| t.as_self_attr() == Some(field))
            })
        })
    }

    /// Whether the class derives from `ABC` or uses `metaclass=ABCMeta`.
    pub fn is_abstract_base(&self) -> bool {
        self.abc_base_index().is_some() || self.abc_keyword_index().is_some()
    }

    /// Drop the `ABC` base and the `ABCMeta` metaclass keyword. Returns
    /// whether anything was removed.
    pub fn remove_abstract_base(&mut self) -> bool {
        let mut removed = false;
        if let Some(index) = self.abc_base_index() {
            self.bases.remove(index);
            removed = true;
        }
        if let Some(index) = self.abc_keyword_index() {
            self.keywords.remove(index);
            removed = true;
        }
        removed
    }

    /// Whether any method carries `@abstractmethod`.
    pub fn has_abstract_method(&self) -> bool {
        self.methods().any(FunctionDef::is_abstract)
    }

    fn abc_base_index(&self) -> Option<usize> {
        self.bases.iter().position(|base| match base {
            Expr::Name(id) => id == "ABC",
            Expr::Attribute { value, attr } => value.is_name("abc") && attr == "ABC",
            _ => false,
        })
    }

    fn abc_keyword_index(&self) -> Option<usize> {
        self.keywords.iter().position(|kw| {
            kw.arg.as_deref() == Some("metaclass")
                && match &kw.value {
                    Expr::Name(id) => id == "ABCMeta",
                    Expr::Attribute { value, attr } => value.is_name("abc") && attr == "ABCMeta",
                    _ => false,
                }
        })
    }

    /// Replace an empty class body, and empty method bodies, with `pass`.
    pub fn ensure_bodies(&mut self) {
        for method in self.methods_mut() {
            if method.body.is_empty() {
                method.body.push(Stmt::Pass);
            }
        }
        if self.body.is_empty() {
            self.body.push(Stmt::Pass);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, decorators: Vec<Expr>) -> FunctionDef {
        FunctionDef {
            name: name.to_string(),
            params: vec![Expr::name("self")],
            decorators,
            returns: None,
            body: vec![Stmt::Pass],
            is_async: false,
        }
    }

    #[test]
    fn test_super_init_call_round_trip() {
        assert!(Stmt::super_init_call().is_super_init_call());
        assert!(!Stmt::Pass.is_super_init_call());
        let other = Stmt::Expr(Expr::call(Expr::attribute(
            Expr::call(Expr::name("super")),
            "setup",
        )));
        assert!(!other.is_super_init_call());
    }

    #[test]
    fn test_method_kind() {
        assert_eq!(method("__repr__", vec![]).kind(), MethodKind::Dunder);
        assert_eq!(
            method("size", vec![Expr::name("property")]).kind(),
            MethodKind::Property
        );
        assert_eq!(
            method("size", vec![Expr::attribute(Expr::name("size"), "setter")]).kind(),
            MethodKind::Property
        );
        assert_eq!(
            method("make", vec![Expr::name("staticmethod")]).kind(),
            MethodKind::Static
        );
        assert_eq!(
            method("build", vec![Expr::name("classmethod")]).kind(),
            MethodKind::Class
        );
        assert_eq!(method("draw", vec![]).kind(), MethodKind::Normal);
        assert!(!is_dunder("__"));
        assert!(!is_dunder("__private"));
    }

    #[test]
    fn test_instance_fields_only_from_init() {
        let init = FunctionDef::init(vec![
            Stmt::super_init_call(),
            Stmt::Assign(Assign::self_field("x", Expr::Constant("1".into()))),
            Stmt::Assign(Assign {
                targets: vec![Expr::name("local")],
                value: Expr::Constant("2".into()),
            }),
        ]);
        let mut other = method("update", vec![]);
        other.body = vec![Stmt::Assign(Assign::self_field(
            "y",
            Expr::Constant("3".into()),
        ))];
        let class = ClassDef::new(
            "Point",
            vec![],
            vec![Stmt::FunctionDef(init), Stmt::FunctionDef(other)],
        );

        let fields: Vec<_> = class
            .instance_fields()
            .into_iter()
            .filter_map(Assign::field_name)
            .collect();
        assert_eq!(fields, vec!["x"]);
        assert!(class.defines_field("x"));
        assert!(!class.defines_field("y"));
    }

    #[test]
    fn test_abstract_base_detection_and_removal() {
        let mut class = ClassDef::new(
            "Shape",
            vec![Expr::attribute(Expr::name("abc"), "ABC")],
            vec![Stmt::Pass],
        );
        assert!(class.is_abstract_base());
        assert!(class.remove_abstract_base());
        assert!(!class.is_abstract_base());
        assert!(class.bases.is_empty());

        let mut meta = ClassDef::new("Shape", vec![], vec![Stmt::Pass]);
        meta.keywords.push(Keyword {
            arg: Some("metaclass".into()),
            value: Expr::name("ABCMeta"),
        });
        assert!(meta.is_abstract_base());
        assert!(meta.remove_abstract_base());
        assert!(meta.keywords.is_empty());
    }

    #[test]
    fn test_init_or_insert_creates_with_super_call() {
        let mut class = ClassDef::new("Child", vec![Expr::name("Base")], vec![Stmt::Pass]);
        let init = class.init_or_insert(true);
        assert_eq!(init.body, vec![Stmt::super_init_call()]);
        assert_eq!(class.method_index("__init__"), Some(0));
        // existing initializer is reused
        class.init_or_insert(true).body.push(Stmt::Pass);
        assert_eq!(class.methods().count(), 1);
    }

    #[test]
    fn test_ensure_bodies() {
        let mut class = ClassDef::new("Empty", vec![], vec![]);
        class.ensure_bodies();
        assert_eq!(class.body, vec![Stmt::Pass]);
    }

    #[test]
    fn test_local_names_excludes_self() {
        let mut init = FunctionDef::init(vec![Stmt::Assign(Assign {
            targets: vec![Expr::name("tmp")],
            value: Expr::Constant("0".into()),
        })]);
        init.params.push(Expr::name("size"));
        assert_eq!(init.local_names(), vec!["size".to_string(), "tmp".to_string()]);
    }

    #[test]
    fn test_param_names_skip_defaults() {
        let mut init = FunctionDef::init(vec![]);
        init.params.push(Expr::name("size"));
        init.params.push(Expr::Compound {
            kind: "default_parameter".into(),
            tokens: vec!["=".into()],
            children: vec![Expr::name("scale"), Expr::name("DEFAULT_SCALE")],
        });
        assert_eq!(
            init.param_names(),
            vec!["size".to_string(), "scale".to_string()]
        );
    }
}
