//! Tree-sitter based Python parser.
//!
//! Each file's tree-sitter syntax tree is lowered into the owned model in
//! [`crate::model`]. Only top-level class definitions and imports become
//! declarations; everything else at module level is dropped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};
use tree_sitter::{LanguageError, Node, Parser as TsParser};
use walkdir::WalkDir;

use crate::core::{Error, Result};
use crate::model::{
    Alias, Assign, ClassDef, Container, Declaration, Expr, FileId, FunctionDef, ImportDecl,
    Keyword, Snapshot, Stmt,
};

/// Module files that never carry library classes.
const IGNORED_FILES: &[&str] = &["__init__.py", "__main__.py"];

/// Literal node kinds kept verbatim as [`Expr::Constant`].
const LITERAL_KINDS: &[&str] = &[
    "string",
    "concatenated_string",
    "integer",
    "float",
    "true",
    "false",
    "none",
    "ellipsis",
];

/// Create a tree-sitter parser configured for Python.
pub fn python_parser() -> std::result::Result<TsParser, LanguageError> {
    let mut parser = TsParser::new();
    parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
    Ok(parser)
}

/// Parse every class-bearing Python file under `root` into a snapshot.
///
/// A syntax error in any file fails the whole library.
pub fn parse_library(root: impl AsRef<Path>) -> Result<Snapshot> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::LibraryNotFound {
            path: root.to_path_buf(),
        });
    }

    let files = collect_python_files(root);
    debug!(count = files.len(), root = %root.display(), "Discovered Python files");

    let parsed: Vec<Option<(FileId, Container)>> = files
        .par_iter()
        .map_init(python_parser, |parser, path| -> Result<Option<(FileId, Container)>> {
            let parser = parser.as_mut().map_err(|e| Error::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let source = std::fs::read_to_string(path)?;
            let file_id = file_id(root, path);
            let container = lower_source(parser, path, &source)?;
            Ok(container.map(|c| (file_id, c)))
        })
        .collect::<Result<_>>()?;

    let containers: BTreeMap<FileId, Container> = parsed.into_iter().flatten().collect();
    info!(
        files = containers.len(),
        classes = containers.values().map(|c| c.classes().count()).sum::<usize>(),
        "Parsed library"
    );
    Ok(Snapshot::new(containers))
}

/// Parse one in-memory file. Returns `None` when it declares no classes.
pub fn parse_source(file: &str, source: &str) -> Result<Option<Container>> {
    let mut parser = python_parser().map_err(|e| Error::Parse {
        path: PathBuf::from(file),
        message: e.to_string(),
    })?;
    lower_source(&mut parser, Path::new(file), source)
}

/// Build a snapshot from in-memory `(file id, source)` pairs.
pub fn parse_sources<'a, I>(sources: I) -> Result<Snapshot>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut containers = BTreeMap::new();
    for (file, source) in sources {
        if let Some(container) = parse_source(file, source)? {
            containers.insert(file.to_string(), container);
        }
    }
    Ok(Snapshot::new(containers))
}

fn collect_python_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "py"))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !IGNORED_FILES.contains(&n))
        })
        .collect();
    files.sort();
    files
}

fn file_id(root: &Path, path: &Path) -> FileId {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn lower_source(parser: &mut TsParser, path: &Path, source: &str) -> Result<Option<Container>> {
    let tree = parser.parse(source, None).ok_or_else(|| Error::Parse {
        path: path.to_path_buf(),
        message: "parser produced no tree".to_string(),
    })?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(Error::Parse {
            path: path.to_path_buf(),
            message: first_error_position(root)
                .map(|(row, col)| format!("syntax error at line {}, column {}", row + 1, col + 1))
                .unwrap_or_else(|| "syntax error".to_string()),
        });
    }

    let lowerer = Lowerer {
        source: source.as_bytes(),
    };
    let declarations = lowerer.module(root);
    if !declarations
        .iter()
        .any(|d| matches!(d, Declaration::Class(_)))
    {
        return Ok(None);
    }
    Ok(Some(Container::new(declarations)))
}

fn first_error_position(node: Node<'_>) -> Option<(usize, usize)> {
    if node.is_error() || node.is_missing() {
        let p = node.start_position();
        return Some((p.row, p.column));
    }
    for child in node.children(&mut node.walk()) {
        if child.has_error() {
            if let Some(pos) = first_error_position(child) {
                return Some(pos);
            }
        }
    }
    None
}

/// Lowers tree-sitter nodes into the owned model.
struct Lowerer<'s> {
    source: &'s [u8],
}

impl Lowerer<'_> {
    fn text(&self, node: Node<'_>) -> String {
        node.utf8_text(self.source).unwrap_or("").to_string()
    }

    fn named_children<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        node.named_children(&mut node.walk())
            .filter(|c| c.kind() != "comment")
            .collect()
    }

    fn module(&self, root: Node<'_>) -> Vec<Declaration> {
        let mut declarations = Vec::new();
        for child in self.named_children(root) {
            match child.kind() {
                "class_definition" => declarations.push(Declaration::Class(self.class(child))),
                "decorated_definition" => {
                    if let Stmt::ClassDef(class) = self.decorated(child) {
                        declarations.push(Declaration::Class(class));
                    }
                }
                "import_statement" | "import_from_statement" => {
                    declarations.push(Declaration::Import(self.import(child)));
                }
                _ => {}
            }
        }
        declarations
    }

    fn block(&self, node: Node<'_>) -> Vec<Stmt> {
        self.named_children(node)
            .into_iter()
            .map(|c| self.stmt(c))
            .collect()
    }

    fn stmt(&self, node: Node<'_>) -> Stmt {
        match node.kind() {
            "class_definition" => Stmt::ClassDef(self.class(node)),
            "function_definition" => Stmt::FunctionDef(self.function(node)),
            "decorated_definition" => self.decorated(node),
            "expression_statement" => self.expression_statement(node),
            "return_statement" => Stmt::Return(
                self.named_children(node)
                    .first()
                    .map(|value| self.expr(*value)),
            ),
            "pass_statement" => Stmt::Pass,
            "import_statement" | "import_from_statement" => Stmt::Import(self.import(node)),
            _ => self.compound_stmt(node),
        }
    }

    fn expression_statement(&self, node: Node<'_>) -> Stmt {
        let children = self.named_children(node);
        match children.as_slice() {
            [single] if single.kind() == "assignment" => self.assignment(*single),
            [single] if single.kind() == "augmented_assignment" => self.compound_stmt(*single),
            [single] => Stmt::Expr(self.expr(*single)),
            _ => Stmt::Expr(Expr::Compound {
                kind: "expression_list".to_string(),
                tokens: Vec::new(),
                children: children.iter().map(|c| self.expr(*c)).collect(),
            }),
        }
    }

    /// Plain and chained assignments become [`Stmt::Assign`]; annotated or
    /// declaration-only forms stay compound.
    fn assignment(&self, node: Node<'_>) -> Stmt {
        let mut targets = Vec::new();
        let mut current = node;
        loop {
            let (Some(left), Some(right)) = (
                current.child_by_field_name("left"),
                current.child_by_field_name("right"),
            ) else {
                return self.compound_stmt(node);
            };
            if current.child_by_field_name("type").is_some() {
                return self.compound_stmt(node);
            }
            targets.push(self.expr(left));
            if right.kind() == "assignment" {
                current = right;
                continue;
            }
            return Stmt::Assign(Assign {
                targets,
                value: self.expr(right),
            });
        }
    }

    fn compound_stmt(&self, node: Node<'_>) -> Stmt {
        let mut tokens = Vec::new();
        let mut exprs = Vec::new();
        let mut blocks = Vec::new();
        for child in node.children(&mut node.walk()) {
            let kind = child.kind();
            if kind == "comment" {
                continue;
            }
            if kind == "block" {
                blocks.push(self.block(child));
            } else if kind.ends_with("_clause") {
                blocks.push(vec![self.compound_stmt(child)]);
            } else if child.is_named() {
                exprs.push(self.expr(child));
            } else {
                tokens.push(self.text(child));
            }
        }
        Stmt::Compound {
            kind: node.kind().to_string(),
            tokens,
            exprs,
            blocks,
        }
    }

    fn decorated(&self, node: Node<'_>) -> Stmt {
        let decorators: Vec<Expr> = self
            .named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "decorator")
            .filter_map(|d| self.named_children(d).first().map(|e| self.expr(*e)))
            .collect();
        let Some(definition) = node.child_by_field_name("definition") else {
            return self.compound_stmt(node);
        };
        match definition.kind() {
            "class_definition" => {
                let mut class = self.class(definition);
                class.decorators = decorators;
                Stmt::ClassDef(class)
            }
            "function_definition" => {
                let mut function = self.function(definition);
                function.decorators = decorators;
                Stmt::FunctionDef(function)
            }
            _ => self.compound_stmt(node),
        }
    }

    fn class(&self, node: Node<'_>) -> ClassDef {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();
        let (bases, keywords) = node
            .child_by_field_name("superclasses")
            .map(|args| self.arguments(args))
            .unwrap_or_default();
        let body = node
            .child_by_field_name("body")
            .map(|b| self.block(b))
            .unwrap_or_default();
        ClassDef {
            name,
            bases,
            keywords,
            decorators: Vec::new(),
            body,
        }
    }

    fn function(&self, node: Node<'_>) -> FunctionDef {
        let is_async = node
            .children(&mut node.walk())
            .any(|c| !c.is_named() && c.kind() == "async");
        FunctionDef {
            name: node
                .child_by_field_name("name")
                .map(|n| self.text(n))
                .unwrap_or_default(),
            params: node
                .child_by_field_name("parameters")
                .map(|p| {
                    self.named_children(p)
                        .into_iter()
                        .map(|c| self.expr(c))
                        .collect()
                })
                .unwrap_or_default(),
            decorators: Vec::new(),
            returns: node.child_by_field_name("return_type").map(|r| self.expr(r)),
            body: node
                .child_by_field_name("body")
                .map(|b| self.block(b))
                .unwrap_or_default(),
            is_async,
        }
    }

    fn import(&self, node: Node<'_>) -> ImportDecl {
        let module = node.child_by_field_name("module_name").map(|m| self.text(m));
        let mut names: Vec<Alias> = node
            .children_by_field_name("name", &mut node.walk())
            .map(|n| self.alias(n))
            .collect();
        if self
            .named_children(node)
            .iter()
            .any(|c| c.kind() == "wildcard_import")
        {
            names.push(Alias {
                name: "*".to_string(),
                asname: None,
            });
        }
        ImportDecl { module, names }
    }

    fn alias(&self, node: Node<'_>) -> Alias {
        if node.kind() == "aliased_import" {
            Alias {
                name: node
                    .child_by_field_name("name")
                    .map(|n| self.text(n))
                    .unwrap_or_default(),
                asname: node.child_by_field_name("alias").map(|a| self.text(a)),
            }
        } else {
            Alias {
                name: self.text(node),
                asname: None,
            }
        }
    }

    fn arguments(&self, node: Node<'_>) -> (Vec<Expr>, Vec<Keyword>) {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        for child in self.named_children(node) {
            match child.kind() {
                "keyword_argument" => keywords.push(Keyword {
                    arg: child.child_by_field_name("name").map(|n| self.text(n)),
                    value: child
                        .child_by_field_name("value")
                        .map(|v| self.expr(v))
                        .unwrap_or_else(|| Expr::Constant(String::new())),
                }),
                "dictionary_splat" => {
                    if let Some(value) = self.named_children(child).first() {
                        keywords.push(Keyword {
                            arg: None,
                            value: self.expr(*value),
                        });
                    }
                }
                _ => args.push(self.expr(child)),
            }
        }
        (args, keywords)
    }

    fn expr(&self, node: Node<'_>) -> Expr {
        let kind = node.kind();
        match kind {
            "identifier" => Expr::Name(self.text(node)),
            "attribute" => match (
                node.child_by_field_name("object"),
                node.child_by_field_name("attribute"),
            ) {
                (Some(object), Some(attr)) => Expr::attribute(self.expr(object), self.text(attr)),
                _ => self.compound_expr(node),
            },
            "call" => {
                let Some(function) = node.child_by_field_name("function") else {
                    return self.compound_expr(node);
                };
                let (args, keywords) = match node.child_by_field_name("arguments") {
                    Some(a) if a.kind() == "argument_list" => self.arguments(a),
                    Some(generator) => (vec![self.expr(generator)], Vec::new()),
                    None => Default::default(),
                };
                Expr::Call {
                    func: Box::new(self.expr(function)),
                    args,
                    keywords,
                }
            }
            "parenthesized_expression" => match self.named_children(node).as_slice() {
                [inner] => self.expr(*inner),
                _ => self.compound_expr(node),
            },
            _ if LITERAL_KINDS.contains(&kind) => Expr::Constant(self.text(node)),
            _ => self.compound_expr(node),
        }
    }

    fn compound_expr(&self, node: Node<'_>) -> Expr {
        let mut tokens = Vec::new();
        let mut children = Vec::new();
        if node.child_count() == 0 {
            tokens.push(self.text(node));
        }
        for child in node.children(&mut node.walk()) {
            if child.kind() == "comment" {
                continue;
            }
            if child.is_named() {
                children.push(self.expr(child));
            } else {
                tokens.push(self.text(child));
            }
        }
        Expr::Compound {
            kind: node.kind().to_string(),
            tokens,
            children,
        }
    }
}
