use serde::Serialize;

use crate::lexer::Position;

/// A parsed source file, reduced to the declarations the generator reads.
/// Function bodies are skipped at parse time and never represented.
#[derive(Debug, Clone, Serialize)]
pub struct File {
    pub package: String,
    pub doc: Option<String>,
    pub imports: Vec<ImportSpec>,
    pub types: Vec<TypeDecl>,
    pub funcs: Vec<FuncDecl>,
}

impl File {
    pub fn type_decl(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSpec {
    pub path: String,
    pub alias: Option<String>,
    pub pos: Position,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeDecl {
    pub doc: Option<String>,
    pub name: String,
    /// `type A = B` alias form.
    pub assign: bool,
    pub type_params: Vec<TypeParam>,
    pub expr: TypeExpr,
    pub pos: Position,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeParam {
    pub names: Vec<String>,
    pub constraint: TypeExpr,
}

#[derive(Debug, Clone, Serialize)]
pub struct FuncDecl {
    pub doc: Option<String>,
    pub has_receiver: bool,
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub pos: Position,
}

#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub name: Option<String>,
    pub expr: TypeExpr,
    pub variadic: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDecl {
    pub doc: Option<String>,
    pub names: Vec<String>,
    pub embedded: bool,
    pub expr: TypeExpr,
    pub tag: Option<String>,
    pub pos: Position,
}

/// Type expressions, shaped after what the resolver dispatches on. Shapes
/// outside the supported subset (funcs, channels) parse into opaque variants
/// and only fail once something tries to resolve them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeExpr {
    Ident(String),
    Selector {
        pkg: String,
        name: String,
    },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array {
        len: String,
        elem: Box<TypeExpr>,
    },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Struct(Vec<FieldDecl>),
    /// Interface body reduced to its type terms; methods are dropped.
    Interface(Vec<TypeExpr>),
    Index {
        base: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
    Union(Vec<TypeExpr>),
    FuncType,
    Chan(Box<TypeExpr>),
}

impl PartialEq for FieldDecl {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names && self.expr == other.expr && self.tag == other.tag
    }
}

impl Eq for FieldDecl {}

impl TypeExpr {
    /// Rendering used for diagnostics and array lengths, not for emission.
    pub fn describe(&self) -> String {
        match self {
            TypeExpr::Ident(name) => name.clone(),
            TypeExpr::Selector { pkg, name } => format!("{pkg}.{name}"),
            TypeExpr::Pointer(inner) => format!("*{}", inner.describe()),
            TypeExpr::Slice(inner) => format!("[]{}", inner.describe()),
            TypeExpr::Array { len, elem } => format!("[{len}]{}", elem.describe()),
            TypeExpr::Map { key, value } => {
                format!("map[{}]{}", key.describe(), value.describe())
            }
            TypeExpr::Struct(_) => "struct{..}".to_string(),
            TypeExpr::Interface(_) => "interface{..}".to_string(),
            TypeExpr::Index { base, args } => {
                let args = args
                    .iter()
                    .map(TypeExpr::describe)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}[{args}]", base.describe())
            }
            TypeExpr::Union(terms) => terms
                .iter()
                .map(TypeExpr::describe)
                .collect::<Vec<_>>()
                .join(" | "),
            TypeExpr::FuncType => "func(..)".to_string(),
            TypeExpr::Chan(inner) => format!("chan {}", inner.describe()),
        }
    }
}
