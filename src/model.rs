use serde::Serialize;
use serde_json::{Map, Value};

use crate::entity_id;
use crate::util;

pub type Properties = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    C,
    Cpp,
    Java,
    CSharp,
    Go,
    Sql,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "TypeScript",
            Language::Tsx => "TSX",
            Language::JavaScript => "JavaScript",
            Language::Python => "Python",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Java => "Java",
            Language::CSharp => "C#",
            Language::Go => "Go",
            Language::Sql => "SQL",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Language> {
        match ext {
            "ts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "js" | "jsx" => Some(Language::JavaScript),
            "py" => Some(Language::Python),
            "c" | "h" => Some(Language::C),
            "cpp" | "hpp" | "cc" | "hh" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            "cs" => Some(Language::CSharp),
            "go" => Some(Language::Go),
            "sql" => Some(Language::Sql),
            _ => None,
        }
    }

    /// TS/JS/TSX files all join the shared project and are parsed together.
    pub fn is_ts_family(&self) -> bool {
        matches!(
            self,
            Language::TypeScript | Language::Tsx | Language::JavaScript
        )
    }
}

/// Closed node-kind vocabulary. The `label()` string is the hashing input for
/// entity ids, the Neo4j label, and the wire name in the Python protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    File,
    Directory,
    Class,
    Interface,
    Function,
    Method,
    Variable,
    Parameter,
    TypeAlias,
    Import,
    Export,
    Component,
    JsxElement,
    JsxAttribute,
    TailwindClass,
    PythonFunction,
    PythonClass,
    PythonMethod,
    PythonParameter,
    PythonVariable,
    PythonModule,
    JavaClass,
    JavaInterface,
    JavaMethod,
    JavaField,
    CppClass,
    CppMethod,
    CFunction,
    IncludeDirective,
    MacroDefinition,
    CSharpClass,
    CSharpInterface,
    CSharpStruct,
    CSharpMethod,
    Property,
    Field,
    GoFunction,
    GoMethod,
    GoStruct,
    GoInterface,
    PackageDeclaration,
    PackageClause,
    ImportDeclaration,
    ImportSpec,
    NamespaceDeclaration,
    UsingDirective,
    SqlTable,
    SqlView,
    SqlColumn,
    SqlSelectStatement,
    SqlInsertStatement,
    SqlUpdateStatement,
    SqlDeleteStatement,
}

pub const NODE_KINDS: &[NodeKind] = &[
    NodeKind::File,
    NodeKind::Directory,
    NodeKind::Class,
    NodeKind::Interface,
    NodeKind::Function,
    NodeKind::Method,
    NodeKind::Variable,
    NodeKind::Parameter,
    NodeKind::TypeAlias,
    NodeKind::Import,
    NodeKind::Export,
    NodeKind::Component,
    NodeKind::JsxElement,
    NodeKind::JsxAttribute,
    NodeKind::TailwindClass,
    NodeKind::PythonFunction,
    NodeKind::PythonClass,
    NodeKind::PythonMethod,
    NodeKind::PythonParameter,
    NodeKind::PythonVariable,
    NodeKind::PythonModule,
    NodeKind::JavaClass,
    NodeKind::JavaInterface,
    NodeKind::JavaMethod,
    NodeKind::JavaField,
    NodeKind::CppClass,
    NodeKind::CppMethod,
    NodeKind::CFunction,
    NodeKind::IncludeDirective,
    NodeKind::MacroDefinition,
    NodeKind::CSharpClass,
    NodeKind::CSharpInterface,
    NodeKind::CSharpStruct,
    NodeKind::CSharpMethod,
    NodeKind::Property,
    NodeKind::Field,
    NodeKind::GoFunction,
    NodeKind::GoMethod,
    NodeKind::GoStruct,
    NodeKind::GoInterface,
    NodeKind::PackageDeclaration,
    NodeKind::PackageClause,
    NodeKind::ImportDeclaration,
    NodeKind::ImportSpec,
    NodeKind::NamespaceDeclaration,
    NodeKind::UsingDirective,
    NodeKind::SqlTable,
    NodeKind::SqlView,
    NodeKind::SqlColumn,
    NodeKind::SqlSelectStatement,
    NodeKind::SqlInsertStatement,
    NodeKind::SqlUpdateStatement,
    NodeKind::SqlDeleteStatement,
];

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::File => "File",
            NodeKind::Directory => "Directory",
            NodeKind::Class => "Class",
            NodeKind::Interface => "Interface",
            NodeKind::Function => "Function",
            NodeKind::Method => "Method",
            NodeKind::Variable => "Variable",
            NodeKind::Parameter => "Parameter",
            NodeKind::TypeAlias => "TypeAlias",
            NodeKind::Import => "Import",
            NodeKind::Export => "Export",
            NodeKind::Component => "Component",
            NodeKind::JsxElement => "JSXElement",
            NodeKind::JsxAttribute => "JSXAttribute",
            NodeKind::TailwindClass => "TailwindClass",
            NodeKind::PythonFunction => "PythonFunction",
            NodeKind::PythonClass => "PythonClass",
            NodeKind::PythonMethod => "PythonMethod",
            NodeKind::PythonParameter => "PythonParameter",
            NodeKind::PythonVariable => "PythonVariable",
            NodeKind::PythonModule => "PythonModule",
            NodeKind::JavaClass => "JavaClass",
            NodeKind::JavaInterface => "JavaInterface",
            NodeKind::JavaMethod => "JavaMethod",
            NodeKind::JavaField => "JavaField",
            NodeKind::CppClass => "CppClass",
            NodeKind::CppMethod => "CppMethod",
            NodeKind::CFunction => "CFunction",
            NodeKind::IncludeDirective => "IncludeDirective",
            NodeKind::MacroDefinition => "MacroDefinition",
            NodeKind::CSharpClass => "CSharpClass",
            NodeKind::CSharpInterface => "CSharpInterface",
            NodeKind::CSharpStruct => "CSharpStruct",
            NodeKind::CSharpMethod => "CSharpMethod",
            NodeKind::Property => "Property",
            NodeKind::Field => "Field",
            NodeKind::GoFunction => "GoFunction",
            NodeKind::GoMethod => "GoMethod",
            NodeKind::GoStruct => "GoStruct",
            NodeKind::GoInterface => "GoInterface",
            NodeKind::PackageDeclaration => "PackageDeclaration",
            NodeKind::PackageClause => "PackageClause",
            NodeKind::ImportDeclaration => "ImportDeclaration",
            NodeKind::ImportSpec => "ImportSpec",
            NodeKind::NamespaceDeclaration => "NamespaceDeclaration",
            NodeKind::UsingDirective => "UsingDirective",
            NodeKind::SqlTable => "SQLTable",
            NodeKind::SqlView => "SQLView",
            NodeKind::SqlColumn => "SQLColumn",
            NodeKind::SqlSelectStatement => "SQLSelectStatement",
            NodeKind::SqlInsertStatement => "SQLInsertStatement",
            NodeKind::SqlUpdateStatement => "SQLUpdateStatement",
            NodeKind::SqlDeleteStatement => "SQLDeleteStatement",
        }
    }

    pub fn from_label(label: &str) -> Option<NodeKind> {
        NODE_KINDS.iter().copied().find(|k| k.label() == label)
    }
}

/// Closed relationship vocabulary. `weight()` ranks structural strength in
/// [0, 10].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelType {
    Contains,
    Imports,
    ResolvesImport,
    Exports,
    Calls,
    Extends,
    Implements,
    HasMethod,
    HasField,
    HasProperty,
    HasParameter,
    HasColumn,
    MutatesState,
    HandlesError,
    DefinesClass,
    DefinesInterface,
    DefinesStruct,
    DefinesEnum,
    DefinesFunction,
    DefinesTable,
    DefinesView,
    DefinesComponent,
    DeclaresPackage,
    DeclaresNamespace,
    Includes,
    RendersElement,
    UsesComponent,
    HasProp,
    UsesTailwindClass,
    ReferencesTable,
    ReferencesView,
    PythonImports,
    PythonCalls,
    PythonHasMethod,
    PythonHasParameter,
    PythonDefinesFunction,
    PythonDefinesClass,
}

pub const REL_TYPES: &[RelType] = &[
    RelType::Contains,
    RelType::Imports,
    RelType::ResolvesImport,
    RelType::Exports,
    RelType::Calls,
    RelType::Extends,
    RelType::Implements,
    RelType::HasMethod,
    RelType::HasField,
    RelType::HasProperty,
    RelType::HasParameter,
    RelType::HasColumn,
    RelType::MutatesState,
    RelType::HandlesError,
    RelType::DefinesClass,
    RelType::DefinesInterface,
    RelType::DefinesStruct,
    RelType::DefinesEnum,
    RelType::DefinesFunction,
    RelType::DefinesTable,
    RelType::DefinesView,
    RelType::DefinesComponent,
    RelType::DeclaresPackage,
    RelType::DeclaresNamespace,
    RelType::Includes,
    RelType::RendersElement,
    RelType::UsesComponent,
    RelType::HasProp,
    RelType::UsesTailwindClass,
    RelType::ReferencesTable,
    RelType::ReferencesView,
    RelType::PythonImports,
    RelType::PythonCalls,
    RelType::PythonHasMethod,
    RelType::PythonHasParameter,
    RelType::PythonDefinesFunction,
    RelType::PythonDefinesClass,
];

impl RelType {
    pub fn label(&self) -> &'static str {
        match self {
            RelType::Contains => "CONTAINS",
            RelType::Imports => "IMPORTS",
            RelType::ResolvesImport => "RESOLVES_IMPORT",
            RelType::Exports => "EXPORTS",
            RelType::Calls => "CALLS",
            RelType::Extends => "EXTENDS",
            RelType::Implements => "IMPLEMENTS",
            RelType::HasMethod => "HAS_METHOD",
            RelType::HasField => "HAS_FIELD",
            RelType::HasProperty => "HAS_PROPERTY",
            RelType::HasParameter => "HAS_PARAMETER",
            RelType::HasColumn => "HAS_COLUMN",
            RelType::MutatesState => "MUTATES_STATE",
            RelType::HandlesError => "HANDLES_ERROR",
            RelType::DefinesClass => "DEFINES_CLASS",
            RelType::DefinesInterface => "DEFINES_INTERFACE",
            RelType::DefinesStruct => "DEFINES_STRUCT",
            RelType::DefinesEnum => "DEFINES_ENUM",
            RelType::DefinesFunction => "DEFINES_FUNCTION",
            RelType::DefinesTable => "DEFINES_TABLE",
            RelType::DefinesView => "DEFINES_VIEW",
            RelType::DefinesComponent => "DEFINES_COMPONENT",
            RelType::DeclaresPackage => "DECLARES_PACKAGE",
            RelType::DeclaresNamespace => "DECLARES_NAMESPACE",
            RelType::Includes => "INCLUDES",
            RelType::RendersElement => "RENDERS_ELEMENT",
            RelType::UsesComponent => "USES_COMPONENT",
            RelType::HasProp => "HAS_PROP",
            RelType::UsesTailwindClass => "USES_TAILWIND_CLASS",
            RelType::ReferencesTable => "REFERENCES_TABLE",
            RelType::ReferencesView => "REFERENCES_VIEW",
            RelType::PythonImports => "PYTHON_IMPORTS",
            RelType::PythonCalls => "PYTHON_CALLS",
            RelType::PythonHasMethod => "PYTHON_HAS_METHOD",
            RelType::PythonHasParameter => "PYTHON_HAS_PARAMETER",
            RelType::PythonDefinesFunction => "PYTHON_DEFINES_FUNCTION",
            RelType::PythonDefinesClass => "PYTHON_DEFINES_CLASS",
        }
    }

    pub fn from_label(label: &str) -> Option<RelType> {
        REL_TYPES.iter().copied().find(|t| t.label() == label)
    }

    pub fn weight(&self) -> i64 {
        match self {
            RelType::Contains => 10,
            RelType::HasMethod
            | RelType::HasField
            | RelType::HasProperty
            | RelType::HasParameter
            | RelType::HasColumn
            | RelType::PythonHasMethod
            | RelType::PythonHasParameter => 9,
            RelType::Extends
            | RelType::Implements
            | RelType::DefinesClass
            | RelType::DefinesInterface
            | RelType::DefinesStruct
            | RelType::DefinesEnum
            | RelType::DefinesFunction
            | RelType::DefinesTable
            | RelType::DefinesView
            | RelType::DefinesComponent
            | RelType::DeclaresPackage
            | RelType::DeclaresNamespace
            | RelType::PythonDefinesFunction
            | RelType::PythonDefinesClass => 8,
            RelType::Imports
            | RelType::ResolvesImport
            | RelType::Exports
            | RelType::Includes
            | RelType::PythonImports => 7,
            RelType::Calls | RelType::UsesComponent | RelType::PythonCalls => 6,
            RelType::MutatesState
            | RelType::RendersElement
            | RelType::ReferencesTable
            | RelType::ReferencesView => 5,
            RelType::HandlesError | RelType::HasProp => 4,
            RelType::UsesTailwindClass => 2,
        }
    }
}

/// Source span. Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Span {
    pub start_line: i64,
    pub end_line: i64,
    pub start_column: i64,
    pub end_column: i64,
}

impl Span {
    pub fn line(line: i64) -> Span {
        Span {
            start_line: line,
            end_line: line,
            start_column: 0,
            end_column: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub entity_id: String,
    pub instance_id: String,
    pub kind: NodeKind,
    pub name: String,
    pub file_path: String,
    pub language: Language,
    pub start_line: i64,
    pub end_line: i64,
    pub start_column: i64,
    pub end_column: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub properties: Properties,
    pub created_at: String,
}

impl Node {
    pub fn new(
        kind: NodeKind,
        name: impl Into<String>,
        qualified_name: &str,
        file_path: &str,
        language: Language,
        span: Span,
    ) -> Node {
        Node {
            entity_id: entity_id::node_id(kind, qualified_name),
            instance_id: util::new_instance_id(),
            kind,
            name: name.into(),
            file_path: file_path.to_string(),
            language,
            start_line: span.start_line,
            end_line: span.end_line,
            start_column: span.start_column,
            end_column: span.end_column,
            parent_id: None,
            properties: Properties::new(),
            created_at: util::timestamp(),
        }
    }

    pub fn with_parent(mut self, parent_id: &str) -> Node {
        self.parent_id = Some(parent_id.to_string());
        self
    }

    pub fn with_prop(mut self, key: &str, value: Value) -> Node {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn prop_bool(&self, key: &str) -> bool {
        self.properties
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub entity_id: String,
    pub rel_type: RelType,
    pub source_id: String,
    pub target_id: String,
    pub weight: i64,
    pub properties: Properties,
    pub created_at: String,
}

impl Relationship {
    pub fn new(rel_type: RelType, source_id: &str, target_id: &str) -> Relationship {
        Self::build(rel_type, source_id, target_id, None)
    }

    /// Relationship disambiguated by a site line (call sites, assignment
    /// sites) so repeated occurrences in one file stay distinct.
    pub fn at_site(
        rel_type: RelType,
        source_id: &str,
        target_id: &str,
        site_line: i64,
    ) -> Relationship {
        Self::build(rel_type, source_id, target_id, Some(site_line))
    }

    fn build(
        rel_type: RelType,
        source_id: &str,
        target_id: &str,
        site_line: Option<i64>,
    ) -> Relationship {
        let qualified = entity_id::relationship_qualified(source_id, target_id, site_line);
        Relationship {
            entity_id: entity_id::relationship_id(rel_type, &qualified),
            rel_type,
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            weight: rel_type.weight(),
            properties: Properties::new(),
            created_at: util::timestamp(),
        }
    }

    pub fn with_prop(mut self, key: &str, value: Value) -> Relationship {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn placeholder(self) -> Relationship {
        self.with_prop("isPlaceholder", Value::Bool(true))
    }

    pub fn is_placeholder(&self) -> bool {
        self.properties
            .get("isPlaceholder")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Pass-1 output for a single source file.
#[derive(Debug, Default)]
pub struct SingleFileParseResult {
    pub file_path: String,
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl SingleFileParseResult {
    pub fn new(file_path: impl Into<String>) -> SingleFileParseResult {
        SingleFileParseResult {
            file_path: file_path.into(),
            nodes: Vec::new(),
            relationships: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeStats {
    pub scanned: usize,
    pub parsed: usize,
    pub skipped: usize,
    pub nodes: usize,
    pub relationships: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_round_trip() {
        for kind in NODE_KINDS {
            assert_eq!(NodeKind::from_label(kind.label()), Some(*kind));
        }
        for rel in REL_TYPES {
            assert_eq!(RelType::from_label(rel.label()), Some(*rel));
        }
    }

    #[test]
    fn weights_stay_in_range() {
        for rel in REL_TYPES {
            let w = rel.weight();
            assert!((0..=10).contains(&w), "{} out of range", rel.label());
        }
    }

    #[test]
    fn extension_dispatch_covers_defaults() {
        for ext in [
            "ts", "tsx", "js", "jsx", "py", "c", "h", "cpp", "hpp", "cc", "hh", "java", "cs",
            "go", "sql",
        ] {
            assert!(Language::from_extension(ext).is_some(), "missing {ext}");
        }
        assert!(Language::from_extension("rs").is_none());
    }

    #[test]
    fn site_line_disambiguates_relationships() {
        let a = Relationship::at_site(RelType::Calls, "ent_a", "ent_b", 3);
        let b = Relationship::at_site(RelType::Calls, "ent_a", "ent_b", 9);
        assert_ne!(a.entity_id, b.entity_id);
    }
}
