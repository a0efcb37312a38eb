//! Language detection from file paths and content

use crate::model::folding::{looks_like_json, StructureKind};
use std::fmt;
use std::path::Path;

/// Languages the engine knows how to fold or highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Json,
    JsonLines,
    Xml,
    Html,
    Svg,
    Yaml,
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Css,
    C,
    Cpp,
    Go,
    Java,
    Toml,
    Markdown,
    Bash,
    Sql,
}

impl Language {
    /// Detect language from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_extension(path.extension()?.to_str()?)
    }

    /// Detect language from a bare extension (case-insensitive, no dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" | "geojson" | "jsonc" => Some(Language::Json),
            "jsonl" | "ndjson" => Some(Language::JsonLines),
            "xml" | "xsd" | "xsl" | "plist" | "csproj" => Some(Language::Xml),
            "html" | "htm" | "xhtml" => Some(Language::Html),
            "svg" => Some(Language::Svg),
            "yaml" | "yml" => Some(Language::Yaml),
            "rs" => Some(Language::Rust),
            "py" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" => Some(Language::TypeScript),
            "css" => Some(Language::Css),
            "c" | "h" => Some(Language::C),
            "cpp" | "hpp" | "cc" | "hh" | "cxx" | "hxx" => Some(Language::Cpp),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            "toml" => Some(Language::Toml),
            "md" | "markdown" => Some(Language::Markdown),
            "sh" | "bash" => Some(Language::Bash),
            "sql" => Some(Language::Sql),
            _ => None,
        }
    }

    /// Detect from an optional path, then from content
    ///
    /// Unknown files whose content looks like JSON are treated as JSON.
    pub fn detect(path: Option<&Path>, lines: &[&str]) -> Option<Self> {
        path.and_then(Self::from_path)
            .or_else(|| looks_like_json(lines).then_some(Language::Json))
    }

    /// Stable lowercase identifier, passed to highlighting services
    pub fn id(&self) -> &'static str {
        match self {
            Language::Json => "json",
            Language::JsonLines => "jsonl",
            Language::Xml => "xml",
            Language::Html => "html",
            Language::Svg => "svg",
            Language::Yaml => "yaml",
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Css => "css",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Go => "go",
            Language::Java => "java",
            Language::Toml => "toml",
            Language::Markdown => "markdown",
            Language::Bash => "bash",
            Language::Sql => "sql",
        }
    }

    /// Look up a language by its [`Language::id`]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|l| l.id() == id)
    }

    /// File extension a syntax definition can be found by
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Json | Language::JsonLines => "json",
            Language::Xml | Language::Svg => "xml",
            Language::Html => "html",
            Language::Yaml => "yaml",
            Language::Rust => "rs",
            Language::Python => "py",
            Language::JavaScript => "js",
            Language::TypeScript => "ts",
            Language::Css => "css",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Go => "go",
            Language::Java => "java",
            Language::Toml => "toml",
            Language::Markdown => "md",
            Language::Bash => "sh",
            Language::Sql => "sql",
        }
    }

    /// Folding scanner for this language
    pub fn structure_kind(&self) -> StructureKind {
        match self {
            Language::Json | Language::JsonLines => StructureKind::Json,
            Language::Xml | Language::Html | Language::Svg => StructureKind::Markup,
            Language::Yaml => StructureKind::Yaml,
            _ => StructureKind::None,
        }
    }

    pub fn all() -> &'static [Language] {
        &[
            Language::Json,
            Language::JsonLines,
            Language::Xml,
            Language::Html,
            Language::Svg,
            Language::Yaml,
            Language::Rust,
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Css,
            Language::C,
            Language::Cpp,
            Language::Go,
            Language::Java,
            Language::Toml,
            Language::Markdown,
            Language::Bash,
            Language::Sql,
        ]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
