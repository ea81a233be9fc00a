//! Embedding eligibility for repository files.
//!
//! [`should_embed`] is a pure function of three static tables:
//!
//! 1. **Important root files**: a file at the repository root whose name
//!    matches (case-insensitively) is always eligible.
//! 2. **Ignored globs**: build output, dependency caches, VCS metadata,
//!    and IDE caches are never eligible.
//! 3. **Text extensions**: everything else is eligible iff its extension
//!    (or, for a few extension-less files, its name) is allow-listed.
//!
//! # Example
//!
//! ```rust
//! use repolens_core::path_filter::should_embed;
//!
//! assert!(should_embed("README.md", "README.md"));
//! assert!(should_embed("src/lib.rs", "lib.rs"));
//! assert!(!should_embed("node_modules/left-pad/index.js", "index.js"));
//! assert!(!should_embed("assets/logo.png", "logo.png"));
//! ```

use std::sync::OnceLock;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::models::extension_of;

/// Root-level files that are always worth embedding.
pub const IMPORTANT_ROOT_FILES: &[&str] = &[
    "README.md",
    "CONTRIBUTING.md",
    "LICENSE",
    "package.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "package-lock.json",
    "pyproject.toml",
    "requirements.txt",
    "setup.py",
    "Pipfile",
    "Pipfile.lock",
    "environment.yml",
    "go.mod",
    "go.sum",
    ".env",
    ".env.example",
    ".gitignore",
    "pubspec.yaml",
    "analysis_options.yaml",
    "build.gradle",
    "gradle.properties",
    "settings.gradle",
    "gradlew",
    "gradlew.bat",
    "Dockerfile",
    "docker-compose.yml",
    "Jenkinsfile",
    ".gitlab-ci.yml",
    "webpack.config.js",
    "tsconfig.json",
    "angular.json",
    "nx.json",
    "lerna.json",
    "babel.config.js",
    "Makefile",
    "Cargo.toml",
    "Cargo.lock",
];

/// Paths that are never embedded, relative to the repository root.
pub const IGNORED_GLOBS: &[&str] = &[
    "node_modules/**",
    "build/**",
    "dist/**",
    "coverage/**",
    "android/**",
    "ios/**",
    "windows/**",
    "linux/**",
    "macos/**",
    "web/**",
    ".git/**",
    ".github/**",
    "venv/**",
    "__pycache__/**",
    ".next/**",
    "out/**",
    "target/**",
    "tmp/**",
    ".dart_tool/**",
    ".pub-cache/**",
    ".flutter-plugins",
    ".flutter-plugins-dependencies",
    ".packages",
    ".pnp/**",
    "bower_components/**",
    ".webpack/**",
    ".parcel-cache/**",
    ".nyc_output/**",
    ".rpt2_cache/**",
    ".eslintcache",
    ".stylelintcache",
    ".vscode-test/**",
    ".serverless/**",
    ".fusebox/**",
    ".dynamodb/**",
    ".cache/**",
    "Pods/**",
    "DerivedData/**",
    ".externalNativeBuild/**",
    "**/gradle-wrapper.jar",
    "**/gradle-wrapper.properties",
    "**/gradle-wrapper.log",
];

/// Allow-listed extensions, lowercase, with the leading dot.
pub const TEXT_EXTENSIONS: &[&str] = &[
    // languages
    ".js", ".jsx", ".ts", ".tsx", ".py", ".ipynb", ".java", ".kt", ".kts", ".c", ".cpp", ".h",
    ".hpp", ".go", ".rs", ".swift", ".dart",
    // web
    ".html", ".htm", ".css", ".scss", ".sass", ".less", ".vue", ".svelte",
    // server-side
    ".php", ".rb", ".rake", ".cs", ".asp", ".jsp",
    // data and config
    ".json", ".yml", ".yaml", ".toml", ".ini", ".env", ".xml", ".csv", ".tsv",
    // docs
    ".md", ".markdown", ".txt", ".rst", ".tex", ".log",
    // build and devops
    ".gradle", ".properties", ".sh", ".bash", ".bat", ".dockerignore", ".gitignore",
    ".gitattributes",
    // ML artefacts and schemas
    ".pkl", ".pt", ".h5", ".onnx", ".pbtxt", ".cfg", ".sql", ".parquet", ".avro",
];

/// Extension-less file names treated as text, lowercase.
const TEXT_FILE_NAMES: &[&str] = &["dockerfile"];

fn ignored_set() -> &'static GlobSet {
    static SET: OnceLock<GlobSet> = OnceLock::new();
    SET.get_or_init(|| {
        let mut builder = GlobSetBuilder::new();
        for pattern in IGNORED_GLOBS {
            // The table is static; a pattern that fails to compile is skipped.
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| GlobSet::empty())
    })
}

/// True if `path` sits at the root and `file_name` is an important root file.
pub fn is_important_root_file(path: &str, file_name: &str) -> bool {
    !path.contains('/')
        && IMPORTANT_ROOT_FILES
            .iter()
            .any(|f| f.eq_ignore_ascii_case(file_name))
}

/// True if `path` matches any ignored glob.
pub fn is_ignored(path: &str) -> bool {
    ignored_set().is_match(path)
}

/// True if the file's extension (or name) is on the text allow-list.
pub fn has_text_extension(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    TEXT_FILE_NAMES.contains(&lower.as_str())
        || TEXT_EXTENSIONS.contains(&extension_of(&lower).as_str())
}

/// Decide whether a file should be chunked and embedded.
pub fn should_embed(path: &str, file_name: &str) -> bool {
    if is_important_root_file(path, file_name) {
        return true;
    }
    if is_ignored(path) {
        return false;
    }
    has_text_extension(file_name)
}
