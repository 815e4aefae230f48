//! Host configuration: engine settings plus the documentation sources of
//! every library, persisted as TOML.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use docsmith_engine::EngineConfig;
use docsmith_engine::adapters::DocSiteConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Complete host configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsmithConfig {
    /// Engine limits, deadlines, cache and health settings.
    pub engine: EngineConfig,
    /// Libraries and their documentation sources.
    pub libraries: Vec<LibraryConfig>,
}

/// One library and the sites that document it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Library identifier, matched case-insensitively.
    pub name: String,
    /// Documentation sources. May be empty.
    #[serde(default)]
    pub adapters: Vec<AdapterEntry>,
}

/// A documentation site with its ranking priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterEntry {
    /// Lower numbers win score ties.
    #[serde(default)]
    pub priority: u32,
    /// Site description.
    #[serde(flatten)]
    pub site: DocSiteConfig,
}

impl Default for DocsmithConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            libraries: default_libraries(),
        }
    }
}

impl DocsmithConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(format!("{}: {e}", path.display())))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/docsmith/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("/tmp/docsmith-config"))
            .join("docsmith")
            .join("config.toml")
    }

    /// Load `path` if given, else the default path if it exists, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit or existing default file cannot be loaded.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let default_path = Self::default_config_path();
        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            tracing::debug!(path = %default_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Check engine settings and library names.
    ///
    /// Site descriptions are checked when their adapters are built.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`] for invalid engine settings and
    /// [`AppError::Config`] for empty or duplicate library names.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        let mut seen = HashSet::new();
        for library in &self.libraries {
            let name = library.name.trim().to_lowercase();
            if name.is_empty() {
                return Err(AppError::Config("library name must not be empty".into()));
            }
            if !seen.insert(name) {
                return Err(AppError::Config(format!(
                    "library {} is configured twice",
                    library.name
                )));
            }
        }
        Ok(())
    }
}

fn site(
    id: &str,
    search_url: &str,
    result_selector: &str,
    snippet_selector: &str,
    link_base: &str,
) -> DocSiteConfig {
    DocSiteConfig {
        id: id.into(),
        weight: 1.0,
        search_url: search_url.into(),
        result_selector: result_selector.into(),
        link_selector: "a".into(),
        snippet_selector: Some(snippet_selector.into()),
        link_base: link_base.into(),
        examples_url: None,
        example_languages: Vec::new(),
        user_agent: None,
        request_timeout_ms: 1_800,
    }
}

/// A site whose search page lives at `<base>search.html`.
fn search_page_site(id: &str, base: &str) -> DocSiteConfig {
    site(
        id,
        &format!("{base}search.html?q={{query}}"),
        "ul.search li",
        ".context",
        base,
    )
}

fn library(name: &str, sites: Vec<DocSiteConfig>) -> LibraryConfig {
    LibraryConfig {
        name: name.into(),
        adapters: sites
            .into_iter()
            .zip(0..)
            .map(|(site, priority)| AdapterEntry { priority, site })
            .collect(),
    }
}

/// The built-in documentation sources.
pub fn default_libraries() -> Vec<LibraryConfig> {
    let python = DocSiteConfig {
        examples_url: Some("https://docs.python.org/3/library/{query}.html".into()),
        example_languages: vec!["python".into()],
        ..site(
            "python-docs",
            "https://docs.python.org/3/search.html?q={query}&check_keywords=yes&area=default",
            "ul.search li",
            ".context",
            "https://docs.python.org/3/",
        )
    };
    let mdn = DocSiteConfig {
        examples_url: Some("https://developer.mozilla.org/en-US/search?q={query}".into()),
        example_languages: vec!["javascript".into()],
        ..site(
            "mdn",
            "https://developer.mozilla.org/en-US/search?q={query}",
            ".result-list .result",
            ".excerpt",
            "https://developer.mozilla.org",
        )
    };
    let nodejs = DocSiteConfig {
        examples_url: Some("https://nodejs.org/api/all.html#all_{query}".into()),
        example_languages: vec!["javascript".into()],
        ..search_page_site("nodejs-api", "https://nodejs.org/api/")
    };

    vec![
        library("python", vec![python]),
        library("javascript", vec![mdn]),
        library("nodejs", vec![nodejs]),
        library(
            "react",
            vec![search_page_site("react-docs", "https://reactjs.org/docs/")],
        ),
        library(
            "tensorflow",
            vec![search_page_site(
                "tensorflow-api",
                "https://www.tensorflow.org/api_docs/",
            )],
        ),
        library(
            "pandas",
            vec![search_page_site("pandas-docs", "https://pandas.pydata.org/docs/")],
        ),
        library(
            "django",
            vec![search_page_site(
                "django-docs",
                "https://docs.djangoproject.com/en/stable/",
            )],
        ),
        library(
            "flask",
            vec![search_page_site(
                "flask-docs",
                "https://flask.palletsprojects.com/en/latest/",
            )],
        ),
        library(
            "fastapi",
            vec![search_page_site("fastapi-docs", "https://fastapi.tiangolo.com/")],
        ),
        library(
            "numpy",
            vec![search_page_site("numpy-docs", "https://numpy.org/doc/stable/")],
        ),
        library(
            "pytorch",
            vec![search_page_site("pytorch-docs", "https://pytorch.org/docs/stable/")],
        ),
    ]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DocsmithConfig::default();
        assert!(config.validate().is_ok());
        for library in &config.libraries {
            for entry in &library.adapters {
                assert!(entry.site.validate().is_ok(), "{} is invalid", entry.site.id);
            }
        }
    }

    #[test]
    fn default_libraries_cover_builtin_set() {
        let names: Vec<String> = default_libraries().into_iter().map(|l| l.name).collect();
        assert_eq!(
            names,
            vec![
                "python", "javascript", "nodejs", "react", "tensorflow", "pandas", "django",
                "flask", "fastapi", "numpy", "pytorch"
            ]
        );
    }

    #[test]
    fn example_sources_only_where_available() {
        let with_examples: Vec<String> = default_libraries()
            .into_iter()
            .filter(|l| l.adapters.iter().any(|a| a.site.examples_url.is_some()))
            .map(|l| l.name)
            .collect();
        assert_eq!(with_examples, vec!["python", "javascript", "nodejs"]);
    }

    #[test]
    fn duplicate_library_rejected() {
        let mut config = DocsmithConfig::default();
        config.libraries.push(LibraryConfig {
            name: "Python".into(),
            adapters: Vec::new(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn invalid_engine_settings_rejected() {
        let mut config = DocsmithConfig::default();
        config.engine.max_results_limit = 0;
        assert!(matches!(config.validate(), Err(AppError::Engine(_))));
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = DocsmithConfig::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = DocsmithConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("docsmith"));
    }

    #[test]
    fn config_serializes_to_toml() {
        let toml_str = toml::to_string_pretty(&DocsmithConfig::default()).expect("serialize");
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[[libraries]]"));
        assert!(toml_str.contains("[[libraries.adapters]]"));
        assert!(toml_str.contains("search_url"));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: DocsmithConfig = toml::from_str(
            r#"
[engine]
adapter_timeout_ms = 500

[[libraries]]
name = "rust"

[[libraries.adapters]]
id = "std-docs"
search_url = "https://doc.rust-lang.org/std/?search={query}"
result_selector = ".search-results a"
link_base = "https://doc.rust-lang.org/std/"
"#,
        )
        .expect("parse");

        assert_eq!(config.engine.adapter_timeout_ms, 500);
        assert_eq!(config.engine.default_max_results, 5);
        assert_eq!(config.libraries.len(), 1);
        let entry = &config.libraries[0].adapters[0];
        assert_eq!(entry.priority, 0);
        assert_eq!(entry.site.link_selector, "a");
        assert!((entry.site.weight - 1.0).abs() < f64::EPSILON);
    }
}
