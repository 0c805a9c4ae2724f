use std::{
    fs, io,
    path::{Path, PathBuf},
};

use derive_more::{Display, Error, From};
use serde::Serialize;
use serde_yaml::Value;

/// Project configuration file name.
pub(crate) const CONFIG_FILE: &str = "peek.yml";

/// Reserved top-level key that never names a service.
const VERSION_KEY: &str = "version";

/// Schema version written by `peek init`.
pub(crate) const CURRENT_VERSION: u32 = 2;

/// Service kind key.
const TYPE_KEY: &str = "type";

/// Asset path key.
const PATH_KEY: &str = "path";

/// Single-page application flag key.
const SPA_KEY: &str = "spa";

/// Service kind value that marks a prebuilt static asset directory.
const STATIC_KIND: &str = "static";

/// Project configuration errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ServiceConfigError {
    /// IO-related error.
    #[display(fmt = "unable to read {}", CONFIG_FILE)]
    Io(io::Error),

    /// No `peek.yml` exists in the start directory or any of its parents.
    #[from(ignore)]
    #[display(fmt = "unable to find {} in this directory or any parent directory", CONFIG_FILE)]
    ConfigNotFound,

    /// The configuration file exists but is not valid YAML.
    #[display(fmt = "unable to parse {}", CONFIG_FILE)]
    ConfigParse(serde_yaml::Error),

    /// The configuration document is valid YAML, but not a mapping.
    #[from(ignore)]
    #[display(fmt = "unable to parse {}: top-level value must be a mapping", CONFIG_FILE)]
    NotAMapping,

    /// The configuration has no static service at all.
    #[from(ignore)]
    #[display(fmt = "no static service found in {}", CONFIG_FILE)]
    NoStaticService,

    /// No static service carries the requested name.
    #[from(ignore)]
    #[display(fmt = "no static service named `{}` found in {}", name, CONFIG_FILE)]
    ServiceNotFound {
        /// Requested service name.
        name: String,
    },
}

/// Kind of a configured service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ServiceKind {
    /// Prebuilt static asset directory.
    Static,

    /// Any other kind; not actionable by this client.
    Other(String),
}

impl From<String> for ServiceKind {
    fn from(value: String) -> Self {
        if value == STATIC_KIND {
            ServiceKind::Static
        } else {
            ServiceKind::Other(value)
        }
    }
}

/// A single service entry of the project configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ServiceDefinition {
    /// Service name, unique within the configuration.
    pub name: String,

    /// Service kind.
    pub kind: ServiceKind,

    /// Asset path, relative to the project root.
    pub path: String,

    /// Serve the assets as a single-page application.
    pub spa: bool,
}

impl ServiceDefinition {
    /// Build a definition from a service sub-map.
    ///
    /// Returns [`None`] when the value is not a mapping or lacks a scalar `type`
    /// or `path`. Unknown keys are tolerated and a malformed `spa` flag is read as `false`.
    fn from_entry(name: String, entry: &Value) -> Option<Self> {
        let Some(mapping) = entry.as_mapping() else {
            tracing::debug!("skipping service `{name}`: entry is not a mapping");
            return None;
        };

        let field = |key: &str| mapping.get(key).and_then(scalar_to_string);

        let (Some(kind), Some(path)) = (field(TYPE_KEY), field(PATH_KEY)) else {
            tracing::debug!("skipping service `{name}`: `{TYPE_KEY}` or `{PATH_KEY}` is missing");
            return None;
        };

        let spa = match mapping.get(SPA_KEY) {
            None => false,
            Some(Value::Bool(spa)) => *spa,
            Some(other) => {
                tracing::debug!("service `{name}`: non-boolean `{SPA_KEY}` value {other:?}");
                false
            }
        };

        Some(Self {
            name,
            kind: kind.into(),
            path,
            spa,
        })
    }
}

/// Service entry layout written by `peek init`.
#[derive(Serialize)]
struct ServiceEntry {
    /// Service kind.
    #[serde(rename = "type")]
    kind: String,

    /// Asset path.
    path: String,

    /// Single-page application flag.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    spa: bool,
}

/// Document layout written by `peek init`.
#[derive(Serialize)]
struct InitialConfig {
    /// Configuration schema version.
    version: u32,

    /// Default static service.
    main: ServiceEntry,
}

/// Parsed project configuration.
#[derive(Debug, Default)]
pub(crate) struct ProjectConfig {
    /// Configuration schema version.
    pub version: Option<u32>,

    /// Valid service entries, in document order.
    pub services: Vec<ServiceDefinition>,
}

impl ProjectConfig {
    /// Parse the configuration document.
    ///
    /// Entries that are not mappings or lack a scalar `type` or `path` are
    /// skipped rather than rejected.
    pub(crate) fn parse(source: &str) -> Result<Self, ServiceConfigError> {
        let mapping = match serde_yaml::from_str::<Value>(source)? {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            _ => return Err(ServiceConfigError::NotAMapping),
        };

        let mut config = Self::default();

        for (key, value) in mapping {
            let Some(name) = scalar_to_string(&key) else {
                tracing::debug!("skipping service with a non-scalar name");
                continue;
            };

            if name == VERSION_KEY {
                config.version = value.as_u64().and_then(|v| u32::try_from(v).ok());
                continue;
            }

            config
                .services
                .extend(ServiceDefinition::from_entry(name, &value));
        }

        Ok(config)
    }

    /// Read and parse the configuration file.
    pub(crate) fn load(path: &Path) -> Result<Self, ServiceConfigError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Select a static service.
    ///
    /// Without a name the first static service in document order is returned,
    /// otherwise the static service with exactly that name.
    pub(crate) fn static_service(
        &self,
        name: Option<&str>,
    ) -> Result<&ServiceDefinition, ServiceConfigError> {
        self.services
            .iter()
            .filter(|service| service.kind == ServiceKind::Static)
            .find(|service| name.map_or(true, |name| service.name == name))
            .ok_or_else(|| match name {
                Some(name) => ServiceConfigError::ServiceNotFound {
                    name: String::from(name),
                },
                None => ServiceConfigError::NoStaticService,
            })
    }

    /// Render a fresh configuration with a single `main` static service.
    pub(crate) fn render_initial(path: &str, spa: bool) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&InitialConfig {
            version: CURRENT_VERSION,
            main: ServiceEntry {
                kind: String::from(STATIC_KIND),
                path: String::from(path),
                spa,
            },
        })
    }
}

/// Service names and fields may be written as any YAML scalar.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Find the configuration file, starting at `start` and moving up through parent directories.
///
/// Returns the full path of the first `peek.yml` found.
pub(crate) fn find_config(start: &Path) -> Result<PathBuf, ServiceConfigError> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
        .ok_or(ServiceConfigError::ConfigNotFound)
}

/// Static service resolved against the project root.
#[derive(Debug)]
pub(crate) struct ResolvedService {
    /// Service definition as written in the configuration.
    pub definition: ServiceDefinition,

    /// Directory that contains the configuration file.
    pub project_root: PathBuf,
}

impl ResolvedService {
    /// Absolute location of the service assets.
    pub(crate) fn asset_dir(&self) -> PathBuf {
        self.project_root.join(&self.definition.path)
    }
}

/// Load the configuration at `config_path` and select a static service from it.
pub(crate) fn resolve_static_service(
    config_path: &Path,
    name: Option<&str>,
) -> Result<ResolvedService, ServiceConfigError> {
    let config = ProjectConfig::load(config_path)?;

    if let Some(version) = config.version.filter(|version| *version > CURRENT_VERSION) {
        tracing::warn!(
            "{CONFIG_FILE} version {version} is newer than the supported version {CURRENT_VERSION}"
        );
    }

    for service in &config.services {
        if let ServiceKind::Other(kind) = &service.kind {
            tracing::debug!("ignoring service `{}` of type `{kind}`", service.name);
        }
    }

    let definition = config.static_service(name)?.clone();

    let project_root = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    tracing::debug!(
        "resolved static service `{}` at `{}`",
        definition.name,
        definition.path
    );

    Ok(ResolvedService {
        definition,
        project_root,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn empty_document_has_no_services() {
        let config = ProjectConfig::parse("").unwrap();

        assert!(config.services.is_empty());
        assert!(matches!(
            config.static_service(None),
            Err(ServiceConfigError::NoStaticService)
        ));
    }

    #[test]
    fn no_static_service() {
        let config = ProjectConfig::parse(
            "---
version: 2

main:
  type: docker
  port: 80
",
        )
        .unwrap();

        assert!(config.static_service(None).is_err());
    }

    #[test]
    fn main_static_service() {
        let config = ProjectConfig::parse(
            "---
version: 2

main:
  type: static
  path: build
",
        )
        .unwrap();

        let service = config.static_service(None).unwrap();

        assert_eq!(config.version, Some(2));
        assert_eq!(service.name, "main");
        assert_eq!(service.path, "build");
        assert!(!service.spa);
    }

    #[test]
    fn differently_named_static_service() {
        let config = ProjectConfig::parse(
            "version: 2
static-app:
  type: static
  path: build
  spa: true
",
        )
        .unwrap();

        let service = config.static_service(None).unwrap();

        assert_eq!(service.name, "static-app");
        assert!(service.spa);
    }

    #[test]
    fn named_selection() {
        let config = ProjectConfig::parse(
            "version: 2
main:
  type: static
  path: .
static-app:
  type: static
  path: build
api:
  type: docker
  path: server
",
        )
        .unwrap();

        assert_eq!(config.static_service(None).unwrap().name, "main");
        assert_eq!(
            config.static_service(Some("static-app")).unwrap().path,
            "build"
        );
        assert!(matches!(
            config.static_service(Some("api")),
            Err(ServiceConfigError::ServiceNotFound { name }) if name == "api"
        ));
        assert!(config.static_service(Some("missing")).is_err());
    }

    #[test]
    fn incomplete_entries_are_skipped() {
        let config = ProjectConfig::parse(
            "version: 2
no-path:
  type: static
no-type:
  path: dist
scalar: 42
list:
  - type
  - static
web:
  type: static
  path: public
  unknown: key
",
        )
        .unwrap();

        assert_eq!(config.services.len(), 1);
        assert_eq!(config.static_service(None).unwrap().name, "web");
    }

    #[test]
    fn malformed_spa_flag_keeps_the_service() {
        let config = ProjectConfig::parse(
            "version: 2
main:
  type: static
  path: dist
  spa: \"yes\"
",
        )
        .unwrap();

        let service = config.static_service(None).unwrap();

        assert_eq!(service.name, "main");
        assert_eq!(service.path, "dist");
        assert!(!service.spa);
    }

    #[test]
    fn scalar_fields_are_read_as_strings() {
        let config = ProjectConfig::parse(
            "version: 2
main:
  type: static
  path: 2020
",
        )
        .unwrap();

        assert_eq!(config.static_service(None).unwrap().path, "2020");
    }

    #[test]
    fn non_scalar_path_is_skipped() {
        let config = ProjectConfig::parse(
            "version: 2
main:
  type: static
  path: [dist, build]
",
        )
        .unwrap();

        assert!(config.services.is_empty());
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        assert!(matches!(
            ProjectConfig::parse("main: [unterminated"),
            Err(ServiceConfigError::ConfigParse(_))
        ));
        assert!(matches!(
            ProjectConfig::parse("- just\n- a list\n"),
            Err(ServiceConfigError::NotAMapping)
        ));
    }

    #[test]
    fn initial_config_resolves() {
        let rendered = ProjectConfig::render_initial("dist", false).unwrap();
        let config = ProjectConfig::parse(&rendered).unwrap();

        assert_eq!(config.version, Some(CURRENT_VERSION));
        assert_eq!(
            config.static_service(None).unwrap(),
            &ServiceDefinition {
                name: String::from("main"),
                kind: ServiceKind::Static,
                path: String::from("dist"),
                spa: false,
            }
        );
    }

    #[test]
    fn config_is_found_in_parent_directories() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "version: 2\nmain:\n  type: static\n  path: dist\n",
        )
        .unwrap();

        let nested = dir.path().join("src/components");
        fs::create_dir_all(&nested).unwrap();

        let config_path = find_config(&nested).unwrap();
        assert_eq!(config_path, dir.path().join(CONFIG_FILE));

        let resolved = resolve_static_service(&config_path, None).unwrap();
        assert_eq!(resolved.definition.name, "main");
        assert_eq!(resolved.asset_dir(), dir.path().join("dist"));
    }

    #[test]
    fn missing_config() {
        let dir = TempDir::new().unwrap();

        // Ancestors of a temporary directory are not expected to carry a project config.
        if dir.path().ancestors().any(|d| d.join(CONFIG_FILE).is_file()) {
            return;
        }

        assert!(matches!(
            find_config(dir.path()),
            Err(ServiceConfigError::ConfigNotFound)
        ));
    }
}
