use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;

use crate::Result;

const FILE_NAMES: &[&str] = &["tugboat.yaml", "tugboat.yml", ".tugboat.yaml", ".tugboat.yml"];
const SEARCH_DIRS: &[&str] = &[".", "ci", ".ci"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub options: Options,
    pub publish: Publish,
    pub docker: Docker,
    pub image: Image,
    pub build: Build,
    pub tag: Tag,
    pub manifest: Manifest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Options {
    pub dry_run: bool,
    pub debug: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Publish {
    pub official: bool,
    /// Parsed leniently by the caller, unknown values fall back to `omit`.
    pub arch_option: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Docker {
    pub registry: Option<String>,
    pub namespace: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub driver: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Image {
    pub name: Option<String>,
    pub version: Option<String>,
    pub supported_architectures: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Build {
    pub context: Option<String>,
    pub file: Option<String>,
    pub tags: Vec<String>,
    pub args: Vec<String>,
    pub push: bool,
    pub pull: bool,
    pub no_cache: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tag {
    pub push: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    pub create: ManifestCreate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestCreate {
    #[serde(rename = "for")]
    pub for_tags: Vec<String>,
    pub latest: bool,
    pub push: bool,
}

/// Returns the first configuration file found in the search directories below `root`.
pub fn discover(root: &Path) -> Option<PathBuf> {
    SEARCH_DIRS
        .iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| root.join(dir).join(name)))
        .find(|path| path.is_file())
}

/// Loads the configuration from `explicit` when given, or from the first file discovered below
/// `root`. Having no configuration file at all is fine, a malformed one is not.
pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Config> {
    let path = match explicit {
        Some(path) if !path.is_file() => {
            warn!(
                "No configuration file located for the provided config: {}",
                path.display()
            );
            return Ok(Config::default());
        }
        Some(path) => path.to_owned(),
        None => match discover(root) {
            Some(path) => path,
            None => {
                debug!("no configuration file found, using flags and defaults only");
                return Ok(Config::default());
            }
        },
    };

    debug!("loading configuration from {}", path.display());
    let failed = |error: &dyn std::fmt::Display| {
        format!("loading the config file failed: {}: {error}", path.display())
    };
    let contents = fs::read_to_string(&path).map_err(|error| failed(&error))?;
    parse(&contents).map_err(|error| failed(&error).into())
}

pub fn parse(contents: &str) -> Result<Config> {
    // An empty document deserializes as unit rather than as an empty mapping.
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let mut config: Config = serde_yaml::from_str(contents)?;
    config.image.version = config
        .image
        .version
        .map(|version| expand_env(&version, |name| std::env::var(name).ok()));
    Ok(config)
}

static VARIABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))$").unwrap()
});

/// Expands a value of the form `$VAR` or `${VAR}`. Anything else is returned unchanged. Unset
/// variables expand to an empty string.
fn expand_env(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let Some(captures) = VARIABLE_REGEX.captures(value.trim()) else {
        return value.to_owned();
    };
    let name = captures
        .get(1)
        .or_else(|| captures.get(2))
        .map_or("", |name| name.as_str());
    lookup(name).unwrap_or_else(|| {
        warn!("environment variable {name} is not set, the version will be empty");
        String::new()
    })
}
