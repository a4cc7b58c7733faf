mod docker;

pub use docker::*;

use std::{fmt, str::FromStr, time::Duration};

use log::debug;

use crate::{
    cancel::{Cancellation, Deadline},
    error::{Error, Result},
    executor::Executor,
    reference::{self, ArchOption, Reference, ResolveOptions},
    registry::{Registry, RegistryCredentials},
};

/// How long cleanup commands may run once the invocation was cancelled.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a driver needs to know about one invocation. Shared read-only by all driver calls.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    pub registry: Registry,
    pub credentials: Option<RegistryCredentials>,
    pub dry_run: bool,
    pub debug: bool,
    pub official: bool,
    pub arch_option: ArchOption,
    pub cancellation: Cancellation,
}

impl DriverOptions {
    pub fn executor(&self) -> Executor {
        Executor::new(self.dry_run, self.debug, self.cancellation.clone())
    }

    /// An executor for releasing resources, which still runs after the invocation was cancelled.
    pub fn cleanup_executor(&self) -> Executor {
        let cancellation = Cancellation::new().with_deadline(Deadline::after(CLEANUP_TIMEOUT));
        Executor::new(self.dry_run, self.debug, cancellation)
    }

    /// Prefixes single segment image names with the configured namespace.
    pub fn complete_image(&self, image: &str) -> String {
        if self.registry.namespace.is_empty() || image.contains('/') {
            image.to_owned()
        } else {
            format!("{}/{image}", self.registry.namespace)
        }
    }

    /// Resolves `image` against the configured registry, layout and architecture policy.
    pub fn resolve(&self, image: &str, arch: Option<&str>) -> Result<Reference> {
        Ok(reference::resolve(
            &self.complete_image(image),
            &ResolveOptions {
                registry: &self.registry.server_address,
                official: self.official,
                arch,
                arch_option: self.arch_option,
            },
        )?)
    }

    /// Resolves `target_tag` within the registry and repository of `source`.
    pub fn retag(
        &self,
        source: &Reference,
        target_tag: &str,
        arch: Option<&str>,
    ) -> Result<Reference> {
        Ok(reference::resolve(
            &format!("{}:{target_tag}", source.short_name()),
            &ResolveOptions {
                registry: source.registry(),
                official: self.official,
                arch,
                arch_option: self.arch_option,
            },
        )?)
    }

    /// Resolves the name of a manifest list, which is never architecture specific.
    pub fn resolve_manifest_list(&self, manifest_list: &str) -> Result<Reference> {
        Ok(reference::resolve(
            &self.complete_image(manifest_list),
            &ResolveOptions {
                registry: &self.registry.server_address,
                official: false,
                arch: None,
                arch_option: ArchOption::Omit,
            },
        )?)
    }

    /// Resolves the architecture specific member of a manifest list.
    pub fn resolve_manifest_member(
        &self,
        manifest_list: &Reference,
        arch: &str,
    ) -> Result<Reference> {
        Ok(reference::resolve(
            manifest_list.name(),
            &ResolveOptions {
                registry: manifest_list.registry(),
                official: self.official,
                arch: Some(arch),
                arch_option: self.arch_option,
            },
        )?)
    }
}

/// A `KEY[=VALUE]` build argument. Only the first `=` separates the key from the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArg {
    pub key: String,
    pub value: Option<String>,
}

impl FromStr for BuildArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = match s.split_once('=') {
            Some((key, value)) => (key, Some(value.to_owned())),
            None => (s, None),
        };
        if key.is_empty() {
            return Err(format!("build argument {s:?} has an empty key"));
        }
        Ok(Self {
            key: key.to_owned(),
            value,
        })
    }
}

impl fmt::Display for BuildArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={value}", self.key),
            None => f.write_str(&self.key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub context: String,
    pub dockerfile: String,
    pub tags: Vec<String>,
    pub build_args: Vec<BuildArg>,
    pub push: bool,
    pub pull: bool,
    pub no_cache: bool,
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self {
            context: ".".to_owned(),
            dockerfile: "Dockerfile".to_owned(),
            tags: Vec::new(),
            build_args: Vec::new(),
            push: false,
            pull: false,
            no_cache: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestPushOptions {
    pub purge: bool,
}

pub trait ImageBuilder {
    /// Builds one image carrying every tag in `spec` and returns the resolved tags.
    fn build_image(&self, spec: &BuildSpec) -> Result<Vec<Reference>>;
    fn pull_image(&self, image: &str) -> Result<Reference>;
    fn pull_image_with_arch(&self, image: &str, arch: &str) -> Result<Reference>;
}

pub trait ImagePusher {
    fn push_image(&self, image: &str) -> Result<Reference>;
    fn push_image_with_arch(&self, image: &str, arch: &str) -> Result<Reference>;
    /// Tags `source` as `target_tag` within the same repository and returns the target.
    fn tag_image(&self, source: &str, target_tag: &str) -> Result<Reference>;
    fn tag_image_with_arch(&self, source: &str, target_tag: &str, arch: &str)
        -> Result<Reference>;
    /// Pushes a reference that was already resolved by this driver.
    fn push_resolved(&self, reference: &Reference) -> Result<()>;
    /// Tags an already resolved `source` as `target_tag` within its repository.
    fn tag_resolved(
        &self,
        source: &Reference,
        target_tag: &str,
        arch: Option<&str>,
    ) -> Result<Reference>;
}

pub trait ManifestSet {
    /// Creates the manifest list `manifest_list` (`image:tag`) from its per architecture members.
    fn create_manifest(&self, manifest_list: &str, architectures: &[String]) -> Result<Reference>;
    fn annotate_manifest(&self, manifest_list: &str, architectures: &[String]) -> Result<()>;
    fn push_manifest(&self, manifest_list: &str, options: ManifestPushOptions) -> Result<()>;
    fn remove_manifest(&self, manifest_lists: &[String]) -> Result<()>;
}

pub trait RegistrySession {
    fn login(&self) -> Result<()>;
    fn logout(&self) -> Result<()>;
}

pub trait Driver: ImageBuilder + ImagePusher + ManifestSet + RegistrySession {
    fn name(&self) -> &'static str;
    fn options(&self) -> &DriverOptions;

    fn get_uri(&self, image: &str) -> Result<Reference> {
        self.options().resolve(image, None)
    }

    fn get_uri_with_arch(&self, image: &str, arch: &str) -> Result<Reference> {
        self.options().resolve(image, Some(arch))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Docker,
    Auto,
}

impl FromStr for DriverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "auto" => Ok(Self::Auto),
            _ => Err(Error::DriverUnsupported(s.to_owned())),
        }
    }
}

/// Creates the driver called `name`. `auto` picks the first available engine, which is Docker.
pub fn new_driver(name: &str, options: DriverOptions) -> Result<Box<dyn Driver>> {
    match name.parse::<DriverKind>()? {
        DriverKind::Docker => Ok(Box::new(DockerDriver::new(options))),
        DriverKind::Auto => {
            debug!("attempting to match a driver, initializing the docker driver");
            Ok(Box::new(DockerDriver::new(options)))
        }
    }
}
