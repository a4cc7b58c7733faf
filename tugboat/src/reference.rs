use std::{fmt, str::FromStr, sync::LazyLock};

use container_image_name::{ImageName, DEFAULT_DOMAIN};
use log::warn;
use regex::Regex;

use crate::error::ReferenceParseError;

/// How the architecture is added to the tag of an image in the namespace layout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ArchOption {
    /// `<arch>-<tag>`
    #[default]
    Prepend,
    /// `<tag>-<arch>`
    Append,
    /// `<tag>`
    Omit,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown architecture option {0:?}, expected one of `prepend`, `append` or `omit`")]
pub struct UnknownArchOption(pub String);

impl FromStr for ArchOption {
    type Err = UnknownArchOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepend" => Ok(Self::Prepend),
            "append" => Ok(Self::Append),
            "omit" => Ok(Self::Omit),
            _ => Err(UnknownArchOption(s.to_owned())),
        }
    }
}

impl ArchOption {
    /// Parses `s`, degrading unknown values to [`ArchOption::Omit`] with a warning.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_else(|error| {
            warn!("{error}, the architecture will not be added to tags");
            Self::Omit
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchOption::Prepend => "prepend",
            ArchOption::Append => "append",
            ArchOption::Omit => "omit",
        }
    }
}

impl fmt::Display for ArchOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps the architecture this binary was compiled for to the platform vocabulary used by
/// container engines.
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "arm" => "arm",
        "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
        "powerpc64" => "ppc64",
        "mips64" if cfg!(target_endian = "little") => "mips64le",
        other => other,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions<'a> {
    /// The registry used when the image does not carry one. Empty means [`DEFAULT_DOMAIN`].
    pub registry: &'a str,
    /// Use the `registry/arch/image:tag` layout instead of `registry/namespace/image:arch-tag`.
    pub official: bool,
    /// Defaults to [`host_arch`].
    pub arch: Option<&'a str>,
    pub arch_option: ArchOption,
}

/// A canonical, fully qualified image reference. The `Display` form is the remote identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    name: ImageName,
}

static REPEATED_SLASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/+").unwrap());

/// Collapses repeated `/` and strips leading ones.
fn trim_uri(uri: &str) -> String {
    REPEATED_SLASHES
        .replace_all(uri, "/")
        .trim_start_matches('/')
        .to_owned()
}

fn strip_scheme(image: &str) -> &str {
    image
        .strip_prefix("http://")
        .or_else(|| image.strip_prefix("https://"))
        .unwrap_or(image)
}

/// Places `image` in the requested layout, before any parsing happens.
fn compose(image: &str, registry: &str, arch: &str, official: bool) -> String {
    let image = trim_uri(strip_scheme(image));
    let segments: Vec<&str> = image.split('/').collect();
    let (registry, namespace, repository) = match segments.as_slice() {
        [repository] => (registry, "", *repository),
        [namespace, repository] => (registry, *namespace, *repository),
        [registry, namespace, repository] => (*registry, *namespace, *repository),
        _ => (registry, "", image.as_str()),
    };

    if official {
        trim_uri(&format!("{registry}/{arch}/{repository}"))
    } else {
        trim_uri(&format!("{registry}/{namespace}/{repository}"))
    }
}

/// Resolves `image` into a canonical [`Reference`] for the architecture and layout in `options`.
///
/// Tags are decorated with the architecture only in the namespace layout, when the reference has
/// no digest and when the tag does not already mention the architecture.
pub fn resolve(image: &str, options: &ResolveOptions) -> Result<Reference, ReferenceParseError> {
    let arch = options.arch.unwrap_or_else(|| host_arch());
    let composed = compose(image, options.registry, arch, options.official);

    let parse_error = |source| ReferenceParseError {
        input: image.to_owned(),
        source,
    };

    let name = ImageName::parse_normalized(&composed)
        .map_err(parse_error)?
        .with_default_tag();

    if name.digest().is_some() {
        return Ok(Reference {
            name: name.without_tag(),
        });
    }

    if options.official {
        return Ok(Reference { name });
    }

    let tag = name.tag().unwrap_or(container_image_name::DEFAULT_TAG);
    if tag.contains(arch) {
        return Ok(Reference { name });
    }

    let decorated = match options.arch_option {
        ArchOption::Prepend => format!("{arch}-{tag}"),
        ArchOption::Append => format!("{tag}-{arch}"),
        ArchOption::Omit => return Ok(Reference { name }),
    };

    Ok(Reference {
        name: name.with_tag(&decorated).map_err(parse_error)?,
    })
}

impl Reference {
    /// The repository path without registry and tag, e.g. `namespace/busybox`.
    pub fn short_name(&self) -> &str {
        self.name.path()
    }

    /// The repository path with its tag or digest, e.g. `namespace/busybox:arm64-latest`.
    pub fn name(&self) -> &str {
        let start = self.name.registry().map_or(0, |registry| registry.len() + 1);
        &self.name[start..]
    }

    /// The namespace, or the architecture in the official layout. `None` for bare repositories.
    pub fn path_segment(&self) -> Option<&str> {
        self.short_name()
            .split_once('/')
            .map(|(segment, _)| segment)
    }

    /// The registry and repository path, e.g. `docker.io/namespace/busybox`.
    pub fn repository(&self) -> &str {
        self.name.repository()
    }

    pub fn registry(&self) -> &str {
        self.name.registry().unwrap_or(DEFAULT_DOMAIN)
    }

    /// The tag, or the digest for digest references.
    pub fn tag(&self) -> &str {
        self.name
            .tag()
            .or_else(|| self.name.digest())
            .unwrap_or_default()
    }

    pub fn digest(&self) -> Option<&str> {
        self.name.digest()
    }

    /// The full remote identifier, e.g. `docker.io/namespace/busybox:arm64-latest`.
    pub fn remote(&self) -> &str {
        self.name.as_str()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.remote())
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({})", self.remote())
    }
}
