//! Container image name types based on
//! [reference](https://github.com/distribution/reference/blob/v0.6.0/reference.go) and its
//! [normalize](https://github.com/distribution/reference/blob/v0.6.0/normalize.go) counterpart:
//!
//! ```txt
//! reference                       := name [ ":" tag ] [ "@" digest ]
//! name                            := [domain '/'] remote-name
//! domain                          := host [':' port-number]
//! host                            := domain-name | "localhost"
//! domain-name                     := domain-component ['.' domain-component]*
//! domain-component                := /([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])/
//! port-number                     := /[0-9]+/
//! remote-name                     := path-component ['/' path-component]*
//! path-component                  := alpha-numeric [separator alpha-numeric]*
//! alpha-numeric                   := /[a-z0-9]+/
//! separator                       := /[_.]|__|[-]+/
//!
//! tag                             := /[\w][\w.-]{0,127}/
//!
//! digest                          := digest-algorithm ":" digest-hex
//! digest-algorithm                := digest-algorithm-component [ digest-algorithm-separator digest-algorithm-component ]*
//! digest-algorithm-separator      := /[+.-_]/
//! digest-algorithm-component      := /[A-Za-z][A-Za-z0-9]*/
//! digest-hex                      := /[0-9a-fA-F]{32,}/ ; At least 128 bit digest value
//! ```
//!
//! The first `/` separated component of a name is only treated as a domain when it contains a `.`
//! or a `:`, or when it equals `localhost`. Everything else is part of the remote name.

use std::{ops::Range, str::FromStr, sync::LazyLock};

use regex::Regex;

/// The registry assumed by the container engine when a name does not carry one.
pub const DEFAULT_DOMAIN: &str = "docker.io";

/// The tag assumed by the container engine when a name carries neither tag nor digest.
pub const DEFAULT_TAG: &str = "latest";

const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";
const OFFICIAL_REPOSITORY_NAMESPACE: &str = "library";
const NAME_TOTAL_LENGTH_MAX: usize = 255;

const REGISTRY_SUFFIX: char = '/';
const PORT_PREFIX: char = ':';
const TAG_PREFIX: char = ':';
const DIGEST_ALGORITHM_PREFIX: char = '@';
const DIGEST_HEX_PREFIX: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Empty,
    InvalidDomain,
    InvalidFormat,
    NameTooLong,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            InvalidReason::Empty => "empty",
            InvalidReason::InvalidDomain => "invalid domain",
            InvalidReason::InvalidFormat => "invalid reference format",
            InvalidReason::NameTooLong => "repository name must not be more than 255 characters",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidContainerImageName {
    value: String,
    reason: InvalidReason,
}

impl InvalidContainerImageName {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn reason(&self) -> InvalidReason {
        self.reason
    }
}

impl std::error::Error for InvalidContainerImageName {}

impl std::fmt::Display for InvalidContainerImageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid container image name {:?}: {}",
            self.value, self.reason
        )
    }
}

static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^",
        r"(?:localhost|[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*)",
        r"(?::[0-9]+)?",
        r"$"
    ))
    .unwrap()
});

static REMAINDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^",
        r"(?P<path>[a-z0-9]+(?:(?:[_.]|__|[-]+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[_.]|__|[-]+)[a-z0-9]+)*)*)",
        r"(?::(?P<tag>[\w][\w.-]{0,127}))?",
        r"(?:@(?P<algorithm>[A-Za-z][A-Za-z0-9]*(?:[+.\-_][A-Za-z][A-Za-z0-9]*)*):(?P<hex>[0-9a-fA-F]{32,}))?",
        r"$"
    ))
    .unwrap()
});

/// Splits `value` at the first `/` when the leading component looks like a registry domain.
fn split_domain(value: &str) -> (Option<&str>, &str) {
    match value.split_once(REGISTRY_SUFFIX) {
        Some((head, tail))
            if head.contains(['.', PORT_PREFIX]) || head == "localhost" =>
        {
            (Some(head), tail)
        }
        _ => (None, value),
    }
}

#[derive(Copy, Clone, Debug)]
struct Indices {
    // NOTE: The registry, when present, always starts at 0 and ends right before `path_start`.
    path_start: usize,
    tag_start: Option<usize>,
    digest_start: Option<usize>,
    hex_start: Option<usize>,
}

impl Indices {
    fn parse(s: &str) -> Result<Self, InvalidReason> {
        if s.is_empty() {
            return Err(InvalidReason::Empty);
        }

        let (domain, remainder) = split_domain(s);
        let path_start = match domain {
            Some(domain) => {
                if !DOMAIN_REGEX.is_match(domain) {
                    return Err(InvalidReason::InvalidDomain);
                }
                domain.len() + REGISTRY_SUFFIX.len_utf8()
            }
            None => 0,
        };

        let captures = REMAINDER_REGEX
            .captures(remainder)
            .ok_or(InvalidReason::InvalidFormat)?;

        let path = captures.name("path").ok_or(InvalidReason::InvalidFormat)?;
        if path_start + path.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(InvalidReason::NameTooLong);
        }

        Ok(Self {
            path_start,
            tag_start: captures.name("tag").map(|m| path_start + m.start()),
            digest_start: captures.name("algorithm").map(|m| path_start + m.start()),
            hex_start: captures.name("hex").map(|m| path_start + m.start()),
        })
    }

    fn registry_range(&self) -> Option<Range<usize>> {
        (self.path_start > 0).then(|| 0..self.path_start - REGISTRY_SUFFIX.len_utf8())
    }

    fn path_end(&self, len: usize) -> usize {
        self.tag_start
            .map(|x| x - TAG_PREFIX.len_utf8())
            .or(self
                .digest_start
                .map(|x| x - DIGEST_ALGORITHM_PREFIX.len_utf8()))
            .unwrap_or(len)
    }

    fn tag_range(&self, len: usize) -> Option<Range<usize>> {
        self.tag_start.map(|start| {
            start
                ..self
                    .digest_start
                    .map(|x| x - DIGEST_ALGORITHM_PREFIX.len_utf8())
                    .unwrap_or(len)
        })
    }
}

/// A parsed container image name. The container image name is written as:
/// ```txt
/// <domain>:<port>/<path>:<tag>@<algorithm>:<hex>
/// <registry----->/<path>:<tag>@<digest--------->
/// ```
/// Only the `<path>` section is required to be present.
#[derive(Clone)]
pub struct ImageName {
    buffer: String,
    indices: Indices,
}

impl ImageName {
    pub fn new(value: String) -> Result<Self, InvalidContainerImageName> {
        match Indices::parse(&value) {
            Ok(indices) => Ok(Self {
                buffer: value,
                indices,
            }),
            Err(reason) => Err(InvalidContainerImageName { value, reason }),
        }
    }

    /// Parses `value` the way the container engine does for user input: a missing registry becomes
    /// [`DEFAULT_DOMAIN`] and single component names on that registry are placed in the `library`
    /// namespace. The tag is left untouched, see [`ImageName::with_default_tag`].
    pub fn parse_normalized(value: &str) -> Result<Self, InvalidContainerImageName> {
        let (domain, remainder) = split_domain(value);
        let domain = match domain {
            None | Some(LEGACY_DEFAULT_DOMAIN) => DEFAULT_DOMAIN,
            Some(domain) => domain,
        };

        let mut buffer = String::with_capacity(
            domain.len() + OFFICIAL_REPOSITORY_NAMESPACE.len() + remainder.len() + 2,
        );
        buffer.push_str(domain);
        buffer.push(REGISTRY_SUFFIX);
        let path_end = remainder
            .find([TAG_PREFIX, DIGEST_ALGORITHM_PREFIX])
            .unwrap_or(remainder.len());
        if domain == DEFAULT_DOMAIN && !remainder[..path_end].contains(REGISTRY_SUFFIX) {
            buffer.push_str(OFFICIAL_REPOSITORY_NAMESPACE);
            buffer.push(REGISTRY_SUFFIX);
        }
        buffer.push_str(remainder);

        Self::new(buffer).map_err(|error| InvalidContainerImageName {
            value: value.to_owned(),
            reason: error.reason,
        })
    }

    /// Adds the [`DEFAULT_TAG`] when the name has neither a tag nor a digest.
    pub fn with_default_tag(self) -> Self {
        if self.indices.tag_start.is_some() || self.indices.digest_start.is_some() {
            return self;
        }
        let mut buffer = self.buffer;
        buffer.push(TAG_PREFIX);
        let tag_start = buffer.len();
        buffer.push_str(DEFAULT_TAG);
        Self {
            buffer,
            indices: Indices {
                tag_start: Some(tag_start),
                ..self.indices
            },
        }
    }

    /// Returns a copy with the tag replaced and any digest removed.
    pub fn with_tag(&self, tag: &str) -> Result<Self, InvalidContainerImageName> {
        let end = self.indices.path_end(self.buffer.len());
        let mut buffer = String::with_capacity(end + TAG_PREFIX.len_utf8() + tag.len());
        buffer.push_str(&self.buffer[..end]);
        buffer.push(TAG_PREFIX);
        buffer.push_str(tag);
        Self::new(buffer)
    }

    /// Returns a copy without the tag, keeping the digest if there is one.
    pub fn without_tag(&self) -> Self {
        let Some(range) = self.indices.tag_range(self.buffer.len()) else {
            return self.clone();
        };
        let removed = range.len() + TAG_PREFIX.len_utf8();
        let mut buffer = String::with_capacity(self.buffer.len() - removed);
        buffer.push_str(&self.buffer[..range.start - TAG_PREFIX.len_utf8()]);
        buffer.push_str(&self.buffer[range.end..]);
        Self {
            buffer,
            indices: Indices {
                tag_start: None,
                digest_start: self.indices.digest_start.map(|x| x - removed),
                hex_start: self.indices.hex_start.map(|x| x - removed),
                ..self.indices
            },
        }
    }

    /// Returns the `<domain>(:<port>)?` section.
    pub fn registry(&self) -> Option<&str> {
        self.indices
            .registry_range()
            .map(|range| &self.buffer[range])
    }

    /// Returns the `<domain>` section.
    pub fn domain(&self) -> Option<&str> {
        self.registry()
            .map(|registry| match registry.rsplit_once(PORT_PREFIX) {
                Some((domain, _)) => domain,
                None => registry,
            })
    }

    /// Returns the `<port>` section.
    pub fn port(&self) -> Option<&str> {
        self.registry()
            .and_then(|registry| registry.rsplit_once(PORT_PREFIX))
            .map(|(_, port)| port)
    }

    /// Returns the `<path>` section. This is the only required section.
    pub fn path(&self) -> &str {
        &self.buffer[self.indices.path_start..self.indices.path_end(self.buffer.len())]
    }

    /// Returns the `<registry>/<path>` section.
    pub fn repository(&self) -> &str {
        &self.buffer[..self.indices.path_end(self.buffer.len())]
    }

    /// Returns the `<tag>` section.
    pub fn tag(&self) -> Option<&str> {
        self.indices
            .tag_range(self.buffer.len())
            .map(|range| &self.buffer[range])
    }

    /// Returns the `<digest>` section, `<algorithm>:<hex>`.
    pub fn digest(&self) -> Option<&str> {
        self.indices.digest_start.map(|start| &self.buffer[start..])
    }

    /// Returns the `<algorithm>` section.
    pub fn digest_algorithm(&self) -> Option<&str> {
        Option::zip(self.indices.digest_start, self.indices.hex_start)
            .map(|(start, hex_start)| &self.buffer[start..hex_start - DIGEST_HEX_PREFIX.len_utf8()])
    }

    /// Returns the `<hex>` section.
    pub fn digest_hex(&self) -> Option<&str> {
        self.indices.hex_start.map(|start| &self.buffer[start..])
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

impl FromStr for ImageName {
    type Err = InvalidContainerImageName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for ImageName {
    type Error = InvalidContainerImageName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImageName> for String {
    fn from(value: ImageName) -> Self {
        value.buffer
    }
}

impl PartialEq for ImageName {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer
    }
}

impl Eq for ImageName {}

impl std::hash::Hash for ImageName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.buffer.hash(state);
    }
}

impl std::ops::Deref for ImageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl std::fmt::Debug for ImageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.buffer.fmt(f)
    }
}

impl std::fmt::Display for ImageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.buffer.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "4abcc75d00d254c931cb5ce4a5c2ebb6aab90f19f70bf79d6734a0e3f8f2c72f";

    #[test]
    fn image_name_parsing_works() {
        {
            let name: ImageName = "org-name/img-name".parse().unwrap();
            assert_eq!(name.registry(), None);
            assert_eq!(name.path(), "org-name/img-name");
            assert_eq!(name.tag(), None);
            assert_eq!(name.digest(), None);
        }

        {
            let name: ImageName = "reg.io:12345/org-name/img-name:latest".parse().unwrap();
            assert_eq!(name.domain(), Some("reg.io"));
            assert_eq!(name.port(), Some("12345"));
            assert_eq!(name.registry(), Some("reg.io:12345"));
            assert_eq!(name.path(), "org-name/img-name");
            assert_eq!(name.repository(), "reg.io:12345/org-name/img-name");
            assert_eq!(name.tag(), Some("latest"));
        }

        {
            let name: ImageName = "localhost/img".parse().unwrap();
            assert_eq!(name.registry(), Some("localhost"));
            assert_eq!(name.path(), "img");
        }

        {
            let name: ImageName = format!("reg.io/org-name/img-name:v1@sha256:{HEX}")
                .parse()
                .unwrap();
            assert_eq!(name.tag(), Some("v1"));
            assert_eq!(name.digest_algorithm(), Some("sha256"));
            assert_eq!(name.digest_hex(), Some(HEX));
            assert_eq!(name.digest(), Some(format!("sha256:{HEX}").as_str()));
        }
    }

    #[test]
    fn invalid_names_are_rejected() {
        let reason = |s: &str| s.parse::<ImageName>().unwrap_err().reason();
        assert_eq!(reason(""), InvalidReason::Empty);
        assert_eq!(reason("."), InvalidReason::InvalidFormat);
        assert_eq!(reason("Upper/case"), InvalidReason::InvalidFormat);
        assert_eq!(reason("a//b"), InvalidReason::InvalidFormat);
        assert_eq!(reason("a@sha256:1234"), InvalidReason::InvalidFormat);
        assert_eq!(reason("-bad.io/img"), InvalidReason::InvalidDomain);
        assert_eq!(reason(&"a".repeat(256)), InvalidReason::NameTooLong);
    }

    #[test]
    fn normalization_matches_the_engine() {
        let normalized = |s: &str| ImageName::parse_normalized(s).unwrap().to_string();
        assert_eq!(normalized("busybox"), "docker.io/library/busybox");
        assert_eq!(normalized("busybox:1.36"), "docker.io/library/busybox:1.36");
        assert_eq!(normalized("namespace/busybox"), "docker.io/namespace/busybox");
        assert_eq!(normalized("index.docker.io/busybox"), "docker.io/library/busybox");
        assert_eq!(normalized("localhost:5000/busybox"), "localhost:5000/busybox");
        assert_eq!(
            normalized(&format!("image@sha256:{HEX}")),
            format!("docker.io/library/image@sha256:{HEX}")
        );
    }

    #[test]
    fn tag_manipulation_works() {
        let name = ImageName::parse_normalized("busybox").unwrap().with_default_tag();
        assert_eq!(name.tag(), Some(DEFAULT_TAG));
        assert_eq!(
            name.with_tag("arm64-latest").unwrap().as_str(),
            "docker.io/library/busybox:arm64-latest"
        );

        let digested: ImageName = format!("reg.io/img:v1@sha256:{HEX}").parse().unwrap();
        let untagged = digested.without_tag();
        assert_eq!(untagged.as_str(), format!("reg.io/img@sha256:{HEX}"));
        assert_eq!(untagged.digest_hex(), Some(HEX));
        assert_eq!(untagged.clone().with_default_tag(), untagged);
    }
}
