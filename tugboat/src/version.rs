include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// The version followed by the architecture this binary was built for, e.g.
/// `0.2.0+1a2b3c4 [amd64]`.
pub fn full_version_with_arch() -> String {
    format!("{VERSION} [{}]", crate::reference::host_arch())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_starts_with_the_package_version() {
        assert!(VERSION.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(full_version_with_arch().ends_with(']'));
    }
}
