use log::debug;

use super::{best_effort, require_tags_and_architectures, LoginSession};
use crate::{
    driver::{Driver, ManifestPushOptions},
    error::Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSpec {
    /// The image the manifest lists are created for, without a tag.
    pub manifest_list: String,
    pub tags: Vec<String>,
    pub architectures: Vec<String>,
    pub push: bool,
}

/// Drops a tag from `image`. A `:` before the last `/` belongs to a registry port.
fn untagged(image: &str) -> &str {
    let name_start = image.rfind('/').map_or(0, |slash| slash + 1);
    match image[name_start..].find(':') {
        Some(colon) => &image[..name_start + colon],
        None => image,
    }
}

/// Creates, annotates and optionally pushes a manifest list per tag, each referencing the
/// architecture specific images.
///
/// All architecture images are pulled first since the engine can only create manifests from local
/// images. The registry session stays open until the function returns, whatever the outcome.
pub fn manifest_create(driver: &dyn Driver, spec: &ManifestSpec) -> Result<()> {
    require_tags_and_architectures(&spec.tags, &spec.architectures)?;

    let image = untagged(&spec.manifest_list);
    let manifest_lists: Vec<String> = spec
        .tags
        .iter()
        .map(|tag| format!("{image}:{tag}"))
        .collect();

    for arch in &spec.architectures {
        for manifest_list in &manifest_lists {
            driver.pull_image_with_arch(manifest_list, arch)?;
        }
    }

    let session = LoginSession::open(driver)?;

    for manifest_list in &manifest_lists {
        driver.create_manifest(manifest_list, &spec.architectures)?;
        driver.annotate_manifest(manifest_list, &spec.architectures)?;
        if spec.push {
            debug!("{manifest_list} manifest staged to push");
        }
    }

    if spec.push {
        for manifest_list in &manifest_lists {
            best_effort(driver.push_manifest(manifest_list, ManifestPushOptions { purge: true }))?;
        }
    }

    session.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        driver::{DockerDriver, DriverOptions},
        error::{Error, ValidationError},
        registry::{Registry, RegistryCredentials},
        workflow::mock::ScriptedDriver,
    };

    fn options() -> DriverOptions {
        DriverOptions {
            registry: Registry {
                server_address: "docker.io".to_owned(),
                namespace: "namespace".to_owned(),
            },
            ..Default::default()
        }
    }

    fn spec() -> ManifestSpec {
        ManifestSpec {
            manifest_list: "image".to_owned(),
            tags: vec!["v1".to_owned(), "latest".to_owned()],
            architectures: vec!["amd64".to_owned(), "arm64".to_owned()],
            push: true,
        }
    }

    #[test]
    fn steps_run_in_order() {
        let driver = ScriptedDriver::new(options());
        manifest_create(&driver, &spec()).unwrap();
        assert_eq!(
            driver.calls(),
            [
                "pull docker.io/namespace/image:amd64-v1",
                "pull docker.io/namespace/image:amd64-latest",
                "pull docker.io/namespace/image:arm64-v1",
                "pull docker.io/namespace/image:arm64-latest",
                "login",
                "manifest create docker.io/namespace/image:v1 amd64,arm64",
                "manifest annotate docker.io/namespace/image:v1 amd64,arm64",
                "manifest create docker.io/namespace/image:latest amd64,arm64",
                "manifest annotate docker.io/namespace/image:latest amd64,arm64",
                "manifest push purge=true docker.io/namespace/image:v1",
                "manifest push purge=true docker.io/namespace/image:latest",
                "logout",
            ]
        );
    }

    #[test]
    fn custom_registries_without_a_namespace_are_resolved_once() {
        let driver = ScriptedDriver::new(DriverOptions {
            registry: Registry {
                server_address: "localhost.local".to_owned(),
                namespace: String::new(),
            },
            ..Default::default()
        });
        manifest_create(
            &driver,
            &ManifestSpec {
                tags: vec!["v1".to_owned()],
                architectures: vec!["amd64".to_owned()],
                ..spec()
            },
        )
        .unwrap();
        assert_eq!(
            driver.calls(),
            [
                "pull localhost.local/image:amd64-v1",
                "login",
                "manifest create localhost.local/image:v1 amd64",
                "manifest annotate localhost.local/image:v1 amd64",
                "manifest push purge=true localhost.local/image:v1",
                "logout",
            ]
        );
    }

    #[test]
    fn tags_are_dropped_from_the_image() {
        assert_eq!(untagged("image"), "image");
        assert_eq!(untagged("namespace/image:old"), "namespace/image");
        assert_eq!(untagged("localhost:5000/image"), "localhost:5000/image");
        assert_eq!(untagged("localhost:5000/ns/image:old"), "localhost:5000/ns/image");
    }

    #[test]
    fn push_failures_are_tolerated() {
        let driver = ScriptedDriver::new(options())
            .failing("manifest push purge=true docker.io/namespace/image:v1");
        manifest_create(&driver, &spec()).unwrap();
        let calls = driver.calls();
        assert_eq!(
            calls[calls.len() - 2],
            "manifest push purge=true docker.io/namespace/image:latest"
        );
        assert_eq!(calls[calls.len() - 1], "logout");
    }

    #[test]
    fn create_failures_still_log_out() {
        let driver = ScriptedDriver::new(options())
            .failing("manifest create docker.io/namespace/image:v1 amd64,arm64")
            .failing("logout");
        let error = manifest_create(&driver, &spec()).unwrap_err();
        assert!(matches!(error, Error::CommandExecutionFailed(_)));
        assert_eq!(driver.calls().last().map(String::as_str), Some("logout"));
    }

    #[test]
    fn logout_failures_after_success_are_reported() {
        let driver = ScriptedDriver::new(options()).failing("logout");
        assert!(matches!(
            manifest_create(&driver, &spec()),
            Err(Error::Authentication { .. })
        ));
    }

    #[test]
    fn pull_and_login_failures_are_fatal() {
        let driver = ScriptedDriver::new(options())
            .failing("pull docker.io/namespace/image:arm64-v1");
        assert!(manifest_create(&driver, &spec()).is_err());
        assert!(!driver.calls().contains(&"login".to_owned()));

        let driver = ScriptedDriver::new(options()).failing("login");
        assert!(matches!(
            manifest_create(&driver, &spec()),
            Err(Error::Authentication { .. })
        ));
        assert_eq!(driver.calls().last().map(String::as_str), Some("login"));
    }

    #[test]
    fn validation_happens_first() {
        let driver = ScriptedDriver::new(options());
        let error = manifest_create(
            &driver,
            &ManifestSpec {
                architectures: Vec::new(),
                ..spec()
            },
        )
        .unwrap_err();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::NoSupportedArchitectures)
        ));
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn dry_run_still_requires_credentials() {
        let dry_run = DriverOptions {
            dry_run: true,
            ..options()
        };
        let driver = DockerDriver::new(dry_run.clone());
        assert!(matches!(
            manifest_create(&driver, &spec()),
            Err(Error::Validation(ValidationError::MissingCredentials))
        ));

        let driver = DockerDriver::new(DriverOptions {
            credentials: Some(
                RegistryCredentials::new("docker.io", "namespace", "user", "pass").unwrap(),
            ),
            ..dry_run
        });
        manifest_create(&driver, &spec()).unwrap();
    }
}
