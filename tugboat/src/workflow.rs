//! The build, tag and manifest workflows. Each workflow is a plain function over a [`Driver`] that
//! decides which failures abort the run and which are only logged.

mod build;
mod manifest;
mod tag;

pub use build::*;
pub use manifest::*;
pub use tag::*;

use log::error;

use crate::{
    driver::RegistrySession,
    error::{Error, Result, ValidationError},
};

fn require_tags_and_architectures(tags: &[String], architectures: &[String]) -> Result<()> {
    if tags.is_empty() {
        return Err(ValidationError::NoProvidedTags.into());
    }
    if architectures.is_empty() {
        return Err(ValidationError::NoSupportedArchitectures.into());
    }
    Ok(())
}

/// Keeps a registry login alive for its lifetime. Dropping the session logs out and only logs a
/// failing logout, [`LoginSession::close`] reports it.
pub struct LoginSession<'a, D: RegistrySession + ?Sized> {
    driver: &'a D,
    active: bool,
}

impl<'a, D: RegistrySession + ?Sized> LoginSession<'a, D> {
    pub fn open(driver: &'a D) -> Result<Self> {
        driver.login()?;
        Ok(Self {
            driver,
            active: true,
        })
    }

    pub fn close(mut self) -> Result<()> {
        self.active = false;
        self.driver.logout()
    }
}

impl<D: RegistrySession + ?Sized> Drop for LoginSession<'_, D> {
    fn drop(&mut self) {
        if self.active {
            if let Err(error) = self.driver.logout() {
                error!("{error}");
            }
        }
    }
}

/// Logs the failure of a step the workflow may continue after. Cancellation still aborts.
fn best_effort<T>(result: Result<T>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Err(error) => {
            error!("{error}");
            Ok(())
        }
    }
}

/// An in-memory [`Driver`](crate::driver::Driver) that records every call and fails the ones it
/// was told to fail.
#[cfg(test)]
pub(crate) mod mock {
    use std::cell::RefCell;

    use crate::{
        driver::{
            BuildSpec, Driver, DriverOptions, ImageBuilder, ImagePusher, ManifestPushOptions,
            ManifestSet, RegistrySession,
        },
        error::{Error, Result},
        process::{self, ErrorKind},
        reference::Reference,
    };

    #[derive(Default)]
    pub struct ScriptedDriver {
        pub options: DriverOptions,
        pub failures: Vec<String>,
        pub calls: RefCell<Vec<String>>,
    }

    impl ScriptedDriver {
        pub fn new(options: DriverOptions) -> Self {
            Self {
                options,
                ..Default::default()
            }
        }

        pub fn failing(mut self, call: &str) -> Self {
            self.failures.push(call.to_owned());
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: String) -> Result<()> {
            let fail = self.failures.contains(&call);
            self.calls.borrow_mut().push(call.clone());
            if fail {
                Err(Error::CommandExecutionFailed(process::Error {
                    command: process::command!("docker", call),
                    kind: ErrorKind::NonZeroExitStatus(std::num::NonZeroI32::new(1)),
                }))
            } else {
                Ok(())
            }
        }
    }

    impl ImageBuilder for ScriptedDriver {
        fn build_image(&self, spec: &BuildSpec) -> Result<Vec<Reference>> {
            let references = spec
                .tags
                .iter()
                .map(|tag| self.get_uri(tag))
                .collect::<Result<Vec<_>>>()?;
            let tags: Vec<_> = references.iter().map(Reference::remote).collect();
            self.record(format!("build {}", tags.join(" ")))?;
            Ok(references)
        }

        fn pull_image(&self, image: &str) -> Result<Reference> {
            let reference = self.get_uri(image)?;
            self.record(format!("pull {reference}"))?;
            Ok(reference)
        }

        fn pull_image_with_arch(&self, image: &str, arch: &str) -> Result<Reference> {
            let reference = self.get_uri_with_arch(image, arch)?;
            self.record(format!("pull {reference}"))?;
            Ok(reference)
        }
    }

    impl ImagePusher for ScriptedDriver {
        fn push_image(&self, image: &str) -> Result<Reference> {
            let reference = self.get_uri(image)?;
            self.record(format!("push {reference}"))?;
            Ok(reference)
        }

        fn push_image_with_arch(&self, image: &str, arch: &str) -> Result<Reference> {
            let reference = self.get_uri_with_arch(image, arch)?;
            self.record(format!("push {reference}"))?;
            Ok(reference)
        }

        fn tag_image(&self, source: &str, target_tag: &str) -> Result<Reference> {
            let source = self.get_uri(source)?;
            let target = self.options.retag(&source, target_tag, None)?;
            self.record(format!("tag {source} {target}"))?;
            Ok(target)
        }

        fn tag_image_with_arch(
            &self,
            source: &str,
            target_tag: &str,
            arch: &str,
        ) -> Result<Reference> {
            let source = self.get_uri_with_arch(source, arch)?;
            let target = self.options.retag(&source, target_tag, Some(arch))?;
            self.record(format!("tag {source} {target}"))?;
            Ok(target)
        }

        fn push_resolved(&self, reference: &Reference) -> Result<()> {
            self.record(format!("push {reference}"))
        }

        fn tag_resolved(
            &self,
            source: &Reference,
            target_tag: &str,
            arch: Option<&str>,
        ) -> Result<Reference> {
            let target = self.options.retag(source, target_tag, arch)?;
            self.record(format!("tag {source} {target}"))?;
            Ok(target)
        }
    }

    impl ManifestSet for ScriptedDriver {
        fn create_manifest(
            &self,
            manifest_list: &str,
            architectures: &[String],
        ) -> Result<Reference> {
            let list = self.options.resolve_manifest_list(manifest_list)?;
            self.record(format!("manifest create {list} {}", architectures.join(",")))?;
            Ok(list)
        }

        fn annotate_manifest(&self, manifest_list: &str, architectures: &[String]) -> Result<()> {
            let list = self.options.resolve_manifest_list(manifest_list)?;
            self.record(format!("manifest annotate {list} {}", architectures.join(",")))
        }

        fn push_manifest(&self, manifest_list: &str, options: ManifestPushOptions) -> Result<()> {
            let list = self.options.resolve_manifest_list(manifest_list)?;
            self.record(format!("manifest push purge={} {list}", options.purge))
        }

        fn remove_manifest(&self, manifest_lists: &[String]) -> Result<()> {
            self.record(format!("manifest rm {}", manifest_lists.join(" ")))
        }
    }

    impl RegistrySession for ScriptedDriver {
        fn login(&self) -> Result<()> {
            self.record("login".to_owned())
                .map_err(|source| Error::Authentication {
                    server: self.options.registry.server_address.clone(),
                    source: Box::new(source),
                })
        }

        fn logout(&self) -> Result<()> {
            self.record("logout".to_owned())
                .map_err(|source| Error::Authentication {
                    server: self.options.registry.server_address.clone(),
                    source: Box::new(source),
                })
        }
    }

    impl Driver for ScriptedDriver {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn options(&self) -> &DriverOptions {
            &self.options
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{mock::ScriptedDriver, *};

    #[test]
    fn sessions_log_out_when_dropped() {
        let driver = ScriptedDriver::default();
        {
            let _session = LoginSession::open(&driver).unwrap();
        }
        assert_eq!(driver.calls(), ["login", "logout"]);
    }

    #[test]
    fn closing_reports_logout_failures() {
        let driver = ScriptedDriver::default().failing("logout");
        let session = LoginSession::open(&driver).unwrap();
        assert!(matches!(session.close(), Err(Error::Authentication { .. })));
        assert_eq!(driver.calls(), ["login", "logout"]);
    }

    #[test]
    fn failed_logins_do_not_log_out() {
        let driver = ScriptedDriver::default().failing("login");
        assert!(LoginSession::open(&driver).is_err());
        assert_eq!(driver.calls(), ["login"]);
    }

    #[test]
    fn tags_and_architectures_are_required() {
        let some = ["x".to_owned()];
        assert!(matches!(
            require_tags_and_architectures(&[], &some),
            Err(Error::Validation(ValidationError::NoProvidedTags))
        ));
        assert!(matches!(
            require_tags_and_architectures(&some, &[]),
            Err(Error::Validation(ValidationError::NoSupportedArchitectures))
        ));
        assert!(require_tags_and_architectures(&some, &some).is_ok());
    }
}
