use log::{debug, info};

use super::{
    BuildSpec, Driver, DriverOptions, ImageBuilder, ImagePusher, ManifestPushOptions,
    ManifestSet, RegistrySession,
};
use crate::{
    error::{Error, Result, ValidationError},
    executor::Executor,
    process::{self, Command},
    reference::Reference,
};

const DOCKER: &str = "docker";

/// Drives the `docker` command line client.
pub struct DockerDriver {
    options: DriverOptions,
    executor: Executor,
    cleanup: Executor,
}

impl DockerDriver {
    pub fn new(options: DriverOptions) -> Self {
        let executor = options.executor();
        let cleanup = options.cleanup_executor();
        Self {
            options,
            executor,
            cleanup,
        }
    }

    fn registry_server(&self) -> &str {
        self.options
            .credentials
            .as_ref()
            .map(|credentials| credentials.server_address())
            .unwrap_or(&self.options.registry.server_address)
    }

    fn pull(&self, reference: Reference) -> Result<Reference> {
        info!("Pulling {reference}");
        self.executor.run(&pull_command(&reference))?;
        Ok(reference)
    }

    fn push(&self, reference: Reference) -> Result<Reference> {
        info!("Pushing {reference}");
        self.executor.run(&push_command(&reference))?;
        Ok(reference)
    }

    fn tag(&self, source: Reference, target_tag: &str, arch: Option<&str>) -> Result<Reference> {
        let target = self.options.retag(&source, target_tag, arch)?;
        info!("Tagging {source} as {target}");
        self.executor.run(&tag_command(&source, &target))?;
        Ok(target)
    }

    fn manifest_members(
        &self,
        manifest_list: &Reference,
        architectures: &[String],
    ) -> Result<Vec<Reference>> {
        architectures
            .iter()
            .map(|arch| self.options.resolve_manifest_member(manifest_list, arch))
            .collect()
    }
}

fn build_command(references: &[Reference], spec: &BuildSpec) -> Command {
    let mut command = process::command!(DOCKER, "build");
    for reference in references {
        command = process::args!(command, "-t", reference.remote());
    }
    command = process::args!(
        command,
        "-f",
        format!("{}/{}", spec.context, spec.dockerfile)
    );
    for build_arg in &spec.build_args {
        command = process::args!(command, "--build-arg", build_arg.to_string());
    }
    if spec.no_cache {
        command = command.arg("--no-cache");
    }
    if spec.pull {
        command = command.arg("--pull");
    }
    command.arg(spec.context.as_str())
}

fn pull_command(reference: &Reference) -> Command {
    process::command!(DOCKER, "pull", reference.remote())
}

fn push_command(reference: &Reference) -> Command {
    process::command!(DOCKER, "push", reference.remote())
}

fn tag_command(source: &Reference, target: &Reference) -> Command {
    process::command!(DOCKER, "tag", source.remote(), target.remote())
}

fn login_command(server: &str, username: &str, password: &str) -> Command {
    process::command!(DOCKER, "login", "--username", username, "--password-stdin", server)
        .stdin(password.as_bytes().to_vec())
}

fn logout_command(server: &str) -> Command {
    process::command!(DOCKER, "logout", server)
}

fn manifest_create_command(manifest_list: &Reference, members: &[Reference]) -> Command {
    process::command!(DOCKER, "manifest", "create", manifest_list.remote())
        .args(members.iter().map(Reference::remote))
}

fn manifest_annotate_command(manifest_list: &Reference, member: &Reference, arch: &str) -> Command {
    process::command!(
        DOCKER,
        "manifest",
        "annotate",
        manifest_list.remote(),
        member.remote(),
        "--arch",
        arch,
    )
}

fn manifest_push_command(manifest_list: &Reference, options: ManifestPushOptions) -> Command {
    let mut command = process::command!(DOCKER, "manifest", "push");
    if options.purge {
        command = command.arg("--purge");
    }
    command.arg(manifest_list.remote())
}

fn manifest_rm_command(manifest_lists: &[Reference]) -> Command {
    process::command!(DOCKER, "manifest", "rm").args(manifest_lists.iter().map(Reference::remote))
}

impl ImageBuilder for DockerDriver {
    fn build_image(&self, spec: &BuildSpec) -> Result<Vec<Reference>> {
        let references = spec
            .tags
            .iter()
            .map(|tag| self.options.resolve(tag, None))
            .collect::<Result<Vec<_>>>()?;

        match references.first() {
            Some(reference) => info!(
                "Building {reference} using {}/{}",
                spec.context, spec.dockerfile
            ),
            None => info!("Building {}/{}", spec.context, spec.dockerfile),
        }

        self.executor.run(&build_command(&references, spec))?;
        Ok(references)
    }

    fn pull_image(&self, image: &str) -> Result<Reference> {
        self.pull(self.get_uri(image)?)
    }

    fn pull_image_with_arch(&self, image: &str, arch: &str) -> Result<Reference> {
        self.pull(self.get_uri_with_arch(image, arch)?)
    }
}

impl ImagePusher for DockerDriver {
    fn push_image(&self, image: &str) -> Result<Reference> {
        self.push(self.get_uri(image)?)
    }

    fn push_image_with_arch(&self, image: &str, arch: &str) -> Result<Reference> {
        self.push(self.get_uri_with_arch(image, arch)?)
    }

    fn tag_image(&self, source: &str, target_tag: &str) -> Result<Reference> {
        self.tag(self.get_uri(source)?, target_tag, None)
    }

    fn tag_image_with_arch(
        &self,
        source: &str,
        target_tag: &str,
        arch: &str,
    ) -> Result<Reference> {
        self.tag(self.get_uri_with_arch(source, arch)?, target_tag, Some(arch))
    }

    fn push_resolved(&self, reference: &Reference) -> Result<()> {
        self.push(reference.clone()).map(drop)
    }

    fn tag_resolved(
        &self,
        source: &Reference,
        target_tag: &str,
        arch: Option<&str>,
    ) -> Result<Reference> {
        self.tag(source.clone(), target_tag, arch)
    }
}

impl ManifestSet for DockerDriver {
    fn create_manifest(&self, manifest_list: &str, architectures: &[String]) -> Result<Reference> {
        let manifest_list = self.options.resolve_manifest_list(manifest_list)?;
        let members = self.manifest_members(&manifest_list, architectures)?;
        info!("Creating manifest {manifest_list}");
        self.executor
            .run(&manifest_create_command(&manifest_list, &members))?;
        Ok(manifest_list)
    }

    fn annotate_manifest(&self, manifest_list: &str, architectures: &[String]) -> Result<()> {
        let manifest_list = self.options.resolve_manifest_list(manifest_list)?;
        let members = self.manifest_members(&manifest_list, architectures)?;
        info!("Annotating manifest {manifest_list}");
        for (member, arch) in members.iter().zip(architectures) {
            self.executor
                .run(&manifest_annotate_command(&manifest_list, member, arch))?;
        }
        Ok(())
    }

    fn push_manifest(&self, manifest_list: &str, options: ManifestPushOptions) -> Result<()> {
        let manifest_list = self.options.resolve_manifest_list(manifest_list)?;
        info!("Pushing manifest {manifest_list}");
        self.executor
            .run(&manifest_push_command(&manifest_list, options))
    }

    fn remove_manifest(&self, manifest_lists: &[String]) -> Result<()> {
        let manifest_lists = manifest_lists
            .iter()
            .map(|manifest_list| self.options.resolve_manifest_list(manifest_list))
            .collect::<Result<Vec<_>>>()?;
        info!(
            "Removing manifests {}",
            manifest_lists
                .iter()
                .map(Reference::remote)
                .collect::<Vec<_>>()
                .join(" ")
        );
        self.executor.run(&manifest_rm_command(&manifest_lists))
    }
}

impl RegistrySession for DockerDriver {
    fn login(&self) -> Result<()> {
        let credentials = self
            .options
            .credentials
            .as_ref()
            .ok_or(ValidationError::MissingCredentials)?;
        let server = credentials.server_address();
        info!("Logging into {server} as {}", credentials.username());

        self.executor
            .run(&login_command(
                server,
                credentials.username(),
                credentials.password(),
            ))
            .map_err(|source| Error::Authentication {
                server: server.to_owned(),
                source: Box::new(source),
            })
    }

    fn logout(&self) -> Result<()> {
        let server = self.registry_server();
        debug!("Logging out of {server}");
        self.cleanup
            .run(&logout_command(server))
            .map_err(|source| Error::Authentication {
                server: server.to_owned(),
                source: Box::new(source),
            })
    }
}

impl Driver for DockerDriver {
    fn name(&self) -> &'static str {
        DOCKER
    }

    fn options(&self) -> &DriverOptions {
        &self.options
    }
}
