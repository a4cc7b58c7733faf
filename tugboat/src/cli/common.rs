use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Args;
use constcat::concat;
use container_image_name::DEFAULT_DOMAIN;
use log::{debug, warn};

use crate::{
    cancel::{Cancellation, Deadline},
    config::{self, Config},
    driver::{self, Driver, DriverOptions},
    git,
    reference::ArchOption,
    registry::{Registry, RegistryCredentials},
    template::{TemplateFields, Templater},
    Result,
};

const DEFAULT_DRIVER: &str = "auto";

fn seconds(value: &str) -> Result<Duration> {
    Ok(Duration::from_secs(value.parse()?))
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Path to the configuration file. By default `tugboat.yaml` is searched for in `.`, `./ci`
    /// and `./.ci`.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Print the commands instead of executing them.
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,

    /// Log every command and its output.
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    /// Use the official image layout, which places the architecture in the repository path
    /// instead of the tag.
    #[arg(long = "official", global = true)]
    pub official: bool,

    /// Where the architecture goes in the tag: `prepend`, `append` or `omit`.
    #[arg(long = "arch-option", global = true)]
    pub arch_option: Option<String>,

    #[arg(
        long = "driver",
        global = true,
        help = concat!("The container engine driver, `docker` or `", DEFAULT_DRIVER, "`.")
    )]
    pub driver: Option<String>,

    #[arg(
        long = "docker-registry",
        global = true,
        env = "TUGBOAT_DOCKER_REGISTRY",
        help = concat!(
            "The registry images are resolved against. Defaults to \"",
            DEFAULT_DOMAIN,
            "\"."
        )
    )]
    pub docker_registry: Option<String>,

    #[arg(long = "docker-namespace", global = true, env = "TUGBOAT_DOCKER_NAMESPACE")]
    pub docker_namespace: Option<String>,

    #[arg(long = "docker-user", global = true, env = "TUGBOAT_DOCKER_USER")]
    pub docker_user: Option<String>,

    #[arg(long = "docker-pass", global = true, env = "TUGBOAT_DOCKER_PASS", hide_env_values = true)]
    pub docker_pass: Option<String>,

    /// Abort running commands after this many seconds.
    #[arg(long = "timeout", global = true, value_name = "SECONDS", value_parser = seconds)]
    pub timeout: Option<Duration>,
}

/// The flag value when given, the configured value otherwise.
fn first(flag: Option<String>, configured: Option<String>) -> Option<String> {
    flag.filter(|value| !value.is_empty())
        .or(configured.filter(|value| !value.is_empty()))
}

/// Registry credentials are only built when a user or password is provided. Providing only one
/// of them is an error.
fn credentials(
    registry: &Registry,
    user: Option<String>,
    pass: Option<String>,
) -> Result<Option<RegistryCredentials>> {
    if user.is_none() && pass.is_none() {
        return Ok(None);
    }
    Ok(Some(RegistryCredentials::new(
        registry.server_address.as_str(),
        registry.namespace.as_str(),
        user.unwrap_or_default(),
        pass.unwrap_or_default(),
    )?))
}

/// Everything a command needs after the flags and the configuration file have been merged.
pub struct Context {
    pub config: Config,
    pub options: DriverOptions,
    pub driver_name: String,
    pub templater: Templater,
}

impl Context {
    pub fn new(global: GlobalArgs, cancellation: Cancellation) -> Result<Self> {
        let config = config::load(global.config.as_deref(), Path::new("."))?;
        Self::from_config(global, config, cancellation, git::info())
    }

    pub(super) fn from_config(
        global: GlobalArgs,
        config: Config,
        cancellation: Cancellation,
        git: git::GitInfo,
    ) -> Result<Self> {
        let dry_run = global.dry_run || config.options.dry_run;
        if dry_run {
            warn!("Dry run in progress, nothing will be executed");
        }

        let registry = Registry {
            server_address: first(global.docker_registry, config.docker.registry.clone())
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_owned()),
            namespace: first(global.docker_namespace, config.docker.namespace.clone())
                .unwrap_or_default(),
        };
        let credentials = credentials(
            &registry,
            first(global.docker_user, config.docker.user.clone()),
            first(global.docker_pass, config.docker.pass.clone()),
        )?;

        let arch_option = first(global.arch_option, config.publish.arch_option.clone())
            .map(|value| ArchOption::parse_lenient(&value))
            .unwrap_or_default();

        let cancellation = match global.timeout {
            Some(timeout) => cancellation.with_deadline(Deadline::after(timeout)),
            None => cancellation,
        };

        let options = DriverOptions {
            registry,
            credentials,
            dry_run,
            debug: global.debug || config.options.debug,
            official: global.official || config.publish.official,
            arch_option,
            cancellation,
        };
        debug!("driver options: {options:?}");

        let templater = Templater::new(&TemplateFields {
            image_name: config.image.name.clone().unwrap_or_default(),
            version: config.image.version.clone().unwrap_or_default(),
            git,
        });

        Ok(Self {
            driver_name: first(global.driver, config.docker.driver.clone())
                .unwrap_or_else(|| DEFAULT_DRIVER.to_owned()),
            config,
            options,
            templater,
        })
    }

    pub fn driver(&self) -> Result<Box<dyn Driver>> {
        Ok(driver::new_driver(&self.driver_name, self.options.clone())?)
    }

    /// The architectures given on the command line, or the configured ones.
    pub fn architectures(&self, flag: Vec<String>) -> Vec<String> {
        if flag.is_empty() {
            self.config.image.supported_architectures.clone()
        } else {
            flag
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::{
        cli::Cli,
        error::{Error, ValidationError},
    };

    fn parse(args: &[&str]) -> std::result::Result<GlobalArgs, clap::Error> {
        let args = ["tugboat", "version"].into_iter().chain(args.iter().copied());
        Ok(Cli::try_parse_from(args)?.global)
    }

    fn global(args: &[&str]) -> GlobalArgs {
        parse(args).unwrap()
    }

    fn merged(args: &[&str], config: &str) -> Result<Context> {
        Context::from_config(
            global(args),
            config::parse(config)?,
            Cancellation::new(),
            git::GitInfo::default(),
        )
    }

    #[test]
    fn defaults_apply_without_flags_or_config() {
        let context = merged(&[], "").unwrap();
        assert_eq!(context.options.registry, Registry::default());
        assert_eq!(context.options.credentials, None);
        assert_eq!(context.options.arch_option, ArchOption::Prepend);
        assert_eq!(context.driver_name, "auto");
        assert!(!context.options.dry_run);
    }

    #[test]
    fn flags_take_precedence_over_the_config() {
        let config = "
docker:
  registry: configured.example.com
  namespace: configured
  driver: docker
publish:
  arch-option: append
";
        let context = merged(&[], config).unwrap();
        assert_eq!(context.options.registry.server_address, "configured.example.com");
        assert_eq!(context.options.arch_option, ArchOption::Append);
        assert_eq!(context.driver_name, "docker");

        let context = merged(
            &["--docker-registry", "flag.example.com", "--arch-option", "omit"],
            config,
        )
        .unwrap();
        assert_eq!(context.options.registry.server_address, "flag.example.com");
        assert_eq!(context.options.registry.namespace, "configured");
        assert_eq!(context.options.arch_option, ArchOption::Omit);
    }

    #[test]
    fn boolean_flags_enable_what_the_config_leaves_off() {
        let context = merged(&["--official"], "options:\n  dry-run: true\n").unwrap();
        assert!(context.options.official);
        assert!(context.options.dry_run);
    }

    #[test]
    fn partial_credentials_are_rejected() {
        let error = merged(&["--docker-namespace", "team", "--docker-user", "ci"], "")
            .err()
            .unwrap();
        assert!(matches!(
            error.downcast_ref::<ValidationError>(),
            Some(ValidationError::EmptyCredentialField("password"))
        ));

        let context = merged(
            &["--docker-namespace", "team", "--docker-user", "ci"],
            "docker:\n  pass: secret\n",
        )
        .unwrap();
        let credentials = context.options.credentials.unwrap();
        assert_eq!(credentials.username(), "ci");
        assert_eq!(credentials.password(), "secret");
        assert_eq!(credentials.server_address(), "docker.io");
    }

    #[test]
    fn unknown_drivers_are_reported_when_used() {
        let context = merged(&["--driver", "podman"], "").unwrap();
        let error = context.driver().err().unwrap();
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::DriverUnsupported(name)) if name == "podman"
        ));
    }

    #[test]
    fn architectures_fall_back_to_the_config() {
        let context = merged(&[], "image:\n  supported-architectures: [amd64]\n").unwrap();
        assert_eq!(context.architectures(Vec::new()), ["amd64"]);
        assert_eq!(context.architectures(vec!["arm64".to_owned()]), ["arm64"]);
    }

    #[test]
    fn timeouts_are_parsed_as_seconds() {
        assert_eq!(
            global(&["--timeout", "90"]).timeout,
            Some(Duration::from_secs(90))
        );
        assert!(parse(&["--timeout", "soon"]).is_err());
    }
}
