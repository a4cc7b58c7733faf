use clap::{Args, Subcommand};
use log::debug;

use super::common::Context;
use crate::{
    workflow::{self, ManifestSpec},
    Result,
};

const LATEST: &str = "latest";

#[derive(Debug, Subcommand)]
pub enum ManifestCommands {
    /// Create a manifest list for every tag and annotate it with the architecture specific images
    #[command(arg_required_else_help = true)]
    Create(CreateArgs),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// The image the manifest lists are created for, without a tag.
    pub image: String,

    /// The tags to create manifest lists for. Accepts a comma separated list or may be repeated.
    #[arg(long = "for", value_name = "TAG", value_delimiter = ',', num_args = 1..)]
    pub for_tags: Vec<String>,

    /// Also create the `latest` manifest list.
    #[arg(long = "latest")]
    pub latest: bool,

    /// Push the manifest lists.
    #[arg(long = "push")]
    pub push: bool,

    /// The architectures the manifest lists refer to. Defaults to `image.supported-architectures`
    /// from the config.
    #[arg(short = 'a', long = "architectures", value_delimiter = ',', num_args = 1..)]
    pub architectures: Vec<String>,
}

fn with_latest(mut tags: Vec<String>, latest: bool) -> Vec<String> {
    if latest && !tags.iter().any(|tag| tag == LATEST) {
        tags.push(LATEST.to_owned());
    }
    tags
}

fn spec(context: &mut Context, args: CreateArgs) -> Result<ManifestSpec> {
    let configured = &context.config.manifest.create;
    let tags = if args.for_tags.is_empty() {
        configured.for_tags.clone()
    } else {
        args.for_tags
    };
    let latest = args.latest || configured.latest;
    let push = args.push || configured.push;

    Ok(ManifestSpec {
        manifest_list: context.templater.apply(&args.image)?,
        tags: with_latest(context.templater.apply_all(&tags)?, latest),
        push,
        architectures: context.architectures(args.architectures),
    })
}

pub fn manifest(context: &mut Context, command: ManifestCommands) -> Result<()> {
    match command {
        ManifestCommands::Create(args) => {
            let spec = spec(context, args)?;
            debug!("manifest create spec: {spec:?}");
            workflow::manifest_create(context.driver()?.as_ref(), &spec)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::{cancel::Cancellation, cli::Cli, config, git::GitInfo};

    fn create_spec(args: &[&str], config: &str) -> Result<ManifestSpec> {
        let args = ["tugboat", "manifest", "create"].into_iter().chain(args.iter().copied());
        let cli = Cli::try_parse_from(args)?;
        let crate::cli::Commands::Manifest {
            command: ManifestCommands::Create(create_args),
        } = cli.command
        else {
            unreachable!("parsed the manifest create command");
        };
        let mut context = Context::from_config(
            cli.global,
            config::parse(config)?,
            Cancellation::new(),
            GitInfo::default(),
        )?;
        spec(&mut context, create_args)
    }

    #[test]
    fn latest_is_appended_once() {
        assert_eq!(with_latest(vec!["v1".to_owned()], true), ["v1", "latest"]);
        assert_eq!(with_latest(vec!["latest".to_owned()], true), ["latest"]);
        assert_eq!(with_latest(vec!["v1".to_owned()], false), ["v1"]);
    }

    #[test]
    fn flags_and_config_are_merged() {
        let config = "
image:
  name: app
  version: 1.0.0
  supported-architectures: [amd64, arm64]
manifest:
  create:
    for: ['{{ Version }}']
    latest: true
";
        let spec = create_spec(&["{{ ImageName }}", "--push"], config).unwrap();
        assert_eq!(spec.manifest_list, "app");
        assert_eq!(spec.tags, ["1.0.0", "latest"]);
        assert_eq!(spec.architectures, ["amd64", "arm64"]);
        assert!(spec.push);

        let spec = create_spec(&["app", "--for", "v2", "-a", "arm64"], config).unwrap();
        assert_eq!(spec.tags, ["v2", "latest"]);
        assert_eq!(spec.architectures, ["arm64"]);
        assert!(!spec.push);
    }
}
