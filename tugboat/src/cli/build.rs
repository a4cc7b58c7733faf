use clap::Args;
use log::debug;

use super::common::Context;
use crate::{
    driver::{BuildArg, BuildSpec},
    workflow, Result,
};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Name and optionally a tag in the `name:tag` format. May be repeated.
    #[arg(short = 't', long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Set a build-time variable. May be repeated.
    #[arg(long = "build-arg", value_name = "KEY[=VALUE]")]
    pub build_args: Vec<BuildArg>,

    /// The build context directory.
    #[arg(long = "context")]
    pub context: Option<String>,

    /// The Dockerfile, relative to the build context.
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,

    /// Push every tag after a successful build.
    #[arg(long = "push")]
    pub push: bool,

    /// Always attempt to pull newer versions of the base images.
    #[arg(long = "pull")]
    pub pull: bool,

    /// Do not use the build cache.
    #[arg(long = "no-cache")]
    pub no_cache: bool,
}

fn spec(context: &mut Context, args: BuildArgs) -> Result<BuildSpec> {
    let configured = &context.config.build;
    let tags = if args.tags.is_empty() {
        configured.tags.clone()
    } else {
        args.tags
    };
    let build_args = if args.build_args.is_empty() {
        configured
            .args
            .iter()
            .map(|arg| arg.parse())
            .collect::<Result<_, String>>()?
    } else {
        args.build_args
    };

    let defaults = BuildSpec::default();
    Ok(BuildSpec {
        context: args
            .context
            .or_else(|| configured.context.clone())
            .unwrap_or(defaults.context),
        dockerfile: args
            .file
            .or_else(|| configured.file.clone())
            .unwrap_or(defaults.dockerfile),
        build_args,
        push: args.push || configured.push,
        pull: args.pull || configured.pull,
        no_cache: args.no_cache || configured.no_cache,
        tags: context.templater.apply_all(&tags)?,
    })
}

pub fn build(context: &mut Context, args: BuildArgs) -> Result<()> {
    let spec = spec(context, args)?;
    debug!("build spec: {spec:?}");
    workflow::build(context.driver()?.as_ref(), &spec)?;
    Ok(())
}
