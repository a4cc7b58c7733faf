use clap::Args;
use log::debug;

use super::common::Context;
use crate::{
    workflow::{self, TagSpec},
    Result,
};

#[derive(Debug, Args)]
pub struct TagArgs {
    /// The image to tag, e.g. `image:1.0`.
    pub source_image: String,

    /// The tags to create. Accepts a comma separated list or may be repeated.
    #[arg(long = "tags", value_delimiter = ',', num_args = 1..)]
    pub tags: Vec<String>,

    /// The architectures to tag. Defaults to `image.supported-architectures` from the config.
    #[arg(short = 'a', long = "architectures", value_delimiter = ',', num_args = 1..)]
    pub architectures: Vec<String>,

    /// Push the tags after creating them.
    #[arg(long = "push")]
    pub push: bool,
}

fn spec(context: &mut Context, args: TagArgs) -> Result<TagSpec> {
    Ok(TagSpec {
        source_image: context.templater.apply(&args.source_image)?,
        tags: context.templater.apply_all(&args.tags)?,
        push: args.push || context.config.tag.push,
        architectures: context.architectures(args.architectures),
    })
}

pub fn tag(context: &mut Context, args: TagArgs) -> Result<()> {
    let spec = spec(context, args)?;
    debug!("tag spec: {spec:?}");
    workflow::tag(context.driver()?.as_ref(), &spec)?;
    Ok(())
}
