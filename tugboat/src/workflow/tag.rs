use super::{best_effort, require_tags_and_architectures};
use crate::{driver::Driver, error::Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    /// `image[:tag]`
    pub source_image: String,
    pub tags: Vec<String>,
    pub architectures: Vec<String>,
    pub push: bool,
}

/// Pulls the source image for every architecture and tags it with each of the target tags.
///
/// Pulling and tagging abort on the first failure. Pushing a tag is best-effort.
pub fn tag(driver: &dyn Driver, spec: &TagSpec) -> Result<()> {
    require_tags_and_architectures(&spec.tags, &spec.architectures)?;

    for arch in &spec.architectures {
        let source = driver.pull_image_with_arch(&spec.source_image, arch)?;

        for target_tag in &spec.tags {
            let target = driver.tag_resolved(&source, target_tag, Some(arch))?;

            if spec.push {
                best_effort(driver.push_resolved(&target))?;
            }
        }
    }

    Ok(())
}
