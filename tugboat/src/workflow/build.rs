use log::info;

use super::best_effort;
use crate::{
    driver::{BuildSpec, Driver},
    error::Result,
};

/// Builds one image for all tags in `spec`, then pushes each tag when asked to. A failing push is
/// logged and does not fail the build.
pub fn build(driver: &dyn Driver, spec: &BuildSpec) -> Result<()> {
    let references = driver.build_image(spec)?;

    if references.is_empty() {
        info!("Built an untagged image, nothing to push");
        return Ok(());
    }

    if spec.push {
        for reference in &references {
            best_effort(driver.push_resolved(reference))?;
        }
    }

    Ok(())
}
