use clap::Args;

use crate::version::{full_version_with_arch, VERSION};

#[derive(Debug, Args)]
pub struct VersionArgs {
    /// Only print the version number.
    #[arg(long = "short")]
    pub short: bool,
}

fn render(args: &VersionArgs) -> String {
    if args.short {
        VERSION.to_owned()
    } else {
        format!("tugboat version {}", full_version_with_arch())
    }
}

pub fn version(args: &VersionArgs) {
    println!("{}", render(args));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_prints_only_the_version() {
        assert_eq!(render(&VersionArgs { short: true }), VERSION);
        let long = render(&VersionArgs { short: false });
        assert!(long.starts_with(&format!("tugboat version {VERSION} [")));
    }
}
