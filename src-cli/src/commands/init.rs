//! `gradesync init`: write a starter gradebook file.

use std::path::PathBuf;

use clap::Args;
use gradesync::config::{write_skeleton, SkeletonOptions, DEFAULT_CONFIG_FILE};

use super::GlobalOptions;
use crate::error::CliResult;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the file (defaults to ./datos_aules.json)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Name of the parent category the tree hangs from
    #[arg(long)]
    pub parent: Option<String>,

    /// Numeric course identifier
    #[arg(long)]
    pub course_id: Option<u64>,

    /// Site address, e.g. https://aules.edu.gva.es/fp
    #[arg(long)]
    pub base_url: Option<String>,

    /// Login name
    #[arg(long)]
    pub username: Option<String>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    fn options(&self) -> SkeletonOptions {
        let defaults = SkeletonOptions::default();
        SkeletonOptions {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            username: self.username.clone().unwrap_or(defaults.username),
            course_id: self.course_id.unwrap_or(defaults.course_id),
            parent_category: self.parent.clone().unwrap_or(defaults.parent_category),
        }
    }
}

pub async fn execute(args: InitArgs, global: &GlobalOptions) -> CliResult<()> {
    let path = args
        .output
        .clone()
        .or_else(|| global.config.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let config = write_skeleton(&path, &args.options(), args.force)?;

    if global.json {
        return print_json(&config);
    }
    println!("Wrote {}", path.display());
    println!(
        "Edit the categories under '{}' and export GRADESYNC_PASSWORD before running 'gradesync create'.",
        config.parent_category
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = InitArgs {
            output: None,
            parent: Some("Resultados".into()),
            course_id: Some(812),
            base_url: None,
            username: None,
            force: false,
        };
        let options = args.options();
        assert_eq!(options.parent_category, "Resultados");
        assert_eq!(options.course_id, 812);
        assert_eq!(options.base_url, SkeletonOptions::default().base_url);
    }
}
