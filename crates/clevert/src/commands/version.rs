//! Version command

use anyhow::Result;

use crate::cli::VersionArgs;
use crate::version::VersionInfo;

pub fn run(args: VersionArgs) -> Result<()> {
    let info = VersionInfo::current();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("{}", info.display());
        if let Some(commit) = &info.commit {
            println!("Commit:     {}", commit);
        }
        if let Some(target) = &info.target {
            println!("Target:     {}", target);
        }
    }

    Ok(())
}
