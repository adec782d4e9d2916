use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

use sivafs::fuse_adapter::SivaFs;
use sivafs::router::Router;

/// Mount a directory of `.siva` archives as a read-only FUSE filesystem
///
/// Each `.siva` file in `archive_dir` (at any depth) appears as a directory.
/// Inside it, alongside the archive's own contents, three synthetic
/// directories project the git history of the repository the archive
/// contains: `_branch_` and `_tag_` hold symlinks (grouped by `/` in the ref
/// name) pointing at `_commit_/<hash>`, and `_commit_` holds one directory
/// per commit object with a `message` file, a `parent/<n>` list, and a
/// `tree` mirroring that commit's tree.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Directory to scan for `.siva` archives
    archive_dir: PathBuf,

    /// Directory to mount the filesystem at
    mount_point: PathBuf,

    /// Keep the process in the foreground instead of forking
    #[arg(long)]
    foreground: bool,

    /// Allow other users to access the mount
    #[arg(long)]
    allow_other: bool,

    /// Allow the root user to access the mount
    #[arg(long)]
    allow_root: bool,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new().filter_level(cli.verbose.log_level_filter()).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let archive_dir = cli
        .archive_dir
        .canonicalize()
        .with_context(|| format!("archive directory {} does not exist", cli.archive_dir.display()))?;

    if !cli.mount_point.is_dir() {
        anyhow::bail!("mount point {} is not a directory", cli.mount_point.display());
    }

    let mut options = vec![fuser::MountOption::RO, fuser::MountOption::FSName("sivafs".to_string())];
    if cli.allow_other {
        options.push(fuser::MountOption::AllowOther);
    }
    if cli.allow_root {
        options.push(fuser::MountOption::AllowRoot);
    }

    log::info!(
        "mounting {} at {}",
        archive_dir.display(),
        cli.mount_point.display()
    );

    let filesystem = SivaFs::new(Router::new(archive_dir));

    if cli.foreground {
        fuser::mount2(filesystem, &cli.mount_point, &options)
            .with_context(|| format!("mounting at {}", cli.mount_point.display()))?;
    } else {
        let session = fuser::Session::new(filesystem, &cli.mount_point, &options)
            .with_context(|| format!("mounting at {}", cli.mount_point.display()))?;
        session
            .spawn()
            .context("backgrounding the mount session")?
            .join();
    }

    Ok(())
}
