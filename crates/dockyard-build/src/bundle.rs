use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Directory the build context is assembled in, relative to the project root.
pub const BUNDLE_DIR_NAME: &str = ".dockyard-bundle";

/// Paths never shipped in a build context, regardless of .gitignore content.
const DOCKYARD_EXCLUDES: &[&str] = &[BUNDLE_DIR_NAME, ".git"];

/// Assembles the build context handed to `docker build`.
///
/// Mirrors what git considers part of the project (tracked files plus
/// untracked files that are not ignored) into `.dockyard-bundle/`, minus
/// [`DOCKYARD_EXCLUDES`] and `extra_excludes`. The rendered Dockerfile is
/// written into the bundle. A previous bundle is removed first.
pub fn create_bundle(
    project_dir: &Path,
    dockerfile_content: &str,
    extra_excludes: &[&str],
) -> Result<PathBuf, BundleError> {
    let bundle_dir = project_dir.join(BUNDLE_DIR_NAME);
    if bundle_dir.exists() {
        fs::remove_dir_all(&bundle_dir).map_err(io_error("remove stale bundle", &bundle_dir))?;
    }

    let listed = git(
        project_dir,
        &["ls-files", "--cached", "--others", "--exclude-standard"],
    )?;
    let shipped = listed
        .lines()
        .filter(|l| !l.is_empty())
        .map(Path::new)
        .filter(|rel| !is_excluded(rel, extra_excludes));

    let mut copied = 0usize;
    for relative in shipped {
        let src = project_dir.join(relative);
        // Tracked but deleted in the working tree
        if !src.is_file() {
            tracing::debug!(path = %relative.display(), "skipping missing file");
            continue;
        }
        let dst = bundle_dir.join(relative);
        let parent = dst.parent().unwrap_or(bundle_dir.as_path());
        fs::create_dir_all(parent).map_err(io_error("create directory", parent))?;
        fs::copy(&src, &dst).map_err(io_error("copy", &src))?;
        copied += 1;
    }

    fs::create_dir_all(&bundle_dir).map_err(io_error("create directory", &bundle_dir))?;
    let dockerfile_path = bundle_dir.join("Dockerfile");
    fs::write(&dockerfile_path, dockerfile_content)
        .map_err(io_error("write Dockerfile", &dockerfile_path))?;

    tracing::debug!(files = copied, bundle = %bundle_dir.display(), "build context bundled");
    Ok(bundle_dir)
}

/// Whether the working tree has uncommitted changes outside the excluded paths.
///
/// The bundle directory is always ignored, as is every path in
/// `extra_excludes`: both are written by dockyard or by the composed
/// services, never by the developer.
pub fn is_dirty(project_dir: &Path, extra_excludes: &[&str]) -> Result<bool, BundleError> {
    let pathspecs: Vec<String> = DOCKYARD_EXCLUDES
        .iter()
        .chain(extra_excludes)
        .map(|ex| format!(":(exclude){}", ex.trim_start_matches("./")))
        .collect();

    let mut args = vec!["status", "--porcelain", "--", "."];
    args.extend(pathspecs.iter().map(String::as_str));

    let status = git(project_dir, &args)?;
    if !status.is_empty() {
        tracing::debug!(changes = %status.trim_end(), "working tree is dirty");
    }
    Ok(!status.is_empty())
}

fn is_excluded(relative: &Path, extra_excludes: &[&str]) -> bool {
    DOCKYARD_EXCLUDES
        .iter()
        .chain(extra_excludes)
        .any(|ex| relative.starts_with(ex.trim_start_matches("./")))
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> BundleError {
    let path = path.to_path_buf();
    move |source| BundleError::Io {
        action,
        path,
        source,
    }
}

/// Run `git <args>` in `project_dir` and return its stdout.
fn git(project_dir: &Path, args: &[&str]) -> Result<String, BundleError> {
    let subcommand = args.first().copied().unwrap_or_default().to_owned();
    let output = Command::new("git")
        .args(args)
        .current_dir(project_dir)
        .output()
        .map_err(|source| BundleError::GitSpawn {
            subcommand: subcommand.clone(),
            source,
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(BundleError::GitExit {
            subcommand,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("failed to {action} {path}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("could not run `git {subcommand}`; is git installed?")]
    GitSpawn {
        subcommand: String,
        source: io::Error,
    },

    #[error("`git {subcommand}` exited with {status}: {stderr}")]
    GitExit {
        subcommand: String,
        status: ExitStatus,
        stderr: String,
    },
}
