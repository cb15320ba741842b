//! Asset files: collecting them for export, staging and swapping them in on import.
//!
//! Import never writes into the live assets directory. Files are extracted
//! into a sibling staging directory first; the swap is two renames
//! (live -> backup, staging -> live), and the backup is only deleted once
//! the database transaction has committed.

use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

pub const ASSETS_PREFIX: &str = "assets/";

/// Every regular file under `root`, as (`/`-separated relative name, path), sorted.
/// A missing root has no files.
pub fn collect_files(root: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    if root.is_dir() {
        walk(root, root, &mut files)?;
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(root, &path, out)?;
        } else if path.is_file() {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let name = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/");
            out.push((name, path));
        }
    }
    Ok(())
}

/// Relative target path for an archive member, or `None` if the member is
/// not a file under `assets/` or would escape the assets directory.
pub fn member_target(name: &str) -> Option<PathBuf> {
    let relative = name.strip_prefix(ASSETS_PREFIX)?;
    if relative.is_empty() || relative.ends_with('/') || relative.starts_with('/') {
        return None;
    }
    let mut target = PathBuf::new();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains(':') => return None,
            s => target.push(s),
        }
    }
    if target.as_os_str().is_empty() {
        None
    } else {
        Some(target)
    }
}

fn sibling(dir: &Path, tag: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "assets".to_string());
    let parent = dir.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!(".{}-{}-{}", name, tag, Uuid::new_v4()))
}

/// Extracted assets waiting to replace the live directory.
///
/// Removed on drop unless swapped in.
pub struct StagedAssets {
    dir: PathBuf,
    count: usize,
    swapped: bool,
}

impl StagedAssets {
    pub fn create(assets_dir: &Path) -> io::Result<Self> {
        let dir = sibling(assets_dir, "staging");
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            count: 0,
            swapped: false,
        })
    }

    pub fn write(&mut self, relative: &Path, reader: &mut impl Read) -> io::Result<()> {
        let target = self.dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&target)?;
        io::copy(reader, &mut file)?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Move the live directory aside and put the staged files in its place.
    pub fn swap_into(mut self, assets_dir: &Path) -> io::Result<AssetSwap> {
        if let Some(parent) = assets_dir.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let backup = if assets_dir.exists() {
            let backup = sibling(assets_dir, "backup");
            fs::rename(assets_dir, &backup)?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&self.dir, assets_dir) {
            if let Some(backup) = &backup {
                if let Err(restore) = fs::rename(backup, assets_dir) {
                    tracing::error!(error = %restore, backup = %backup.display(), "could not restore assets backup");
                }
            }
            return Err(e);
        }

        self.swapped = true;
        Ok(AssetSwap {
            assets_dir: assets_dir.to_path_buf(),
            backup,
            finished: false,
        })
    }
}

impl Drop for StagedAssets {
    fn drop(&mut self) {
        if !self.swapped {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }
}

/// A completed directory swap that can still be undone.
///
/// Dropping it without calling [`AssetSwap::commit`] rolls it back.
pub struct AssetSwap {
    assets_dir: PathBuf,
    backup: Option<PathBuf>,
    finished: bool,
}

impl AssetSwap {
    /// Keep the new assets and delete the backup.
    pub fn commit(mut self) {
        self.finished = true;
        if let Some(backup) = self.backup.take() {
            if let Err(e) = fs::remove_dir_all(&backup) {
                tracing::warn!(error = %e, backup = %backup.display(), "could not remove assets backup");
            }
        }
    }

    /// Put the previous assets back.
    pub fn rollback(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(e) = fs::remove_dir_all(&self.assets_dir) {
            tracing::warn!(error = %e, "could not remove imported assets");
        }
        if let Some(backup) = self.backup.take() {
            if let Err(e) = fs::rename(&backup, &self.assets_dir) {
                tracing::error!(error = %e, backup = %backup.display(), "could not restore assets backup");
            }
        }
    }
}

impl Drop for AssetSwap {
    fn drop(&mut self) {
        self.restore();
    }
}
