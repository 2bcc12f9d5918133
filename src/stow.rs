//! Merge an unpacked package tree into an install prefix.
//!
//! A tree whose root holds a `*bin` directory is assumed to already be laid
//! out like a prefix and is mirrored path for path. Anything else is treated
//! as a loose bundle: executables go to `bin/`, man pages to
//! `share/man/man1/`, and the rest (docs, licenses, ...) is left behind.
//!
//! Files are moved, not copied, so the source tree is consumed. Nothing is
//! rolled back or pruned when a move fails halfway.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const BIN_DIR: &str = "bin";
const MAN1_DIR: &str = "share/man/man1";

#[cfg(windows)]
const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "bat", "cmd", "com", "ps1"];

#[derive(Debug, Error)]
#[error("failed to {action} '{}': {source}", .path.display())]
pub struct StowError {
    action: &'static str,
    path: PathBuf,
    relocated: Vec<PathBuf>,
    #[source]
    source: io::Error,
}

impl StowError {
    /// Files that were already moved into the destination before the failure.
    pub fn relocated(&self) -> &[PathBuf] {
        &self.relocated
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Standard,
    NonStandard,
}

struct Stower<'a> {
    src: &'a Path,
    dst: &'a Path,
    dry_run: bool,
    stows: Vec<PathBuf>,
    relocated: Vec<PathBuf>,
}

impl Stower<'_> {
    fn fail(&self, action: &'static str, path: &Path, source: io::Error) -> StowError {
        StowError {
            action,
            path: path.to_path_buf(),
            relocated: self.relocated.clone(),
            source,
        }
    }

    fn make_dir(&self, dir: &Path) -> Result<(), StowError> {
        if self.dry_run {
            return Ok(());
        }
        tracing::trace!("Creating directory {}", dir.display());
        fs::create_dir_all(dir).map_err(|e| self.fail("create directory", dir, e))
    }

    fn place(&mut self, from: &Path, to: PathBuf) -> Result<(), StowError> {
        if !self.dry_run {
            if to.exists() {
                tracing::warn!("Overwriting existing file {}", to.display());
            }
            move_file(from, &to).map_err(|e| self.fail("move", from, e))?;
            self.relocated.push(to.clone());
        }
        tracing::debug!("{} -> {}", from.display(), to.display());
        self.stows.push(to);
        Ok(())
    }

    fn walk(&self, root: &Path) -> Result<Vec<walkdir::DirEntry>, StowError> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
                self.fail("read", &path, source)
            })
    }

    fn stow_standard(&mut self) -> Result<(), StowError> {
        let children = immediate_children(self.src).map_err(|e| self.fail("read", self.src, e))?;
        for child in children {
            let file_type = child
                .file_type()
                .map_err(|e| self.fail("read", &child.path(), e))?;
            if !file_type.is_dir() {
                tracing::debug!("Skipping root-level file {}", child.path().display());
                continue;
            }
            for entry in self.walk(&child.path())? {
                let relative = entry.path().strip_prefix(self.src).map_err(|e| {
                    self.fail("read", entry.path(), io::Error::new(io::ErrorKind::Other, e))
                })?;
                let target = self.dst.join(relative);
                if entry.file_type().is_dir() {
                    self.make_dir(&target)?;
                } else {
                    self.place(entry.path(), target)?;
                }
            }
        }
        Ok(())
    }

    fn stow_nonstandard(&mut self) -> Result<(), StowError> {
        let mut bins = Vec::new();
        let mut manpages = Vec::new();

        for entry in self.walk(self.src)? {
            if entry.file_type().is_dir() {
                continue;
            }
            // Follows symlinks; a dangling link is an error.
            let metadata =
                fs::metadata(entry.path()).map_err(|e| self.fail("read", entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }
            if is_executable(entry.path(), &metadata) {
                bins.push(entry.into_path());
            } else if is_man_page(entry.path()) {
                manpages.push(entry.into_path());
            } else {
                tracing::trace!("Not installing {}", entry.path().display());
            }
        }

        for (files, subdir) in [(bins, BIN_DIR), (manpages, MAN1_DIR)] {
            if files.is_empty() {
                continue;
            }
            let dir = self.dst.join(subdir);
            self.make_dir(&dir)?;
            let mut taken = HashSet::new();
            for file in files {
                let Some(name) = file.file_name() else {
                    continue;
                };
                let target = dir.join(name);
                if !taken.insert(target.clone()) {
                    tracing::warn!(
                        "Skipping {}: {} is already installed from this package",
                        file.display(),
                        target.display()
                    );
                    continue;
                }
                self.place(&file, target)?;
            }
        }
        Ok(())
    }
}

fn immediate_children(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

/// Classify a source tree by its immediate children.
pub fn detect_layout(src: &Path) -> io::Result<Layout> {
    for entry in immediate_children(src)? {
        if entry.file_type()?.is_dir() && entry.file_name().to_string_lossy().ends_with("bin") {
            return Ok(Layout::Standard);
        }
    }
    Ok(Layout::NonStandard)
}

#[cfg(unix)]
fn is_executable(_path: &Path, metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(windows)]
fn is_executable(path: &Path, _metadata: &fs::Metadata) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            EXECUTABLE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

fn is_man_page(path: &Path) -> bool {
    // TODO: compressed pages (".1.gz") are common in release tarballs too
    path.to_string_lossy().ends_with(".1")
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        result => result,
    }
}

/// Move the interesting files of `src` into `dst` and return where they
/// ended up.
///
/// With `dry_run` the same paths are computed and returned, but no directory
/// is created and no file is moved.
pub fn stow(src: &Path, dst: &Path, dry_run: bool) -> Result<Vec<PathBuf>, StowError> {
    let mut stower = Stower {
        src,
        dst,
        dry_run,
        stows: Vec::new(),
        relocated: Vec::new(),
    };

    let layout = detect_layout(src).map_err(|e| stower.fail("read", src, e))?;
    tracing::debug!("Detected {:?} layout in {}", layout, src.display());

    match layout {
        Layout::Standard => stower.stow_standard()?,
        Layout::NonStandard => stower.stow_nonstandard()?,
    }

    Ok(stower.stows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str, executable: bool) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = if executable { 0o755 } else { 0o644 };
            fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
        }
        #[cfg(not(unix))]
        let _ = executable;
    }

    fn exe_name(name: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", name)
        } else {
            name.to_string()
        }
    }

    fn standard_tree(root: &Path) {
        write_file(&root.join("bin").join(exe_name("tool")), "tool", true);
        write_file(&root.join("share/man/man1/tool.1"), "man", false);
        write_file(&root.join("share/doc/tool/README"), "docs", false);
        write_file(&root.join("LICENSE"), "mit", false);
    }

    fn loose_tree(root: &Path) {
        write_file(&root.join(exe_name("install.sh")), "#!/bin/sh", true);
        write_file(&root.join("README.md"), "readme", false);
        write_file(&root.join("man/foo.1"), "man", false);
    }

    fn snapshot(root: &Path) -> Vec<PathBuf> {
        if !root.exists() {
            return Vec::new();
        }
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .map(|e| e.unwrap().into_path())
            .collect()
    }

    #[test]
    fn test_detect_standard_layout() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("bin")).unwrap();
        fs::create_dir_all(src.path().join("share")).unwrap();
        assert_eq!(detect_layout(src.path()).unwrap(), Layout::Standard);
    }

    #[test]
    fn test_detect_bin_suffix() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("sbin")).unwrap();
        assert_eq!(detect_layout(src.path()).unwrap(), Layout::Standard);
    }

    #[test]
    fn test_detect_nonstandard_layout() {
        let src = TempDir::new().unwrap();
        loose_tree(src.path());
        assert_eq!(detect_layout(src.path()).unwrap(), Layout::NonStandard);
    }

    #[test]
    fn test_file_named_bin_is_not_standard() {
        let src = TempDir::new().unwrap();
        write_file(&src.path().join("bin"), "not a dir", true);
        assert_eq!(detect_layout(src.path()).unwrap(), Layout::NonStandard);
    }

    #[test]
    fn test_standard_layout_mirrors_tree() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        standard_tree(src.path());

        let files = stow(src.path(), dst.path(), false).unwrap();

        assert_eq!(
            files,
            vec![
                dst.path().join("bin").join(exe_name("tool")),
                dst.path().join("share/doc/tool/README"),
                dst.path().join("share/man/man1/tool.1"),
            ]
        );
        for file in &files {
            assert!(file.is_file(), "{} should exist", file.display());
        }
        // Moved, not copied.
        assert!(!src.path().join("bin").join(exe_name("tool")).exists());
        // Root-level files are left alone.
        assert!(src.path().join("LICENSE").exists());
        assert!(!dst.path().join("LICENSE").exists());
        // Emptied source directories are not pruned.
        assert!(src.path().join("share/man/man1").is_dir());
    }

    #[test]
    fn test_nonstandard_layout_classifies_files() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        loose_tree(src.path());

        let files = stow(src.path(), dst.path(), false).unwrap();

        let install_sh = dst.path().join("bin").join(exe_name("install.sh"));
        let man = dst.path().join("share/man/man1/foo.1");
        assert_eq!(files, vec![install_sh.clone(), man.clone()]);
        assert_eq!(fs::read_to_string(install_sh).unwrap(), "#!/bin/sh");
        assert_eq!(fs::read_to_string(man).unwrap(), "man");
        assert!(!files.iter().any(|f| f.ends_with("README.md")));
        assert!(src.path().join("README.md").exists());
    }

    #[test]
    fn test_nonstandard_flattens_nested_executables() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_file(&src.path().join("tool-1.0/target/release").join(exe_name("tool")), "x", true);
        write_file(&src.path().join("tool-1.0/docs/guide.md"), "guide", false);

        let files = stow(src.path(), dst.path(), false).unwrap();
        assert_eq!(files, vec![dst.path().join("bin").join(exe_name("tool"))]);
    }

    #[test]
    fn test_nonstandard_without_matches_creates_nothing() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_file(&src.path().join("README.md"), "readme", false);

        let files = stow(src.path(), dst.path(), false).unwrap();
        assert!(files.is_empty());
        assert!(!dst.path().join("bin").exists());
        assert!(!dst.path().join("share").exists());
    }

    #[test]
    fn test_dry_run_matches_real_run_without_mutation() {
        for build in [standard_tree as fn(&Path), loose_tree] {
            let dry_src = TempDir::new().unwrap();
            let real_src = TempDir::new().unwrap();
            let dst_root = TempDir::new().unwrap();
            let dst = dst_root.path().join("prefix");
            build(dry_src.path());
            build(real_src.path());

            let before = snapshot(dry_src.path());
            let planned = stow(dry_src.path(), &dst, true).unwrap();
            assert_eq!(snapshot(dry_src.path()), before);
            assert!(!dst.exists());

            let installed = stow(real_src.path(), &dst, false).unwrap();
            assert_eq!(planned, installed);
            assert!(!installed.is_empty());
        }
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let root = TempDir::new().unwrap();
        let err = stow(&root.path().join("missing"), root.path(), false).unwrap_err();
        assert!(err.relocated().is_empty());
        assert_eq!(err.path(), root.path().join("missing"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_aborts_nonstandard_stow() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::os::unix::fs::symlink(src.path().join("nowhere"), src.path().join("broken")).unwrap();
        write_file(&src.path().join("tool"), "x", true);

        let err = stow(src.path(), dst.path(), false).unwrap_err();
        assert_eq!(err.path(), src.path().join("broken"));
    }

    #[test]
    fn test_failure_reports_partial_relocation() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_file(&src.path().join("bin/a-tool"), "a", true);
        write_file(&src.path().join("bin/b-tool"), "b", true);
        write_file(&src.path().join("lib/libtool.so"), "lib", false);

        // A non-empty directory in the way makes the third move fail.
        write_file(&dst.path().join("lib/libtool.so/keep"), "keep", false);

        let err = stow(src.path(), dst.path(), false).unwrap_err();

        assert_eq!(
            err.relocated(),
            &[dst.path().join("bin/a-tool"), dst.path().join("bin/b-tool")]
        );
        assert_eq!(err.path(), src.path().join("lib/libtool.so"));
        assert!(dst.path().join("bin/a-tool").exists());
        assert!(src.path().join("lib/libtool.so").is_file());
    }

    #[test]
    fn test_nonstandard_duplicate_basename_keeps_first() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_file(&src.path().join("a").join(exe_name("tool")), "from a", true);
        write_file(&src.path().join("b").join(exe_name("tool")), "from b", true);

        let planned = stow(src.path(), dst.path(), true).unwrap();
        let files = stow(src.path(), dst.path(), false).unwrap();

        let tool = dst.path().join("bin").join(exe_name("tool"));
        assert_eq!(files, vec![tool.clone()]);
        assert_eq!(planned, files);
        assert_eq!(fs::read_to_string(&tool).unwrap(), "from a");
        assert!(src.path().join("b").join(exe_name("tool")).exists());
    }
}
