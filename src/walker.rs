use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use walkdir::WalkDir;

use crate::error::FileFault;

/// A regular file found under the corpus root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path (symlinks are not resolved).
    pub path: PathBuf,
    /// Last modification time in milliseconds since the Unix epoch.
    pub modified_at: i64,
}

/// Lazily walk `root`, yielding every regular file beneath it.
///
/// A file root yields just that file. Directories are visited in file-name
/// order. Entries that cannot be visited (unreadable directories, dangling
/// links, link loops) come out as [`FileFault::Walk`] items and the walk
/// carries on past them.
pub fn walk(root: &Path) -> Walk {
    let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    let inner = WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();
    Walk { root, inner }
}

/// Iterator returned by [`walk`].
pub struct Walk {
    root: PathBuf,
    inner: walkdir::IntoIter,
}

impl Iterator for Walk {
    type Item = Result<SourceFile, FileFault>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Some(Err(FileFault::Walk { path, source }));
                }
            };

            // Directories are descended into by walkdir; fifos, sockets
            // and devices are never corpus files.
            if !entry.file_type().is_file() {
                continue;
            }

            return Some(match entry.metadata() {
                Ok(meta) => Ok(SourceFile {
                    modified_at: millis_since_epoch(
                        meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    ),
                    path: entry.into_path(),
                }),
                Err(source) => Err(FileFault::Walk {
                    path: entry.into_path(),
                    source,
                }),
            });
        }
    }
}

fn millis_since_epoch(time: SystemTime) -> i64 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => {
            -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX)
        }
    }
}
