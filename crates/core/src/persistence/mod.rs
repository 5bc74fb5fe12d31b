pub mod http;
pub mod local;
pub mod s3;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Storage driver for one or more path schemes.
///
/// Drivers hold no per-path state. `get` always writes to the local
/// filesystem and `put` always reads from it; the other side of the transfer
/// is in the driver's own domain.
#[async_trait]
pub trait DataPersistence: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(false)` when the object is simply absent; `Err` on transport or auth failure.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Copy one object, or the whole tree under `from` when `recursive`, to `to`.
    async fn get(&self, from: &str, to: &Path, recursive: bool) -> Result<()>;

    /// Copy the local file or tree at `from` to `to`.
    async fn put(&self, from: &Path, to: &str, recursive: bool) -> Result<()>;

    fn construct_path(&self, add_protocol: bool, add_prefix: bool, segments: &[&str])
    -> Result<String>;
}

pub type DriverFactory = Arc<dyn Fn() -> Result<Arc<dyn DataPersistence>> + Send + Sync>;

/// Joins path parts with `/`, dropping empty parts and doubled separators.
pub(crate) fn join_segments<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut joined = String::new();
    for part in parts.into_iter().filter(|p| !p.is_empty()) {
        if joined.is_empty() {
            joined.push_str(part.trim_end_matches('/'));
            if joined.is_empty() {
                // part was only separators, e.g. "/"
                joined.push('/');
            }
        } else {
            if !joined.ends_with('/') {
                joined.push('/');
            }
            joined.push_str(part.trim_matches('/'));
        }
    }
    joined
}

/// Every regular file under `root`, paired with its `/`-separated path relative to `root`.
///
/// Symlinks are followed. A dangling link or a link back into one of its own
/// ancestor directories is an error.
pub(crate) async fn collect_files(root: &Path) -> std::io::Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    let mut stack = vec![(root.to_path_buf(), vec![tokio::fs::canonicalize(root).await?])];
    while let Some((dir, ancestors)) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            let mut file_type = entry.file_type().await?;
            if file_type.is_symlink() {
                file_type = tokio::fs::metadata(&entry_path).await?.file_type();
            }
            if file_type.is_dir() {
                let real = tokio::fs::canonicalize(&entry_path).await?;
                if ancestors.contains(&real) {
                    return Err(std::io::Error::other(format!(
                        "symlink loop at {}",
                        entry_path.display()
                    )));
                }
                let mut chain = ancestors.clone();
                chain.push(real);
                stack.push((entry_path, chain));
            } else if file_type.is_file() {
                if let Ok(relative) = entry_path.strip_prefix(root) {
                    let relative = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    files.push((entry_path, relative));
                }
            }
        }
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_segments_normalizes_separators() {
        assert_eq!(join_segments(["bucket/", "/a/", "b.txt"]), "bucket/a/b.txt");
        assert_eq!(join_segments(["/tmp/raw", "x"]), "/tmp/raw/x");
        assert_eq!(join_segments(["/", "x"]), "/x");
        assert_eq!(join_segments(["", "a", "", "b"]), "a/b");
    }

    #[tokio::test]
    async fn collect_files_walks_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("top.txt"), "1").unwrap();
        std::fs::write(dir.path().join("a/b/deep.txt"), "2").unwrap();

        let files = collect_files(dir.path()).await.unwrap();
        let names: Vec<_> = files.iter().map(|(_, rel)| rel.as_str()).collect();
        assert_eq!(names, vec!["a/b/deep.txt", "top.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn collect_files_follows_symlinks() {
        use std::os::unix::fs::symlink;

        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("real.txt"), "target").unwrap();
        std::fs::create_dir_all(outside.path().join("shared")).unwrap();
        std::fs::write(outside.path().join("shared/inner.txt"), "inner").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        symlink(outside.path().join("real.txt"), dir.path().join("link.txt")).unwrap();
        symlink(outside.path().join("shared"), dir.path().join("shared")).unwrap();

        let files = collect_files(dir.path()).await.unwrap();
        let names: Vec<_> = files.iter().map(|(_, rel)| rel.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "link.txt", "shared/inner.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn collect_files_rejects_loops_and_dangling_links() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        symlink(dir.path(), dir.path().join("sub/back")).unwrap();
        assert!(collect_files(dir.path()).await.is_err());

        let dangling = tempfile::tempdir().unwrap();
        symlink(dangling.path().join("gone.txt"), dangling.path().join("link.txt")).unwrap();
        assert!(collect_files(dangling.path()).await.is_err());
    }
}
