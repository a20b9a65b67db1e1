//! Transient files owned by one check invocation.

use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// File-name stem for a student's scratch files, safe for any filesystem.
pub fn scratch_key(user_id: &str, task_id: &str) -> String {
    format!("{user_id}_{task_id}")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Scratch files under one root, removed when dropped.
#[derive(Debug)]
pub struct ScratchFiles {
    root: PathBuf,
    stem: String,
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    pub async fn create(root: &Path, stem: impl Into<String>) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        Ok(Self {
            root: root.to_path_buf(),
            stem: stem.into(),
            paths: Vec::new(),
        })
    }

    /// Reserve `{stem}{suffix}`; the file is removed on drop if created.
    pub fn path(&mut self, suffix: &str) -> PathBuf {
        let path = self.root.join(format!("{}{}", self.stem, suffix));
        if !self.paths.contains(&path) {
            self.paths.push(path.clone());
        }
        path
    }

    pub async fn write(&mut self, suffix: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.path(suffix);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Contents of a reserved file; empty if the file was never written.
    pub async fn read(&mut self, suffix: &str) -> Vec<u8> {
        tokio::fs::read(self.path(suffix)).await.unwrap_or_default()
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_key_is_path_safe() {
        assert_eq!(scratch_key("alice", "task1"), "alice_task1");
        assert_eq!(scratch_key("a/b", "../t"), "a_b____t");
    }

    #[tokio::test]
    async fn test_files_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("scratch");
        let written = {
            let mut scratch = ScratchFiles::create(&root, "alice_task1").await.unwrap();
            let prog = scratch.write(".py", b"print(1)").await.unwrap();
            assert_eq!(prog, root.join("alice_task1.py"));
            assert!(prog.exists());
            assert!(scratch.read(".out").await.is_empty());
            prog
        };
        assert!(!written.exists());
        assert!(root.exists());
    }
}
