//! File emission for the code-producing stage.
//!
//! Generated files land under `{output root}/{app id}/{generation id}/`,
//! preserving each file's declared relative path. The generation id is the
//! run-distinguishing value: unlike a coarse timestamp it cannot collide
//! between rapid consecutive runs for the same application.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::errors::StageError;
use crate::models::GeneratedFile;

/// Writes generated file sets under a configured output root.
#[derive(Debug, Clone)]
pub struct FileEmitter {
    output_root: PathBuf,
}

impl FileEmitter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// The directory one run's files are written into.
    pub fn run_dir(&self, app_id: &str, generation_id: &str) -> PathBuf {
        self.output_root.join(app_id).join(generation_id)
    }

    /// Write every file byte-for-byte under the run directory, creating
    /// parent directories as needed. All-or-nothing from the caller's
    /// perspective: the first write error fails the emission and the
    /// partially written run directory is left for external cleanup.
    pub async fn emit_run(
        &self,
        app_id: &str,
        generation_id: &str,
        files: &[GeneratedFile],
    ) -> Result<Vec<PathBuf>, StageError> {
        let run_dir = self.run_dir(app_id, generation_id);
        let mut written = Vec::with_capacity(files.len());

        for file in files {
            let rel = sanitize_relative(&file.path)?;
            let target = run_dir.join(&rel);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StageError::FileWrite {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
            tokio::fs::write(&target, file.content.as_bytes())
                .await
                .map_err(|source| StageError::FileWrite {
                    path: target.clone(),
                    source,
                })?;
            debug!(path = %target.display(), bytes = file.content.len(), "emitted file");
            written.push(target);
        }

        Ok(written)
    }
}

/// Agent-declared paths are untrusted. Reject anything that could escape
/// the run directory.
fn sanitize_relative(declared: &str) -> Result<PathBuf, StageError> {
    let path = Path::new(declared);
    if declared.trim().is_empty() {
        return Err(StageError::Validation("empty file path".to_string()));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(StageError::Validation(format!(
                    "unsafe file path from agent: {}",
                    declared
                )));
            }
        }
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file(path: &str, content: &str) -> GeneratedFile {
        GeneratedFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn writes_under_app_and_run_directory() {
        let dir = tempdir().unwrap();
        let emitter = FileEmitter::new(dir.path());

        let written = emitter
            .emit_run("app_1", "gen_1", &[file("src/index.ts", "export {}\n")])
            .await
            .unwrap();

        assert_eq!(written.len(), 1);
        assert_eq!(
            written[0],
            dir.path().join("app_1").join("gen_1").join("src/index.ts")
        );
        let back = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(back, "export {}\n");
    }

    #[tokio::test]
    async fn content_round_trips_byte_for_byte() {
        let dir = tempdir().unwrap();
        let emitter = FileEmitter::new(dir.path());
        let content = "line1\n\tline2 with unicode: \u{00e9}\u{4e16}\n";

        let written = emitter
            .emit_run("app_1", "gen_2", &[file("notes.txt", content)])
            .await
            .unwrap();

        let bytes = std::fs::read(&written[0]).unwrap();
        assert_eq!(bytes, content.as_bytes());
    }

    #[tokio::test]
    async fn distinct_runs_do_not_collide() {
        let dir = tempdir().unwrap();
        let emitter = FileEmitter::new(dir.path());

        emitter
            .emit_run("app_1", "gen_a", &[file("a.txt", "first")])
            .await
            .unwrap();
        emitter
            .emit_run("app_1", "gen_b", &[file("a.txt", "second")])
            .await
            .unwrap();

        let a = std::fs::read_to_string(dir.path().join("app_1/gen_a/a.txt")).unwrap();
        let b = std::fs::read_to_string(dir.path().join("app_1/gen_b/a.txt")).unwrap();
        assert_eq!(a, "first");
        assert_eq!(b, "second");
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let emitter = FileEmitter::new(dir.path());

        let err = emitter
            .emit_run("app_1", "gen_1", &[file("../escape.txt", "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Validation(_)));

        let err = emitter
            .emit_run("app_1", "gen_1", &[file("/etc/passwd", "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Validation(_)));
    }

    #[tokio::test]
    async fn partial_writes_remain_on_failure() {
        let dir = tempdir().unwrap();
        let emitter = FileEmitter::new(dir.path());

        let err = emitter
            .emit_run(
                "app_1",
                "gen_1",
                &[file("ok.txt", "kept"), file("../bad.txt", "x")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Validation(_)));

        // The file written before the failure is left for external cleanup.
        assert!(dir.path().join("app_1/gen_1/ok.txt").exists());
    }
}
