use chrono::Local;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BackupOutcome {
    pub backup_path: Option<PathBuf>,
    pub final_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("Could not create backup: {0}")]
    BackupCreate(String),
}

/// Write `contents` to a sibling temp file, then rename it over `target`.
/// Missing parent directories are created. A reader never sees a half
/// written file.
pub fn write_atomic(target: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = build_temp_path(target);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    if let Err(err) = replace(&temp_path, target) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(target_os = "windows")]
fn replace(from: &Path, to: &Path) -> io::Result<()> {
    use std::io::ErrorKind;
    match fs::rename(from, to) {
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            fs::remove_file(to)?;
            fs::rename(from, to)
        }
        other => other,
    }
}

#[cfg(not(target_os = "windows"))]
fn replace(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

/// Copy an existing `target` to `<name>.<ext>.bak.<timestamp>` and then
/// replace it atomically.
pub fn backup_and_swap(target: &Path, contents: &[u8]) -> Result<BackupOutcome, BackupError> {
    let parent = target
        .parent()
        .ok_or_else(|| BackupError::BackupCreate("target path has no parent directory".into()))?;

    let backup_path = if target.exists() {
        let timestamp = Local::now().format("%Y%m%d%H%M%S");
        let extension = target
            .extension()
            .map(|ext| format!("{}.bak.{timestamp}", ext.to_string_lossy()))
            .unwrap_or_else(|| format!("bak.{timestamp}"));
        let mut candidate = parent.join(target.file_name().unwrap_or_default());
        candidate.set_extension(extension);

        fs::copy(target, &candidate).map_err(|err| BackupError::BackupCreate(err.to_string()))?;
        log::debug!("backed up {} to {}", target.display(), candidate.display());
        Some(candidate)
    } else {
        None
    };

    write_atomic(target, contents)?;

    Ok(BackupOutcome {
        backup_path,
        final_path: target.to_path_buf(),
    })
}

fn build_temp_path(target: &Path) -> PathBuf {
    let mut temp = target.to_path_buf();
    let pid = std::process::id();
    let suffix = format!("__tmp__pid_{}", pid);
    match temp.file_name() {
        Some(name) => {
            let mut os_string = name.to_os_string();
            os_string.push(suffix);
            temp.set_file_name(os_string);
        }
        None => {
            temp.push(format!("temp_{pid}"));
        }
    }
    temp
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_backup_and_swaps() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("chapter.snbt");
        fs::write(&target, b"original").unwrap();
        let outcome = backup_and_swap(&target, b"translated").unwrap();

        let backup = outcome.backup_path.unwrap();
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("chapter.snbt.bak."));
        assert_eq!(fs::read(&backup).unwrap(), b"original");
        assert_eq!(fs::read_to_string(&target).unwrap(), "translated");
    }

    #[test]
    fn atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a/b/out.json");
        write_atomic(&target, b"{}").unwrap();
        write_atomic(&target, b"{ }").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "{ }");
        let entries: Vec<_> = fs::read_dir(target.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn first_write_has_no_backup() {
        let dir = tempdir().unwrap();
        let outcome = backup_and_swap(&dir.path().join("new.lang"), b"a=b").unwrap();
        assert!(outcome.backup_path.is_none());
    }
}
