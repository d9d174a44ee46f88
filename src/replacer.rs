//! 원본 교체 모듈
//!
//! 새 파일로 원본을 바꿀 때 다음 순서를 지킵니다 (모두 이동, 복사 아님):
//!
//! 1. 원본 → `<원본><백업 접미사>` (실패하면 아무것도 바뀌지 않음)
//! 2. 새 파일 → 대상 경로 (실패하면 백업이 남고, 다음 실행에서 복구됨)
//! 3. 백업 삭제 (실패해도 대상은 이미 올바름; 경고만 남김)
//!
//! 2단계 실패 시 1단계를 되돌리지 않습니다. 남은 백업 파일은 탐색기가 다시
//! 입력으로 받아 [`Replacer::recover`]로 이름을 되돌린 뒤 재처리합니다.

use log::warn;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BatchError, Result};

/// 기본 백업 접미사
pub const DEFAULT_BACKUP_SUFFIX: &str = ".mediabatch_backup";

/// 백업 기반 교체기
#[derive(Debug, Clone)]
pub struct Replacer {
    backup_suffix: String,
}

impl Default for Replacer {
    fn default() -> Self {
        Self::new(DEFAULT_BACKUP_SUFFIX)
    }
}

impl Replacer {
    pub fn new(backup_suffix: impl Into<String>) -> Self {
        Self {
            backup_suffix: backup_suffix.into(),
        }
    }

    /// `<original><suffix>` 경로
    pub fn backup_path(&self, original: &Path) -> PathBuf {
        let mut name = OsString::from(original.as_os_str());
        name.push(&self.backup_suffix);
        PathBuf::from(name)
    }

    /// 원본을 같은 경로의 새 파일로 교체
    pub fn commit(&self, new_file: &Path, original: &Path) -> Result<()> {
        self.commit_as(new_file, original, original)
    }

    /// 원본을 치우고 새 파일을 `target`에 둠 (형식이 바뀌는 변환용)
    pub fn commit_as(&self, new_file: &Path, original: &Path, target: &Path) -> Result<()> {
        let backup = self.backup_path(original);

        fs::rename(original, &backup).map_err(|e| BatchError::fs("rename", original, e))?;

        move_file(new_file, target)?;

        if let Err(e) = fs::remove_file(&backup) {
            warn!("백업 파일 삭제 실패 '{}': {}", backup.display(), e);
        }
        Ok(())
    }

    /// 남은 백업을 원래 이름으로 되돌리고 원래 경로를 반환
    pub fn recover(&self, backup: &Path) -> Result<PathBuf> {
        let original = self.original_of(backup).ok_or_else(|| BatchError::UnsupportedFormat {
            path: backup.to_path_buf(),
            extension: self.backup_suffix.clone(),
        })?;

        fs::rename(backup, &original).map_err(|e| BatchError::fs("rename", backup, e))?;
        Ok(original)
    }

    /// 백업 경로에서 원래 경로를 계산 (파일은 건드리지 않음)
    ///
    /// 백업이 아니면 `None`. 접미사 비교는 대소문자를 무시합니다.
    pub fn original_of(&self, backup: &Path) -> Option<PathBuf> {
        let name = backup.file_name()?;
        let stem = strip_suffix_ignore_case(name, &self.backup_suffix)?;
        Some(backup.with_file_name(stem))
    }
}

/// 이름 끝의 접미사를 대소문자 무시로 떼어냄 (UTF-8이 아닌 이름도 바이트 단위로 처리)
#[cfg(unix)]
fn strip_suffix_ignore_case(name: &OsStr, suffix: &str) -> Option<OsString> {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};

    let bytes = name.as_bytes();
    let cut = bytes.len().checked_sub(suffix.len()).filter(|cut| *cut > 0)?;
    bytes[cut..]
        .eq_ignore_ascii_case(suffix.as_bytes())
        .then(|| OsString::from_vec(bytes[..cut].to_vec()))
}

#[cfg(not(unix))]
fn strip_suffix_ignore_case(name: &OsStr, suffix: &str) -> Option<OsString> {
    let name = name.to_str()?;
    let cut = name.len().checked_sub(suffix.len()).filter(|cut| *cut > 0)?;
    (name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(suffix))
        .then(|| OsString::from(&name[..cut]))
}

/// 파일 이동
///
/// 같은 파일 시스템이면 rename 한 번으로 끝납니다. 작업 폴더가 다른 장치에
/// 있으면 대상 옆 임시 이름으로 복사한 뒤 rename 하므로 대상은 반쯤 쓰인
/// 상태로 보이지 않습니다.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    let staging = staging_path(to);
    if let Err(e) = fs::copy(from, &staging) {
        let _ = fs::remove_file(&staging);
        return Err(BatchError::fs("copy", from, e));
    }
    if let Err(e) = fs::rename(&staging, to) {
        let _ = fs::remove_file(&staging);
        return Err(BatchError::fs("rename", to, e));
    }
    if let Err(e) = fs::remove_file(from) {
        warn!("이동 후 원본 삭제 실패 '{}': {}", from.display(), e);
    }
    Ok(())
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(".partial");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_path_appends_suffix() {
        let replacer = Replacer::new(".bak");
        assert_eq!(
            replacer.backup_path(Path::new("/music/a.mp3")),
            PathBuf::from("/music/a.mp3.bak")
        );
    }

    #[test]
    fn test_original_of() {
        let replacer = Replacer::new(".bak");
        assert_eq!(
            replacer.original_of(Path::new("/m/a.mp3.bak")),
            Some(PathBuf::from("/m/a.mp3"))
        );
        assert_eq!(
            replacer.original_of(Path::new("/m/a.mp3.BAK")),
            Some(PathBuf::from("/m/a.mp3"))
        );
        assert_eq!(replacer.original_of(Path::new("/m/a.mp3")), None);
        assert_eq!(replacer.original_of(Path::new("/m/.bak")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_recover_non_utf8_name() {
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir
            .path()
            .join(OsStr::from_bytes(b"caf\xe9.mp3"));
        let replacer = Replacer::default();
        let backup = replacer.backup_path(&original);
        fs::write(&backup, "old").unwrap();

        assert_eq!(replacer.original_of(&backup).as_ref(), Some(&original));
        assert_eq!(replacer.recover(&backup).unwrap(), original);
        assert_eq!(fs::read_to_string(&original).unwrap(), "old");
    }

    #[test]
    fn test_commit_replaces_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("a.mp3");
        let new_file = temp_dir.path().join("work.mp3");
        fs::write(&original, "old").unwrap();
        fs::write(&new_file, "new").unwrap();

        let replacer = Replacer::default();
        replacer.commit(&new_file, &original).unwrap();

        assert_eq!(fs::read_to_string(&original).unwrap(), "new");
        assert!(!new_file.exists());
        assert!(!replacer.backup_path(&original).exists());
    }

    #[test]
    fn test_commit_as_removes_original() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("a.flac");
        let target = temp_dir.path().join("a.mp3");
        let new_file = temp_dir.path().join("work.mp3");
        fs::write(&original, "flac").unwrap();
        fs::write(&new_file, "mp3").unwrap();

        let replacer = Replacer::default();
        replacer.commit_as(&new_file, &original, &target).unwrap();

        assert!(!original.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "mp3");
        assert!(!replacer.backup_path(&original).exists());
    }

    #[test]
    fn test_missing_original_aborts_without_touching_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("gone.mp3");
        let new_file = temp_dir.path().join("work.mp3");
        fs::write(&new_file, "new").unwrap();

        let result = Replacer::default().commit(&new_file, &original);

        assert!(matches!(result, Err(BatchError::Filesystem { .. })));
        assert!(new_file.exists());
        assert!(!original.exists());
    }

    #[test]
    fn test_failed_move_leaves_backup_for_recovery() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("a.mp3");
        fs::write(&original, "old").unwrap();

        let replacer = Replacer::default();
        let result = replacer.commit(&temp_dir.path().join("never-made.mp3"), &original);

        assert!(result.is_err());
        let backup = replacer.backup_path(&original);
        assert!(backup.exists());
        assert!(!original.exists());

        let recovered = replacer.recover(&backup).unwrap();
        assert_eq!(recovered, original);
        assert_eq!(fs::read_to_string(&original).unwrap(), "old");
        assert!(!backup.exists());
    }

    #[test]
    fn test_move_file_within_directory() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("from.bin");
        let to = temp_dir.path().join("to.bin");
        fs::write(&from, "data").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "data");
        assert!(!staging_path(&to).exists());
    }
}
