//! 폴더 탐색 모듈
//!
//! 백그라운드 스레드 하나가 폴더 트리를 돌며 지원되는 파일의 절대 경로를
//! 채널로 내보냅니다. 채널은 기본적으로 랑데부(용량 0)라서, 받을 워커가
//! 준비될 때까지 탐색기가 멈춥니다.
//!
//! - 루트 폴더는 항상 들어가고, 하위 폴더는 `recursive`일 때만 들어갑니다.
//! - 개별 항목 에러는 경고로 남기고 건너뜁니다. 루트 에러와 취소만 탐색을 끝냅니다.
//! - 경로 채널은 어떤 경우에도 탐색이 끝나면 닫히고, 그 뒤에 [`Walk::finish`]가
//!   결과를 정확히 한 번 돌려줍니다.

use crossbeam_channel::{select, Receiver, Sender};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::error::{BatchError, Result};
use crate::extensions::ExtensionSet;
use crate::pattern::PatternMatcher;

/// 탐색 설정
#[derive(Debug, Clone)]
pub struct Walker {
    extensions: ExtensionSet,
    pattern: PatternMatcher,
    recursive: bool,
    channel_capacity: usize,
}

/// 진행 중인 탐색: 경로 채널 + 종료 결과 슬롯
#[derive(Debug)]
pub struct Walk {
    paths: Receiver<PathBuf>,
    handle: JoinHandle<Result<()>>,
}

impl Walker {
    /// 기본 탐색기 생성 (비재귀, 랑데부 채널, 패턴 없음)
    pub fn new(extensions: ExtensionSet) -> Self {
        Self {
            extensions,
            pattern: PatternMatcher::default(),
            recursive: false,
            channel_capacity: 0,
        }
    }

    /// 하위 폴더 탐색 여부 설정
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 경로 채널 용량 설정 (0이면 랑데부)
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// 파일 이름 패턴 필터 설정
    pub fn with_pattern(mut self, pattern: PatternMatcher) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// 탐색 스레드 시작
    ///
    /// 루트 에러는 여기서 반환하지 않고 [`Walk::finish`]로 전달됩니다.
    pub fn spawn(&self, root: impl Into<PathBuf>, cancel: CancelToken) -> Result<Walk> {
        let root = root.into();
        let (tx, paths) = crossbeam_channel::bounded(self.channel_capacity);
        let walker = self.clone();

        let handle = std::thread::Builder::new()
            .name("walker".to_string())
            .spawn(move || {
                let result = walker.traverse(&root, &tx, &cancel);
                // tx가 여기서 drop되어 경로 채널이 닫힘
                drop(tx);
                result
            })
            .map_err(|e| BatchError::ThreadPoolError {
                reason: format!("탐색 스레드 생성 실패: {}", e),
            })?;

        Ok(Walk { paths, handle })
    }

    fn traverse(&self, root: &Path, tx: &Sender<PathBuf>, cancel: &CancelToken) -> Result<()> {
        let root = std::path::absolute(root).map_err(|e| BatchError::RootUnreadable {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut entries = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(BatchError::RootUnreadable {
                        path: root,
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!("항목을 건너뜁니다: {}", err);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                if entry.depth() == 0 || self.recursive {
                    debug!("Walk in '{}'", entry.path().display());
                } else {
                    entries.skip_current_dir();
                }
                continue;
            }

            if !entry.file_type().is_file() || !self.accepts(entry.path()) {
                continue;
            }

            send_path(tx, entry.into_path(), cancel)?;
        }

        Ok(())
    }

    fn accepts(&self, path: &Path) -> bool {
        if !self.extensions.is_supported(path) {
            return false;
        }
        if !self.pattern.has_pattern() {
            return true;
        }
        path.file_name()
            .is_some_and(|name| self.pattern.matches(&name.to_string_lossy()))
    }
}

/// 블로킹 send; 취소가 먼저 관찰되면 `WalkCanceled`
fn send_path(tx: &Sender<PathBuf>, path: PathBuf, cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(BatchError::WalkCanceled);
    }

    select! {
        send(tx, path) -> sent => sent.map_err(|_| BatchError::WalkCanceled),
        recv(cancel.channel()) -> _ => Err(BatchError::WalkCanceled),
    }
}

impl Walk {
    /// 경로 채널 (닫히면 더 이상 경로가 없음)
    pub fn paths(&self) -> &Receiver<PathBuf> {
        &self.paths
    }

    /// 탐색 종료를 기다리고 결과를 반환
    ///
    /// 남은 경로는 버려집니다. 소비자가 먼저 떠나면 탐색기는 `WalkCanceled`로 끝납니다.
    pub fn finish(self) -> Result<()> {
        let Walk { paths, handle } = self;
        drop(paths);
        handle.join().map_err(|_| BatchError::WalkerPanicked)?
    }

    /// 남은 경로를 모두 모은 뒤 탐색 결과와 함께 반환
    pub fn collect(self) -> (Vec<PathBuf>, Result<()>) {
        let files: Vec<PathBuf> = self.paths.iter().collect();
        (files, self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSource;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    fn setup_tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.mp3");
        touch(temp_dir.path(), "B.FLAC");
        touch(temp_dir.path(), "notes.txt");
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        touch(&sub, "c.mp3");
        let deep = sub.join("deep");
        fs::create_dir(&deep).unwrap();
        touch(&deep, "d.ogg");
        temp_dir
    }

    fn names(paths: &[PathBuf]) -> BTreeSet<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn music() -> ExtensionSet {
        [".mp3", ".flac", ".ogg"].into_iter().collect()
    }

    #[test]
    fn test_non_recursive_walk_stays_in_root() {
        let temp_dir = setup_tree();
        let source = CancelSource::new();

        let walk = Walker::new(music())
            .spawn(temp_dir.path(), source.token())
            .unwrap();
        let (files, result) = walk.collect();

        assert!(result.is_ok());
        assert_eq!(names(&files), BTreeSet::from(["a.mp3".into(), "B.FLAC".into()]));
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_recursive_walk_visits_everything_once() {
        let temp_dir = setup_tree();
        let source = CancelSource::new();

        let walk = Walker::new(music())
            .with_recursive(true)
            .spawn(temp_dir.path(), source.token())
            .unwrap();
        let (files, result) = walk.collect();

        assert!(result.is_ok());
        assert_eq!(files.len(), 4);
        assert_eq!(
            names(&files),
            BTreeSet::from(["a.mp3".into(), "B.FLAC".into(), "c.mp3".into(), "d.ogg".into()])
        );
    }

    #[test]
    fn test_pattern_narrows_emitted_files() {
        let temp_dir = setup_tree();
        let source = CancelSource::new();
        let pattern = PatternMatcher::new(Some("a*".to_string())).unwrap();

        let walk = Walker::new(music())
            .with_pattern(pattern)
            .spawn(temp_dir.path(), source.token())
            .unwrap();
        let (files, result) = walk.collect();

        assert!(result.is_ok());
        assert_eq!(names(&files), BTreeSet::from(["a.mp3".into()]));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_are_emitted() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "plain.mp3");
        let odd = temp_dir.path().join(OsStr::from_bytes(b"caf\xe9.mp3"));
        fs::write(&odd, b"x").unwrap();

        let source = CancelSource::new();
        let (files, result) = Walker::new(music())
            .spawn(temp_dir.path(), source.token())
            .unwrap()
            .collect();
        assert!(result.is_ok());
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|p| p.file_name() == odd.file_name()));

        // 패턴은 손실 변환한 이름에 적용
        let pattern = PatternMatcher::new(Some("caf*".to_string())).unwrap();
        let (files, result) = Walker::new(music())
            .with_pattern(pattern)
            .spawn(temp_dir.path(), source.token())
            .unwrap()
            .collect();
        assert!(result.is_ok());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name(), odd.file_name());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let source = CancelSource::new();

        let walk = Walker::new(music())
            .spawn(temp_dir.path().join("nope"), source.token())
            .unwrap();
        let (files, result) = walk.collect();

        assert!(files.is_empty());
        assert!(matches!(result, Err(BatchError::RootUnreadable { .. })));
    }

    #[test]
    fn test_cancel_before_drain_reports_canceled() {
        let temp_dir = setup_tree();
        let source = CancelSource::new();

        let walk = Walker::new(music())
            .with_recursive(true)
            .spawn(temp_dir.path(), source.token())
            .unwrap();

        // 랑데부 채널이므로 탐색기는 첫 send에서 대기 중
        source.cancel();
        let (files, result) = walk.collect();

        assert!(files.len() < 4);
        assert!(matches!(result, Err(BatchError::WalkCanceled)));
    }

    #[test]
    fn test_consumer_leaving_early_ends_walk() {
        let temp_dir = setup_tree();
        let source = CancelSource::new();

        let walk = Walker::new(music())
            .with_recursive(true)
            .spawn(temp_dir.path(), source.token())
            .unwrap();
        let first = walk.paths().recv().unwrap();
        assert!(first.is_absolute());

        assert!(matches!(walk.finish(), Err(BatchError::WalkCanceled)));
    }
}
