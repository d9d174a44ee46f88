//! 파일 단위 변환 파이프라인
//!
//! 한 파일에 대해 다음을 순서대로 수행합니다.
//!
//! 1. 필요한 실행 파일 확인 (없으면 아무것도 건드리지 않고 실패)
//! 2. 임시 작업 폴더에 작업 사본 생성
//! 3. 확장자별 단계를 차례로 실행
//! 4. [`Replacer`]로 원본 교체
//! 5. 작업 폴더 삭제 (성공/실패와 무관하게 drop 시점에 삭제)
//!
//! 백업 접미사가 붙은 파일은 원래 이름으로 되돌린 뒤 처음부터 다시 처리합니다.
//! 원본과 그 백업이 함께 남아 있으면 두 워커가 같은 원본을 만지게 되므로,
//! 원본 경로 단위로 점유한 뒤에만 작업합니다.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::error::{BatchError, Result};
use crate::extensions::{extension_of, ExtensionSet};
use crate::process;
use crate::profile::{Profile, Step};
use crate::replacer::{move_file, Replacer};
use crate::tools;

/// 파일 처리 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 결과가 원본(또는 새 확장자의 대상)을 대체함
    Committed {
        source: PathBuf,
        target: PathBuf,
        bytes_before: u64,
        bytes_after: u64,
        recovered: bool,
    },
    /// 변환은 했지만 교체하지 않음
    Skipped { source: PathBuf, reason: String },
}

impl Outcome {
    fn recovered(self) -> Self {
        match self {
            Outcome::Committed {
                source,
                target,
                bytes_before,
                bytes_after,
                ..
            } => Outcome::Committed {
                source,
                target,
                bytes_before,
                bytes_after,
                recovered: true,
            },
            skipped => skipped,
        }
    }

    pub fn source(&self) -> &Path {
        match self {
            Outcome::Committed { source, .. } | Outcome::Skipped { source, .. } => source,
        }
    }
}

/// 처리 중인 원본 경로 표
#[derive(Debug, Default)]
struct Claims {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl Claims {
    /// 다른 워커가 같은 경로를 놓을 때까지 기다린 뒤 점유
    fn acquire(&self, path: &Path) -> Claim<'_> {
        let mut held = lock(&self.held);
        while held.contains(path) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        held.insert(path.to_path_buf());

        Claim {
            claims: self,
            path: path.to_path_buf(),
        }
    }
}

struct Claim<'a> {
    claims: &'a Claims,
    path: PathBuf,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        lock(&self.claims.held).remove(&self.path);
        self.claims.released.notify_all();
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 프로필 하나에 묶인 변환 파이프라인
///
/// 복제본끼리는 점유 표를 공유합니다.
#[derive(Debug, Clone)]
pub struct Pipeline {
    profile: Profile,
    replacer: Replacer,
    extensions: ExtensionSet,
    claims: Arc<Claims>,
}

impl Pipeline {
    /// 확장자 키를 소문자로 맞추고 검증한 뒤 파이프라인 생성
    pub fn new(mut profile: Profile) -> Result<Self> {
        profile.normalize_keys()?;
        profile.validate()?;
        let replacer = Replacer::new(profile.backup_suffix.clone());
        let extensions = profile.extension_set();
        Ok(Self {
            profile,
            replacer,
            extensions,
            claims: Arc::default(),
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// 탐색기 필터로 쓸 확장자 집합
    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// 파일 하나 처리
    pub fn process(&self, path: &Path) -> Result<Outcome> {
        tools::ensure_executables(self.profile.required_programs())?;

        let Some(original) = self.replacer.original_of(path) else {
            let _claim = self.claims.acquire(path);
            return self.convert(path);
        };

        let _claim = self.claims.acquire(&original);
        if !path.exists() {
            // 같은 원본을 먼저 교체한 워커가 백업까지 정리함
            debug!("'{}' is already gone", path.display());
            return Ok(Outcome::Skipped {
                source: path.to_path_buf(),
                reason: "백업이 이미 정리되었습니다".to_string(),
            });
        }

        let original = self.replacer.recover(path)?;
        info!("Recovered '{}' from '{}'", original.display(), path.display());
        self.convert(&original).map(Outcome::recovered)
    }

    /// 점유한 원본 하나를 변환하고 교체
    fn convert(&self, path: &Path) -> Result<Outcome> {
        let extension = extension_of(path).unwrap_or_default();

        let steps = self
            .profile
            .steps_for(&extension)
            .ok_or_else(|| BatchError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension.clone(),
            })?;

        let bytes_before = file_size(path)?;
        let file_name = path.file_name().ok_or_else(|| BatchError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: extension.clone(),
        })?;

        let work_dir = tempfile::Builder::new()
            .prefix(&self.profile.temp_prefix)
            .tempdir()
            .map_err(|e| BatchError::fs("create temp dir", std::env::temp_dir(), e))?;

        let working_copy = work_dir.path().join(file_name);
        fs::copy(path, &working_copy).map_err(|e| BatchError::fs("copy", path, e))?;

        let result = run_steps(steps, working_copy)?;
        let bytes_after = file_size(&result)?;

        if let Some(ratio) = self.profile.min_size_reduction {
            let limit = bytes_before as f64 * (1.0 - ratio);
            if bytes_after as f64 > limit {
                debug!(
                    "'{}': {} -> {} bytes, not enough reduction",
                    path.display(),
                    bytes_before,
                    bytes_after
                );
                return Ok(Outcome::Skipped {
                    source: path.to_path_buf(),
                    reason: format!(
                        "크기가 {:.0}% 이상 줄지 않았습니다 ({} -> {} bytes)",
                        ratio * 100.0,
                        bytes_before,
                        bytes_after
                    ),
                });
            }
        }

        let target = if self.profile.keep_original {
            appended_path(path, &result)
        } else {
            target_path(path, &result)
        };
        if target != path && target.exists() {
            warn!("기존 파일을 덮어씁니다: '{}'", target.display());
        }

        if self.profile.keep_original {
            move_file(&result, &target)?;
        } else {
            self.replacer.commit_as(&result, path, &target)?;
        }
        info!("Derived '{}' from '{}'", target.display(), path.display());

        Ok(Outcome::Committed {
            source: path.to_path_buf(),
            target,
            bytes_before,
            bytes_after,
            recovered: false,
        })
    }
}

/// 단계를 순서대로 실행하고 최종 작업 파일 경로를 반환
fn run_steps(steps: &[Step], working_copy: PathBuf) -> Result<PathBuf> {
    let mut current = working_copy;

    for step in steps {
        match step {
            Step::InPlace { program, .. } => {
                process::run(program, &step.render_args(&current, None))?;
            }
            Step::Convert {
                program,
                output_extension,
                ..
            } => {
                let same_format = extension_of(&current)
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(output_extension));

                if same_format {
                    // 같은 형식끼리는 옆 이름으로 만든 뒤 덮어씀
                    let mut name = current.clone().into_os_string();
                    name.push(output_extension);
                    let output = PathBuf::from(name);

                    process::run(program, &step.render_args(&current, Some(&output)))?;
                    ensure_produced(program, &output)?;
                    fs::rename(&output, &current)
                        .map_err(|e| BatchError::fs("rename", &output, e))?;
                } else {
                    let output = current.with_extension(output_extension.trim_start_matches('.'));

                    process::run(program, &step.render_args(&current, Some(&output)))?;
                    ensure_produced(program, &output)?;
                    current = output;
                }
            }
        }
    }

    Ok(current)
}

fn ensure_produced(program: &str, output: &Path) -> Result<()> {
    if output.is_file() {
        return Ok(());
    }
    Err(BatchError::Filesystem {
        action: "stat",
        path: output.to_path_buf(),
        reason: format!("'{}'가 출력 파일을 만들지 않았습니다", program),
    })
}

/// 최종 작업 파일의 확장자를 원본 이름에 적용한 경로
fn target_path(source: &Path, result: &Path) -> PathBuf {
    match (extension_of(source), result.extension()) {
        (Some(src), Some(ext)) if src.trim_start_matches('.') == ext.to_string_lossy().to_lowercase() => {
            source.to_path_buf()
        }
        (_, Some(ext)) => source.with_extension(ext),
        (_, None) => source.to_path_buf(),
    }
}

/// 원본 이름 뒤에 결과 확장자를 덧붙인 경로 (`book.epub` → `book.epub.mobi`)
fn appended_path(source: &Path, result: &Path) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    if let Some(ext) = result.extension() {
        name.push(".");
        name.push(ext);
    }
    PathBuf::from(name)
}

fn file_size(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| BatchError::fs("stat", path, e))
}
