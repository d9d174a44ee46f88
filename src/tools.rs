//! 외부 실행 파일 확인 모듈
//!
//! 작업을 시작하기 전에 필요한 변환기가 모두 PATH에 있는지 확인합니다.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{BatchError, Result};

/// 실행 파일 위치 찾기
///
/// 경로 구분자가 있으면 그 경로를 그대로 확인하고, 없으면 PATH를 순서대로 찾습니다.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .flat_map(|dir| candidates(&dir, program))
        .find(|path| is_executable(path))
}

/// 모든 프로그램이 실행 가능한지 확인 (첫 번째 누락에서 실패)
pub fn ensure_executables<'a, I>(programs: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for program in programs {
        if find_executable(program).is_none() {
            return Err(BatchError::MissingExecutable {
                program: program.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(windows)]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    let pathext = env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.CMD;.BAT;.COM".to_string());
    std::iter::once(dir.join(program))
        .chain(
            pathext
                .split(';')
                .filter(|ext| !ext.is_empty())
                .map(|ext| dir.join(format!("{}{}", program, ext))),
        )
        .collect()
}

#[cfg(not(windows))]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    vec![dir.join(program)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
