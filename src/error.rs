//! 에러 타입 정의 모듈
//!
//! mediabatch에서 발생할 수 있는 모든 에러 타입을 정의합니다.
//! 파일 단위 에러는 워커 경계에서 기록만 하고, 탐색 에러는 배치 전체를 중단합니다.

use std::path::PathBuf;
use thiserror::Error;

/// mediabatch에서 발생할 수 있는 에러 타입
#[derive(Error, Debug)]
pub enum BatchError {
    /// 필요한 외부 실행 파일을 PATH에서 찾을 수 없음
    #[error("실행 파일을 찾을 수 없습니다: {program}")]
    MissingExecutable { program: String },

    /// 외부 프로세스 실행 실패 (실행 불가 또는 0이 아닌 종료 코드)
    #[error(
        "명령 실패 '{command}': {reason}\nstdout: --------------\n{stdout}\nstderr: --------------\n{stderr}"
    )]
    ProcessFailure {
        command: String,
        reason: String,
        stdout: String,
        stderr: String,
    },

    /// 변환 테이블에 없는 확장자
    #[error("지원하지 않는 형식입니다 ({path}): '{extension}'")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// 취소 신호로 탐색이 중단됨
    #[error("탐색이 취소되었습니다")]
    WalkCanceled,

    /// stat/rename/remove/copy 실패
    #[error("파일 시스템 작업 실패 ({action} {path}): {reason}")]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// 루트 폴더 자체를 읽을 수 없음
    #[error("루트 경로를 읽을 수 없습니다 ({path}): {reason}")]
    RootUnreadable { path: PathBuf, reason: String },

    /// 탐색 스레드가 비정상 종료됨
    #[error("탐색 스레드가 비정상 종료되었습니다")]
    WalkerPanicked,

    /// 스레드 풀 초기화 실패
    #[error("스레드 풀 초기화 실패: {reason}")]
    ThreadPoolError { reason: String },

    /// 유효하지 않은 변환 프로필
    #[error("유효하지 않은 프로필 ({name}): {reason}")]
    InvalidProfile { name: String, reason: String },

    /// 유효하지 않은 파일 이름 패턴
    #[error("유효하지 않은 패턴: {pattern}")]
    InvalidPattern { pattern: String },

    /// 프로필 이름/파일을 찾을 수 없음
    #[error("프로필을 찾을 수 없습니다: {name}")]
    ProfileNotFound { name: String },
}

impl BatchError {
    /// io 에러를 파일 시스템 에러로 변환
    pub(crate) fn fs(action: &'static str, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        BatchError::Filesystem {
            action,
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// 배치 전체를 중단해야 하는 탐색 단계 에러인지 확인
    pub fn is_walk_error(&self) -> bool {
        matches!(
            self,
            BatchError::WalkCanceled | BatchError::RootUnreadable { .. } | BatchError::WalkerPanicked
        )
    }
}

/// mediabatch 결과 타입 별칭
pub type Result<T> = std::result::Result<T, BatchError>;
