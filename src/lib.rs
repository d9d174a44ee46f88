//! mediabatch - MEDIA BATCH CONVERTER
//!
//! 폴더를 탐색하며 미디어 파일을 외부 변환기로 변환하고, 원본을 백업 기반으로
//! 안전하게 교체하는 CLI 도구입니다.
//!
//! # 구성
//!
//! - 🔍 **탐색기** ([`walker`]): 취소 가능한 백그라운드 폴더 탐색, 경로를 채널로 전달
//! - ⚡ **분배기** ([`dispatcher`]): 고정 크기 워커 풀, 파일 단위 에러는 격리
//! - 🔧 **파이프라인** ([`pipeline`]): 작업 사본 → 단계별 외부 변환 → 원본 교체
//! - 🛡️ **교체기** ([`replacer`]): 백업 → 이동 → 백업 삭제, 중단 시 다음 실행에서 복구
//! - 📋 **프로필** ([`profile`]): 확장자별 변환 단계 표 (내장 또는 JSON)
//!
//! # 예제
//!
//! ```bash
//! # 현재 폴더의 음악 파일을 mp3로 정리
//! mediabatch
//!
//! # 하위 폴더 포함
//! mediabatch ./...
//!
//! # PDF 용량 줄이기, 실제 변환 없이 대상만 확인
//! mediabatch ~/Docs -r --profile pdf --dry-run
//!
//! # 전자책을 mobi로 (원본은 그대로 둠)
//! mediabatch ~/Books --profile kindle
//! ```

pub mod cancel;
pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod extensions;
pub mod pattern;
pub mod pipeline;
pub mod process;
pub mod profile;
pub mod replacer;
pub mod stats;
pub mod tools;
pub mod walker;

// Re-exports for convenient access
pub use cancel::{CancelSource, CancelToken};
pub use cli::Args;
pub use dispatcher::{DispatchSummary, Dispatcher, DispatcherConfig};
pub use error::{BatchError, Result};
pub use extensions::ExtensionSet;
pub use pattern::PatternMatcher;
pub use pipeline::{Outcome, Pipeline};
pub use profile::{Profile, Step};
pub use replacer::Replacer;
pub use stats::{format_bytes, Statistics};
pub use walker::{Walk, Walker};
