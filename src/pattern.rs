//! 패턴 매칭 모듈
//!
//! 확장자 필터에 더해, glob 패턴으로 처리할 파일 이름을 좁힙니다.

use glob::{MatchOptions, Pattern};

use crate::error::{BatchError, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// 컴파일된 파일 이름 패턴
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    pattern: Option<Pattern>,
}

impl PatternMatcher {
    /// 새 패턴 매처 생성
    ///
    /// # Arguments
    /// * `pattern` - 글로브 패턴 문자열 (None이면 모든 파일 매칭)
    ///
    /// # Examples
    /// ```
    /// use mediabatch::pattern::PatternMatcher;
    ///
    /// let matcher = PatternMatcher::new(Some("live_*".to_string())).unwrap();
    /// assert!(matcher.matches("LIVE_01.flac"));
    /// assert!(!matcher.matches("studio_01.flac"));
    /// ```
    pub fn new(pattern: Option<String>) -> Result<Self> {
        let pattern = pattern
            .map(|p| Pattern::new(&p).map_err(|_| BatchError::InvalidPattern { pattern: p }))
            .transpose()?;

        Ok(Self { pattern })
    }

    /// 파일 이름이 패턴과 일치하는지 확인 (대소문자 무시, 패턴이 없으면 항상 true)
    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern
            .as_ref()
            .map_or(true, |p| p.matches_with(file_name, MATCH_OPTIONS))
    }

    /// 패턴이 설정되어 있는지 확인
    pub fn has_pattern(&self) -> bool {
        self.pattern.is_some()
    }
}
