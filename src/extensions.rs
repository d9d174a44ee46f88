//! 지원 확장자 집합 모듈
//!
//! 탐색기의 필터와 파이프라인의 형식 분기 키로 함께 쓰입니다.
//! 확장자는 소문자 + 앞의 점 포함 형태(".mp3")로 정규화됩니다.

use std::collections::HashMap;
use std::path::Path;

/// 정규화된 확장자 → 지원 여부
#[derive(Debug, Clone, Default)]
pub struct ExtensionSet {
    entries: HashMap<String, bool>,
}

impl ExtensionSet {
    /// 빈 집합 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 확장자 등록 (대소문자 무관, 점 생략 가능)
    pub fn insert(&mut self, extension: &str, supported: bool) {
        self.entries.insert(normalize(extension), supported);
    }

    /// 확장자 지원 여부 (없는 확장자는 미지원)
    pub fn contains(&self, extension: &str) -> bool {
        self.entries
            .get(&normalize(extension))
            .copied()
            .unwrap_or(false)
    }

    /// 경로의 확장자가 지원되는지 확인
    pub fn is_supported(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.contains(&ext))
    }
}

impl<'a> FromIterator<&'a str> for ExtensionSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = ExtensionSet::new();
        for ext in iter {
            set.insert(ext, true);
        }
        set
    }
}

/// 경로의 정규화된 확장자 (예: "Song.MP3" → ".mp3")
///
/// 확장자가 없으면 `None`. 파일 이름의 나머지 부분은 UTF-8이 아니어도 됩니다.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|s| normalize(&s.to_string_lossy()))
}

fn normalize(extension: &str) -> String {
    let trimmed = extension.trim_start_matches('.');
    format!(".{}", trimmed.to_lowercase())
}
