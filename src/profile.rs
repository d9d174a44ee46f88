//! 변환 프로필 모듈
//!
//! 확장자별로 외부 변환 단계의 순서를 정의하는 표입니다. 내장 프로필을
//! 쓰거나 JSON 파일에서 읽어올 수 있습니다.
//!
//! 단계 인자 안의 `{input}` / `{output}`은 실행 직전에 작업 파일 경로로 치환됩니다.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{BatchError, Result};
use crate::extensions::ExtensionSet;
use crate::replacer::DEFAULT_BACKUP_SUFFIX;

/// 입력 경로 자리표시자
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// 출력 경로 자리표시자
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// 내장 프로필 이름 목록
pub const BUILTIN_PROFILES: &[&str] = &["music", "pdf", "kindle"];

/// 변환 단계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// 새 파일을 만드는 변환 (`{output}`에 `output_extension` 파일이 생김)
    Convert {
        program: String,
        args: Vec<String>,
        output_extension: String,
    },
    /// 입력 파일을 그 자리에서 수정
    InPlace { program: String, args: Vec<String> },
}

impl Step {
    pub fn program(&self) -> &str {
        match self {
            Step::Convert { program, .. } | Step::InPlace { program, .. } => program,
        }
    }

    /// 자리표시자를 치환한 인자 목록
    ///
    /// 경로는 `OsString` 그대로 넣으므로 UTF-8이 아닌 파일 이름도 손실 없이 전달됩니다.
    pub fn render_args(&self, input: &Path, output: Option<&Path>) -> Vec<OsString> {
        let args = match self {
            Step::Convert { args, .. } | Step::InPlace { args, .. } => args,
        };
        let output = output.map(Path::as_os_str).unwrap_or_default();

        args.iter()
            .map(|arg| substitute(arg, input.as_os_str(), output))
            .collect()
    }
}

/// 인자 하나의 자리표시자를 모두 치환
fn substitute(arg: &str, input: &OsStr, output: &OsStr) -> OsString {
    let mut rendered = OsString::with_capacity(arg.len());
    let mut rest = arg;

    loop {
        let next = [(INPUT_PLACEHOLDER, input), (OUTPUT_PLACEHOLDER, output)]
            .into_iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|at| (at, placeholder, value))
            })
            .min_by_key(|(at, _, _)| *at);

        match next {
            Some((at, placeholder, value)) => {
                rendered.push(&rest[..at]);
                rendered.push(value);
                rest = &rest[at + placeholder.len()..];
            }
            None => {
                rendered.push(rest);
                return rendered;
            }
        }
    }
}

/// 확장자 → 단계 목록 표
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,

    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,

    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,

    /// 결과가 이 비율 이상 작아지지 않으면 교체하지 않음 (예: 0.1 = 10%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size_reduction: Option<f64>,

    /// 원본을 그대로 두고 결과를 `<원본><출력 확장자>`로 저장
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keep_original: bool,

    pub formats: BTreeMap<String, Vec<Step>>,
}

fn default_backup_suffix() -> String {
    DEFAULT_BACKUP_SUFFIX.to_string()
}

fn default_temp_prefix() -> String {
    "mediabatch".to_string()
}

impl Profile {
    /// 내장 프로필 이름이면 그것을, 아니면 JSON 파일 경로로 보고 읽음
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if let Some(profile) = Self::builtin(name_or_path) {
            return Ok(profile);
        }

        let path = Path::new(name_or_path);
        if path.is_file() {
            return Self::load(path);
        }

        Err(BatchError::ProfileNotFound {
            name: name_or_path.to_string(),
        })
    }

    /// JSON 프로필 파일 읽기 + 검증
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| BatchError::fs("open", path, e))?;
        let mut profile: Profile =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                BatchError::InvalidProfile {
                    name: path.display().to_string(),
                    reason: e.to_string(),
                }
            })?;

        profile.normalize_keys()?;
        profile.validate()?;
        Ok(profile)
    }

    /// 내장 프로필
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "music" => Some(music_profile()),
            "pdf" => Some(pdf_profile()),
            "kindle" => Some(kindle_profile()),
            _ => None,
        }
    }

    /// 지원 확장자 집합 (백업 접미사 포함)
    pub fn extension_set(&self) -> ExtensionSet {
        let mut set: ExtensionSet = self.formats.keys().map(String::as_str).collect();
        set.insert(&self.backup_suffix, true);
        set
    }

    /// 모든 단계에서 쓰는 프로그램 목록
    pub fn required_programs(&self) -> BTreeSet<&str> {
        self.formats
            .values()
            .flatten()
            .map(Step::program)
            .collect()
    }

    /// 확장자에 해당하는 단계 목록
    pub fn steps_for(&self, extension: &str) -> Option<&[Step]> {
        self.formats
            .get(&extension.to_lowercase())
            .map(Vec::as_slice)
    }

    /// 프로필 검증
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| BatchError::InvalidProfile {
            name: self.name.clone(),
            reason,
        };

        if self.formats.is_empty() {
            return Err(invalid("형식이 하나도 없습니다".to_string()));
        }

        if !is_single_extension(&self.backup_suffix) {
            return Err(invalid(format!(
                "백업 접미사는 '.'으로 시작하는 단일 확장자여야 합니다: '{}'",
                self.backup_suffix
            )));
        }

        if let Some(ratio) = self.min_size_reduction {
            if !(0.0..1.0).contains(&ratio) {
                return Err(invalid(format!("min_size_reduction 범위 오류: {}", ratio)));
            }
        }

        for (extension, steps) in &self.formats {
            if !is_single_extension(extension) {
                return Err(invalid(format!("잘못된 확장자: '{}'", extension)));
            }
            if extension.eq_ignore_ascii_case(&self.backup_suffix) {
                return Err(invalid(format!(
                    "백업 접미사와 같은 확장자는 쓸 수 없습니다: '{}'",
                    extension
                )));
            }
            for step in steps {
                if step.program().trim().is_empty() {
                    return Err(invalid(format!("'{}': 프로그램 이름이 비어 있습니다", extension)));
                }
                if let Step::Convert {
                    output_extension, ..
                } = step
                {
                    if !is_single_extension(output_extension) {
                        return Err(invalid(format!(
                            "'{}': 잘못된 출력 확장자 '{}'",
                            extension, output_extension
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// 확장자 키를 소문자로 맞춤 (대소문자만 다른 키가 겹치면 에러)
    pub(crate) fn normalize_keys(&mut self) -> Result<()> {
        let formats = std::mem::take(&mut self.formats);
        for (extension, steps) in formats {
            let key = extension.to_lowercase();
            if self.formats.insert(key, steps).is_some() {
                return Err(BatchError::InvalidProfile {
                    name: self.name.clone(),
                    reason: format!("확장자가 중복됩니다: '{}'", extension),
                });
            }
        }
        Ok(())
    }
}

fn is_single_extension(extension: &str) -> bool {
    extension.len() > 1
        && extension.starts_with('.')
        && !extension[1..].contains(['.', '/', '\\'])
}

fn convert(program: &str, args: &[&str], output_extension: &str) -> Step {
    Step::Convert {
        program: program.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        output_extension: output_extension.to_string(),
    }
}

fn in_place(program: &str, args: &[&str]) -> Step {
    Step::InPlace {
        program: program.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
    }
}

/// lame 재인코딩 후 mp3gain 정규화
fn mp3_finish() -> Vec<Step> {
    vec![
        convert("lame", &["-v", "{input}", "{output}"], ".mp3"),
        in_place("mp3gain", &["-r", "-k", "-T", "{input}"]),
    ]
}

fn ffmpeg_to_mp3(extra: &[&str]) -> Vec<Step> {
    let mut args = vec!["-i", "{input}"];
    args.extend_from_slice(extra);
    args.push("{output}");

    let mut steps = vec![convert("ffmpeg", &args, ".mp3")];
    steps.extend(mp3_finish());
    steps
}

fn music_profile() -> Profile {
    let keep_tags = ["-map_metadata", "0:s:0"];

    let mut formats = BTreeMap::new();
    formats.insert(".mp3".to_string(), mp3_finish());
    formats.insert(
        ".wma".to_string(),
        ffmpeg_to_mp3(&["-map_metadata", "0:s:0", "-acodec", "libmp3lame"]),
    );
    formats.insert(".flac".to_string(), {
        let mut steps = vec![
            convert("flac", &["-d", "{input}", "-o", "{output}"], ".wav"),
            convert("lame", &["{input}", "{output}"], ".mp3"),
        ];
        steps.extend(mp3_finish());
        steps
    });
    formats.insert(".flv".to_string(), ffmpeg_to_mp3(&keep_tags));
    formats.insert(".m4a".to_string(), ffmpeg_to_mp3(&keep_tags));
    formats.insert(".ogg".to_string(), ffmpeg_to_mp3(&keep_tags));
    formats.insert(".mp4".to_string(), ffmpeg_to_mp3(&[]));
    formats.insert(".webm".to_string(), ffmpeg_to_mp3(&[]));
    formats.insert(".mkv".to_string(), ffmpeg_to_mp3(&[]));

    Profile {
        name: "music".to_string(),
        backup_suffix: default_backup_suffix(),
        temp_prefix: "mediabatch-music".to_string(),
        min_size_reduction: None,
        keep_original: false,
        formats,
    }
}

fn pdf_profile() -> Profile {
    let mut formats = BTreeMap::new();
    formats.insert(
        ".pdf".to_string(),
        vec![convert(
            "gs",
            &[
                "-sDEVICE=pdfwrite",
                "-dCompatibilityLevel=1.4",
                "-dPDFSETTINGS=/ebook",
                "-dNOPAUSE",
                "-dQUIET",
                "-dBATCH",
                "-sOutputFile={output}",
                "{input}",
            ],
            ".pdf",
        )],
    );

    Profile {
        name: "pdf".to_string(),
        backup_suffix: default_backup_suffix(),
        temp_prefix: "mediabatch-pdf".to_string(),
        min_size_reduction: Some(0.1),
        keep_original: false,
        formats,
    }
}

/// calibre로 전자책을 mobi로 변환, 원본은 보존
fn kindle_profile() -> Profile {
    let to_mobi = || {
        vec![convert(
            "ebook-convert",
            &[
                "{input}",
                "{output}",
                "--filter-css",
                "font-family,color,margin-left,margin-right",
                "--mobi-ignore-margins",
            ],
            ".mobi",
        )]
    };

    let mut formats = BTreeMap::new();
    formats.insert(".html".to_string(), to_mobi());
    formats.insert(".epub".to_string(), to_mobi());

    Profile {
        name: "kindle".to_string(),
        backup_suffix: default_backup_suffix(),
        temp_prefix: "mediabatch-kindle".to_string(),
        min_size_reduction: None,
        keep_original: true,
        formats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_profiles_are_valid() {
        for name in BUILTIN_PROFILES {
            let profile = Profile::builtin(name).unwrap();
            profile.validate().unwrap();
        }
        assert!(Profile::builtin("video").is_none());
    }

    #[test]
    fn test_music_profile_chains() {
        let profile = Profile::builtin("music").unwrap();
        let flac = profile.steps_for(".FLAC").unwrap();
        assert_eq!(flac.len(), 4);
        assert_eq!(flac[0].program(), "flac");
        assert_eq!(flac.last().unwrap().program(), "mp3gain");

        let programs = profile.required_programs();
        assert_eq!(
            programs.into_iter().collect::<Vec<_>>(),
            vec!["ffmpeg", "flac", "lame", "mp3gain"]
        );
    }

    #[test]
    fn test_extension_set_includes_backup_suffix() {
        let profile = Profile::builtin("music").unwrap();
        let set = profile.extension_set();
        assert!(set.contains(".mp3"));
        assert!(set.contains(".MKV"));
        assert!(set.contains(DEFAULT_BACKUP_SUFFIX));
        assert!(!set.contains(".txt"));
    }

    #[test]
    fn test_render_args_substitutes_inside_arguments() {
        let profile = Profile::builtin("pdf").unwrap();
        let step = &profile.steps_for(".pdf").unwrap()[0];
        let args = step.render_args(Path::new("/tmp/w/in.pdf"), Some(Path::new("/tmp/w/out.pdf")));
        assert!(args.contains(&OsString::from("-sOutputFile=/tmp/w/out.pdf")));
        assert_eq!(args.last().unwrap(), "/tmp/w/in.pdf");
    }

    #[test]
    fn test_substitute_repeated_and_mixed_placeholders() {
        let rendered = substitute(
            "{output}:{input}:{input}",
            OsStr::new("in"),
            OsStr::new("out"),
        );
        assert_eq!(rendered, "out:in:in");
        assert_eq!(substitute("plain", OsStr::new("in"), OsStr::new("out")), "plain");
    }

    #[cfg(unix)]
    #[test]
    fn test_render_args_keeps_non_utf8_paths() {
        use std::os::unix::ffi::OsStrExt;

        let input = Path::new(OsStr::from_bytes(b"/tmp/w/caf\xe9.mp3"));
        let step = in_place("mp3gain", &["-r", "{input}"]);
        let args = step.render_args(input, None);
        assert_eq!(args[1].as_bytes(), b"/tmp/w/caf\xe9.mp3");
    }

    #[test]
    fn test_kindle_profile_keeps_original() {
        let profile = Profile::builtin("kindle").unwrap();
        assert!(profile.keep_original);
        assert_eq!(
            profile.required_programs().into_iter().collect::<Vec<_>>(),
            vec!["ebook-convert"]
        );

        let step = &profile.steps_for(".EPUB").unwrap()[0];
        let args = step.render_args(Path::new("/w/book.epub"), Some(Path::new("/w/book.mobi")));
        assert_eq!(args[0], "/w/book.epub");
        assert_eq!(args[1], "/w/book.mobi");
        assert!(args.contains(&OsString::from("--mobi-ignore-margins")));
        assert!(profile.steps_for(".html").is_some());
    }

    #[test]
    fn test_normalize_keys_rejects_case_duplicates() {
        let mut profile = Profile::builtin("pdf").unwrap();
        let steps = profile.formats[".pdf"].clone();
        profile.formats.insert(".PDF".to_string(), steps);

        assert!(matches!(
            profile.normalize_keys(),
            Err(BatchError::InvalidProfile { .. })
        ));
    }

    #[test]
    fn test_load_from_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("upper.json");
        fs::write(
            &path,
            r#"{
                "name": "upper",
                "formats": {
                    ".TXT": [
                        {"kind": "convert", "program": "sh",
                         "args": ["-c", "tr a-z A-Z < \"$0\" > \"$1\"", "{input}", "{output}"],
                         "output_extension": ".txt"}
                    ]
                }
            }"#,
        )
        .unwrap();

        let profile = Profile::resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(profile.name, "upper");
        assert_eq!(profile.backup_suffix, DEFAULT_BACKUP_SUFFIX);
        assert_eq!(profile.temp_prefix, "mediabatch");
        assert!(profile.steps_for(".txt").is_some());
    }

    #[test]
    fn test_invalid_profiles() {
        let mut profile = Profile::builtin("pdf").unwrap();
        profile.backup_suffix = "bak".to_string();
        assert!(matches!(profile.validate(), Err(BatchError::InvalidProfile { .. })));

        let mut profile = Profile::builtin("pdf").unwrap();
        profile.min_size_reduction = Some(1.5);
        assert!(profile.validate().is_err());

        let mut profile = Profile::builtin("pdf").unwrap();
        profile.formats.clear();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_unknown_profile() {
        let result = Profile::resolve("no-such-profile");
        assert!(matches!(result, Err(BatchError::ProfileNotFound { .. })));
    }
}
