//! CLI 인자 파싱 모듈
//!
//! clap을 사용한 명령줄 인자 정의 및 파싱을 담당합니다.

use clap::Parser;
use std::path::PathBuf;

/// "현재 폴더, 하위 폴더 포함"을 뜻하는 특수 인자
pub const RECURSIVE_CWD: &str = "./...";

/// mediabatch CLI 인자 구조체
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mediabatch",
    author = "YourName <your@email.com>",
    version,
    about = "MEDIA BATCH CONVERTER - 폴더 내 미디어 파일을 외부 변환기로 안전하게 일괄 변환",
    long_about = r#"
MEDIA BATCH CONVERTER
=====================

폴더를 탐색하며 지원되는 파일을 외부 변환기로 변환하고
원본을 백업 기반으로 안전하게 교체합니다.

특징:
  • 워커 풀 병렬 처리
  • 중단된 실행은 남은 백업 파일로 다음 실행에서 자동 복구
  • 확장자별 변환 단계를 JSON 프로필로 정의 가능

예제:
  mediabatch                      # 현재 폴더 (하위 폴더 제외)
  mediabatch ./...                # 현재 폴더 + 하위 폴더
  mediabatch ~/Music -r -j 4
  mediabatch ~/Docs --profile pdf --dry-run
  mediabatch . --profile my-profile.json --pattern "live_*"
"#
)]
pub struct Args {
    /// 탐색할 루트 폴더 ("./..."이면 현재 폴더를 재귀 탐색)
    pub root: Option<String>,

    /// 하위 폴더까지 탐색
    #[arg(short, long)]
    pub recursive: bool,

    /// 변환 프로필 (내장: music, pdf, kindle / 또는 JSON 파일 경로)
    #[arg(short = 'P', long, default_value = "music")]
    pub profile: String,

    /// 파일 이름 패턴 필터 (glob 형식, 예: "live_*", "track??.*")
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// 워커 수 (기본값: CPU 코어 수)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// 경로 채널 용량 (0이면 워커가 준비될 때까지 탐색 대기)
    #[arg(long, default_value_t = 0)]
    pub channel_capacity: usize,

    /// 첫 파일 실패에서 탐색 중단
    #[arg(long)]
    pub fail_fast: bool,

    /// 파일 단위 실패가 있으면 0이 아닌 코드로 종료
    #[arg(long)]
    pub strict: bool,

    /// 실제 변환 없이 처리될 파일 목록만 표시
    #[arg(long)]
    pub dry_run: bool,

    /// 상세 출력 모드
    #[arg(short, long)]
    pub verbose: bool,

    /// 에러 로그 파일 경로
    #[arg(long)]
    pub log: Option<PathBuf>,
}

impl Args {
    /// 루트 폴더와 재귀 여부 결정
    ///
    /// 인자가 없으면 현재 폴더(비재귀), `./...`이면 현재 폴더(재귀)
    pub fn resolve_root(&self) -> std::io::Result<(PathBuf, bool)> {
        match self.root.as_deref() {
            None => Ok((std::env::current_dir()?, self.recursive)),
            Some(RECURSIVE_CWD) => Ok((std::env::current_dir()?, true)),
            Some(root) => Ok((PathBuf::from(root), self.recursive)),
        }
    }

    /// 로그 필터 기본값
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
