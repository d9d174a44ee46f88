//! mediabatch - MEDIA BATCH CONVERTER
//!
//! 메인 엔트리포인트

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mediabatch::{
    cli::Args,
    pattern::PatternMatcher,
    pipeline::{Outcome, Pipeline},
    profile::Profile,
    stats::Statistics,
    tools, BatchError, CancelSource, Dispatcher, DispatcherConfig, Walk, Walker,
};

fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(&args);

    let (root, recursive) = args
        .resolve_root()
        .context("현재 폴더를 확인할 수 없습니다")?;

    // 프로필 / 파이프라인 준비
    let profile = Profile::resolve(&args.profile)?;
    let pipeline = Pipeline::new(profile)?;

    // 패턴 매처 초기화
    let pattern_matcher = PatternMatcher::new(args.pattern.clone())?;

    let walker = Walker::new(pipeline.extensions().clone())
        .with_recursive(recursive)
        .with_channel_capacity(args.channel_capacity)
        .with_pattern(pattern_matcher);

    // 헤더 출력
    print_header(&args, &root, &walker, &pipeline);

    // 아무것도 건드리기 전에 변환기 확인
    if !args.dry_run {
        tools::ensure_executables(pipeline.profile().required_programs())?;
    }

    let cancel = CancelSource::new();
    let walk = walker.spawn(&root, cancel.token())?;

    // 드라이런 모드
    if args.dry_run {
        return run_dry_run(walk);
    }

    run_conversion_mode(&args, &pipeline, walk, &cancel)
}

/// 로거 초기화 (RUST_LOG가 있으면 우선)
fn init_logger(args: &Args) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// 헤더 출력
fn print_header(args: &Args, root: &Path, walker: &Walker, pipeline: &Pipeline) {
    let profile = pipeline.profile();

    println!("\n{}", "═".repeat(50).bright_blue());
    println!("{}", " 🚀 MEDIA BATCH CONVERTER".bright_white().bold());
    println!("{}", "═".repeat(50).bright_blue());
    println!("  {} 루트 폴더: {:?}", "📂".bright_cyan(), root);
    println!(
        "  {} 하위 폴더: {}",
        "📏".bright_white(),
        if walker.is_recursive() { "포함" } else { "제외" }
    );
    println!("  {} 프로필: {}", "⚙️".bright_yellow(), profile.name);
    println!(
        "  {} 형식: {}",
        "🎵".bright_green(),
        profile.formats.keys().cloned().collect::<Vec<_>>().join(", ")
    );

    if let Some(ref pattern) = args.pattern {
        println!("  {} 패턴 필터: {}", "🔍".bright_magenta(), pattern);
    }

    if let Some(threads) = args.threads {
        println!("  {} 워커 수: {}", "🧵".bright_cyan(), threads);
    }

    if args.dry_run {
        println!(
            "  {} {}",
            "⚠️".bright_yellow(),
            "드라이런 모드 (실제 변환 없음)".yellow()
        );
    }

    if args.fail_fast {
        println!("  {} {}", "🛑".bright_red(), "첫 실패에서 중단".red());
    }

    println!("{}", "═".repeat(50).bright_blue());
    println!("\n{}", "📁 파일 검색 중...".bright_cyan());
}

/// 드라이런: 탐색만 하고 목록 출력
fn run_dry_run(walk: Walk) -> Result<()> {
    let (files, walk_result) = walk.collect();
    walk_result.context("폴더 탐색 실패")?;

    if files.is_empty() {
        println!("{}", "⚠️ 처리할 파일이 없습니다.".yellow());
        return Ok(());
    }

    println!("\n{}", "📋 처리 예정 파일 목록:".bright_cyan());
    for (i, path) in files.iter().enumerate() {
        println!("  {}. {}", i + 1, path.display());
    }
    println!(
        "\n{} 총 {} 개의 파일이 처리될 예정입니다.",
        "ℹ️".bright_blue(),
        files.len().to_string().bright_green()
    );

    Ok(())
}

/// 변환 모드 실행
fn run_conversion_mode(
    args: &Args,
    pipeline: &Pipeline,
    walk: Walk,
    cancel: &CancelSource,
) -> Result<()> {
    let stats = Statistics::new();
    let dispatcher = Dispatcher::new(
        DispatcherConfig::new()
            .with_workers(args.threads)
            .with_fail_fast(args.fail_fast),
    );

    println!(
        "\n{} (워커 {}개)",
        "⚡ 병렬 처리 중...".bright_cyan(),
        dispatcher.config().worker_count()
    );

    let pb = create_spinner();

    let result = dispatcher.run(walk, cancel, |path| {
        let outcome = pipeline.process(path);
        match &outcome {
            Ok(outcome) => {
                stats.record(outcome);
                if args.verbose {
                    pb.println(describe(outcome));
                }
            }
            Err(_) => stats.increment_error(),
        }
        pb.inc(1);
        outcome
    });

    pb.finish_with_message("완료!");

    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            stats.print_summary();
            let context = abort_context(&err);
            return Err(err).context(context);
        }
    };

    let errors: Vec<(PathBuf, String)> = summary
        .failed
        .iter()
        .map(|(path, err)| (path.clone(), err.to_string()))
        .collect();

    // 에러 출력
    print_errors(&errors, args.verbose);

    // 로그 파일 작성
    if let Some(ref log_path) = args.log {
        write_error_log(log_path, &errors)?;
    }

    // 통계 출력
    stats.print_summary();

    if stats.total_files() == 0 {
        println!("\n{}", "⚠️ 처리할 파일이 없습니다.".yellow());
    }

    if args.strict && !errors.is_empty() {
        anyhow::bail!("{} 개의 파일 처리에 실패했습니다", errors.len());
    }

    println!("\n{} 완료\n", "✅".bright_green());

    Ok(())
}

/// 배치를 끝낸 에러의 요약 문구
fn abort_context(err: &BatchError) -> &'static str {
    match err {
        BatchError::WalkCanceled => "파일 처리 실패로 작업을 중단했습니다",
        err if err.is_walk_error() => "폴더 탐색 실패",
        _ => "작업 실패",
    }
}

/// 결과 한 줄 설명
fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Committed {
            source,
            target,
            recovered,
            ..
        } => {
            let mark = if *recovered { "♻" } else { "✓" };
            if source == target {
                format!("  {} {}", mark.green(), source.display())
            } else {
                format!(
                    "  {} {} -> {}",
                    mark.green(),
                    source.display(),
                    file_name(target)
                )
            }
        }
        Outcome::Skipped { reason, .. } => format!(
            "  {} {} ({})",
            "-".yellow(),
            outcome.source().display(),
            reason.dimmed()
        ),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 진행 스피너 생성 (전체 파일 수는 탐색이 끝나야 알 수 있음)
fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} 개 처리 {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// 에러 목록 출력
fn print_errors(errors: &[(PathBuf, String)], verbose: bool) {
    if errors.is_empty() {
        return;
    }

    println!("\n{}", "❌ 오류 발생 파일:".bright_red());
    for (path, error) in errors {
        println!("  {} {}", "•".red(), path.display());
        if verbose {
            println!("    {}", error.dimmed());
        }
    }
}

/// 에러 로그 파일 작성
fn write_error_log(log_path: &Path, errors: &[(PathBuf, String)]) -> Result<()> {
    let mut log_file = File::create(log_path)
        .with_context(|| format!("로그 파일을 만들 수 없습니다: {:?}", log_path))?;

    writeln!(log_file, "mediabatch 에러 로그")?;
    writeln!(log_file, "생성 시간: {}", unix_now())?;
    writeln!(log_file, "총 에러 수: {}", errors.len())?;
    writeln!(log_file, "{}", "=".repeat(50))?;

    for (path, error) in errors {
        writeln!(log_file, "\n파일: {:?}", path)?;
        writeln!(log_file, "에러: {}", error)?;
    }

    println!("\n{} 에러 로그 저장: {:?}", "📝".bright_cyan(), log_path);

    Ok(())
}

/// 현재 시간 문자열 반환
fn unix_now() -> String {
    use std::time::SystemTime;
    let duration = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    format!("Unix timestamp: {}", duration.as_secs())
}
