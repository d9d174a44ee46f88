//! 통계 및 유틸리티 모듈
//!
//! 처리 통계 수집 및 포맷팅을 담당합니다. 워커들이 동시에 갱신하므로
//! 카운터는 모두 원자 변수입니다.

use colored::Colorize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::pipeline::Outcome;

/// 처리 통계 구조체
#[derive(Debug, Default)]
pub struct Statistics {
    /// 교체 성공 수
    pub success_count: AtomicUsize,
    /// 에러 발생 수
    pub error_count: AtomicUsize,
    /// 교체하지 않은 수
    pub skipped_count: AtomicUsize,
    /// 백업에서 복구한 수
    pub recovered_count: AtomicUsize,
    /// 변환 전 총 바이트
    pub total_bytes_before: AtomicU64,
    /// 변환 후 총 바이트
    pub total_bytes_after: AtomicU64,
    /// 처리 시작 시간
    start_time: Option<Instant>,
}

impl Statistics {
    /// 새 통계 인스턴스 생성
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// 파일 처리 결과 반영
    pub fn record(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Committed {
                bytes_before,
                bytes_after,
                recovered,
                ..
            } => {
                self.success_count.fetch_add(1, Ordering::Relaxed);
                self.total_bytes_before
                    .fetch_add(*bytes_before, Ordering::Relaxed);
                self.total_bytes_after.fetch_add(*bytes_after, Ordering::Relaxed);
                if *recovered {
                    self.recovered_count.fetch_add(1, Ordering::Relaxed);
                }
            }
            Outcome::Skipped { .. } => {
                self.skipped_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// 에러 카운트 증가
    pub fn increment_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_success_count(&self) -> usize {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn get_error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn get_skipped_count(&self) -> usize {
        self.skipped_count.load(Ordering::Relaxed)
    }

    pub fn get_recovered_count(&self) -> usize {
        self.recovered_count.load(Ordering::Relaxed)
    }

    /// 처리한 전체 파일 수
    pub fn total_files(&self) -> usize {
        self.get_success_count() + self.get_error_count() + self.get_skipped_count()
    }

    /// 경과 시간 반환
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// 처리 통계 요약 출력
    pub fn print_summary(&self) {
        let success = self.get_success_count();
        let errors = self.get_error_count();
        let skipped = self.get_skipped_count();
        let recovered = self.get_recovered_count();
        let before = self.total_bytes_before.load(Ordering::Relaxed);
        let after = self.total_bytes_after.load(Ordering::Relaxed);
        let total = self.total_files();

        println!("\n{}", "═".repeat(50).bright_blue());
        println!("{}", " 📊 처리 통계".bright_white().bold());
        println!("{}", "═".repeat(50).bright_blue());

        println!("  {} 전체 파일:    {}", "📁".bright_cyan(), total);
        println!(
            "  {} 교체:         {}",
            "✅".bright_green(),
            success.to_string().green()
        );

        if errors > 0 {
            println!(
                "  {} 실패:         {}",
                "❌".bright_red(),
                errors.to_string().red()
            );
        } else {
            println!("  {} 실패:         {}", "✅".bright_green(), "0".green());
        }

        if skipped > 0 {
            println!(
                "  {} 건너뜀:       {}",
                "⏭️".bright_yellow(),
                skipped.to_string().yellow()
            );
        }

        if recovered > 0 {
            println!(
                "  {} 복구:         {}",
                "♻️".bright_magenta(),
                recovered.to_string().magenta()
            );
        }

        println!(
            "  {} 변환 전:      {}",
            "📥".bright_yellow(),
            format_bytes(before)
        );
        println!(
            "  {} 변환 후:      {}",
            "📤".bright_magenta(),
            format_bytes(after)
        );

        if total > 0 {
            let success_rate = (success as f64 / total as f64) * 100.0;
            println!(
                "  {} 성공률:       {:.1}%",
                "📈".bright_white(),
                success_rate
            );
        }

        println!(
            "  {} 처리 시간:    {}",
            "⏱️".bright_cyan(),
            format_duration(self.elapsed())
        );

        println!("{}", "═".repeat(50).bright_blue());
    }
}

/// 바이트를 읽기 쉬운 형식으로 변환
///
/// # Examples
/// ```
/// use mediabatch::stats::format_bytes;
///
/// assert_eq!(format_bytes(500), "500 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1048576), "1.00 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// 경과 시간을 읽기 쉬운 형식으로 변환
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        format!("{}시간 {}분", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}분 {}초", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}초", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}
