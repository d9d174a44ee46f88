//! 워커 풀 분배 모듈
//!
//! 고정 크기의 rayon 스레드 풀에서 워커 N개가 탐색기의 경로 채널을 함께
//! 소비합니다. 파일 단위 에러는 워커 경계에서 기록하고 모아 둘 뿐,
//! 다른 워커를 멈추지 않습니다. 모든 워커가 끝난 뒤 탐색 결과를 확인하고,
//! 탐색 자체가 실패했을 때만 에러를 반환합니다.

use log::error;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::cancel::CancelSource;
use crate::error::{BatchError, Result};
use crate::walker::Walk;

/// 분배기 설정
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatcherConfig {
    /// 워커 수 (None이면 CPU 코어 수)
    pub workers: Option<usize>,
    /// 첫 파일 실패에서 탐색 취소
    pub fail_fast: bool,
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 워커 수 설정 (0은 기본값으로 취급)
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers.filter(|n| *n > 0);
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// 실제로 시작할 워커 수
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// 배치 처리 결과
#[derive(Debug)]
pub struct DispatchSummary<T> {
    /// 성공한 파일과 그 결과
    pub succeeded: Vec<(PathBuf, T)>,
    /// 실패한 파일과 에러
    pub failed: Vec<(PathBuf, BatchError)>,
}

impl<T> DispatchSummary<T> {
    /// 처리한 전체 파일 수
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// 워커 풀 분배기
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// 워커를 시작하고, 채널이 닫힐 때까지 처리한 뒤 탐색 결과를 확인
    ///
    /// # Arguments
    /// * `walk` - 진행 중인 탐색
    /// * `cancel` - `fail_fast`일 때 첫 실패에서 취소할 소스
    /// * `per_file` - 파일 하나를 처리하는 함수
    ///
    /// # Returns
    /// 모든 `per_file` 호출이 끝난 뒤의 요약. 탐색이 실패/취소되거나
    /// `fail_fast`에서 한 파일이라도 실패하면 에러
    pub fn run<T, F>(&self, walk: Walk, cancel: &CancelSource, per_file: F) -> Result<DispatchSummary<T>>
    where
        T: Send,
        F: Fn(&Path) -> Result<T> + Sync,
    {
        let workers = self.config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("worker-{}", i))
            .build()
            .map_err(|e| BatchError::ThreadPoolError {
                reason: e.to_string(),
            })?;

        let succeeded = Mutex::new(Vec::new());
        let failed = Mutex::new(Vec::new());

        pool.scope(|scope| {
            for _ in 0..workers {
                let paths = walk.paths().clone();
                let (per_file, succeeded, failed) = (&per_file, &succeeded, &failed);

                scope.spawn(move |_| {
                    for path in paths.iter() {
                        match per_file(&path) {
                            Ok(value) => lock(succeeded).push((path, value)),
                            Err(err) => {
                                error!("'{}': {}", path.display(), err);
                                if self.config.fail_fast {
                                    cancel.cancel();
                                }
                                lock(failed).push((path, err));
                            }
                        }
                    }
                });
            }
        });

        walk.finish()?;

        let failed = into_inner(failed);
        // 마지막 파일의 실패는 탐색이 이미 끝난 뒤라 취소로 드러나지 않음
        if self.config.fail_fast && !failed.is_empty() {
            return Err(BatchError::WalkCanceled);
        }

        Ok(DispatchSummary {
            succeeded: into_inner(succeeded),
            failed,
        })
    }
}

fn lock<V>(mutex: &Mutex<V>) -> std::sync::MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn into_inner<V>(mutex: Mutex<V>) -> V {
    mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
}
