//! 취소 신호 모듈
//!
//! 닫히면 모든 토큰이 즉시 관찰하는 채널로 취소를 표현합니다.
//! 토큰은 탐색기의 블로킹 send 옆에서 `select!`로 함께 대기됩니다.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::Mutex;

/// 취소를 발생시키는 쪽
#[derive(Debug)]
pub struct CancelSource {
    // 값은 절대 보내지 않음; drop으로 채널을 닫아 취소를 알림
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

/// 취소를 관찰하는 쪽
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: Receiver<()>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// 이 소스에 연결된 토큰 생성
    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: self.receiver.clone(),
        }
    }

    /// 취소 신호 발생 (여러 번 호출해도 안전)
    pub fn cancel(&self) {
        let mut guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token().is_cancelled()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// 논블로킹 취소 확인
    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// `select!`에서 대기할 채널; 취소되면 즉시 준비 상태가 됨
    pub(crate) fn channel(&self) -> &Receiver<()> {
        &self.receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_observed_by_all_tokens() {
        let source = CancelSource::new();
        let a = source.token();
        let b = a.clone();
        assert!(!a.is_cancelled());
        assert!(!b.is_cancelled());

        source.cancel();
        source.cancel();

        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(source.is_cancelled());
    }

    #[test]
    fn test_dropping_source_cancels() {
        let source = CancelSource::new();
        let token = source.token();
        drop(source);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancelled_channel_is_ready() {
        let source = CancelSource::new();
        let token = source.token();
        source.cancel();
        assert!(token.channel().recv().is_err());
    }
}
