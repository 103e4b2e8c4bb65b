//! 재연결 정책.
//!
//! 예기치 않은 종료마다 시도 횟수를 올리고 다음 대기 시간을 계산한다.
//! 상한에 도달하면 포기 판정을 내린다. 타이머는 세션이 소유한다.

use std::time::Duration;

use truckflow_core::config::{BackoffStrategy, RealtimeConfig};

/// 예기치 않은 종료에 대한 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// `delay` 후 `attempt`번째 재연결 시도
    Retry { attempt: u32, delay: Duration },
    /// 최대 시도 횟수 소진
    GiveUp { attempts: u32 },
}

/// 재연결 정책
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    interval: Duration,
    strategy: BackoffStrategy,
    max_interval: Duration,
}

impl ReconnectPolicy {
    /// 고정 간격 정책
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            interval,
            strategy: BackoffStrategy::Fixed,
            max_interval: interval,
        }
    }

    /// 지수 백오프 정책 (`max_interval` 상한)
    pub fn exponential(max_attempts: u32, interval: Duration, max_interval: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            interval,
            strategy: BackoffStrategy::Exponential,
            max_interval: max_interval.max(interval),
        }
    }

    /// 설정으로부터 생성
    pub fn from_config(config: &RealtimeConfig) -> Self {
        let interval = Duration::from_millis(config.reconnect_interval_ms);
        match config.backoff {
            BackoffStrategy::Fixed => Self::fixed(config.max_reconnect_attempts, interval),
            BackoffStrategy::Exponential => Self::exponential(
                config.max_reconnect_attempts,
                interval,
                Duration::from_millis(config.max_reconnect_interval_ms),
            ),
        }
    }

    /// 예기치 않은 종료 기록 → 판정
    pub fn on_unexpected_close(&mut self) -> ReconnectDecision {
        if self.attempts >= self.max_attempts {
            return ReconnectDecision::GiveUp {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay: self.delay_for(self.attempts),
        }
    }

    /// `attempt`번째 시도 전 대기 시간 (1부터)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.interval,
            BackoffStrategy::Exponential => {
                let shift = attempt.saturating_sub(1).min(31);
                self.interval
                    .checked_mul(1u32 << shift)
                    .unwrap_or(self.max_interval)
                    .min(self.max_interval)
            }
        }
    }

    /// 시도 횟수 초기화 (연결 성공 / 명시적 해제)
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// 현재까지의 연속 재연결 시도 횟수
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 최대 시도 횟수
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&RealtimeConfig::default())
    }
}
