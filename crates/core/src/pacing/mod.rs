//! Per-provider pacing state machine.
//!
//! One [`RateLimiter`] lives per process and is shared across requests. Each
//! provider has its own policy and state: Barchart paces distinct-symbol
//! calls (2 s apart, with a 30 s pause after every 10) and lets the
//! adjusted/unadjusted pair of a single symbol through back-to-back; Tiingo
//! applies a flat minimum spacing to every call and tracks a per-minute
//! counter that emits a soft warning when the documented quota comes into
//! view.
//!
//! The wait is computed under a short mutex and slept outside it - the lock
//! never wraps I/O. Counters are process-lifetime and never persisted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::time::sleep;

use crate::bars::ProviderId;
use crate::config::Config;

/// How the upcoming call relates to the previous one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallKind {
    /// First call for a symbol in this request. Subject to inter-symbol
    /// spacing and the periodic long pause.
    NewSymbol,
    /// Follow-up call for the same symbol (the adjusted/unadjusted pair, or a
    /// later gap of the same symbol). Free on Barchart; still spaced on
    /// Tiingo.
    SameSymbol,
}

/// Pacing policy for one provider.
#[derive(Clone, Debug)]
struct PacingPolicy {
    /// Spacing applied between paced calls.
    inter_request_delay: Duration,
    /// Insert `long_pause` after every this many distinct-symbol calls.
    /// Zero disables the periodic pause.
    long_pause_every: u32,
    long_pause: Duration,
    /// Whether `SameSymbol` calls are paced too.
    pace_same_symbol: bool,
    /// Calls per minute that trigger a soft quota warning. Zero disables.
    rpm_warn_threshold: u32,
}

/// Mutable pacing state for one provider.
#[derive(Debug, Default)]
struct ProviderState {
    /// The reserved slot of the most recent call (may sit in the near future
    /// while its caller is still sleeping toward it).
    last_slot: Option<Instant>,
    distinct_symbol_calls: u64,
    window_started: Option<Instant>,
    calls_in_window: u32,
    warned_this_window: bool,
}

/// Shared per-provider pacer.
pub struct RateLimiter {
    states: Mutex<HashMap<ProviderId, ProviderState>>,
    policies: HashMap<ProviderId, PacingPolicy>,
}

impl RateLimiter {
    pub fn new(config: &Config) -> Self {
        let mut policies = HashMap::new();
        policies.insert(
            ProviderId::Barchart,
            PacingPolicy {
                inter_request_delay: config.barchart_inter_request_delay,
                long_pause_every: config.barchart_long_pause_every,
                long_pause: config.barchart_long_pause,
                pace_same_symbol: false,
                rpm_warn_threshold: 0,
            },
        );
        policies.insert(
            ProviderId::Tiingo,
            PacingPolicy {
                inter_request_delay: config.tiingo_min_request_spacing,
                long_pause_every: 0,
                long_pause: Duration::ZERO,
                pace_same_symbol: true,
                rpm_warn_threshold: config.tiingo_rpm_warn_threshold,
            },
        );

        Self {
            states: Mutex::new(HashMap::new()),
            policies,
        }
    }

    /// Block until the next call to `provider` may be issued.
    pub async fn pace(&self, provider: ProviderId, kind: CallKind) {
        let wait = self.reserve(provider, kind);
        if wait > Duration::ZERO {
            debug!("pacing {provider}: waiting {:?} before next call", wait);
            sleep(wait).await;
        }
    }

    /// Compute the required wait and advance counters under the lock. Never
    /// sleeps; concurrent callers each reserve a distinct slot.
    fn reserve(&self, provider: ProviderId, kind: CallKind) -> Duration {
        let policy = match self.policies.get(&provider) {
            Some(policy) => policy,
            None => return Duration::ZERO,
        };

        let mut states = self.lock_states();
        let state = states.entry(provider).or_default();
        let now = Instant::now();

        if policy.rpm_warn_threshold > 0 {
            note_quota_call(provider, policy, state, now);
        }

        let paced = kind == CallKind::NewSymbol || policy.pace_same_symbol;
        let mut earliest = match (state.last_slot, paced) {
            (Some(last), true) => last + policy.inter_request_delay,
            _ => now,
        };

        if kind == CallKind::NewSymbol {
            if policy.long_pause_every > 0
                && state.distinct_symbol_calls > 0
                && state.distinct_symbol_calls % policy.long_pause_every as u64 == 0
            {
                earliest += policy.long_pause;
            }
            state.distinct_symbol_calls += 1;
        }

        let slot = earliest.max(now);
        state.last_slot = Some(slot);
        slot.saturating_duration_since(now)
    }

    /// Distinct-symbol calls issued to `provider` so far in this process.
    pub fn distinct_symbol_calls(&self, provider: ProviderId) -> u64 {
        let states = self.lock_states();
        states
            .get(&provider)
            .map(|s| s.distinct_symbol_calls)
            .unwrap_or(0)
    }

    /// Recovering from a poisoned mutex is safe here: the worst case is
    /// slightly wrong pacing, which beats panicking the whole request.
    fn lock_states(&self) -> MutexGuard<'_, HashMap<ProviderId, ProviderState>> {
        self.states.lock().unwrap_or_else(|poisoned| {
            warn!("rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

fn note_quota_call(
    provider: ProviderId,
    policy: &PacingPolicy,
    state: &mut ProviderState,
    now: Instant,
) {
    const WINDOW: Duration = Duration::from_secs(60);

    let window_expired = state
        .window_started
        .map(|started| now.duration_since(started) >= WINDOW)
        .unwrap_or(true);
    if window_expired {
        state.window_started = Some(now);
        state.calls_in_window = 0;
        state.warned_this_window = false;
    }

    state.calls_in_window += 1;
    if !state.warned_this_window && state.calls_in_window >= policy.rpm_warn_threshold {
        warn!(
            "{provider}: {} calls in the current minute, approaching the documented quota",
            state.calls_in_window
        );
        state.warned_this_window = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(&Config::default())
    }

    /// Sums the waits a strictly sequential caller would incur.
    fn total_wait(limiter: &RateLimiter, calls: &[(ProviderId, CallKind)]) -> Duration {
        calls
            .iter()
            .map(|(provider, kind)| limiter.reserve(*provider, *kind))
            .sum()
    }

    #[test]
    fn first_call_is_free() {
        let limiter = limiter();
        let wait = limiter.reserve(ProviderId::Barchart, CallKind::NewSymbol);
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn same_symbol_pair_is_free_on_barchart() {
        let limiter = limiter();
        assert_eq!(
            limiter.reserve(ProviderId::Barchart, CallKind::NewSymbol),
            Duration::ZERO
        );
        // The adjusted/unadjusted pair goes through back-to-back.
        assert_eq!(
            limiter.reserve(ProviderId::Barchart, CallKind::SameSymbol),
            Duration::ZERO
        );
    }

    #[test]
    fn distinct_symbols_are_spaced_two_seconds() {
        let limiter = limiter();
        limiter.reserve(ProviderId::Barchart, CallKind::NewSymbol);
        let wait = limiter.reserve(ProviderId::Barchart, CallKind::NewSymbol);
        assert!(wait >= Duration::from_millis(1900), "wait was {wait:?}");
        assert!(wait <= Duration::from_secs(2));
    }

    #[test]
    fn pacing_lower_bound_for_eleven_symbols() {
        // 11 distinct symbols: 2s * 10 gaps + one 30s long pause = 50s.
        let limiter = limiter();
        let calls = vec![(ProviderId::Barchart, CallKind::NewSymbol); 11];
        let total = total_wait(&limiter, &calls);
        assert!(total >= Duration::from_millis(49_900), "total was {total:?}");
        assert!(total <= Duration::from_secs(50));
    }

    #[test]
    fn long_pause_lands_before_the_eleventh_symbol() {
        let limiter = limiter();
        for _ in 0..10 {
            limiter.reserve(ProviderId::Barchart, CallKind::NewSymbol);
        }
        let wait = limiter.reserve(ProviderId::Barchart, CallKind::NewSymbol);
        // 2s spacing plus the 30s periodic pause.
        assert!(wait >= Duration::from_secs(31), "wait was {wait:?}");
    }

    #[test]
    fn same_symbol_calls_do_not_advance_the_distinct_counter() {
        let limiter = limiter();
        limiter.reserve(ProviderId::Barchart, CallKind::NewSymbol);
        limiter.reserve(ProviderId::Barchart, CallKind::SameSymbol);
        limiter.reserve(ProviderId::Barchart, CallKind::SameSymbol);
        assert_eq!(limiter.distinct_symbol_calls(ProviderId::Barchart), 1);
    }

    #[test]
    fn tiingo_paces_every_call() {
        let limiter = limiter();
        limiter.reserve(ProviderId::Tiingo, CallKind::NewSymbol);
        let wait = limiter.reserve(ProviderId::Tiingo, CallKind::SameSymbol);
        assert!(wait > Duration::ZERO);
        assert!(wait <= Config::default().tiingo_min_request_spacing);
    }

    #[test]
    fn providers_are_isolated() {
        let limiter = limiter();
        limiter.reserve(ProviderId::Barchart, CallKind::NewSymbol);
        // A busy Barchart schedule does not delay Tiingo.
        assert_eq!(
            limiter.reserve(ProviderId::Tiingo, CallKind::NewSymbol),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pace_sleeps_cooperatively() {
        let limiter = limiter();
        limiter.pace(ProviderId::Barchart, CallKind::NewSymbol).await;
        // Paused tokio time auto-advances; the second call must complete
        // without real wall-clock delay while still issuing the sleep.
        limiter.pace(ProviderId::Barchart, CallKind::NewSymbol).await;
        assert_eq!(limiter.distinct_symbol_calls(ProviderId::Barchart), 2);
    }
}
