//! Backoff schedule and HTTP status classification for provider calls.

use std::time::Duration;

use rand::Rng;

/// How a non-success HTTP status should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusClass {
    /// Credentials rejected; retrying cannot help.
    Auth,
    /// Quota exhausted; retry after the server's hint if there is one.
    RateLimited,
    /// Transient server-side failure.
    Transient,
    /// The configured model does not exist on this endpoint.
    ModelMissing,
    /// Any other client error.
    Fatal,
}

pub(crate) fn classify_status(status: u16) -> StatusClass {
    match status {
        401 | 403 => StatusClass::Auth,
        429 => StatusClass::RateLimited,
        500 | 502 | 503 | 504 => StatusClass::Transient,
        404 => StatusClass::ModelMissing,
        _ => StatusClass::Fatal,
    }
}

/// Exponential backoff with +/-25% jitter, capped.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    base: Duration,
    cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(20),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = (self.base.as_millis() as u64).saturating_mul(1u64 << attempt.min(16));
        let base_ms = base_ms.min(self.cap.as_millis() as u64);
        let spread = base_ms / 4;
        let jittered = if spread > 0 {
            base_ms - spread + rand::thread_rng().gen_range(0..=spread * 2)
        } else {
            base_ms
        };
        Duration::from_millis(jittered.max(100))
    }

    /// Delay honouring a server `Retry-After` hint when present, never
    /// longer than the cap.
    pub fn delay_with_hint(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.min(self.cap),
            None => self.delay(attempt),
        }
    }
}

/// Parse a `Retry-After` header value given in whole seconds.
///
/// HTTP-date values are ignored and fall back to the backoff schedule.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_are_classified() {
        assert_eq!(classify_status(401), StatusClass::Auth);
        assert_eq!(classify_status(429), StatusClass::RateLimited);
        assert_eq!(classify_status(503), StatusClass::Transient);
        assert_eq!(classify_status(404), StatusClass::ModelMissing);
        assert_eq!(classify_status(400), StatusClass::Fatal);
    }

    #[test]
    fn delay_doubles_within_jitter() {
        let backoff = Backoff::default();
        for _ in 0..20 {
            let d0 = backoff.delay(0).as_millis();
            let d2 = backoff.delay(2).as_millis();
            assert!((750..=1250).contains(&d0), "attempt 0: {d0}");
            assert!((3000..=5000).contains(&d2), "attempt 2: {d2}");
        }
    }

    #[test]
    fn delay_is_capped() {
        let backoff = Backoff::default();
        assert!(backoff.delay(40) <= Duration::from_millis(25_000));
        assert_eq!(
            backoff.delay_with_hint(0, Some(Duration::from_secs(600))),
            Duration::from_secs(20)
        );
    }

    #[test]
    fn retry_after_seconds_only() {
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
