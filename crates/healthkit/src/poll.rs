//! Polling a probe until it reports healthy.
//!
//! Every built-in check wraps its probe in [`poll_until`]. The check's own
//! `timeout` bounds the polling; the instruction deadline and the run's
//! cancellation token (both in the [`CallContext`]) end it early.

use crate::error::Result;
use crate::fields;
use enactor::{CallContext, FieldType, Health, Schema, Section};
use std::thread;
use std::time::{Duration, Instant};

/// Default polling window: a single attempt
pub const DEFAULT_TIMEOUT_SECS: u64 = 0;

/// Default pause between attempts
pub const DEFAULT_POLL_DELAY_SECS: u64 = 1;

/// Granularity at which a pause notices cancellation
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// How long and how often to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub poll_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_delay: Duration::from_secs(DEFAULT_POLL_DELAY_SECS),
        }
    }
}

impl PollSettings {
    /// Read `timeout` and `poll_delay` (seconds) from a check section
    pub fn from_section(check: &'static str, section: &Section) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            timeout: fields::seconds(check, section, "timeout")?.unwrap_or(defaults.timeout),
            poll_delay: fields::seconds(check, section, "poll_delay")?.unwrap_or(defaults.poll_delay),
        })
    }
}

/// Add the polling keys every built-in check accepts
pub fn with_poll_fields(schema: Schema) -> Schema {
    schema
        .optional("timeout", FieldType::UnsignedInteger)
        .optional("poll_delay", FieldType::UnsignedInteger)
}

/// Callback for unhealthy attempts that will be retried.
pub trait PollCallback {
    /// Called after attempt `attempt` reported `reason`, before sleeping `delay`
    fn on_retry(&self, attempt: u32, reason: &str, delay: Duration);
}

/// Logs retries at debug level.
pub struct LogCallback;

impl PollCallback for LogCallback {
    fn on_retry(&self, attempt: u32, reason: &str, delay: Duration) {
        log::debug!("attempt {attempt} unhealthy ({reason}), retrying in {}s", delay.as_secs());
    }
}

/// Run `probe` until it is healthy or the polling window closes.
///
/// Probe errors end polling immediately; only `Unhealthy` is retried. The
/// last unhealthy reason is returned when polling gives up.
pub fn poll_until<F>(
    settings: &PollSettings,
    ctx: &CallContext,
    callback: Option<&dyn PollCallback>,
    mut probe: F,
) -> anyhow::Result<Health>
where
    F: FnMut() -> anyhow::Result<Health>,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let reason = match probe()? {
            Health::Healthy => return Ok(Health::Healthy),
            Health::Unhealthy { reason } => reason,
        };

        let window_closed = started.elapsed() + settings.poll_delay > settings.timeout;
        let deadline_near = ctx.remaining().is_some_and(|r| r < settings.poll_delay);
        if window_closed || deadline_near || ctx.should_stop() {
            log::debug!("giving up after {attempt} attempt(s): {reason}");
            return Ok(Health::Unhealthy { reason });
        }

        if let Some(cb) = callback {
            cb.on_retry(attempt, &reason, settings.poll_delay);
        }
        if !pause(settings.poll_delay, ctx) {
            return Ok(Health::Unhealthy { reason });
        }
    }
}

/// Sleep for `delay`; false if the call was told to stop meanwhile
fn pause(delay: Duration, ctx: &CallContext) -> bool {
    let until = Instant::now() + delay;
    loop {
        if ctx.should_stop() {
            return false;
        }
        let now = Instant::now();
        if now >= until {
            return true;
        }
        thread::sleep(SLEEP_SLICE.min(until - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enactor::CancelToken;
    use serde_json::json;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(timeout_ms: u64) -> PollSettings {
        PollSettings {
            timeout: Duration::from_millis(timeout_ms),
            poll_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_settings_from_section() {
        let section = Section::new("ports").with("timeout", 30).with("poll_delay", 5);
        let settings = PollSettings::from_section("ports", &section).unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.poll_delay, Duration::from_secs(5));

        let settings = PollSettings::from_section("ports", &Section::new("ports")).unwrap();
        assert_eq!(settings, PollSettings::default());
        assert_eq!(settings.timeout, Duration::ZERO);
    }

    #[test]
    fn test_default_is_single_attempt() {
        let attempts = Cell::new(0);
        let health = poll_until(&PollSettings::default(), &CallContext::default(), None, || {
            attempts.set(attempts.get() + 1);
            Ok(Health::unhealthy("closed"))
        })
        .unwrap();
        assert_eq!(health, Health::unhealthy("closed"));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_eventual_success() {
        let attempts = Cell::new(0);
        let health = poll_until(&fast(5_000), &CallContext::default(), None, || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Ok(Health::unhealthy("starting"))
            } else {
                Ok(Health::Healthy)
            }
        })
        .unwrap();
        assert!(health.is_healthy());
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_probe_error_is_not_retried() {
        let attempts = Cell::new(0);
        let result = poll_until(&fast(5_000), &CallContext::default(), None, || {
            attempts.set(attempts.get() + 1);
            anyhow::bail!("no address")
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_cancelled_context_stops_polling() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let ctx = CallContext::new(None, cancel);
        let attempts = Cell::new(0);
        let health = poll_until(&fast(60_000), &ctx, None, || {
            attempts.set(attempts.get() + 1);
            Ok(Health::unhealthy("down"))
        })
        .unwrap();
        assert!(!health.is_healthy());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_callback_invoked_between_attempts() {
        struct Counting(Arc<AtomicU32>);
        impl PollCallback for Counting {
            fn on_retry(&self, _: u32, _: &str, _: Duration) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicU32::new(0));
        let callback = Counting(Arc::clone(&count));
        let attempts = Cell::new(0);
        poll_until(&fast(5_000), &CallContext::default(), Some(&callback), || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Ok(Health::unhealthy("starting"))
            } else {
                Ok(Health::Healthy)
            }
        })
        .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_poll_fields_accepted_by_schema() {
        let schema = with_poll_fields(Schema::new());
        let mut params = enactor::Params::new();
        params.insert("timeout".into(), json!(10));
        assert!(schema.validate("test", &params).is_ok());
    }
}
