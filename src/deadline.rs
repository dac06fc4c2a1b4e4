use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{Cancellation, NuoDbError};

/// Caller-supplied time limit for one operation.
///
/// Converted into the native client's microsecond budget right before the
/// boundary call. A budget of `0` means "no limit" to the client, so an
/// expired deadline is refused here instead of ever being sent as zero.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    at: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl Deadline {
    /// No time limit.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn at(instant: Instant) -> Self {
        Self {
            at: Some(instant),
            cancel: None,
        }
    }

    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        // Durations too large to add to `now` are treated as unlimited.
        Self {
            at: Instant::now().checked_add(timeout),
            cancel: None,
        }
    }

    /// Also refuse the operation once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Microseconds left, rounded up; `0` when there is no deadline.
    ///
    /// # Errors
    ///
    /// Returns [`NuoDbError::Cancelled`] if the token was cancelled or the
    /// deadline has been reached.
    pub fn timeout_micros(&self) -> Result<i64, NuoDbError> {
        self.timeout_micros_at(Instant::now())
    }

    fn timeout_micros_at(&self, now: Instant) -> Result<i64, NuoDbError> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(NuoDbError::Cancelled(Cancellation::Cancelled));
        }
        let Some(at) = self.at else {
            return Ok(0);
        };
        let remaining = at.saturating_duration_since(now);
        if remaining.is_zero() {
            return Err(NuoDbError::Cancelled(Cancellation::DeadlineExceeded));
        }
        let micros = remaining.as_nanos().div_ceil(1_000);
        Ok(i64::try_from(micros).unwrap_or(i64::MAX))
    }
}

impl From<Instant> for Deadline {
    fn from(instant: Instant) -> Self {
        Deadline::at(instant)
    }
}

impl From<Option<Instant>> for Deadline {
    fn from(instant: Option<Instant>) -> Self {
        instant.map_or_else(Deadline::none, Deadline::at)
    }
}
