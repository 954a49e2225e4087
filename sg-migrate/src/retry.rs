use std::time::Duration;

use backoff::ExponentialBackoff;
use ruleset_core::{
    AccessControlProvider, Direction, NamedAddressList, NewAddressList, NewRuleSet,
    ProviderError, Rule, RuleSet, RuleSetFilter,
};
use tracing::warn;

/// Retry behavior for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Doubling backoff from `initial_backoff` up to `max_backoff`, without
    /// an elapsed-time limit; attempts are capped separately.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            multiplier: 2.0,
            max_interval: self.max_backoff,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Provider wrapper that retries calls failing with a transient error.
#[derive(Debug)]
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: AccessControlProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

fn with_retry<T>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: impl FnMut() -> Result<T, ProviderError>,
) -> Result<T, ProviderError> {
    let mut attempt = 0;
    let attempt_once = || {
        attempt += 1;
        call().map_err(|err| {
            if err.is_transient() && attempt < policy.max_attempts {
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            }
        })
    };
    let log_retry = |err: ProviderError, delay: Duration| {
        warn!("{operation} failed ({err}), retrying in {delay:?}");
    };

    backoff::retry_notify(policy.backoff(), attempt_once, log_retry).map_err(|err| match err {
        backoff::Error::Permanent(err) => err,
        backoff::Error::Transient { err, .. } => err,
    })
}

impl<P: AccessControlProvider> AccessControlProvider for RetryingProvider<P> {
    fn list_rule_sets(&self, filter: &RuleSetFilter) -> Result<Vec<RuleSet>, ProviderError> {
        with_retry(&self.policy, "list rule sets", || {
            self.inner.list_rule_sets(filter)
        })
    }

    fn create_rule_set(&mut self, request: &NewRuleSet) -> Result<String, ProviderError> {
        let inner = &mut self.inner;
        with_retry(&self.policy, "create rule set", || {
            inner.create_rule_set(request)
        })
    }

    fn append_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError> {
        let inner = &mut self.inner;
        with_retry(&self.policy, "append rules", || {
            inner.append_rules(rule_set_id, direction, rules)
        })
    }

    fn revoke_rules(
        &mut self,
        rule_set_id: &str,
        direction: Direction,
        rules: &[Rule],
    ) -> Result<(), ProviderError> {
        let inner = &mut self.inner;
        with_retry(&self.policy, "revoke rules", || {
            inner.revoke_rules(rule_set_id, direction, rules)
        })
    }

    fn list_named_address_lists(
        &self,
        ids: &[String],
    ) -> Result<Vec<NamedAddressList>, ProviderError> {
        with_retry(&self.policy, "list address lists", || {
            self.inner.list_named_address_lists(ids)
        })
    }

    fn create_named_address_list(
        &mut self,
        request: &NewAddressList,
    ) -> Result<String, ProviderError> {
        let inner = &mut self.inner;
        with_retry(&self.policy, "create address list", || {
            inner.create_named_address_list(request)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use ruleset_core::ProviderError;

    use super::{with_retry, RetryPolicy};

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn backoff_starts_at_initial_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
        };
        let backoff = policy.backoff();
        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
        assert_eq!(backoff.max_interval, Duration::from_millis(300));
        assert_eq!(backoff.max_elapsed_time, None);
    }

    #[test]
    fn retries_transient_errors_until_success() {
        let calls = Cell::new(0);
        let result = with_retry(&quick(), "list_rule_sets", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(ProviderError::Transient("throttled".to_string()))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&quick(), "list_rule_sets", || {
            calls.set(calls.get() + 1);
            Err(ProviderError::Timeout(Duration::from_secs(30)))
        });
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn does_not_retry_permanent_errors() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&quick(), "list_rule_sets", || {
            calls.set(calls.get() + 1);
            Err(ProviderError::DuplicateName("web".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
