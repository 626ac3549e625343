//! State-change polling for asynchronous remote operations
//!
//! Most mutations on the provider side return before the object is usable.
//! [`StateChangeConf::wait_for_state`] drives such an operation to completion
//! by calling a refresh function until it reports a target state, a fatal
//! error, or the timeout elapses.
//!
//! The engine knows nothing about HTTP. Resource-specific quirks such as
//! "the task endpoint answers 404 once the task is done" are handled inside
//! the refresh function with a [`NotFoundPolicy`].

use crate::error::{CloudError, ConvergenceError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Upper bound for the backoff between two polls
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Lower bound for the backoff between two polls
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What to do with a state that is neither pending nor target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlistedState {
    /// Fail with [`ConvergenceError::UnexpectedState`]
    Fail,
    /// Keep polling; for resources that only enumerate a target state
    KeepWaiting,
}

/// How a refresh function treats a "not found" answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// Not found is an error like any other
    Propagate,
    /// Not found means the operation finished; report the given state
    Completes(&'static str),
}

impl NotFoundPolicy {
    /// Map a refresh error according to the policy
    pub fn recover<T>(self, identity: T, err: CloudError) -> Result<Refresh<T>> {
        match self {
            NotFoundPolicy::Completes(state) if err.is_not_found() => {
                tracing::debug!(state, "Object no longer exists, treating as completed");
                Ok(Refresh::new(identity, state))
            }
            _ => Err(err),
        }
    }
}

/// One observation of the remote object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refresh<T> {
    pub identity: T,
    pub state: String,
}

impl<T> Refresh<T> {
    pub fn new(identity: T, state: impl Into<String>) -> Self {
        Self {
            identity,
            state: state.into(),
        }
    }
}

/// Poll context for one asynchronous operation
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    subject: String,
    pending: Vec<String>,
    target: Vec<String>,
    failure: Vec<String>,
    unlisted: UnlistedState,
    delay: Duration,
    min_interval: Duration,
    timeout: Duration,
    transient_retries: u32,
}

impl StateChangeConf {
    /// `subject` names the object in logs and errors (e.g. "instance 42")
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            pending: Vec::new(),
            target: Vec::new(),
            failure: Vec::new(),
            unlisted: UnlistedState::Fail,
            delay: Duration::from_secs(10),
            min_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(10 * 60),
            transient_retries: 0,
        }
    }

    pub fn with_pending(mut self, states: &[&str]) -> Self {
        self.pending = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_target(mut self, states: &[&str]) -> Self {
        self.target = states.iter().map(|s| s.to_string()).collect();
        self
    }

    /// States that end the wait with [`ConvergenceError::FailureState`]
    pub fn with_failure(mut self, states: &[&str]) -> Self {
        self.failure = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_unlisted(mut self, policy: UnlistedState) -> Self {
        self.unlisted = policy;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of transient refresh errors tolerated before giving up
    pub fn with_transient_retries(mut self, retries: u32) -> Self {
        self.transient_retries = retries;
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Waits between polls: `delay` first, then a doubling backoff that
    /// starts at `min_interval` and stops growing at [`MAX_POLL_INTERVAL`].
    pub fn intervals(&self) -> impl Iterator<Item = Duration> + use<> {
        let floor = self.min_interval.max(MIN_POLL_INTERVAL);
        let cap = MAX_POLL_INTERVAL.max(floor);
        std::iter::once(self.delay)
            .chain(std::iter::successors(Some(floor), move |d| Some((*d * 2).min(cap))))
    }

    /// Poll `refresh` until the object reaches a target state.
    ///
    /// `refresh` is called immediately. Its errors end the wait unchanged,
    /// except transient ones while the retry budget lasts. Timeouts are only
    /// checked between polls; an in-flight refresh is never cancelled.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Refresh<T>>>,
    {
        if self.target.is_empty() {
            return Err(CloudError::InvalidConfig(format!(
                "no target state configured while waiting for {}",
                self.subject
            )));
        }

        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut intervals = self.intervals();
        let mut last_state: Option<String> = None;
        let mut transient_errors = 0u32;
        let mut polls = 0u32;

        loop {
            polls += 1;
            match refresh().await {
                Ok(Refresh { identity, state }) => {
                    if self.target.contains(&state) {
                        tracing::debug!(subject = %self.subject, %state, polls, "Target state reached");
                        return Ok(identity);
                    }
                    if self.failure.contains(&state) {
                        return Err(self.convergence(ConvergenceError::FailureState { state }));
                    }
                    if !self.pending.contains(&state) && self.unlisted == UnlistedState::Fail {
                        return Err(self.convergence(ConvergenceError::UnexpectedState {
                            state,
                            target: self.target.clone(),
                        }));
                    }
                    tracing::debug!(subject = %self.subject, %state, polls, "Waiting for target state");
                    last_state = Some(state);
                }
                Err(e) if e.is_transient() && transient_errors < self.transient_retries => {
                    transient_errors += 1;
                    tracing::warn!(
                        subject = %self.subject,
                        error = %e,
                        attempt = transient_errors,
                        "Transient error while polling, retrying"
                    );
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.convergence(ConvergenceError::Timeout {
                    target: self.target.clone(),
                    last_state,
                    elapsed: now.duration_since(started),
                }));
            }

            let wait = intervals
                .next()
                .unwrap_or(MAX_POLL_INTERVAL)
                .min(deadline.duration_since(now));
            sleep(wait).await;
        }
    }

    fn convergence(&self, reason: ConvergenceError) -> CloudError {
        tracing::warn!(subject = %self.subject, %reason, "Gave up waiting");
        CloudError::Convergence {
            subject: self.subject.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conf() -> StateChangeConf {
        StateChangeConf::new("instance i-1")
            .with_pending(&["BUILD", "BUILDING"])
            .with_target(&["ACTIVE"])
            .with_failure(&["ERROR"])
            .with_delay(Duration::from_secs(10))
            .with_min_interval(Duration::from_secs(5))
            .with_timeout(Duration::from_secs(15 * 60))
    }

    /// Refresh that answers `states[n]` on the n-th call, repeating the last one
    fn scripted<'a>(
        calls: &'a AtomicU32,
        states: &'a [&'a str],
    ) -> impl FnMut() -> std::future::Ready<Result<Refresh<u32>>> + 'a {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) as usize;
            let state = states[n.min(states.len() - 1)];
            std::future::ready(Ok(Refresh::new(n as u32 + 1, state)))
        }
    }

    #[test]
    fn test_interval_schedule() {
        let schedule: Vec<u64> = conf().intervals().take(5).map(|d| d.as_secs()).collect();
        assert_eq!(schedule, vec![10, 5, 10, 10, 10]);

        let schedule: Vec<u64> = conf()
            .with_min_interval(Duration::from_secs(3))
            .intervals()
            .take(5)
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(schedule, vec![10, 3, 6, 10, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_exactly_n_refreshes() {
        for n in 1..=5usize {
            let calls = AtomicU32::new(0);
            let mut states = vec!["BUILDING"; n - 1];
            states.push("ACTIVE");

            let identity = conf().wait_for_state(scripted(&calls, &states)).await.unwrap();

            assert_eq!(calls.load(Ordering::SeqCst) as usize, n);
            assert_eq!(identity as usize, n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_refresh_is_immediate() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        conf()
            .wait_for_state(scripted(&calls, &["ACTIVE"]))
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);

        let calls = AtomicU32::new(0);
        let started = Instant::now();
        conf()
            .wait_for_state(scripted(&calls, &["BUILD", "BUILD", "ACTIVE"]))
            .await
            .unwrap();
        // delay, then min interval
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinguishable() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let err = conf()
            .with_timeout(Duration::from_secs(60))
            .wait_for_state(scripted(&calls, &["BUILD"]))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_secs(60));
        match err {
            CloudError::Convergence {
                reason: ConvergenceError::Timeout { last_state, .. },
                ..
            } => assert_eq!(last_state.as_deref(), Some("BUILD")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlisted_state_policies() {
        let calls = AtomicU32::new(0);
        let err = conf()
            .wait_for_state(scripted(&calls, &["BUILD", "RESCUE"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CloudError::Convergence {
                reason: ConvergenceError::UnexpectedState { .. },
                ..
            }
        ));
        assert!(!err.is_timeout());

        let calls = AtomicU32::new(0);
        let identity = StateChangeConf::new("volume v-1")
            .with_target(&["available"])
            .with_unlisted(UnlistedState::KeepWaiting)
            .wait_for_state(scripted(&calls, &["creating", "attaching", "available"]))
            .await
            .unwrap();
        assert_eq!(identity, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_state_ends_wait() {
        let calls = AtomicU32::new(0);
        let err = conf()
            .wait_for_state(scripted(&calls, &["BUILD", "ERROR", "ACTIVE"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CloudError::Convergence {
                reason: ConvergenceError::FailureState { .. },
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_errors() {
        // terminal error is surfaced verbatim
        let calls = AtomicU32::new(0);
        let err = conf()
            .wait_for_state(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<Refresh<()>, _>(CloudError::remote("/t", ApiError::status(403, "denied"))) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::RemoteCall { ref endpoint, .. } if endpoint == "/t"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // transient errors consume the retry budget
        let calls = AtomicU32::new(0);
        let result = conf()
            .with_transient_retries(2)
            .wait_for_state(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(CloudError::remote("/t", ApiError::status(503, "busy")))
                    } else {
                        Ok(Refresh::new((), "ACTIVE"))
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let calls = AtomicU32::new(0);
        let err = conf()
            .with_transient_retries(1)
            .wait_for_state(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<Refresh<()>, _>(CloudError::remote("/t", ApiError::transport("reset"))) }
            })
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_policy() {
        let task_conf = StateChangeConf::new("task 7")
            .with_pending(&["init", "todo", "doing"])
            .with_target(&["completed"]);

        let completes = NotFoundPolicy::Completes("completed");
        let identity = task_conf
            .wait_for_state(|| async move {
                completes.recover(7u64, CloudError::remote("/task/7", ApiError::not_found("no task")))
            })
            .await
            .unwrap();
        assert_eq!(identity, 7);

        let propagate = NotFoundPolicy::Propagate;
        let err = task_conf
            .wait_for_state(|| async move {
                propagate.recover(7u64, CloudError::remote("/task/7", ApiError::not_found("no task")))
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // other errors are never turned into completion
        let err = completes
            .recover(7u64, CloudError::remote("/task/7", ApiError::status(500, "oops")))
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_target_is_rejected() {
        let err = StateChangeConf::new("nothing")
            .wait_for_state(|| async { Ok(Refresh::new((), "ok")) })
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidConfig(_)));
    }
}
