//! Post-attempt limit checks for tasks that did not complete.

use crate::error::{LimitExceeded, LimitKind};

/// Thresholds and expectations checked after an incomplete attempt.
///
/// `G` is the guard factory type; the engine uses a closure pair that
/// snapshots state before the attempt and checks it afterwards.
#[derive(Clone, Debug)]
pub struct Limit<G> {
    /// Hard cap on attempts.
    pub tries: Option<u32>,
    /// Cap on turns spent at the task's location.
    pub turns: Option<u32>,
    /// Attempt cap worded as likely bad luck.
    pub soft: Option<u32>,
    /// The task should have become unready.
    pub unready: bool,
    /// The task should have become completed.
    pub completed: bool,
    pub guard: Option<G>,
    /// Appended to every limit message.
    pub message: Option<String>,
}

impl<G> Default for Limit<G> {
    fn default() -> Self {
        Self {
            tries: None,
            turns: None,
            soft: None,
            unready: false,
            completed: false,
            guard: None,
            message: None,
        }
    }
}

impl<G> Limit<G> {
    pub fn tries(tries: u32) -> Self {
        Self {
            tries: Some(tries),
            ..Self::default()
        }
    }

    pub fn turns(turns: u32) -> Self {
        Self {
            turns: Some(turns),
            ..Self::default()
        }
    }

    pub fn soft(soft: u32) -> Self {
        Self {
            soft: Some(soft),
            ..Self::default()
        }
    }

    pub fn unready() -> Self {
        Self {
            unready: true,
            ..Self::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            completed: true,
            ..Self::default()
        }
    }

    pub fn with_guard(mut self, guard: G) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// What the engine observed after an attempt that left the task incomplete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    /// Attempts recorded so far, including this one.
    pub attempts: u32,
    /// Turns spent at the task's location; `None` if the body is a callback.
    pub turns_spent: Option<u32>,
    /// Whether the task still reports ready.
    pub still_ready: bool,
    /// Guard postcondition result, if the task has a guard.
    pub guard_passed: Option<bool>,
}

/// Check limits in a fixed order and report the first violation.
pub fn check_limits<G>(
    task: &str,
    limit: &Limit<G>,
    observed: &Observation,
) -> Result<(), LimitExceeded> {
    let violation = if let Some(tries) = limit.tries.filter(|&t| observed.attempts >= t) {
        Some(LimitKind::Tries(tries))
    } else if let Some(soft) = limit.soft.filter(|&s| observed.attempts >= s) {
        Some(LimitKind::Soft(soft))
    } else if let Some(turns) = limit
        .turns
        .filter(|&t| observed.turns_spent.is_some_and(|spent| spent >= t))
    {
        Some(LimitKind::Turns(turns))
    } else if limit.unready && observed.still_ready {
        Some(LimitKind::Unready)
    } else if limit.completed {
        Some(LimitKind::Completed)
    } else if observed.guard_passed == Some(false) {
        Some(LimitKind::Guard)
    } else {
        None
    };

    match violation {
        Some(kind) => Err(LimitExceeded {
            task: task.to_string(),
            kind,
            message: limit.message.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(attempts: u32) -> Observation {
        Observation {
            attempts,
            ..Observation::default()
        }
    }

    #[test]
    fn tries_trip_at_threshold() {
        let limit = Limit::<()>::tries(3);
        assert!(check_limits("t", &limit, &observed(2)).is_ok());
        let err = check_limits("t", &limit, &observed(3)).expect_err("limit");
        assert_eq!(err.kind, LimitKind::Tries(3));
        assert!(err.to_string().contains("did not complete within 3 attempts"));
    }

    #[test]
    fn turns_only_apply_to_location_bodies() {
        let limit = Limit::<()>::turns(5);
        let callback = Observation {
            attempts: 9,
            turns_spent: None,
            ..Observation::default()
        };
        assert!(check_limits("t", &limit, &callback).is_ok());

        let location = Observation {
            turns_spent: Some(5),
            ..callback
        };
        let err = check_limits("t", &limit, &location).expect_err("limit");
        assert_eq!(err.kind, LimitKind::Turns(5));
    }

    #[test]
    fn unready_trips_while_still_ready() {
        let limit = Limit::<()>::unready();
        let ready = Observation {
            still_ready: true,
            ..observed(1)
        };
        assert_eq!(
            check_limits("t", &limit, &ready).expect_err("limit").kind,
            LimitKind::Unready
        );
        assert!(check_limits("t", &limit, &observed(1)).is_ok());
    }

    #[test]
    fn completed_expectation_always_trips() {
        let limit = Limit::<()>::completed().with_message("Expected a drop.");
        let err = check_limits("t", &limit, &observed(1)).expect_err("limit");
        assert_eq!(err.kind, LimitKind::Completed);
        assert!(err.to_string().ends_with("Expected a drop."));
    }

    #[test]
    fn failed_guard_trips_after_other_limits() {
        let limit = Limit::<()>::tries(10);
        let failed = Observation {
            guard_passed: Some(false),
            ..observed(1)
        };
        assert_eq!(
            check_limits("t", &limit, &failed).expect_err("limit").kind,
            LimitKind::Guard
        );

        let passed = Observation {
            guard_passed: Some(true),
            ..observed(1)
        };
        assert!(check_limits("t", &limit, &passed).is_ok());
    }
}
