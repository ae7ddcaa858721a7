//! Deterministic dependency-gated task selection.

use crate::error::ConfigurationError;

/// Anything that can be scheduled by name with direct dependencies.
pub trait Scheduled {
    fn name(&self) -> &str;
    fn after(&self) -> &[String];
}

/// True if `task` may run now.
///
/// Only the task's direct dependencies are consulted; a dependency's own
/// dependencies do not matter once it reports completed.
pub fn is_available<T, C, R>(
    tasks: &[T],
    task: &T,
    completed: &C,
    ready: &R,
) -> Result<bool, ConfigurationError>
where
    T: Scheduled,
    C: Fn(&T) -> bool,
    R: Fn(&T) -> bool,
{
    if completed(task) {
        return Ok(false);
    }
    for dependency in task.after() {
        let found = tasks
            .iter()
            .find(|t| t.name() == dependency)
            .ok_or_else(|| ConfigurationError::UnknownDependency {
                task: task.name().to_string(),
                dependency: dependency.clone(),
            })?;
        if !completed(found) {
            return Ok(false);
        }
    }
    Ok(ready(task))
}

/// First available task in declaration order, or `None` if nothing can run.
pub fn next_available<'a, T, C, R>(
    tasks: &'a [T],
    completed: C,
    ready: R,
) -> Result<Option<&'a T>, ConfigurationError>
where
    T: Scheduled,
    C: Fn(&T) -> bool,
    R: Fn(&T) -> bool,
{
    for task in tasks {
        if is_available(tasks, task, &completed, &ready)? {
            return Ok(Some(task));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Stub {
        name: String,
        after: Vec<String>,
        done: bool,
        ready: bool,
    }

    impl Scheduled for Stub {
        fn name(&self) -> &str {
            &self.name
        }
        fn after(&self) -> &[String] {
            &self.after
        }
    }

    fn stub(name: &str, after: &[&str], done: bool) -> Stub {
        Stub {
            name: name.to_string(),
            after: after.iter().map(|a| a.to_string()).collect(),
            done,
            ready: true,
        }
    }

    fn next(tasks: &[Stub]) -> Option<&str> {
        next_available(tasks, |t| t.done, |t| t.ready)
            .expect("select")
            .map(|t| t.name.as_str())
    }

    #[test]
    fn waits_for_dependencies_in_declaration_order() {
        let mut tasks = vec![stub("A", &["B"], false), stub("B", &[], false)];
        assert_eq!(next(&tasks), Some("B"));
        tasks[1].done = true;
        assert_eq!(next(&tasks), Some("A"));
        tasks[0].done = true;
        assert_eq!(next(&tasks), None);
    }

    #[test]
    fn dependencies_are_not_transitive() {
        let tasks = vec![
            stub("A", &["B"], false),
            stub("B", &["C"], true),
            stub("C", &[], false),
        ];
        assert_eq!(next(&tasks), Some("A"));
    }

    #[test]
    fn unready_tasks_are_skipped() {
        let mut tasks = vec![stub("A", &[], false), stub("B", &[], false)];
        tasks[0].ready = false;
        assert_eq!(next(&tasks), Some("B"));
    }

    #[test]
    fn unknown_dependency_is_a_configuration_error() {
        let tasks = vec![stub("A", &["Nope"], false)];
        let err = next_available(&tasks, |t| t.done, |t| t.ready).expect_err("unknown");
        assert_eq!(
            err,
            ConfigurationError::UnknownDependency {
                task: "A".to_string(),
                dependency: "Nope".to_string()
            }
        );
    }

    #[test]
    fn completed_task_is_never_available() {
        let tasks = vec![stub("A", &["Nope"], true)];
        assert!(!is_available(&tasks, &tasks[0], &|t: &Stub| t.done, &|_: &Stub| true).expect("check"));
    }
}
