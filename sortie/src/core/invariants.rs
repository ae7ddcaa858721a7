//! Task list invariants checked before a run starts.

use std::collections::HashSet;

/// Check a task list, given as `(name, after)` pairs in declaration order:
/// - No duplicate names
/// - Every `after` entry names a task in the list
/// - No task depends on itself
pub fn validate_task_graph<A: AsRef<[String]>>(tasks: &[(String, A)]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for (name, _) in tasks {
        if !seen.insert(name.as_str()) {
            errors.push(format!("duplicate task name '{}'", name));
        }
    }

    for (name, after) in tasks {
        for dependency in after.as_ref() {
            if dependency == name {
                errors.push(format!("task '{}' depends on itself", name));
            } else if !seen.contains(dependency.as_str()) {
                errors.push(format!(
                    "unknown task dependency '{}' of '{}'",
                    dependency, name
                ));
            }
        }
    }
    errors
}
