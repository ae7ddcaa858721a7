//! Planning for the capped "song" effect category.

use crate::core::types::Effect;

/// Result of fitting requested songs under the concurrent cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongPlan {
    /// Shrug these active songs (in order) before applying effects.
    Fits { shrug: Vec<Effect> },
    /// The requested songs alone exceed the cap.
    TooMany { requested: Vec<Effect>, limit: usize },
}

/// Decide which active, unrequested songs to drop so that requested songs fit.
///
/// `active_songs` is the list of currently active song effects. Songs are
/// removed from the end of that list first.
pub fn plan_songs(requested: &[Effect], active_songs: &[Effect], limit: usize) -> SongPlan {
    if requested.len() > limit {
        return SongPlan::TooMany {
            requested: requested.to_vec(),
            limit,
        };
    }

    let mut extra: Vec<Effect> = active_songs
        .iter()
        .filter(|song| !requested.contains(song))
        .cloned()
        .collect();
    let mut shrug = Vec::new();
    while requested.len() + extra.len() > limit {
        match extra.pop() {
            Some(song) => shrug.push(song),
            None => break,
        }
    }
    SongPlan::Fits { shrug }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effects(names: &[&str]) -> Vec<Effect> {
        names.iter().map(|n| Effect::new(*n)).collect()
    }

    #[test]
    fn rejects_more_songs_than_the_cap() {
        let plan = plan_songs(&effects(&["a", "b", "c", "d"]), &[], 3);
        assert_eq!(
            plan,
            SongPlan::TooMany {
                requested: effects(&["a", "b", "c", "d"]),
                limit: 3
            }
        );
    }

    #[test]
    fn shrugs_unrequested_songs_until_fit() {
        let plan = plan_songs(&effects(&["a", "b"]), &effects(&["a", "x", "y"]), 3);
        assert_eq!(
            plan,
            SongPlan::Fits {
                shrug: effects(&["y"])
            }
        );
    }

    #[test]
    fn keeps_everything_when_under_cap() {
        let plan = plan_songs(&effects(&["a"]), &effects(&["x"]), 4);
        assert_eq!(plan, SongPlan::Fits { shrug: Vec::new() });
    }
}
