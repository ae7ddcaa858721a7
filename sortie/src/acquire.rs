//! Item acquisition and effect upkeep before a task runs.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::songs::{SongPlan, plan_songs};
use crate::core::types::Effect;
use crate::error::{AcquisitionFailure, EffectCapExceeded};
use crate::io::session::Session;
use crate::task::AcquireItem;

/// Make sure every requested item is owned in the requested quantity.
///
/// Strategies, first applicable wins: the item's own getter, a capped
/// purchase, folding a related item, then generic retrieval.
#[instrument(skip_all, fields(task = %task))]
pub fn acquire_items(session: &mut dyn Session, task: &str, items: &[AcquireItem]) -> Result<()> {
    for request in items {
        let have = session.owned(&request.item);
        if have >= request.num {
            continue;
        }
        if request.useful.as_ref().is_some_and(|useful| !useful(&*session)) {
            debug!(item = %request.item, "skipping acquisition, not useful");
            continue;
        }

        let deficit = request.num - have;
        info!(item = %request.item, deficit, "acquiring");
        if let Some(get) = &request.get {
            get(&mut *session).with_context(|| format!("acquire {}", request.item))?;
        } else if let Some(price) = request.price {
            session
                .buy(&request.item, deficit, price)
                .with_context(|| format!("buy {}", request.item))?;
        } else if !session.fold(&request.item)? || session.owned(&request.item) < request.num {
            let remaining = request.num.saturating_sub(session.owned(&request.item));
            session
                .retrieve(&request.item, remaining)
                .with_context(|| format!("retrieve {}", request.item))?;
        }

        let have = session.owned(&request.item);
        if have < request.num {
            if request.optional {
                warn!(item = %request.item, have, needed = request.num, "optional item missing");
                continue;
            }
            return Err(AcquisitionFailure {
                task: task.to_string(),
                item: request.item.clone(),
                needed: request.num,
                have,
            }
            .into());
        }
    }
    Ok(())
}

/// Bring up every requested effect, dropping other songs to stay under the cap.
#[instrument(skip_all, fields(task = %task, song_limit))]
pub fn ensure_effects(
    session: &mut dyn Session,
    task: &str,
    effects: &[Effect],
    song_limit: usize,
) -> Result<()> {
    let requested: Vec<Effect> = effects
        .iter()
        .filter(|e| session.is_song(e))
        .cloned()
        .collect();
    let active: Vec<Effect> = session
        .active_effects()
        .into_iter()
        .filter(|e| session.is_song(e))
        .collect();

    match plan_songs(&requested, &active, song_limit) {
        SongPlan::TooMany { requested, limit } => {
            return Err(EffectCapExceeded {
                task: task.to_string(),
                requested: requested.len(),
                limit,
                songs: requested,
            }
            .into());
        }
        SongPlan::Fits { shrug } => {
            for song in shrug {
                debug!(effect = %song, "shrugging song");
                session.shrug(&song)?;
            }
        }
    }

    for effect in effects {
        session
            .ensure_effect(effect)
            .with_context(|| format!("ensure effect {}", effect))?;
    }
    Ok(())
}
