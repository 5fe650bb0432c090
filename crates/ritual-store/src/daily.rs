//! Daily contact picks, memoised per user and calendar day.

use chrono::{FixedOffset, NaiveDate};
use ritual_core::care;
use ritual_core::{Contact, DailyPick};
use tracing::{debug, info, warn};

use crate::{Storage, StoreError};

/// Today's recommended contacts for `user_id`.
///
/// The first call on a given day scores the user's contacts and stores the
/// result; every later call that day returns the stored ids verbatim, even if
/// contacts changed in between. If another writer stores a pick first, that
/// pick wins and is returned.
pub async fn daily_picks(
    storage: &dyn Storage,
    user_id: &str,
    today: NaiveDate,
    tz: &FixedOffset,
) -> Result<DailyPick, StoreError> {
    if let Some(existing) = storage.get_daily_pick(user_id, today).await? {
        debug!(user_id, %today, "daily pick cache hit");
        return Ok(existing);
    }

    let contacts = storage.list_contacts(user_id).await?;
    let pick = DailyPick {
        user_id: user_id.to_string(),
        pick_date: today,
        picks: care::select_daily(&contacts, today, tz),
    };

    match storage.insert_daily_pick(&pick).await {
        Ok(()) => {
            info!(user_id, %today, count = pick.picks.len(), "stored daily pick");
            Ok(pick)
        }
        Err(StoreError::Conflict(_)) => {
            warn!(user_id, %today, "daily pick stored concurrently, using stored row");
            storage
                .get_daily_pick(user_id, today)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("daily pick for {user_id} on {today}")))
        }
        Err(err) => Err(err),
    }
}

/// Contacts named by `pick`, in pick order. Ids whose contact has since been
/// deleted are skipped.
pub fn picked_contacts<'a>(contacts: &'a [Contact], pick: &DailyPick) -> Vec<&'a Contact> {
    pick.picks
        .iter()
        .filter_map(|id| contacts.iter().find(|c| &c.id == id))
        .collect()
}
