//! # Trigger Lifecycle
//!
//! Keeps each schedule's single time-based trigger in step with its frequency.
//! A trigger is created once with its schedule and afterwards only rewritten
//! in place, so its identity survives frequency changes.

use crate::constants::TriggerType;
use crate::frequency::Frequency;
use crate::models::{IntervalFields, NewTrigger, Trigger};
use crate::persistence::{PersistenceResult, PmTransaction};
use tracing::{debug, info, warn};

/// Interval columns matching a canonical frequency
pub fn fields_for(frequency: Frequency) -> IntervalFields {
    match frequency {
        Frequency::Daily => IntervalFields::days(1),
        Frequency::Weekly => IntervalFields::weeks(1),
        Frequency::Monthly => IntervalFields::months(1),
        Frequency::Quarterly => IntervalFields::months(3),
        Frequency::Yearly => IntervalFields::months(12),
    }
}

/// Create the active trigger of a freshly inserted schedule
pub async fn create_for_schedule(
    tx: &mut dyn PmTransaction,
    schedule_id: i64,
    frequency: Frequency,
) -> PersistenceResult<Trigger> {
    let trigger = tx
        .insert_trigger(&NewTrigger {
            schedule_id,
            trigger_type: TriggerType::TimeBased,
            interval: fields_for(frequency),
            is_active: true,
        })
        .await?;

    debug!(
        schedule_id = schedule_id,
        trigger_id = trigger.id,
        frequency = %frequency,
        "Created schedule trigger"
    );
    Ok(trigger)
}

/// Bring the trigger in line with a possibly changed frequency.
///
/// An unchanged frequency leaves the trigger untouched. A changed one rewrites
/// the interval columns and clears `last_triggered` on the existing row. A
/// schedule without any trigger gets one.
pub async fn reconcile(
    tx: &mut dyn PmTransaction,
    schedule_id: i64,
    previous: Frequency,
    current: Frequency,
) -> PersistenceResult<Trigger> {
    let Some(trigger) = tx.find_trigger(schedule_id).await? else {
        warn!(schedule_id = schedule_id, "Schedule had no trigger, creating one");
        return create_for_schedule(tx, schedule_id, current).await;
    };

    if previous == current {
        return Ok(trigger);
    }

    let updated = tx
        .update_trigger_interval(trigger.id, fields_for(current))
        .await?;

    info!(
        schedule_id = schedule_id,
        trigger_id = updated.id,
        from = %previous,
        to = %current,
        "Rewrote trigger interval for frequency change"
    );
    Ok(updated)
}
