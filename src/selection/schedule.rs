use crate::model::ScheduleCandidate;

/// Picks a schedule for the chosen job
///
/// Schedules are visited in server order. Exhausted pair keys are skipped.
///
/// - no schedules: `None`
/// - one schedule: returned unless its pair is exhausted
/// - several: the first whose tags intersect `preferred_shifts`
///
/// An empty `preferred_shifts` places no constraint, so the first
/// non-exhausted schedule is taken.
pub fn select_schedule<'a, F>(
    schedules: &'a [ScheduleCandidate],
    preferred_shifts: &[String],
    is_exhausted: F,
) -> Option<&'a ScheduleCandidate>
where
    F: Fn(&str) -> bool,
{
    if let [only] = schedules {
        return (!is_exhausted(&only.pair_key())).then_some(only);
    }

    schedules.iter().find(|schedule| {
        if is_exhausted(&schedule.pair_key()) {
            tracing::trace!(key = %schedule.pair_key(), "Skipping exhausted schedule");
            return false;
        }
        preferred_shifts.is_empty() || schedule.shift_tags.intersects(preferred_shifts)
    })
}
