use crate::model::{Filter, JobCandidate};

/// Rank given to a dimension the candidate does not satisfy
const UNMATCHED: usize = usize::MAX;

/// Composite ranking key for a job candidate
///
/// Compared lexicographically, smallest wins. `original_index` is the final
/// tie-break so the ordering is total and stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score {
    pub shift: usize,
    pub city: usize,
    pub original_index: usize,
}

impl Score {
    pub fn shift_matched(&self) -> bool {
        self.shift != UNMATCHED
    }
}

/// Scores one candidate against a filter
pub fn score_candidate(candidate: &JobCandidate, filter: &Filter) -> Score {
    let shift = if filter.shifts.is_empty() {
        0
    } else if filter.shifts_prioritized {
        candidate
            .shift_tags
            .best_rank(&filter.shifts)
            .unwrap_or(UNMATCHED)
    } else if candidate.shift_tags.intersects(&filter.shifts) {
        0
    } else {
        UNMATCHED
    };

    let city = if filter.cities.is_empty() {
        0
    } else {
        match city_position(&candidate.city_name, &filter.cities) {
            Some(index) if filter.cities_prioritized => index,
            Some(_) => 0,
            None => UNMATCHED,
        }
    };

    Score {
        shift,
        city,
        original_index: candidate.original_index,
    }
}

fn city_position(city: &str, cities: &[String]) -> Option<usize> {
    let city = city.trim();
    cities
        .iter()
        .position(|wanted| wanted.trim().eq_ignore_ascii_case(city))
}

/// Selects the best job for a filter
///
/// # Rules
///
/// | Input | Result |
/// |-------|--------|
/// | no candidates | `None` |
/// | one candidate | that candidate, if it shares a tag with a non-empty shift filter |
/// | empty shifts and cities | first candidate by original order |
/// | otherwise | lowest `(shift, city, original_index)` score |
///
/// A candidate that misses every wanted shift never wins: if the best score
/// has an unmatched shift rank, the candidates are rescanned in original
/// order for any shift match, ignoring cities, and `None` is returned when
/// there is none.
///
/// # Examples
///
/// ```
/// use shiftwatch::model::{Filter, JobCandidate, ShiftTags};
/// use shiftwatch::selection::select_best_job;
///
/// let candidates = vec![
///     JobCandidate::new("a", ShiftTags::parse("FULL_TIME"), "X", 0),
///     JobCandidate::new("b", ShiftTags::parse("FLEX_TIME"), "Y", 1),
/// ];
/// let filter = Filter {
///     shifts: vec!["FLEX_TIME".into(), "FULL_TIME".into()],
///     shifts_prioritized: true,
///     ..Filter::default()
/// };
///
/// assert_eq!(select_best_job(&candidates, &filter), Some("b"));
/// ```
pub fn select_best_job<'a>(candidates: &'a [JobCandidate], filter: &Filter) -> Option<&'a str> {
    match candidates {
        [] => return None,
        [only] => {
            if filter.shifts.is_empty() || only.shift_tags.intersects(&filter.shifts) {
                return Some(only.id.as_str());
            }
            return None;
        }
        _ => {}
    }

    if filter.is_unconstrained() {
        return candidates
            .iter()
            .min_by_key(|c| c.original_index)
            .map(|c| c.id.as_str());
    }

    let (best, score) = candidates
        .iter()
        .map(|c| (c, score_candidate(c, filter)))
        .min_by_key(|(_, score)| *score)?;

    tracing::trace!(
        job_id = %best.id,
        shift = score.shift,
        city = score.city,
        "Best scored candidate"
    );

    if !filter.shifts.is_empty() && !score.shift_matched() {
        let mut by_index: Vec<&JobCandidate> = candidates.iter().collect();
        by_index.sort_by_key(|c| c.original_index);
        return by_index
            .into_iter()
            .find(|c| c.shift_tags.intersects(&filter.shifts))
            .map(|c| c.id.as_str());
    }

    Some(best.id.as_str())
}
