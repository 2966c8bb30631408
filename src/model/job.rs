use std::fmt;

/// An ordered set of shift tags
///
/// The remote API joins a job's work-schedule types with semicolons
/// (`"FULL_TIME;FLEX_TIME"`). This type holds them split, trimmed and
/// de-duplicated while keeping first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftTags(Vec<String>);

impl ShiftTags {
    /// Creates an empty tag set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parses a semicolon-delimited tag list
    ///
    /// Empty segments are dropped, so `""` and `";;"` both parse to an empty set.
    ///
    /// # Examples
    ///
    /// ```
    /// use shiftwatch::model::ShiftTags;
    ///
    /// let tags = ShiftTags::parse("FULL_TIME; FLEX_TIME;FULL_TIME");
    /// assert_eq!(tags.len(), 2);
    /// assert!(tags.contains("FLEX_TIME"));
    /// ```
    pub fn parse(raw: &str) -> Self {
        raw.split(';').collect()
    }

    /// Inserts a tag, returning false if it was already present
    pub fn insert(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.contains(tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Returns true if any tag appears in `wanted`
    pub fn intersects(&self, wanted: &[String]) -> bool {
        self.0.iter().any(|t| wanted.contains(t))
    }

    /// Returns the smallest index in `wanted` of any tag in this set
    pub fn best_rank(&self, wanted: &[String]) -> Option<usize> {
        wanted.iter().position(|w| self.contains(w))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for ShiftTags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = ShiftTags::new();
        for tag in iter {
            tags.insert(tag.as_ref());
        }
        tags
    }
}

impl fmt::Display for ShiftTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(";"))
    }
}

/// A job returned by one search poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCandidate {
    pub id: String,
    pub shift_tags: ShiftTags,
    pub city_name: String,
    /// Position in the server response, used as the final tie-break
    pub original_index: usize,
}

impl JobCandidate {
    pub fn new(
        id: impl Into<String>,
        shift_tags: ShiftTags,
        city_name: impl Into<String>,
        original_index: usize,
    ) -> Self {
        Self {
            id: id.into(),
            shift_tags,
            city_name: city_name.into(),
            original_index,
        }
    }
}

/// A schedule offered for a single job
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleCandidate {
    pub job_id: String,
    pub schedule_id: String,
    pub shift_tags: ShiftTags,
    pub hours_per_week: Option<f64>,
}

impl ScheduleCandidate {
    /// The exhaustion key for this job/schedule pair
    pub fn pair_key(&self) -> String {
        pair_key(&self.job_id, &self.schedule_id)
    }
}

/// Builds the `"jobId-scheduleId"` exhaustion key
pub fn pair_key(job_id: &str, schedule_id: &str) -> String {
    format!("{}-{}", job_id, schedule_id)
}
