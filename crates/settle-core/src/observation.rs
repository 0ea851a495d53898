//! A single observation of a remote entity

/// Result of one successful refresh call
///
/// Observations are produced fresh on every poll tick and never reused; the
/// engines keep no memory of entity state between ticks beyond counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation<T, S> {
    /// The entity exists and reports `status`
    Present { entity: T, status: S },

    /// The entity does not exist (or is not yet visible)
    Absent,
}

impl<T, S> Observation<T, S> {
    /// Create an observation of an existing entity
    pub fn present(entity: T, status: S) -> Self {
        Observation::Present { entity, status }
    }

    /// The reported status, if the entity exists
    pub fn status(&self) -> Option<&S> {
        match self {
            Observation::Present { status, .. } => Some(status),
            Observation::Absent => None,
        }
    }

    /// Whether the entity was reported as absent
    pub fn is_absent(&self) -> bool {
        matches!(self, Observation::Absent)
    }

    /// Consume the observation, returning the entity
    pub fn into_entity(self) -> Option<T> {
        match self {
            Observation::Present { entity, .. } => Some(entity),
            Observation::Absent => None,
        }
    }
}

impl<T, S> From<Option<(T, S)>> for Observation<T, S> {
    fn from(value: Option<(T, S)>) -> Self {
        match value {
            Some((entity, status)) => Observation::Present { entity, status },
            None => Observation::Absent,
        }
    }
}
