use bitflags::bitflags;

bitflags! {
    /// Facts recorded while translating a subset, consulted by later
    /// handlers and by the caller.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u32 {
        /// A station-type element (0 02 001) carried a value.
        const STATION_TYPE_KNOWN = 1 << 0;
    }
}

/// Working state for one subset's translation pass. The dispatcher
/// refreshes `ival` before routing each atom; everything else accumulates
/// until [`clean`](SubsetState::clean).
#[derive(Debug, Default)]
pub struct SubsetState {
    /// Integer view of the value under dispatch, what code and flag
    /// table handlers consume.
    pub ival: i64,
    /// Station type, meaningful once `STATION_TYPE_KNOWN` is set.
    pub station_type: i64,
    pub mask: StatusFlags,
}

impl SubsetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything recorded for the previous subset.
    pub fn clean(&mut self) {
        *self = SubsetState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_nothing_known() {
        let state = SubsetState::new();
        assert!(state.mask.is_empty());
        assert_eq!(state.ival, 0);
        assert_eq!(state.station_type, 0);
    }

    #[test]
    fn clean_drops_accumulated_facts() {
        let mut state = SubsetState::new();
        state.ival = 12;
        state.station_type = 1;
        state.mask |= StatusFlags::STATION_TYPE_KNOWN;

        state.clean();
        assert!(state.mask.is_empty());
        assert_eq!(state.station_type, 0);
    }
}
