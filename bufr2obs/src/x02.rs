//! Class 02 handlers: instrumentation and type of station.

use bufrdec::Atom;

use crate::errors::{Error, Result};
use crate::records::{ReportRecord, SectionMask};
use crate::records::{buoy::BuoyRecord, climat::ClimatRecord, synop::SynopRecord};
use crate::state::{StatusFlags, SubsetState};

/// Routes a class 02 atom to the handler for the report family.
pub(crate) fn dispatch(
    atom: &Atom,
    state: &mut SubsetState,
    record: Option<&mut ReportRecord>,
) -> Result<()> {
    match record {
        Some(ReportRecord::Synop(rec)) => synop(atom, state, rec),
        Some(ReportRecord::Buoy(rec)) => buoy(atom, state, rec),
        Some(ReportRecord::Climat(rec)) => climat(atom, state, rec),
        None => Err(Error::RecordRequired(2)),
    }
}

/// Maps the 0 02 002 flag table to the iw indicator: the
/// originally-measured-in-knots bit picks iw 4, anything else iw 1.
fn wind_indicator(ival: i64) -> &'static str {
    if ival & 4 != 0 { "4" } else { "1" }
}

fn synop(atom: &Atom, state: &mut SubsetState, rec: &mut SynopRecord) -> Result<()> {
    match atom.desc.y {
        // 0 02 001, type of station
        1 => {
            if atom.is_missing() {
                rec.s1.ix = Some("/".to_string());
                return Ok(());
            }
            state.station_type = state.ival;
            state.mask |= StatusFlags::STATION_TYPE_KNOWN;
        }
        // 0 02 002, type of instrumentation for wind measurement
        2 => {
            if atom.is_missing() {
                return Ok(());
            }
            rec.s0.iw = Some(wind_indicator(state.ival).to_string());
        }
        _ => {}
    }
    Ok(())
}

fn buoy(atom: &Atom, state: &mut SubsetState, rec: &mut BuoyRecord) -> Result<()> {
    if atom.is_missing() {
        return Ok(());
    }
    match atom.desc.y {
        // 0 02 001, type of station
        1 => {
            state.station_type = state.ival;
            state.mask |= StatusFlags::STATION_TYPE_KNOWN;
        }
        // 0 02 002, type of instrumentation for wind measurement
        2 => {
            rec.s0.iw = Some(wind_indicator(state.ival).to_string());
        }
        // 0 02 031, duration and time of current measurement. Repeated
        // descriptors within a subset must not clobber the first value.
        31 => {
            if rec.s3.k3.is_none() && state.ival < 10 {
                rec.s3.k3 = Some(state.ival.to_string());
            }
            rec.mask |= SectionMask::SEC3;
        }
        // 0 02 033, method of salinity/depth measurement
        33 => {
            rec.s3.k2 = Some(state.ival.to_string());
            rec.mask |= SectionMask::SEC3;
        }
        // 0 02 040, method of removing platform motion from current
        40 => {
            if rec.s3.k6.is_none() {
                rec.s3.k6 = Some(state.ival.to_string());
            }
            rec.mask |= SectionMask::SEC3;
        }
        _ => {}
    }
    Ok(())
}

fn climat(atom: &Atom, state: &mut SubsetState, _rec: &mut ClimatRecord) -> Result<()> {
    if atom.is_missing() {
        return Ok(());
    }
    // 0 02 001, type of station
    if atom.desc.y == 1 {
        state.station_type = state.ival;
        state.mask |= StatusFlags::STATION_TYPE_KNOWN;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::records::ReportKind;
    use bufrdec::descriptor::Descriptor;
    use bufrdec::subset::AtomFlags;

    fn send(record: &mut ReportRecord, y: u8, value: f64) {
        let atom = Atom::number(Descriptor::new(0, 2, y), value, AtomFlags::CODE_TABLE);
        let mut state = SubsetState::new();
        Dispatcher::new()
            .dispatch(&atom, &mut state, Some(record))
            .unwrap();
    }

    fn send_with_state(state: &mut SubsetState, record: &mut ReportRecord, y: u8, value: f64) {
        let atom = Atom::number(Descriptor::new(0, 2, y), value, AtomFlags::CODE_TABLE);
        Dispatcher::new()
            .dispatch(&atom, state, Some(record))
            .unwrap();
    }

    #[test]
    fn station_type_lands_in_the_state() {
        let mut state = SubsetState::new();
        let mut record = ReportRecord::new(ReportKind::Synop);
        send_with_state(&mut state, &mut record, 1, 1.0);

        assert_eq!(state.station_type, 1);
        assert!(state.mask.contains(StatusFlags::STATION_TYPE_KNOWN));
    }

    #[test]
    fn missing_station_type_on_a_synop_writes_the_ix_sentinel() {
        let atom = Atom::missing(Descriptor::new(0, 2, 1), AtomFlags::CODE_TABLE);
        let mut state = SubsetState::new();
        let mut record = ReportRecord::new(ReportKind::Synop);
        Dispatcher::new()
            .dispatch(&atom, &mut state, Some(&mut record))
            .unwrap();

        assert!(!state.mask.contains(StatusFlags::STATION_TYPE_KNOWN));
        match record {
            ReportRecord::Synop(rec) => assert_eq!(rec.s1.ix.as_deref(), Some("/")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn missing_station_type_on_a_buoy_changes_nothing() {
        let atom = Atom::missing(Descriptor::new(0, 2, 1), AtomFlags::CODE_TABLE);
        let mut state = SubsetState::new();
        let mut record = ReportRecord::new(ReportKind::Buoy);
        Dispatcher::new()
            .dispatch(&atom, &mut state, Some(&mut record))
            .unwrap();

        assert!(!state.mask.contains(StatusFlags::STATION_TYPE_KNOWN));
        match record {
            ReportRecord::Buoy(rec) => {
                assert!(rec.s0.iw.is_none());
                assert!(rec.mask.is_empty());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn missing_station_type_on_a_climat_changes_nothing() {
        let atom = Atom::missing(Descriptor::new(0, 2, 1), AtomFlags::CODE_TABLE);
        let mut state = SubsetState::new();
        let mut record = ReportRecord::new(ReportKind::Climat);
        Dispatcher::new()
            .dispatch(&atom, &mut state, Some(&mut record))
            .unwrap();
        assert!(!state.mask.contains(StatusFlags::STATION_TYPE_KNOWN));
    }

    #[test]
    fn climat_station_type_still_feeds_the_state() {
        let mut state = SubsetState::new();
        let mut record = ReportRecord::new(ReportKind::Climat);
        send_with_state(&mut state, &mut record, 1, 2.0);
        assert_eq!(state.station_type, 2);
        assert!(state.mask.contains(StatusFlags::STATION_TYPE_KNOWN));
    }

    #[test]
    fn wind_instrumentation_maps_bit_two() {
        let mut record = ReportRecord::new(ReportKind::Synop);
        send(&mut record, 2, 4.0);
        match &record {
            ReportRecord::Synop(rec) => assert_eq!(rec.s0.iw.as_deref(), Some("4")),
            _ => unreachable!(),
        }

        let mut record = ReportRecord::new(ReportKind::Synop);
        send(&mut record, 2, 3.0);
        match &record {
            ReportRecord::Synop(rec) => assert_eq!(rec.s0.iw.as_deref(), Some("1")),
            _ => unreachable!(),
        }

        // Any value with bit 2 set counts, not just 4 itself.
        let mut record = ReportRecord::new(ReportKind::Buoy);
        send(&mut record, 2, 6.0);
        match &record {
            ReportRecord::Buoy(rec) => assert_eq!(rec.s0.iw.as_deref(), Some("4")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn missing_wind_instrumentation_is_skipped() {
        let atom = Atom::missing(Descriptor::new(0, 2, 2), AtomFlags::CODE_TABLE);
        let mut state = SubsetState::new();
        let mut record = ReportRecord::new(ReportKind::Synop);
        Dispatcher::new()
            .dispatch(&atom, &mut state, Some(&mut record))
            .unwrap();
        match record {
            ReportRecord::Synop(rec) => assert!(rec.s0.iw.is_none()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn buoy_current_duration_keeps_the_first_value() {
        let mut record = ReportRecord::new(ReportKind::Buoy);
        send(&mut record, 31, 7.0);
        send(&mut record, 31, 3.0);

        match &record {
            ReportRecord::Buoy(rec) => {
                assert_eq!(rec.s3.k3.as_deref(), Some("7"));
                assert!(rec.mask.contains(SectionMask::SEC3));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn buoy_current_duration_out_of_range_still_marks_the_section() {
        let mut record = ReportRecord::new(ReportKind::Buoy);
        send(&mut record, 31, 12.0);

        match &record {
            ReportRecord::Buoy(rec) => {
                assert!(rec.s3.k3.is_none());
                assert!(rec.mask.contains(SectionMask::SEC3));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn buoy_salinity_method_overwrites() {
        let mut record = ReportRecord::new(ReportKind::Buoy);
        send(&mut record, 33, 2.0);
        send(&mut record, 33, 5.0);

        match &record {
            ReportRecord::Buoy(rec) => assert_eq!(rec.s3.k2.as_deref(), Some("5")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn buoy_platform_motion_keeps_the_first_value() {
        let mut record = ReportRecord::new(ReportKind::Buoy);
        send(&mut record, 40, 1.0);
        send(&mut record, 40, 2.0);

        match &record {
            ReportRecord::Buoy(rec) => {
                assert_eq!(rec.s3.k6.as_deref(), Some("1"));
                assert!(rec.mask.contains(SectionMask::SEC3));
            }
            _ => unreachable!(),
        }
    }
}
