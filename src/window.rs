//! Daily window assembly.
//!
//! [`DailyWindowAssembler`] walks a [`RawSeries`] one calendar day at a time
//! and lays each day onto a fixed cadence grid of `86400 / integration_time`
//! slots. Slots without an exactly matching record are missing. The series is
//! sorted once at ingest, so each day is extracted by binary search in time
//! proportional to the window rather than the whole series.

use crate::constants::{SECONDS_PER_DAY, fields};
use crate::models::{FieldArray, FieldSet, RawRecord, RawSeries};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::debug;

/// Where the assembler is in its walk over the series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Next call to `advance` builds this day; `None` means the first day in the series
    Positioned(Option<NaiveDate>),
    /// A terminal window has been produced; nothing more to emit
    Exhausted,
}

/// One calendar day on the cadence grid, borrowing records from the series.
#[derive(Debug, Clone)]
pub struct DayWindow<'a> {
    date: NaiveDate,
    start: NaiveDateTime,
    step_seconds: u32,
    bins: usize,
    legacy_columns: &'a [String],
    slots: Vec<Option<&'a RawRecord>>,
}

impl<'a> DayWindow<'a> {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Timestamp of the first slot (local midnight)
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn step_seconds(&self) -> u32 {
        self.step_seconds
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Number of slots; constant for a given integration time
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Option<&'a RawRecord>] {
        &self.slots
    }

    /// Slots backed by a real record
    pub fn observed(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn slot_time(&self, index: usize) -> NaiveDateTime {
        self.start + Duration::seconds(index as i64 * i64::from(self.step_seconds))
    }

    /// Drop counts as a row-major `time x bins` buffer, NaN on missing rows
    pub fn counts(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.slots.len() * self.bins);
        for slot in &self.slots {
            match slot {
                Some(record) => values.extend_from_slice(&record.counts),
                None => values.extend(std::iter::repeat_n(f64::NAN, self.bins)),
            }
        }
        values
    }

    /// Per-slot sampling interval, NaN on missing rows
    pub fn intervals(&self) -> Vec<f64> {
        self.slots
            .iter()
            .map(|s| s.map_or(f64::NAN, |r| r.interval))
            .collect()
    }

    /// Pass-through columns as time series keyed by column name
    pub fn legacy_fields(&self) -> FieldSet {
        self.legacy_columns
            .iter()
            .enumerate()
            .map(|(column, name)| {
                let values = self
                    .slots
                    .iter()
                    .map(|s| s.map_or(f64::NAN, |r| r.legacy[column]))
                    .collect();
                (name.clone(), FieldArray::series(values))
            })
            .collect()
    }

    /// `base_time`, `time_offset` and `time` for this window.
    ///
    /// The first slot sits at midnight, so the offset from `base_time` and
    /// the seconds since midnight coincide.
    pub fn time_fields(&self) -> FieldSet {
        let base_time = self.start.and_utc().timestamp() as f64;
        let offsets: Vec<f64> = (0..self.slots.len())
            .map(|i| (i as u64 * u64::from(self.step_seconds)) as f64)
            .collect();

        let mut set = FieldSet::new();
        set.insert(fields::BASE_TIME.to_string(), FieldArray::scalar(base_time));
        set.insert(
            fields::TIME_OFFSET.to_string(),
            FieldArray::series(offsets.clone()),
        );
        set.insert(fields::TIME.to_string(), FieldArray::series(offsets));
        set
    }
}

/// Output of one `advance` call.
///
/// When `terminal` is set the window lies past the end of the data and must
/// not be written in batch runs.
#[derive(Debug)]
pub struct WindowStep<'a> {
    pub window: DayWindow<'a>,
    pub terminal: bool,
}

/// Cursor-driven day-by-day walk over a raw series
#[derive(Debug)]
pub struct DailyWindowAssembler<'a> {
    series: &'a RawSeries,
    integration_time: u32,
    bins: usize,
    state: AssemblerState,
}

impl<'a> DailyWindowAssembler<'a> {
    /// `start` of `None` begins at the date of the first record
    pub fn new(
        series: &'a RawSeries,
        integration_time: u32,
        bins: usize,
        start: Option<NaiveDate>,
    ) -> Self {
        Self {
            series,
            integration_time,
            bins,
            state: AssemblerState::Positioned(start),
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn slots_per_day(&self) -> usize {
        (SECONDS_PER_DAY / self.integration_time) as usize
    }

    /// Build the window at the cursor and move the cursor one day on.
    ///
    /// Returns `None` once exhausted, or straight away for an empty series
    /// with no explicit start date.
    pub fn advance(&mut self) -> Option<WindowStep<'a>> {
        let cursor = match self.state {
            AssemblerState::Exhausted => return None,
            AssemblerState::Positioned(Some(date)) => date,
            AssemblerState::Positioned(None) => match self.series.first_timestamp() {
                Some(first) => first.date(),
                None => {
                    self.state = AssemblerState::Exhausted;
                    return None;
                }
            },
        };

        let window = self.extract(cursor);
        let terminal = self
            .series
            .last_timestamp()
            .is_none_or(|last| window.start > last);

        self.state = match (terminal, cursor.succ_opt()) {
            (false, Some(next)) => AssemblerState::Positioned(Some(next)),
            _ => AssemblerState::Exhausted,
        };

        Some(WindowStep { window, terminal })
    }

    fn extract(&self, date: NaiveDate) -> DayWindow<'a> {
        let start = date.and_time(chrono::NaiveTime::MIN);
        let day_end = start + Duration::seconds(i64::from(SECONDS_PER_DAY));
        let step = i64::from(self.integration_time);

        let records = self.series.records();
        let lo = self.series.lower_bound(start);
        let hi = self.series.lower_bound(day_end);

        let mut slots = vec![None; self.slots_per_day()];
        let mut off_grid = 0usize;
        for record in &records[lo..hi] {
            let offset = (record.timestamp - start).num_seconds();
            if offset % step == 0 {
                slots[(offset / step) as usize] = Some(record);
            } else {
                off_grid += 1;
            }
        }

        let window = DayWindow {
            date,
            start,
            step_seconds: self.integration_time,
            bins: self.bins,
            legacy_columns: self.series.legacy_columns(),
            slots,
        };

        debug!(
            "Assembled {}: {} of {} slots observed, {} off-grid records ignored",
            date,
            window.observed(),
            window.len(),
            off_grid
        );
        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn record(ts: &str, counts: [f64; 2]) -> RawRecord {
        RawRecord {
            timestamp: at(ts),
            interval: 60.0,
            counts: counts.to_vec(),
            legacy: vec![1.5],
        }
    }

    fn series(records: Vec<RawRecord>) -> RawSeries {
        RawSeries::new(records, vec!["RI".to_string()])
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_window_length_is_fixed_regardless_of_sparsity() {
        let sparse = series(vec![record("2023-01-02 12:00:00", [1.0, 0.0])]);
        for step in [10u32, 60, 300] {
            let mut assembler = DailyWindowAssembler::new(&sparse, step, 2, None);
            let first = assembler.advance().unwrap();
            assert_eq!(first.window.len(), (86_400 / step) as usize);
            assert_eq!(first.window.observed(), 1);
        }

        // A date with no data at all still yields a full-length window
        let mut assembler = DailyWindowAssembler::new(&sparse, 60, 2, Some(date("2022-12-25")));
        let step = assembler.advance().unwrap();
        assert_eq!(step.window.len(), 1440);
        assert_eq!(step.window.observed(), 0);
        assert!(!step.terminal);
    }

    #[test]
    fn test_records_land_on_their_slots() {
        let data = series(vec![
            record("2023-01-02 00:00:00", [3.0, 1.0]),
            record("2023-01-02 00:02:00", [4.0, 0.0]),
            record("2023-01-02 00:02:30", [9.0, 9.0]),
        ]);
        let mut assembler = DailyWindowAssembler::new(&data, 60, 2, None);
        let window = assembler.advance().unwrap().window;

        assert_eq!(window.date(), date("2023-01-02"));
        assert_eq!(window.start(), at("2023-01-02 00:00:00"));
        assert!(window.slots()[0].is_some());
        assert!(window.slots()[1].is_none());
        assert_eq!(window.slots()[2].unwrap().counts[0], 4.0);
        assert_eq!(window.observed(), 2);
        assert_eq!(window.slot_time(2), at("2023-01-02 00:02:00"));

        let counts = window.counts();
        assert_eq!(counts.len(), 1440 * 2);
        assert_eq!(&counts[0..2], &[3.0, 1.0]);
        assert!(counts[2].is_nan() && counts[3].is_nan());

        let intervals = window.intervals();
        assert_eq!(intervals[0], 60.0);
        assert!(intervals[1].is_nan());

        let legacy = window.legacy_fields();
        assert_eq!(legacy["RI"].values()[0], 1.5);
        assert!(legacy["RI"].values()[1].is_nan());
    }

    #[test]
    fn test_walks_days_until_terminal() {
        let data = series(vec![
            record("2023-01-02 23:59:00", [1.0, 0.0]),
            record("2023-01-04 00:00:00", [1.0, 0.0]),
        ]);
        let mut assembler = DailyWindowAssembler::new(&data, 60, 2, None);

        let mut dates = Vec::new();
        loop {
            let step = assembler.advance().unwrap();
            if step.terminal {
                assert_eq!(step.window.date(), date("2023-01-05"));
                break;
            }
            dates.push(step.window.date());
        }
        assert_eq!(
            dates,
            vec![date("2023-01-02"), date("2023-01-03"), date("2023-01-04")]
        );
        assert_eq!(assembler.state(), AssemblerState::Exhausted);
        assert!(assembler.advance().is_none());
    }

    #[test]
    fn test_start_after_last_record_is_terminal() {
        let data = series(vec![record("2023-01-02 00:00:00", [1.0, 0.0])]);
        let mut assembler = DailyWindowAssembler::new(&data, 60, 2, Some(date("2023-02-01")));
        assert!(assembler.advance().unwrap().terminal);
    }

    #[test]
    fn test_time_fields() {
        let data = series(vec![record("2023-01-02 00:00:00", [1.0, 0.0])]);
        let window = DailyWindowAssembler::new(&data, 60, 2, None)
            .advance()
            .unwrap()
            .window;
        let time = window.time_fields();

        assert_eq!(time[fields::BASE_TIME].values(), &[1_672_617_600.0]);
        assert_eq!(time[fields::TIME_OFFSET].values()[1], 60.0);
        assert_eq!(time[fields::TIME].values()[1439], 86_340.0);
    }

    #[test]
    fn test_empty_series_is_exhausted() {
        let empty = RawSeries::default();
        let mut assembler = DailyWindowAssembler::new(&empty, 60, 2, None);
        assert!(assembler.advance().is_none());
        assert_eq!(assembler.state(), AssemblerState::Exhausted);
    }
}
