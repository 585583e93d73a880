//! CSV recording of crash and exit events and of per-frame aggregates
//!
//! Row layout per event:
//! `frame,car_id,car_x,car_v,car_a,car_t_d,f_car_id,b_car_id` for crashes,
//! with `avg_v,avg_a` appended for exits. Missing neighbors are written as
//! `-1`. Frame rows follow [`FRAME_HEADER`].

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;

use crate::simulation::{CarEvent, RoadObserver, RoadSnapshot};

const EVENT_HEADER: [&str; 8] = [
    "frame", "car_id", "car_x", "car_v", "car_a", "car_t_d", "f_car_id", "b_car_id",
];

/// Columns of a [`FrameLog`] row. Velocities are in km/h.
pub const FRAME_HEADER: [&str; 8] = [
    "frame",
    "cars",
    "all_cars",
    "crashes",
    "all_crashes",
    "avg_v",
    "avg_a",
    "avg_t_d",
];

/// A [`RoadObserver`] writing crash and exit rows to two CSV sinks.
///
/// Observer callbacks can't fail, so the first write error is kept and
/// handed out by [`take_error`](Self::take_error).
pub struct CsvRecorder<W: Write> {
    crashes: Writer<W>,
    exits: Writer<W>,
    precision: u32,
    last_error: Option<csv::Error>,
}

impl CsvRecorder<File> {
    /// Create (or truncate) both files and write their headers
    pub fn create(crash_path: &Path, exit_path: &Path, precision: u32) -> Result<Self> {
        let crashes = File::create(crash_path)
            .with_context(|| format!("Failed to create {}", crash_path.display()))?;
        let exits = File::create(exit_path)
            .with_context(|| format!("Failed to create {}", exit_path.display()))?;
        Self::new(crashes, exits, precision)
    }
}

impl<W: Write> CsvRecorder<W> {
    /// `precision` converts event ticks into frames
    pub fn new(crash_sink: W, exit_sink: W, precision: u32) -> Result<Self> {
        let mut crashes = Writer::from_writer(crash_sink);
        crashes.write_record(EVENT_HEADER)?;

        let mut exits = Writer::from_writer(exit_sink);
        exits.write_record(EVENT_HEADER.iter().chain(["avg_v", "avg_a"].iter()))?;

        Ok(Self {
            crashes,
            exits,
            precision: precision.max(1),
            last_error: None,
        })
    }

    pub fn take_error(&mut self) -> Option<csv::Error> {
        self.last_error.take()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.crashes.flush().context("Failed to flush crash log")?;
        self.exits.flush().context("Failed to flush exit log")?;
        Ok(())
    }

    /// Flush and return the two sinks (crashes, exits)
    pub fn into_inner(self) -> Result<(W, W)> {
        let crashes = self
            .crashes
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush crash log: {}", e.error()))?;
        let exits = self
            .exits
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush exit log: {}", e.error()))?;
        Ok((crashes, exits))
    }

    fn event_fields(&self, event: &CarEvent) -> Vec<String> {
        vec![
            (event.tick / self.precision as u64).to_string(),
            event.id.0.to_string(),
            format!("{:.3}", event.position),
            format!("{:.3}", event.velocity),
            format!("{:.3}", event.acceleration),
            format!("{:.2}", event.trip_time),
            event.front_id().to_string(),
            event.back_id().to_string(),
        ]
    }

    fn store_err(&mut self, result: csv::Result<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: Write> RoadObserver for CsvRecorder<W> {
    fn on_crash(&mut self, event: &CarEvent) {
        let row = self.event_fields(event);
        let result = self.crashes.write_record(&row);
        self.store_err(result);
    }

    fn on_exit(&mut self, event: &CarEvent) {
        let mut row = self.event_fields(event);
        row.push(format!("{:.3}", event.avg_velocity));
        row.push(format!("{:.3}", event.avg_acceleration));
        let result = self.exits.write_record(&row);
        self.store_err(result);
    }
}

/// One aggregate row per frame, built from [`RoadSnapshot`]s
pub struct FrameLog<W: Write> {
    writer: Writer<W>,
}

impl FrameLog<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        Self::new(file)
    }
}

impl<W: Write> FrameLog<W> {
    pub fn new(sink: W) -> Result<Self> {
        let mut writer = Writer::from_writer(sink);
        writer.write_record(FRAME_HEADER)?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, snapshot: &RoadSnapshot) -> Result<()> {
        self.writer
            .write_record([
                snapshot.frame.to_string(),
                snapshot.current_car_count.to_string(),
                snapshot.historic_car_count.to_string(),
                snapshot.current_crash_count.to_string(),
                snapshot.historic_crash_count.to_string(),
                format!("{:.3}", crate::simulation::ms_to_kmh(snapshot.avg_v)),
                format!("{:.3}", snapshot.avg_a),
                format!("{:.2}", snapshot.avg_trip_duration),
            ])
            .with_context(|| format!("Failed to write frame {}", snapshot.frame))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush frame log")
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush frame log: {}", e.error()))
    }
}

/// Format a frame summary the way the progress log prints it
pub fn summary_line(snapshot: &RoadSnapshot) -> String {
    format!(
        "frame={} cars={} all_cars={} crashes={} all_crashes={} \
         avg_v={:.2} km/h avg_a={:.2} avg_t_d={:.2}s",
        snapshot.frame,
        snapshot.current_car_count,
        snapshot.historic_car_count,
        snapshot.current_crash_count,
        snapshot.historic_crash_count,
        crate::simulation::ms_to_kmh(snapshot.avg_v),
        snapshot.avg_a,
        snapshot.avg_trip_duration,
    )
}
