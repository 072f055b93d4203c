//! JSON-lines trace replay.
//!
//! Each non-blank line is one step:
//!
//! ```text
//! {"op":"geometry","offset_width":80,"offset_height":80}
//! {"op":"start","x":100,"y":50}
//! {"op":"move","x":50,"y":100}
//! {"op":"end"}
//! {"op":"set","value":23}
//! {"op":"config","scale":12,"max":null}
//! ```
//!
//! Lines starting with `#` are comments. In `config`, an omitted field is
//! left alone and `null` removes a bound.

#[cfg(test)]
#[path = "replay_test.rs"]
mod replay_test;

use std::io::{BufRead, Write};

use input_knob::config::{ConfigChange, KnobConfig};
use input_knob::engine::KnobCore;
use input_knob::events::KnobEvent;
use input_knob::geometry::{ElementGeometry, Point};
use input_knob::input::{InputSource, Sample};
use serde::{Deserialize, Deserializer, Serialize};

use crate::CliError;

/// One trace line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Start {
        x: f64,
        y: f64,
        #[serde(default)]
        contact: Option<i32>,
    },
    Move {
        x: f64,
        y: f64,
        #[serde(default)]
        contact: Option<i32>,
    },
    End {
        #[serde(default)]
        contact: Option<i32>,
    },
    Cancel {
        #[serde(default)]
        contact: Option<i32>,
    },
    Set {
        value: f64,
    },
    Config {
        #[serde(default)]
        scale: Option<f64>,
        #[serde(default, deserialize_with = "present")]
        min: Option<Option<f64>>,
        #[serde(default, deserialize_with = "present")]
        max: Option<Option<f64>>,
    },
    Geometry(ElementGeometry),
}

/// Distinguish an explicit `null` (`Some(None)`) from an absent field (`None`).
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Option<f64>>, D::Error> {
    Option::<f64>::deserialize(deserializer).map(Some)
}

/// Engine state printed by `--state`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub value: f64,
    pub angle: f64,
    pub rotations: i64,
    pub dragging: bool,
}

#[derive(Serialize)]
struct StateLine {
    state: Snapshot,
}

/// Drives a [`KnobCore`] from trace steps.
#[derive(Debug, Clone)]
pub struct Replayer {
    core: KnobCore,
    geometry: ElementGeometry,
}

impl Replayer {
    #[must_use]
    pub fn new(config: KnobConfig, geometry: ElementGeometry) -> Self {
        Self { core: KnobCore::with_config(config), geometry }
    }

    #[must_use]
    pub fn core(&self) -> &KnobCore {
        &self.core
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            value: self.core.value(),
            angle: self.core.angle(),
            rotations: self.core.rotations(),
            dragging: self.core.is_dragging(),
        }
    }

    /// Apply one step and return what the engine emitted.
    pub fn step(&mut self, step: Step) -> Vec<KnobEvent> {
        let source = InputSource::Pointer;
        match step {
            Step::Start { x, y, contact } => self.core.handle(&Sample::start(source, Point::new(x, y), contact), &self.geometry),
            Step::Move { x, y, contact } => self.core.handle(&Sample::moved(source, Point::new(x, y), contact), &self.geometry),
            Step::End { contact } => self.core.handle(&Sample::end(source, contact), &self.geometry),
            Step::Cancel { contact } => self.core.handle(&Sample::cancel(source, contact), &self.geometry),
            Step::Set { value } => self.core.set_value(value),
            Step::Config { scale, min, max } => {
                let changes = scale
                    .map(ConfigChange::Scale)
                    .into_iter()
                    .chain(min.map(ConfigChange::Min))
                    .chain(max.map(ConfigChange::Max));
                changes.flat_map(|change| self.core.apply(change)).collect()
            }
            Step::Geometry(geometry) => {
                self.geometry = geometry;
                Vec::new()
            }
        }
    }
}

/// Parse one line. `Ok(None)` for blank and comment lines.
///
/// # Errors
///
/// Returns the `serde_json` error for anything that is not a valid step.
pub fn parse_line(line: &str) -> Result<Option<Step>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

/// Replay every line of `reader`, writing one JSON line per event (and per
/// step when `print_state` is set). Returns the number of steps applied.
///
/// Stops at the first malformed line.
pub(crate) fn run<R: BufRead, W: Write>(
    reader: R,
    out: &mut W,
    replayer: &mut Replayer,
    print_state: bool,
) -> Result<usize, CliError> {
    let mut applied = 0_usize;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        let Some(step) = parse_line(&line).map_err(|source| CliError::Parse { line: number, source })? else {
            continue;
        };
        tracing::trace!(line = number, ?step, "replay step");
        for event in replayer.step(step) {
            writeln!(out, "{}", serde_json::to_string(&event).map_err(CliError::Encode)?)?;
        }
        if print_state {
            let state = StateLine { state: replayer.snapshot() };
            writeln!(out, "{}", serde_json::to_string(&state).map_err(CliError::Encode)?)?;
        }
        applied += 1;
    }
    Ok(applied)
}
