//! Modal-state G-code writer.

use millforge_cam::{Move, MoveKind, OperationToolpath, ToolEntry, Units};
use millforge_math::Point3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PostError, Result};
use crate::flavor::PostFlavor;
use crate::format::format_number;

/// Coolant mode held for the whole program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coolant {
    /// No coolant.
    #[default]
    Off,
    /// Mist coolant (`M7`).
    Mist,
    /// Flood coolant (`M8`).
    Flood,
}

impl Coolant {
    fn code(self) -> Option<&'static str> {
        match self {
            Coolant::Off => None,
            Coolant::Mist => Some("M7"),
            Coolant::Flood => Some("M8"),
        }
    }
}

/// Post-processor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostSettings {
    /// Controller dialect.
    pub flavor: PostFlavor,
    /// Prefix blocks with `N` numbers.
    pub line_numbers: bool,
    /// Emit program and operation comments.
    pub comments: bool,
    /// Coolant mode.
    pub coolant: Coolant,
    /// Program comment; the job name when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            flavor: PostFlavor::Grbl,
            line_numbers: false,
            comments: true,
            coolant: Coolant::Off,
            program_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Rapid,
    Linear,
}

impl Motion {
    fn word(self) -> &'static str {
        match self {
            Motion::Rapid => "G0",
            Motion::Linear => "G1",
        }
    }
}

/// Last value of every modal word as it was printed.
#[derive(Debug, Clone, Default)]
struct ModalState {
    motion: Option<Motion>,
    x: Option<String>,
    y: Option<String>,
    z: Option<String>,
    feed: Option<String>,
    tool: Option<u32>,
    coolant: bool,
}

impl ModalState {
    /// After a move to a machine position the work coordinates are unknown.
    fn forget_position(&mut self) {
        self.motion = None;
        self.x = None;
        self.y = None;
        self.z = None;
    }
}

fn changed(previous: &Option<String>, value: &str) -> bool {
    previous.as_deref() != Some(value)
}

/// Serializes toolpaths into G-code text, one line per block.
#[derive(Debug)]
pub struct CodeEmitter {
    settings: PostSettings,
    precision: usize,
    units: Units,
    origin: Point3,
    state: ModalState,
    lines: Vec<String>,
    line_number: u32,
    move_index: usize,
}

impl CodeEmitter {
    /// Emitter for a program in `units`, relative to the work `origin`.
    pub fn new(settings: PostSettings, units: Units, origin: Point3) -> Self {
        Self {
            settings,
            precision: units.precision(),
            units,
            origin,
            state: ModalState::default(),
            lines: Vec::new(),
            line_number: 0,
            move_index: 0,
        }
    }

    fn block(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.settings.line_numbers {
            self.line_number += 10;
            self.lines.push(format!("N{} {}", self.line_number, text));
        } else {
            self.lines.push(text);
        }
    }

    fn comment(&mut self, text: &str) {
        if self.settings.comments {
            let line = self.settings.flavor.comment(text);
            self.lines.push(line);
        }
    }

    fn number(&self, value: f64) -> String {
        format_number(value, self.precision)
    }

    fn select_tool(&mut self, tool: &ToolEntry) -> Result<()> {
        if tool.number == 0 {
            return Err(PostError::UnknownTool(tool.number));
        }
        let line = self.settings.flavor.tool_select(tool.number);
        self.block(line);
        self.state.tool = Some(tool.number);

        let mut start = format!("M3 S{}", format_number(tool.spindle_rpm, 0));
        if let Some(code) = self.settings.coolant.code() {
            start.push(' ');
            start.push_str(code);
            self.state.coolant = true;
        }
        self.block(start);
        Ok(())
    }

    fn stop_spindle(&mut self) {
        if self.state.coolant {
            self.block("M5 M9");
            self.state.coolant = false;
        } else {
            self.block("M5");
        }
    }

    /// Program comment, safety block, units and the first tool.
    pub fn preamble(&mut self, program: &str, tool: &ToolEntry) -> Result<()> {
        self.comment(program);
        for line in self.settings.flavor.safety_block() {
            self.block(*line);
        }
        let units = match self.units {
            Units::Millimeters => "G21",
            Units::Inches => "G20",
        };
        self.block(units);
        self.select_tool(tool)
    }

    /// Swap to `tool` unless it is already loaded.
    pub fn tool_change(&mut self, tool: &ToolEntry) -> Result<()> {
        if self.state.tool == Some(tool.number) {
            return Ok(());
        }
        debug!(from = ?self.state.tool, to = tool.number, "tool change");
        self.stop_spindle();
        self.comment(&format!("T{} {}", tool.number, tool.name));
        let position = self.settings.flavor.tool_change_position();
        self.block(position);
        self.state.forget_position();
        if let Some(stop) = self.settings.flavor.optional_stop() {
            self.block(stop);
        }
        self.select_tool(tool)
    }

    /// One operation: comment, tool change when needed, then its moves.
    pub fn operation(&mut self, op: &OperationToolpath) -> Result<()> {
        self.comment(&op.name);
        self.tool_change(&op.tool)?;
        for m in op.toolpath.iter() {
            self.emit_move(m)?;
        }
        Ok(())
    }

    /// Write one move, omitting words whose printed value is unchanged.
    pub fn emit_move(&mut self, m: &Move) -> Result<()> {
        let move_index = self.move_index;
        self.move_index += 1;

        let finite = |p: &Point3| p.iter().all(|v| v.is_finite());
        if !finite(&m.start) || !finite(&m.end) || m.feed.is_some_and(|f| !f.is_finite()) {
            return Err(PostError::NonFinite { move_index });
        }

        let motion = match m.kind {
            MoveKind::Rapid | MoveKind::Retract => Motion::Rapid,
            MoveKind::Plunge | MoveKind::LinearCut => Motion::Linear,
        };
        let p = m.end - self.origin;
        let x = self.number(p.x);
        let y = self.number(p.y);
        let z = self.number(p.z);

        let mut words = Vec::new();
        if changed(&self.state.x, &x) {
            words.push(format!("X{x}"));
        }
        if changed(&self.state.y, &y) {
            words.push(format!("Y{y}"));
        }
        if changed(&self.state.z, &z) || m.kind == MoveKind::Retract {
            words.push(format!("Z{z}"));
        }
        if words.is_empty() {
            return Ok(());
        }

        let mut line = Vec::with_capacity(words.len() + 2);
        if self.state.motion != Some(motion) {
            line.push(motion.word().to_string());
        }
        line.append(&mut words);
        if motion == Motion::Linear {
            if let Some(feed) = m.feed {
                let f = self.number(feed);
                if changed(&self.state.feed, &f) {
                    line.push(format!("F{f}"));
                    self.state.feed = Some(f);
                }
            }
        }

        self.state.motion = Some(motion);
        self.state.x = Some(x);
        self.state.y = Some(y);
        self.state.z = Some(z);
        self.block(line.join(" "));
        Ok(())
    }

    /// Final retract to `clearance`, spindle and coolant off, program end.
    pub fn postamble(&mut self, clearance: f64) {
        let z = self.number(clearance - self.origin.z);
        if changed(&self.state.z, &z) {
            self.block(format!("G0 Z{z}"));
            self.state.motion = Some(Motion::Rapid);
            self.state.z = Some(z);
        }
        self.stop_spindle();
        self.block("M30");
    }

    /// Number of lines written so far.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// The program text, newline terminated.
    pub fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}
