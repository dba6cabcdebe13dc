//! G-code flavor definitions.

use serde::{Deserialize, Serialize};

/// Controller dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostFlavor {
    /// Grbl hobby controllers.
    #[default]
    Grbl,
    /// LinuxCNC.
    LinuxCnc,
}

impl PostFlavor {
    /// Modal reset lines at the start of the program.
    pub fn safety_block(&self) -> &'static [&'static str] {
        match self {
            PostFlavor::Grbl => &["G90 G94 G17"],
            PostFlavor::LinuxCnc => &["G90 G54 G64 G50 G17 G94", "G49 G40 G80"],
        }
    }

    /// Move to the tool change position.
    pub fn tool_change_position(&self) -> &'static str {
        "G30"
    }

    /// Optional stop before loading a new tool.
    pub fn optional_stop(&self) -> Option<&'static str> {
        match self {
            PostFlavor::Grbl => None,
            PostFlavor::LinuxCnc => Some("M1"),
        }
    }

    /// Tool selection block, with the length offset where supported.
    pub fn tool_select(&self, number: u32) -> String {
        match self {
            PostFlavor::Grbl => format!("T{number} M6"),
            PostFlavor::LinuxCnc => format!("T{number} G43 H{number} M6"),
        }
    }

    /// Comment block. Parentheses inside `text` are dropped.
    pub fn comment(&self, text: &str) -> String {
        let clean: String = text.chars().filter(|c| !matches!(c, '(' | ')')).collect();
        format!("({})", clean.trim())
    }
}
