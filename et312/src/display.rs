//! On-device LCD
//!
//! The unit does not redraw its display after remote mode changes, so the
//! controller draws mode names and short labels itself. Two lines of
//! sixteen characters; the mode name field is the right half of line 0.

use std::fmt;

use tokio::task::JoinHandle;

use et312_core::Opcode;
use et312_core::constants::{addresses, display};
use et312_types::Mode;

use crate::error::Result;
use crate::link::Link;

/// Label drawn when output is stopped
pub const PAUSED_LABEL: &str = "-PAUSED-";

/// Something to draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayRequest {
    /// Mode name from the unit's string table
    ModeName(u8),

    /// Blank the mode name field
    ClearModeName,

    /// Raw characters at a position
    Text { text: String, line: u8, start: u8 },
}

impl DisplayRequest {
    /// Draw the name of a mode
    pub fn mode_name(mode: Mode) -> Self {
        Self::ModeName(mode.0)
    }

    /// Draw text at a line and column
    ///
    /// # Errors
    ///
    /// [`InvalidDisplayText`](et312_core::Error::InvalidDisplayText) unless
    /// the text is 1-16 ASCII characters, the line is 0 or 1, the start
    /// column is 0-15 and the text fits on the line.
    ///
    /// # Examples
    ///
    /// ```
    /// use et312::DisplayRequest;
    ///
    /// assert!(DisplayRequest::text("Hello", 1, 0).is_ok());
    /// assert!(DisplayRequest::text("Hello", 0, 12).is_err());
    /// ```
    pub fn text(text: impl Into<String>, line: u8, start: u8) -> Result<Self> {
        let text = text.into();
        check_text(&text, line, start)?;
        Ok(Self::Text { text, line, start })
    }

    /// Draw a label in the mode name field, padded or cut to fit
    pub fn label(text: &str) -> Self {
        let label: String = text
            .chars()
            .filter(char::is_ascii)
            .take(display::MODE_NAME_WIDTH)
            .collect();

        Self::Text {
            text: format!("{:<width$}", label, width = display::MODE_NAME_WIDTH),
            line: 0,
            start: display::MODE_NAME_WIDTH as u8,
        }
    }

    /// The stop indicator
    pub fn paused() -> Self {
        Self::label(PAUSED_LABEL)
    }
}

impl fmt::Display for DisplayRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModeName(id) => write!(f, "ModeName({})", Mode(*id)),
            Self::ClearModeName => f.write_str("ClearModeName"),
            Self::Text { text, line, start } => write!(f, "Text({text:?} @ {line}:{start})"),
        }
    }
}

fn check_text(text: &str, line: u8, start: u8) -> et312_core::Result<()> {
    let invalid = |msg: String| Err(et312_core::Error::InvalidDisplayText(msg));

    if text.is_empty() || text.len() > display::LINE_WIDTH {
        return invalid(format!("{:?} must be 1-16 characters long", text));
    }
    if !text.is_ascii() {
        return invalid(format!("{:?} is not ASCII", text));
    }
    if line >= display::LINES {
        return invalid(format!("line {} (must be 0 or 1)", line));
    }
    if usize::from(start) >= display::LINE_WIDTH {
        return invalid(format!("start {} (must be 0-15)", start));
    }
    if usize::from(start) + text.len() > display::LINE_WIDTH {
        return invalid(format!("{:?} does not fit at column {}", text, start));
    }
    Ok(())
}

/// Handle to a display update running in the background
///
/// Dropping it leaves the update running.
#[derive(Debug)]
pub struct DisplayUpdate {
    handle: JoinHandle<Result<()>>,
}

impl DisplayUpdate {
    pub(crate) fn new(handle: JoinHandle<Result<()>>) -> Self {
        Self { handle }
    }

    /// Wait for the update to finish
    pub async fn wait(self) -> Result<()> {
        self.handle.await?
    }

    /// Check if the update has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Link {
    /// Draw on the display
    pub async fn display(&mut self, request: &DisplayRequest) -> Result<()> {
        match request {
            DisplayRequest::ModeName(offset) => self.draw_mode_name(*offset).await,
            DisplayRequest::ClearModeName => self.draw_mode_name(display::BLANK_MODE_NAME).await,
            DisplayRequest::Text { text, line, start } => {
                check_text(text, *line, *start)?;

                for (pos, character) in text.bytes().enumerate() {
                    let position = start + pos as u8 + (line << 6);
                    self.write_address(addresses::DISPLAY, &[character, position], 1)
                        .await?;
                    self.execute_opcodes(&[Opcode::WriteCharacter]).await?;
                }
                Ok(())
            }
        }
    }

    async fn draw_mode_name(&mut self, offset: u8) -> Result<()> {
        // The mode id doubles as the string table offset of its name
        self.write_address(addresses::DISPLAY, &[offset], 1).await?;
        self.execute_opcodes(&[Opcode::WriteModeName]).await?;
        Ok(())
    }
}
