use serde::Deserialize;
use thiserror::Error;

use crate::source::SourceResolver;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BreakValidationError {
    #[error("Wrong breakpoint format must be [file][:lineno][#function][,condition].")]
    WrongFormat,
    #[error("Line does not exist")]
    LineDoesNotExist,
    #[error("Blank line or comment")]
    BlankOrComment,
}

/// `break`/`unbreak` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BreakRequest {
    #[serde(rename = "fn")]
    pub file: String,
    /// Kept raw: front-ends send numbers or numeric strings.
    #[serde(default)]
    pub lno: serde_json::Value,
    #[serde(default)]
    pub temporary: bool,
    #[serde(default)]
    pub cond: Option<String>,
    #[serde(default)]
    pub fun: Option<String>,
}

impl BreakRequest {
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }

    /// The requested line. `None` means a function-entry breakpoint.
    pub fn line(&self) -> Result<Option<u32>, BreakValidationError> {
        let number = match &self.lno {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|f| f.trunc() as i64)),
            serde_json::Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        };
        let number = number.ok_or(BreakValidationError::WrongFormat)?;
        // Lines are 1-based; anything else cannot name a source line.
        u32::try_from(number)
            .ok()
            .filter(|line| *line > 0)
            .map(Some)
            .ok_or(BreakValidationError::LineDoesNotExist)
    }

    /// Checks the requested line against the source before it reaches the
    /// breakpoint store.
    pub fn validate(&self, sources: &dyn SourceResolver) -> Result<Option<u32>, BreakValidationError> {
        let Some(line) = self.line()? else {
            return Ok(None);
        };
        let text = sources
            .line(&self.file, line)
            .ok_or(BreakValidationError::LineDoesNotExist)?;
        if !executable_line(&text) {
            return Err(BreakValidationError::BlankOrComment);
        }
        Ok(Some(line))
    }

    pub fn failure_title(&self) -> String {
        let lno = match &self.lno {
            serde_json::Value::Null => "None".to_string(),
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        format!("Break on {}:{lno} failed", self.file)
    }
}

/// Whether a breakpoint on this source line can ever be hit.
pub fn executable_line(line: &str) -> bool {
    let line = line.trim();
    !(line.is_empty()
        || line.starts_with('#')
        || line.starts_with("\"\"\"")
        || line.starts_with("'''"))
}
