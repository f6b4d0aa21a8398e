//! Action stream encoding: tag/length framing, argument readers and the
//! per-action descriptor type.

use std::ops::Range;

use crate::{Context, ScriptError};

/// Highest language version the dispatcher knows about.
pub const MAX_VERSION: u8 = 10;

/// Control transfer requested by a handler. The frame's pc already points
/// past the executing action when the handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    Continue,
    /// Absolute pc to continue at.
    Jump(usize),
}

pub type ActionHandler = fn(&mut Context, &[u8]) -> Result<ActionResult, ScriptError>;

pub type ActionFormatter = fn(&[u8]) -> String;

/// Stack effect of an action; `None` means it depends on the operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEffect {
    pub consumed: Option<u8>,
    pub produced: Option<u8>,
}

impl StackEffect {
    pub const fn fixed(consumed: u8, produced: u8) -> Self {
        Self {
            consumed: Some(consumed),
            produced: Some(produced),
        }
    }

    pub const fn dynamic(consumed: Option<u8>, produced: Option<u8>) -> Self {
        Self { consumed, produced }
    }

    pub fn is_fixed(self) -> bool {
        self.consumed.is_some() && self.produced.is_some()
    }
}

// ( consumed -- produced ) per action, with the first version that defines it
#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    pub code: u8,
    pub name: &'static str,
    pub effect: StackEffect,
    pub since: u8,
    pub handler: ActionHandler,
    pub format: ActionFormatter,
}

impl ActionSpec {
    pub const fn new(
        code: u8,
        name: &'static str,
        effect: StackEffect,
        since: u8,
        handler: ActionHandler,
        format: ActionFormatter,
    ) -> Self {
        Self {
            code,
            name,
            effect,
            since,
            handler,
            format,
        }
    }

    /// Version whose handler runs for a script of `version`: the exact one
    /// when the action exists there, else the nearest newer version.
    pub fn handler_version(&self, version: u8) -> u8 {
        version.max(self.since)
    }
}

/// One framed action: tag byte, argument byte range, and where the next
/// action starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAction {
    pub code: u8,
    pub args: Range<usize>,
    pub next: usize,
}

/// Decodes the action header at `pc`. Tags with the high bit set carry a
/// little-endian `u16` argument length.
pub fn decode_action(bytes: &[u8], pc: usize, end: usize) -> Result<RawAction, ScriptError> {
    let end = end.min(bytes.len());
    if pc >= end {
        return Err(ScriptError::Truncated { pc, end });
    }
    let code = bytes[pc];
    if code & 0x80 == 0 {
        return Ok(RawAction {
            code,
            args: pc + 1..pc + 1,
            next: pc + 1,
        });
    }
    if pc + 3 > end {
        return Err(ScriptError::Truncated { pc, end });
    }
    let len = u16::from_le_bytes([bytes[pc + 1], bytes[pc + 2]]) as usize;
    let start = pc + 3;
    if start + len > end {
        return Err(ScriptError::Truncated { pc, end });
    }
    Ok(RawAction {
        code,
        args: start..start + len,
        next: start + len,
    })
}

/// Cursor over an action's argument bytes.
#[derive(Debug, Clone)]
pub struct ArgReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    action: &'static str,
}

impl<'a> ArgReader<'a> {
    pub fn new(action: &'static str, bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            action,
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ScriptError> {
        if self.remaining() < n {
            return Err(ScriptError::malformed(self.action, "arguments too short"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, ScriptError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ScriptError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn i16(&mut self) -> Result<i16, ScriptError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn i32(&mut self) -> Result<i32, ScriptError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn f32(&mut self) -> Result<f32, ScriptError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Doubles are stored as two little-endian words, high word first.
    pub fn f64_swapped(&mut self) -> Result<f64, ScriptError> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[4], b[5], b[6], b[7], b[0], b[1], b[2], b[3],
        ]))
    }

    /// NUL-terminated string.
    pub fn string(&mut self) -> Result<String, ScriptError> {
        let rest = &self.bytes[self.pos..];
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(ScriptError::malformed(self.action, "unterminated string"));
        };
        self.pos += len + 1;
        Ok(String::from_utf8_lossy(&rest[..len]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_short_and_long_actions() {
        let bytes = [0x0A, 0x96, 0x02, 0x00, 0x05, 0x01, 0x00];
        let add = decode_action(&bytes, 0, bytes.len()).unwrap();
        assert_eq!(add.code, 0x0A);
        assert_eq!(add.next, 1);
        let push = decode_action(&bytes, 1, bytes.len()).unwrap();
        assert_eq!(push.code, 0x96);
        assert_eq!(push.args, 4..6);
        assert_eq!(push.next, 6);
    }

    #[test]
    fn rejects_lengths_past_the_end() {
        let bytes = [0x96, 0x10, 0x00, 0x00];
        assert!(matches!(
            decode_action(&bytes, 0, bytes.len()),
            Err(ScriptError::Truncated { .. })
        ));
        assert!(decode_action(&bytes, 4, bytes.len()).is_err());
    }

    #[test]
    fn reads_swapped_doubles() {
        let value = 1.5f64.to_le_bytes();
        let mut encoded = Vec::new();
        encoded.extend_from_slice(&value[4..]);
        encoded.extend_from_slice(&value[..4]);
        let mut reader = ArgReader::new("Push", &encoded);
        assert_eq!(reader.f64_swapped().unwrap(), 1.5);
        assert!(reader.is_empty());
    }
}
