//! TraCI wire format: command framing and typed values.
//!
//! All integers and doubles are big-endian. A message is a `u32` total length
//! (including the length field itself) followed by commands:
//!
//! ```text
//! short command:  [len: u8][id: u8][content...]            len = 2 + content
//! long command:   [0: u8][len: u32][id: u8][content...]    len = 6 + content
//! ```
//!
//! Every request command is answered by a status command carrying the same id,
//! optionally followed by a result command with id `request + 0x10`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::domain::Position;

pub const CMD_GETVERSION: u8 = 0x00;
pub const CMD_SIMSTEP: u8 = 0x02;
pub const CMD_CLOSE: u8 = 0x7F;
pub const CMD_GET_TL_VARIABLE: u8 = 0xA2;
pub const CMD_GET_VEHICLE_VARIABLE: u8 = 0xA4;
pub const CMD_GET_SIM_VARIABLE: u8 = 0xAB;
pub const CMD_SET_TL_VARIABLE: u8 = 0xC2;

/// Offset from a get command id to its result command id.
pub const RESPONSE_OFFSET: u8 = 0x10;

pub const ID_LIST: u8 = 0x00;
pub const TL_RED_YELLOW_GREEN_STATE: u8 = 0x20;
pub const VAR_POSITION: u8 = 0x42;
pub const VAR_TYPE: u8 = 0x4F;
pub const VAR_TIME: u8 = 0x66;

pub const POSITION_2D: u8 = 0x01;
pub const TYPE_INTEGER: u8 = 0x09;
pub const TYPE_DOUBLE: u8 = 0x0B;
pub const TYPE_STRING: u8 = 0x0C;
pub const TYPE_STRINGLIST: u8 = 0x0E;

pub const RTYPE_OK: u8 = 0x00;
pub const RTYPE_NOTIMPLEMENTED: u8 = 0x01;
pub const RTYPE_ERR: u8 = 0xFF;

#[derive(Error, Debug)]
pub enum TraciError {
    #[error("truncated message: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("unexpected command 0x{found:02x}, expected 0x{expected:02x}")]
    UnexpectedCommand { expected: u8, found: u8 },

    #[error("unexpected value type 0x{found:02x}, expected 0x{expected:02x}")]
    UnexpectedType { expected: u8, found: u8 },

    #[error("command 0x{command:02x} failed (status 0x{status:02x}): {description}")]
    Status {
        command: u8,
        status: u8,
        description: String,
    },

    #[error("invalid UTF-8 in string value")]
    InvalidString(#[from] std::string::FromUtf8Error),

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TraciResult<T> = Result<T, TraciError>;

/// A typed value as carried in get/set commands.
#[derive(Debug, Clone, PartialEq)]
pub enum TraciValue {
    Integer(i32),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    Position2D(Position),
}

impl TraciValue {
    fn type_id(&self) -> u8 {
        match self {
            TraciValue::Integer(_) => TYPE_INTEGER,
            TraciValue::Double(_) => TYPE_DOUBLE,
            TraciValue::String(_) => TYPE_STRING,
            TraciValue::StringList(_) => TYPE_STRINGLIST,
            TraciValue::Position2D(_) => POSITION_2D,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.type_id());
        match self {
            TraciValue::Integer(v) => buf.put_i32(*v),
            TraciValue::Double(v) => buf.put_f64(*v),
            TraciValue::String(s) => put_string(buf, s),
            TraciValue::StringList(items) => {
                buf.put_u32(items.len() as u32);
                for item in items {
                    put_string(buf, item);
                }
            }
            TraciValue::Position2D(p) => {
                buf.put_f64(p.x);
                buf.put_f64(p.y);
            }
        }
    }

    pub fn decode(buf: &mut Bytes) -> TraciResult<Self> {
        let type_id = take_u8(buf)?;
        match type_id {
            TYPE_INTEGER => Ok(TraciValue::Integer(take_i32(buf)?)),
            TYPE_DOUBLE => Ok(TraciValue::Double(take_f64(buf)?)),
            TYPE_STRING => Ok(TraciValue::String(take_string(buf)?)),
            TYPE_STRINGLIST => {
                let count = take_u32(buf)? as usize;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(take_string(buf)?);
                }
                Ok(TraciValue::StringList(items))
            }
            POSITION_2D => {
                let x = take_f64(buf)?;
                let y = take_f64(buf)?;
                Ok(TraciValue::Position2D(Position::new(x, y)))
            }
            found => Err(TraciError::UnexpectedType {
                expected: TYPE_STRING,
                found,
            }),
        }
    }

    pub fn into_string(self) -> TraciResult<String> {
        match self {
            TraciValue::String(s) => Ok(s),
            other => Err(type_mismatch(TYPE_STRING, &other)),
        }
    }

    pub fn into_string_list(self) -> TraciResult<Vec<String>> {
        match self {
            TraciValue::StringList(items) => Ok(items),
            other => Err(type_mismatch(TYPE_STRINGLIST, &other)),
        }
    }

    pub fn into_double(self) -> TraciResult<f64> {
        match self {
            TraciValue::Double(v) => Ok(v),
            other => Err(type_mismatch(TYPE_DOUBLE, &other)),
        }
    }

    pub fn into_position(self) -> TraciResult<Position> {
        match self {
            TraciValue::Position2D(p) => Ok(p),
            other => Err(type_mismatch(POSITION_2D, &other)),
        }
    }
}

fn type_mismatch(expected: u8, found: &TraciValue) -> TraciError {
    TraciError::UnexpectedType {
        expected,
        found: found.type_id(),
    }
}

/// A single request command.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub id: u8,
    pub content: Bytes,
}

impl Command {
    pub fn get_version() -> Self {
        Self {
            id: CMD_GETVERSION,
            content: Bytes::new(),
        }
    }

    /// Advance to `target_time`; 0.0 performs exactly one step.
    pub fn simulation_step(target_time: f64) -> Self {
        let mut content = BytesMut::with_capacity(8);
        content.put_f64(target_time);
        Self {
            id: CMD_SIMSTEP,
            content: content.freeze(),
        }
    }

    pub fn close() -> Self {
        Self {
            id: CMD_CLOSE,
            content: Bytes::new(),
        }
    }

    pub fn get_variable(domain: u8, variable: u8, object_id: &str) -> Self {
        let mut content = BytesMut::with_capacity(5 + object_id.len());
        content.put_u8(variable);
        put_string(&mut content, object_id);
        Self {
            id: domain,
            content: content.freeze(),
        }
    }

    pub fn set_variable(domain: u8, variable: u8, object_id: &str, value: &TraciValue) -> Self {
        let mut content = BytesMut::new();
        content.put_u8(variable);
        put_string(&mut content, object_id);
        value.encode(&mut content);
        Self {
            id: domain,
            content: content.freeze(),
        }
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        let short_len = 2 + self.content.len();
        if short_len <= u8::MAX as usize {
            buf.put_u8(short_len as u8);
        } else {
            buf.put_u8(0);
            buf.put_u32((6 + self.content.len()) as u32);
        }
        buf.put_u8(self.id);
        buf.put_slice(&self.content);
    }
}

/// Frame commands into a complete message including the length prefix.
pub fn encode_message(commands: &[Command]) -> Bytes {
    let mut body = BytesMut::new();
    for command in commands {
        command.encode_into(&mut body);
    }
    let mut message = BytesMut::with_capacity(4 + body.len());
    message.put_u32((4 + body.len()) as u32);
    message.put_slice(&body);
    message.freeze()
}

/// Split one command off the front of `buf`, returning its id and content.
pub fn take_command(buf: &mut Bytes) -> TraciResult<(u8, Bytes)> {
    let short_len = take_u8(buf)? as usize;
    let (total, header) = if short_len == 0 {
        (take_u32(buf)? as usize, 6)
    } else {
        (short_len, 2)
    };
    if total < header {
        return Err(TraciError::Truncated {
            needed: header,
            available: total,
        });
    }
    let id = take_u8(buf)?;
    let content_len = total - header;
    ensure(buf, content_len)?;
    Ok((id, buf.split_to(content_len)))
}

/// Status part of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub command: u8,
    pub result: u8,
    pub description: String,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        self.result == RTYPE_OK
    }

    fn into_result(self) -> TraciResult<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(TraciError::Status {
                command: self.command,
                status: self.result,
                description: self.description,
            })
        }
    }
}

/// Read and check the status command answering `expected`.
pub fn take_status(buf: &mut Bytes, expected: u8) -> TraciResult<Status> {
    let (command, mut content) = take_command(buf)?;
    if command != expected {
        return Err(TraciError::UnexpectedCommand {
            expected,
            found: command,
        });
    }
    let result = take_u8(&mut content)?;
    let description = take_string(&mut content)?;
    Status {
        command,
        result,
        description,
    }
    .into_result()
}

/// Decode the answer to a get-variable command (status + result command).
pub fn decode_get_response(mut buf: Bytes, domain: u8, variable: u8) -> TraciResult<TraciValue> {
    take_status(&mut buf, domain)?;

    let expected = domain.wrapping_add(RESPONSE_OFFSET);
    let (command, mut content) = take_command(&mut buf)?;
    if command != expected {
        return Err(TraciError::UnexpectedCommand {
            expected,
            found: command,
        });
    }
    let returned_variable = take_u8(&mut content)?;
    if returned_variable != variable {
        return Err(TraciError::UnexpectedCommand {
            expected: variable,
            found: returned_variable,
        });
    }
    let _object_id = take_string(&mut content)?;
    TraciValue::decode(&mut content)
}

/// Decode the answer to a GETVERSION command: API level and server identifier.
pub fn decode_version_response(mut buf: Bytes) -> TraciResult<(i32, String)> {
    take_status(&mut buf, CMD_GETVERSION)?;
    let (command, mut content) = take_command(&mut buf)?;
    if command != CMD_GETVERSION {
        return Err(TraciError::UnexpectedCommand {
            expected: CMD_GETVERSION,
            found: command,
        });
    }
    let api = take_i32(&mut content)?;
    let identifier = take_string(&mut content)?;
    Ok((api, identifier))
}

/// Decode the answer to SIMSTEP. Returns the number of subscription results,
/// which are not used by this client and left unread.
pub fn decode_step_response(mut buf: Bytes) -> TraciResult<i32> {
    take_status(&mut buf, CMD_SIMSTEP)?;
    if buf.remaining() >= 4 {
        take_i32(&mut buf)
    } else {
        Ok(0)
    }
}

pub fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn ensure(buf: &Bytes, needed: usize) -> TraciResult<()> {
    if buf.remaining() < needed {
        Err(TraciError::Truncated {
            needed,
            available: buf.remaining(),
        })
    } else {
        Ok(())
    }
}

fn take_u8(buf: &mut Bytes) -> TraciResult<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn take_u32(buf: &mut Bytes) -> TraciResult<u32> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

fn take_i32(buf: &mut Bytes) -> TraciResult<i32> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

fn take_f64(buf: &mut Bytes) -> TraciResult<f64> {
    ensure(buf, 8)?;
    Ok(buf.get_f64())
}

fn take_string(buf: &mut Bytes) -> TraciResult<String> {
    let len = take_u32(buf)? as usize;
    ensure(buf, len)?;
    let raw = buf.split_to(len);
    Ok(String::from_utf8(raw.to_vec())?)
}
