//! Line protocol spoken between the two peers.
//!
//! One message per `\n`-terminated line:
//!
//! ```text
//! p<y>        own paddle position
//! b<x>,<y>    ball position (host only)
//! ```

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    PaddlePos(f64),
    BallPos(f64, f64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty line")]
    Empty,
    #[error("unknown message tag {0:?}")]
    UnknownTag(char),
    #[error("bad numeric payload {0:?}")]
    BadNumber(String),
    #[error("missing field in {0:?}")]
    MissingField(String),
}

impl Message {
    /// Wire form including the trailing newline. Floats always carry a
    /// decimal point (`250.0`, not `250`).
    pub fn encode(&self) -> String {
        match self {
            Message::PaddlePos(y) => format!("p{y:?}\n"),
            Message::BallPos(x, y) => format!("b{x:?},{y:?}\n"),
        }
    }

    /// Parse one line. A trailing `\n` or `\r\n` is ignored.
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut chars = line.chars();
        let tag = chars.next().ok_or(DecodeError::Empty)?;
        let payload = chars.as_str();

        match tag {
            'p' => Ok(Message::PaddlePos(parse_float(payload)?)),
            'b' => {
                let mut fields = payload.split(',');
                let x = fields.next().ok_or_else(|| DecodeError::MissingField(line.to_string()))?;
                let y = fields.next().ok_or_else(|| DecodeError::MissingField(line.to_string()))?;
                Ok(Message::BallPos(parse_float(x)?, parse_float(y)?))
            }
            other => Err(DecodeError::UnknownTag(other)),
        }
    }
}

fn parse_float(raw: &str) -> Result<f64, DecodeError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(DecodeError::BadNumber(raw.to_string())),
    }
}

/// Lines are single-byte text: every byte maps to the code point of the same value.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
