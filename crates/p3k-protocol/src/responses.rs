//! Response parsing for Protocol 3000.
//!
//! Responses from the device look like `~01@COMMAND PARAMETERS`:
//! - `~` followed by the device address (decimal digits)
//! - `@` followed by the command name (letters, digits, `_` and `-`)
//! - a single whitespace character, then the parameter text
//!
//! Only a few command names carry data this client uses. Everything else
//! parses to [`ResponseKind::Unhandled`].

use crate::error::{ProtocolError, ProtocolResult};

/// Prefix of every inbound response.
pub const RESPONSE_PREFIX: char = '~';

/// Command name of the input/output count report.
pub const INFO_IO: &str = "INFO-IO";

/// Command name of the preset count report.
pub const INFO_PRST: &str = "INFO-PRST";

/// Command name of a bare syntax error reply.
pub const ERR: &str = "ERR";

/// What a parsed response means to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// `INFO-IO IN <n>,OUT <m>`: number of inputs and outputs.
    InputOutput {
        /// Number of inputs.
        inputs: u32,
        /// Number of outputs.
        outputs: u32,
    },

    /// `INFO-PRST VID <n>,AUD <m>`: number of stored presets.
    Presets {
        /// Number of video presets.
        video: u32,
        /// Number of audio presets, when reported.
        audio: Option<u32>,
    },

    /// `<COMMAND> ERR <code>` or `ERR <code>`: the device rejected a command.
    DeviceError {
        /// Protocol 3000 error code.
        code: u32,
    },

    /// A well-formed response this client does not act on.
    Unhandled,
}

/// A parsed response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Device address (machine number) as sent, e.g. `"01"`.
    pub address: String,
    /// Command name, e.g. `INFO-IO`.
    pub command: String,
    /// Raw parameter text after the separator.
    pub params: String,
    /// Structured meaning of the response.
    pub kind: ResponseKind,
}

impl Response {
    /// Parse a response line.
    ///
    /// The input should be a single line without the `\r\n` terminator.
    pub fn parse(line: &str) -> ProtocolResult<Response> {
        let malformed = || ProtocolError::Malformed(line.to_string());

        let rest = line.strip_prefix(RESPONSE_PREFIX).ok_or_else(malformed)?;
        let (address, rest) = rest.split_once('@').ok_or_else(malformed)?;
        if address.is_empty() || !address.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        let name_len = rest
            .find(|c: char| !is_name_char(c))
            .unwrap_or(rest.len());
        if name_len == 0 {
            return Err(malformed());
        }
        let (command, rest) = rest.split_at(name_len);

        // Exactly one whitespace separator, then the rest of the line
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if c.is_whitespace() => {}
            _ => return Err(malformed()),
        }
        let params = chars.as_str();

        let kind = classify(command, params)?;

        Ok(Response {
            address: address.to_string(),
            command: command.to_string(),
            params: params.to_string(),
            kind,
        })
    }

    /// Check if the device reported an error.
    pub fn is_error(&self) -> bool {
        matches!(self.kind, ResponseKind::DeviceError { .. })
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Work out the structured meaning of a framed response.
fn classify(command: &str, params: &str) -> ProtocolResult<ResponseKind> {
    let invalid = || ProtocolError::InvalidParameters {
        command: command.to_string(),
        params: params.to_string(),
    };

    let error_code = if command == ERR {
        Some(params)
    } else {
        params.strip_prefix("ERR ")
    };
    if let Some(code) = error_code {
        let (code, _) = leading_number(code.trim_start()).ok_or_else(invalid)?;
        return Ok(ResponseKind::DeviceError { code });
    }

    match command {
        INFO_IO => {
            // IN 11,OUT 9
            let (inputs, rest) = number_after(params, "IN ").ok_or_else(invalid)?;
            let rest = rest.strip_prefix(",OUT ").ok_or_else(invalid)?;
            let (outputs, _) = leading_number(rest).ok_or_else(invalid)?;
            Ok(ResponseKind::InputOutput { inputs, outputs })
        }
        INFO_PRST => {
            // VID 60,AUD 0
            let (video, _) = number_after(params, "VID ").ok_or_else(invalid)?;
            let audio = number_after(params, "AUD ").map(|(n, _)| n);
            Ok(ResponseKind::Presets { video, audio })
        }
        _ => Ok(ResponseKind::Unhandled),
    }
}

/// Find `key` in `text` and parse the decimal number right after it.
fn number_after<'a>(text: &'a str, key: &str) -> Option<(u32, &'a str)> {
    let start = text.find(key)? + key.len();
    leading_number(&text[start..])
}

/// Parse the decimal digits at the start of `text`.
fn leading_number(text: &str) -> Option<(u32, &str)> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    if end == 0 {
        return None;
    }
    let value = text[..end].parse().ok()?;
    Some((value, &text[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Command, Instruction};

    #[test]
    fn test_parse_info_io() {
        let response = Response::parse("~01@INFO-IO IN 11,OUT 9").unwrap();
        assert_eq!(response.address, "01");
        assert_eq!(response.command, "INFO-IO");
        assert_eq!(response.params, "IN 11,OUT 9");
        assert_eq!(
            response.kind,
            ResponseKind::InputOutput { inputs: 11, outputs: 9 }
        );
    }

    #[test]
    fn test_parse_info_presets() {
        let response = Response::parse("~01@INFO-PRST VID 60,AUD 0").unwrap();
        assert_eq!(
            response.kind,
            ResponseKind::Presets { video: 60, audio: Some(0) }
        );

        let response = Response::parse("~01@INFO-PRST VID 8").unwrap();
        assert_eq!(response.kind, ResponseKind::Presets { video: 8, audio: None });
    }

    #[test]
    fn test_parse_unhandled() {
        let response = Response::parse("~01@ROUTE 1,1,3").unwrap();
        assert_eq!(response.command, "ROUTE");
        assert_eq!(response.kind, ResponseKind::Unhandled);
        assert!(!response.is_error());
    }

    #[test]
    fn test_parse_device_errors() {
        let response = Response::parse("~01@ROUTE ERR 002").unwrap();
        assert_eq!(response.kind, ResponseKind::DeviceError { code: 2 });
        assert!(response.is_error());

        let response = Response::parse("~01@ERR 001").unwrap();
        assert_eq!(response.kind, ResponseKind::DeviceError { code: 1 });
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(
            Response::parse("garbage"),
            Err(ProtocolError::Malformed("garbage".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_bad_framing() {
        for line in [
            "",
            "~@INFO-IO IN 1,OUT 1",
            "~0a@INFO-IO IN 1,OUT 1",
            "~01INFO-IO IN 1,OUT 1",
            "~01@ IN 1,OUT 1",
            "~01@INFO-IO",
            "~01@INFO:IO IN 1,OUT 1",
            "01@INFO-IO IN 1,OUT 1",
        ] {
            assert!(
                matches!(Response::parse(line), Err(ProtocolError::Malformed(_))),
                "expected malformed: {:?}",
                line
            );
        }
    }

    #[test]
    fn test_parse_long_address() {
        let response = Response::parse("~12345678901@INFO-IO IN 11,OUT 9").unwrap();
        assert_eq!(response.address, "12345678901");
        assert_eq!(response.kind, ResponseKind::InputOutput { inputs: 11, outputs: 9 });
    }

    #[test]
    fn test_parse_invalid_io_parameters() {
        let err = Response::parse("~01@INFO-IO IN x,OUT 9").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidParameters {
                command: "INFO-IO".to_string(),
                params: "IN x,OUT 9".to_string(),
            }
        );
        assert!(Response::parse("~01@INFO-PRST AUD 3").is_err());
    }

    #[test]
    fn test_parse_empty_params() {
        // A trailing separator with nothing after it is still a valid frame
        let response = Response::parse("~01@PROT-VER ").unwrap();
        assert_eq!(response.params, "");
        assert_eq!(response.kind, ResponseKind::Unhandled);
    }

    #[test]
    fn test_commands_never_parse_as_responses() {
        for instruction in Instruction::ALL {
            for param in [0, 1, 9, 100, u32::MAX] {
                let wire = Command::new(instruction, param).encode();
                let text = String::from_utf8(wire).unwrap();
                for line in [text.as_str(), text.trim_end()] {
                    assert!(Response::parse(line).is_err(), "{:?} parsed as response", line);
                }
            }
        }
    }
}
