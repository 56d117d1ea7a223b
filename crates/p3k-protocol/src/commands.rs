//! Commands that can be sent to the matrix.
//!
//! Every command is a fixed template with a single trailing parameter. The
//! leading numbers in each template (layer, output index) are constants for
//! the single-output switchers this client targets.

use std::fmt;

use crate::codec::LineCodec;

/// Prefix of every outbound command.
pub const COMMAND_PREFIX: char = '#';

/// The instructions supported by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Route a video input to output 1 (`ROUTE 1,1,<input>`).
    SwitchVideo,
    /// Route an audio input to output 1 (`ROUTE 2,1,<input>`).
    SwitchAudio,
    /// Set the output audio level (`AUD-LVL 1,1,<level>`).
    AudioLevel,
    /// Mute or unmute output audio (`MUTE 1,<state>`).
    AudioMute,
    /// Mute, unmute or blank output video (`VMUTE 1,<state>`).
    VideoMute,
}

impl Instruction {
    /// All supported instructions.
    pub const ALL: [Instruction; 5] = [
        Instruction::SwitchVideo,
        Instruction::SwitchAudio,
        Instruction::AudioLevel,
        Instruction::AudioMute,
        Instruction::VideoMute,
    ];

    /// The command text preceding the parameter, without the `#` prefix.
    pub fn template(&self) -> &'static str {
        match self {
            Instruction::SwitchVideo => "ROUTE 1,1,",
            Instruction::SwitchAudio => "ROUTE 2,1,",
            Instruction::AudioLevel => "AUD-LVL 1,1,",
            Instruction::AudioMute => "MUTE 1,",
            Instruction::VideoMute => "VMUTE 1,",
        }
    }

    /// Short name used on the command line and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Instruction::SwitchVideo => "video",
            Instruction::SwitchAudio => "audio",
            Instruction::AudioLevel => "level",
            Instruction::AudioMute => "mute",
            Instruction::VideoMute => "vmute",
        }
    }

    /// Parse an instruction from its short name.
    pub fn from_str(s: &str) -> Option<Instruction> {
        match s {
            "video" => Some(Instruction::SwitchVideo),
            "audio" => Some(Instruction::SwitchAudio),
            "level" => Some(Instruction::AudioLevel),
            "mute" => Some(Instruction::AudioMute),
            "vmute" => Some(Instruction::VideoMute),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command ready to be written to the device.
///
/// Parameters are validated before a `Command` exists, so encoding cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// Which template to use.
    pub instruction: Instruction,
    /// The trailing parameter (input number, level or mute state).
    pub param: u32,
}

impl Command {
    /// Create a new command.
    pub fn new(instruction: Instruction, param: u32) -> Self {
        Command { instruction, param }
    }

    /// Encode the command as a line to send to the device.
    /// Returns the bytes to send (including the `\r` terminator).
    pub fn encode(&self) -> Vec<u8> {
        LineCodec::encode_command(&self.to_command_string())
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        format!("{}{}{}", COMMAND_PREFIX, self.instruction.template(), self.param)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_string())
    }
}
