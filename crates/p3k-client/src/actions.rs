//! User actions and how they become device commands.
//!
//! Fixed actions carry already-validated numbers. Dynamic actions carry text
//! that may contain `$(name)` placeholders; the placeholders are resolved when
//! the action is dispatched, and the result must be a plain decimal number.

use std::collections::HashMap;

use p3k_protocol::{Command, Instruction};

use crate::error::ParameterError;

/// Marker that introduces a placeholder in dynamic parameters.
pub const PLACEHOLDER_START: &str = "$(";

/// Resolves placeholders in dynamic action parameters.
pub trait VariableResolver {
    /// Return `text` with every known placeholder replaced by its value.
    fn resolve(&self, text: &str) -> String;
}

/// A resolver that knows no variables and returns text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVariables;

impl VariableResolver for NoVariables {
    fn resolve(&self, text: &str) -> String {
        text.to_string()
    }
}

/// A resolver backed by a name → value map.
///
/// `$(name)` is replaced by the value stored under `name`. Unknown
/// placeholders are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableMap {
    values: HashMap<String, String>,
}

impl VariableMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Parse a `name=value` pair.
    pub fn parse_pair(pair: &str) -> Option<(String, String)> {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), value.to_string()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = VariableMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl VariableResolver for VariableMap {
    fn resolve(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(PLACEHOLDER_START) {
            out.push_str(&rest[..start]);
            let after = &rest[start + PLACEHOLDER_START.len()..];
            let Some(end) = after.find(')') else {
                // Unterminated placeholder, keep it verbatim
                out.push_str(&rest[start..]);
                return out;
            };

            let name = &after[..end];
            match self.values.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + PLACEHOLDER_START.len() + end + 1]),
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }
}

/// Something the user asked the matrix to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Route a video input.
    SwitchVideo { input: u32 },
    /// Route an audio input.
    SwitchAudio { input: u32 },
    /// Route a video input given as text, resolved at dispatch.
    SwitchVideoDynamic { input: String },
    /// Route an audio input given as text, resolved at dispatch.
    SwitchAudioDynamic { input: String },
    /// Set the output audio level.
    AudioLevel { level: u32 },
    /// Set the audio mute state (0 = unmuted, 1 = muted).
    AudioMute { state: u32 },
    /// Set the video mute state (0 = enabled, 1 = muted, 2 = blank).
    VideoMute { state: u32 },
}

impl Action {
    /// Stable identifier used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::SwitchVideo { .. } => "switch_video",
            Action::SwitchAudio { .. } => "switch_audio",
            Action::SwitchVideoDynamic { .. } => "switch_video_dynamic",
            Action::SwitchAudioDynamic { .. } => "switch_audio_dynamic",
            Action::AudioLevel { .. } => "audio_level",
            Action::AudioMute { .. } => "audio_mute",
            Action::VideoMute { .. } => "video_mute",
        }
    }

    /// Turn the action into a command, resolving dynamic parameters.
    ///
    /// The action is consumed, so resolved values only ever exist in the
    /// returned command.
    pub fn into_command(self, resolver: &dyn VariableResolver) -> Result<Command, ParameterError> {
        let name = self.name();
        let command = match self {
            Action::SwitchVideo { input } => Command::new(Instruction::SwitchVideo, input),
            Action::SwitchAudio { input } => Command::new(Instruction::SwitchAudio, input),
            Action::SwitchVideoDynamic { input } => Command::new(
                Instruction::SwitchVideo,
                resolve_number(name, "input", &input, resolver)?,
            ),
            Action::SwitchAudioDynamic { input } => Command::new(
                Instruction::SwitchAudio,
                resolve_number(name, "input", &input, resolver)?,
            ),
            Action::AudioLevel { level } => Command::new(Instruction::AudioLevel, level),
            Action::AudioMute { state } => Command::new(Instruction::AudioMute, state),
            Action::VideoMute { state } => Command::new(Instruction::VideoMute, state),
        };
        Ok(command)
    }
}

/// Resolve placeholders in `value` and parse the result as a `u32`.
fn resolve_number(
    action: &'static str,
    option: &'static str,
    value: &str,
    resolver: &dyn VariableResolver,
) -> Result<u32, ParameterError> {
    let resolved = if value.contains(PLACEHOLDER_START) {
        resolver.resolve(value)
    } else {
        value.to_string()
    };
    let resolved = resolved.trim();

    let not_a_number = || ParameterError::NotANumber {
        action,
        option,
        value: resolved.to_string(),
    };
    if resolved.is_empty() || !resolved.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_a_number());
    }
    resolved.parse().map_err(|_| not_a_number())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> VariableMap {
        [("internal:input", "4"), ("padded", " 7 "), ("word", "three")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_resolve_placeholders() {
        let vars = vars();
        assert_eq!(vars.resolve("$(internal:input)"), "4");
        assert_eq!(vars.resolve("a$(internal:input)b$(word)"), "a4bthree");
        assert_eq!(vars.resolve("$(missing)"), "$(missing)");
        assert_eq!(vars.resolve("$(unterminated"), "$(unterminated");
        assert_eq!(vars.resolve("plain"), "plain");
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            VariableMap::parse_pair("input=3"),
            Some(("input".to_string(), "3".to_string()))
        );
        assert_eq!(VariableMap::parse_pair("=3"), None);
        assert_eq!(VariableMap::parse_pair("input"), None);
    }

    #[test]
    fn test_fixed_actions() {
        let cmd = Action::SwitchVideo { input: 3 }.into_command(&NoVariables).unwrap();
        assert_eq!(cmd.encode(), b"#ROUTE 1,1,3\r");
        let cmd = Action::SwitchAudio { input: 3 }.into_command(&NoVariables).unwrap();
        assert_eq!(cmd.encode(), b"#ROUTE 2,1,3\r");
        let cmd = Action::AudioLevel { level: 20 }.into_command(&NoVariables).unwrap();
        assert_eq!(cmd.encode(), b"#AUD-LVL 1,1,20\r");
        let cmd = Action::VideoMute { state: 1 }.into_command(&NoVariables).unwrap();
        assert_eq!(cmd.encode(), b"#VMUTE 1,1\r");
    }

    #[test]
    fn test_dynamic_action_resolves() {
        let action = Action::SwitchVideoDynamic { input: "$(internal:input)".to_string() };
        let cmd = action.into_command(&vars()).unwrap();
        assert_eq!(cmd.encode(), b"#ROUTE 1,1,4\r");

        let action = Action::SwitchAudioDynamic { input: "$(padded)".to_string() };
        let cmd = action.into_command(&vars()).unwrap();
        assert_eq!(cmd.encode(), b"#ROUTE 2,1,7\r");

        let action = Action::SwitchAudioDynamic { input: "2".to_string() };
        assert_eq!(action.into_command(&NoVariables).unwrap().param, 2);
    }

    #[test]
    fn test_dynamic_action_rejects_non_numbers() {
        let action = Action::SwitchVideoDynamic { input: "$(word)".to_string() };
        assert_eq!(
            action.into_command(&vars()),
            Err(ParameterError::NotANumber {
                action: "switch_video_dynamic",
                option: "input",
                value: "three".to_string(),
            })
        );

        for input in ["$(missing)", "", "-1", "+1", "1.5", "99999999999"] {
            let action = Action::SwitchAudioDynamic { input: input.to_string() };
            assert!(action.into_command(&vars()).is_err(), "accepted {:?}", input);
        }
    }
}
