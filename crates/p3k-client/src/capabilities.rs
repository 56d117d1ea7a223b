//! Device capabilities learned from `INFO-IO` and `INFO-PRST` responses.

use std::fmt;

use p3k_protocol::ResponseKind;

/// Counts reported by the device. `None` until the device reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Number of inputs.
    pub inputs: Option<u32>,
    /// Number of outputs.
    pub outputs: Option<u32>,
    /// Number of stored video presets.
    pub video_presets: Option<u32>,
}

/// A capability recorded for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Inputs(u32),
    Outputs(u32),
    VideoPresets(u32),
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detection::Inputs(n) => write!(f, "Detected: {} inputs.", n),
            Detection::Outputs(n) => write!(f, "Detected: {} outputs.", n),
            Detection::VideoPresets(n) => write!(f, "Detected: {} presets.", n),
        }
    }
}

impl Capabilities {
    /// Record any counts carried by a response.
    ///
    /// A field that already has a value is never overwritten. Returns the
    /// fields that were filled in by this call.
    pub fn observe(&mut self, kind: &ResponseKind) -> Vec<Detection> {
        let mut detected = Vec::new();
        match *kind {
            ResponseKind::InputOutput { inputs, outputs } => {
                if self.inputs.is_none() {
                    self.inputs = Some(inputs);
                    detected.push(Detection::Inputs(inputs));
                }
                if self.outputs.is_none() {
                    self.outputs = Some(outputs);
                    detected.push(Detection::Outputs(outputs));
                }
            }
            ResponseKind::Presets { video, .. } => {
                if self.video_presets.is_none() {
                    self.video_presets = Some(video);
                    detected.push(Detection::VideoPresets(video));
                }
            }
            ResponseKind::DeviceError { .. } | ResponseKind::Unhandled => {}
        }
        detected
    }

    /// Whether every count has been reported.
    pub fn is_complete(&self) -> bool {
        self.inputs.is_some() && self.outputs.is_some() && self.video_presets.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_io_once() {
        let mut caps = Capabilities::default();
        let kind = ResponseKind::InputOutput { inputs: 11, outputs: 9 };

        assert_eq!(
            caps.observe(&kind),
            vec![Detection::Inputs(11), Detection::Outputs(9)]
        );
        assert_eq!(caps.inputs, Some(11));
        assert_eq!(caps.outputs, Some(9));

        assert!(caps.observe(&kind).is_empty());
        let other = ResponseKind::InputOutput { inputs: 4, outputs: 1 };
        assert!(caps.observe(&other).is_empty());
        assert_eq!(caps.inputs, Some(11));
        assert_eq!(caps.outputs, Some(9));
    }

    #[test]
    fn test_zero_is_a_real_value() {
        let mut caps = Capabilities::default();
        caps.observe(&ResponseKind::Presets { video: 0, audio: Some(0) });
        assert_eq!(caps.video_presets, Some(0));
        assert!(caps.observe(&ResponseKind::Presets { video: 8, audio: None }).is_empty());
        assert_eq!(caps.video_presets, Some(0));
    }

    #[test]
    fn test_ignores_other_responses() {
        let mut caps = Capabilities::default();
        assert!(caps.observe(&ResponseKind::Unhandled).is_empty());
        assert!(caps.observe(&ResponseKind::DeviceError { code: 2 }).is_empty());
        assert_eq!(caps, Capabilities::default());
        assert!(!caps.is_complete());
    }

    #[test]
    fn test_detection_messages() {
        assert_eq!(Detection::Inputs(4).to_string(), "Detected: 4 inputs.");
        assert_eq!(Detection::VideoPresets(60).to_string(), "Detected: 60 presets.");
    }
}
