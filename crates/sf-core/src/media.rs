//! Media-domain enums: the kinds of data flowing between steps and the closed
//! set of step types a chain may declare.
//!
//! Both enums serialize in snake_case and implement `Display` manually for a
//! consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// The kind of data a step consumes or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Text,
    Image,
    Video,
    /// Accepts or produces a heterogeneous group of inputs.
    Any,
}

impl MediaKind {
    /// Whether data of kind `self` may be handed to a step expecting `next`.
    pub fn feeds(self, next: MediaKind) -> bool {
        self == MediaKind::Any || next == MediaKind::Any || self == next
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Any => write!(f, "any"),
        }
    }
}

// ---------------------------------------------------------------------------
// StepType
// ---------------------------------------------------------------------------

/// Step-type tag declared by each chain step.
///
/// Unrecognised tags are preserved as [`StepType::Unknown`] so chain
/// validation can report them by name instead of failing at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepType {
    TextToImage,
    TextToVideo,
    ImageToImage,
    ImageToVideo,
    ImageUnderstanding,
    PromptGeneration,
    SplitImage,
    UpscaleImage,
    UpscaleVideo,
    ParallelGroup,
    Unknown(String),
}

impl StepType {
    /// Every known step type, in catalogue order.
    pub const KNOWN: [StepType; 10] = [
        StepType::TextToImage,
        StepType::TextToVideo,
        StepType::ImageToImage,
        StepType::ImageToVideo,
        StepType::ImageUnderstanding,
        StepType::PromptGeneration,
        StepType::SplitImage,
        StepType::UpscaleImage,
        StepType::UpscaleVideo,
        StepType::ParallelGroup,
    ];

    /// The snake_case tag used in chain documents.
    pub fn as_str(&self) -> &str {
        match self {
            Self::TextToImage => "text_to_image",
            Self::TextToVideo => "text_to_video",
            Self::ImageToImage => "image_to_image",
            Self::ImageToVideo => "image_to_video",
            Self::ImageUnderstanding => "image_understanding",
            Self::PromptGeneration => "prompt_generation",
            Self::SplitImage => "split_image",
            Self::UpscaleImage => "upscale_image",
            Self::UpscaleVideo => "upscale_video",
            Self::ParallelGroup => "parallel_group",
            Self::Unknown(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Kind of input this step type expects, or `None` for unknown tags.
    pub fn input_kind(&self) -> Option<MediaKind> {
        let kind = match self {
            Self::TextToImage | Self::TextToVideo => MediaKind::Text,
            Self::ImageToImage
            | Self::ImageToVideo
            | Self::ImageUnderstanding
            | Self::PromptGeneration
            | Self::SplitImage
            | Self::UpscaleImage => MediaKind::Image,
            Self::UpscaleVideo => MediaKind::Video,
            Self::ParallelGroup => MediaKind::Any,
            Self::Unknown(_) => return None,
        };
        Some(kind)
    }

    /// Kind of output this step type produces, or `None` for unknown tags.
    pub fn output_kind(&self) -> Option<MediaKind> {
        let kind = match self {
            Self::TextToImage
            | Self::ImageToImage
            | Self::SplitImage
            | Self::UpscaleImage => MediaKind::Image,
            Self::TextToVideo | Self::ImageToVideo | Self::UpscaleVideo => MediaKind::Video,
            Self::ImageUnderstanding | Self::PromptGeneration => MediaKind::Text,
            Self::ParallelGroup => MediaKind::Any,
            Self::Unknown(_) => return None,
        };
        Some(kind)
    }

    /// Whether executing this step type calls out to a generation provider.
    pub fn uses_generator(&self) -> bool {
        !matches!(
            self,
            Self::SplitImage | Self::ParallelGroup | Self::Unknown(_)
        )
    }

    /// Whether this step type can fan out over a collection of inputs.
    pub fn supports_fan_out(&self) -> bool {
        matches!(
            self,
            Self::ImageToImage | Self::ImageToVideo | Self::UpscaleImage | Self::ParallelGroup
        )
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl From<String> for StepType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text_to_image" => Self::TextToImage,
            "text_to_video" => Self::TextToVideo,
            "image_to_image" => Self::ImageToImage,
            "image_to_video" => Self::ImageToVideo,
            "image_understanding" => Self::ImageUnderstanding,
            "prompt_generation" => Self::PromptGeneration,
            "split_image" => Self::SplitImage,
            "upscale_image" => Self::UpscaleImage,
            "upscale_video" => Self::UpscaleVideo,
            "parallel_group" => Self::ParallelGroup,
            _ => Self::Unknown(tag),
        }
    }
}

impl From<StepType> for String {
    fn from(step_type: StepType) -> Self {
        match step_type {
            StepType::Unknown(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_from_str() {
        for step_type in StepType::KNOWN.iter() {
            let parsed: StepType = step_type.as_str().parse().unwrap();
            assert_eq!(&parsed, step_type);
            assert!(parsed.is_known());
        }
    }

    #[test]
    fn unknown_tag_is_preserved() {
        let parsed: StepType = serde_json::from_str("\"add_audio\"").unwrap();
        assert_eq!(parsed, StepType::Unknown("add_audio".into()));
        assert!(!parsed.is_known());
        assert_eq!(parsed.input_kind(), None);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"add_audio\"");
    }

    #[test]
    fn step_type_serializes_as_tag() {
        let json = serde_json::to_string(&StepType::ImageToVideo).unwrap();
        assert_eq!(json, "\"image_to_video\"");
    }

    #[test]
    fn kinds_follow_catalogue() {
        assert_eq!(StepType::TextToImage.input_kind(), Some(MediaKind::Text));
        assert_eq!(StepType::TextToImage.output_kind(), Some(MediaKind::Image));
        assert_eq!(StepType::ImageUnderstanding.output_kind(), Some(MediaKind::Text));
        assert_eq!(StepType::UpscaleVideo.input_kind(), Some(MediaKind::Video));
        assert_eq!(StepType::ParallelGroup.input_kind(), Some(MediaKind::Any));
    }

    #[test]
    fn media_kind_compatibility() {
        assert!(MediaKind::Image.feeds(MediaKind::Image));
        assert!(MediaKind::Any.feeds(MediaKind::Video));
        assert!(MediaKind::Text.feeds(MediaKind::Any));
        assert!(!MediaKind::Image.feeds(MediaKind::Text));
    }

    #[test]
    fn generator_and_fan_out_flags() {
        assert!(!StepType::SplitImage.uses_generator());
        assert!(!StepType::ParallelGroup.uses_generator());
        assert!(StepType::UpscaleImage.uses_generator());
        assert!(StepType::ImageToVideo.supports_fan_out());
        assert!(!StepType::TextToImage.supports_fan_out());
    }

    #[test]
    fn display_matches_tag() {
        assert_eq!(StepType::SplitImage.to_string(), "split_image");
        assert_eq!(MediaKind::Video.to_string(), "video");
    }
}
