//! Built-in step executors.
//!
//! Each executor handles one step type (or a family sharing a request
//! shape) behind the unified [`StepExecutor`](crate::executor::StepExecutor)
//! trait.

mod image_transform;
mod parallel_group;
mod split_image;
mod text_to_media;
mod understanding;
mod upscale_video;

pub use image_transform::ImageTransformExecutor;
pub use parallel_group::{group_members, ParallelGroupExecutor};
pub use split_image::{parse_grid, SplitImageExecutor};
pub(crate) use split_image::grid_from_params;
pub use text_to_media::TextToMediaExecutor;
pub use understanding::ImageTextExecutor;
pub use upscale_video::VideoUpscaleExecutor;

use crate::chain::ChainConfig;
use crate::input::{MediaRef, StepInput};
use crate::step::{param_str, Params};

/// Prompt for a generation call: the step's `prompt` param, then text
/// handed over by the previous step, then the chain-level prompt.
pub(crate) fn resolve_prompt(params: &Params, input: &StepInput, chain: &ChainConfig) -> Option<String> {
    param_str(params, "prompt")
        .map(str::to_string)
        .or_else(|| input.as_text().map(str::to_string))
        .or_else(|| chain.prompt.clone().filter(|p| !p.trim().is_empty()))
}

/// Media items for an image/video step, falling back to the chain-level
/// input of that kind when the step was handed nothing.
pub(crate) fn resolve_media(input: &StepInput, chain_fallback: Option<&str>) -> Vec<MediaRef> {
    let media = input.media();
    if !media.is_empty() {
        return media;
    }
    chain_fallback
        .filter(|s| !s.trim().is_empty())
        .map(|s| vec![MediaRef::from_location(s)])
        .unwrap_or_default()
}

pub(crate) fn missing_input(step: &str, what: &str, input: &StepInput) -> sf_core::Error {
    sf_core::Error::pipeline(step, format!("expected {what} input, got {}", input.describe()))
}
