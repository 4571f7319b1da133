//! `upscale_video`: one video in, one video out.

use async_trait::async_trait;
use sf_core::StepType;

use super::{missing_input, resolve_media};
use crate::chain::ChainConfig;
use crate::context::StepContext;
use crate::executor::{resolve_params, PricedGenerator, StepExecutor};
use crate::generator::GenerationRequest;
use crate::input::StepInput;
use crate::result::StepResult;
use crate::step::Step;

pub struct VideoUpscaleExecutor {
    generator: PricedGenerator,
}

impl VideoUpscaleExecutor {
    pub fn new(generator: PricedGenerator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl StepExecutor for VideoUpscaleExecutor {
    fn step_type(&self) -> StepType {
        StepType::UpscaleVideo
    }

    async fn run(
        &self,
        step: &Step,
        input: &StepInput,
        chain: &ChainConfig,
        ctx: &StepContext,
    ) -> sf_core::Result<StepResult> {
        let mut media = resolve_media(input, chain.input_video.as_deref());
        match media.len() {
            0 => return Err(missing_input(&step.name, "video", input)),
            1 => {}
            n => {
                return Ok(StepResult::failure(
                    &step.model,
                    format!("upscale_video takes a single video, got {n} items"),
                    0.0,
                ))
            }
        }

        let params = resolve_params(step, chain, &ctx.overrides, &[]);
        let request = GenerationRequest::for_step(step, ctx)
            .with_params(params)
            .with_input(media.remove(0));
        self.generator.generate_once(request).await
    }
}
