//! Text-prompted generation (`text_to_image`, `text_to_video`).

use async_trait::async_trait;
use sf_core::StepType;

use super::resolve_prompt;
use crate::chain::ChainConfig;
use crate::context::StepContext;
use crate::executor::{resolve_params, PricedGenerator, StepExecutor};
use crate::generator::GenerationRequest;
use crate::input::StepInput;
use crate::result::StepResult;
use crate::step::Step;

/// Generate one image or video from a text prompt.
pub struct TextToMediaExecutor {
    step_type: StepType,
    generator: PricedGenerator,
}

impl TextToMediaExecutor {
    pub fn new(step_type: StepType, generator: PricedGenerator) -> Self {
        Self {
            step_type,
            generator,
        }
    }
}

#[async_trait]
impl StepExecutor for TextToMediaExecutor {
    fn step_type(&self) -> StepType {
        self.step_type.clone()
    }

    async fn run(
        &self,
        step: &Step,
        input: &StepInput,
        chain: &ChainConfig,
        ctx: &StepContext,
    ) -> sf_core::Result<StepResult> {
        let params = resolve_params(step, chain, &ctx.overrides, &["prompt"]);
        let Some(prompt) = resolve_prompt(&params, input, chain) else {
            return Ok(StepResult::failure(
                &step.model,
                format!("{} needs a prompt, got {}", self.step_type, input.describe()),
                0.0,
            ));
        };

        let request = GenerationRequest::for_step(step, ctx)
            .with_prompt(Some(prompt))
            .with_params(params);
        self.generator.generate_once(request).await
    }
}
