//! Per-image generation (`image_to_image`, `image_to_video`,
//! `upscale_image`). Several input images fan out.

use async_trait::async_trait;
use sf_core::StepType;

use super::{missing_input, resolve_media, resolve_prompt};
use crate::chain::ChainConfig;
use crate::context::StepContext;
use crate::executor::{resolve_params, PricedGenerator, StepExecutor};
use crate::fanout::FanOutSettings;
use crate::generator::GenerationRequest;
use crate::input::StepInput;
use crate::result::StepResult;
use crate::step::Step;

/// Transform each input image with one generation call.
pub struct ImageTransformExecutor {
    step_type: StepType,
    generator: PricedGenerator,
}

impl ImageTransformExecutor {
    pub fn new(step_type: StepType, generator: PricedGenerator) -> Self {
        Self {
            step_type,
            generator,
        }
    }
}

#[async_trait]
impl StepExecutor for ImageTransformExecutor {
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
        let mut media = resolve_media(input, chain.input_image.as_deref());
        if media.is_empty() {
            return Err(missing_input(&step.name, "image", input));
        }

        // Text handed over by a previous step is a prompt, not an image.
        let prompt = resolve_prompt(&params, input, chain);
        let settings = FanOutSettings::from_params(&params, false, ctx.default_max_workers);
        let template = GenerationRequest::for_step(step, ctx)
            .with_prompt(prompt)
            .with_params(params);

        if media.len() == 1 {
            let prompt = settings.prompt_for(0, template.prompt.as_deref());
            let request = template.with_prompt(prompt).with_input(media.remove(0));
            return self.generator.generate_once(request).await;
        }

        Ok(self.generator.generate_each(template, media, &settings).await)
    }
}
