//! Image-to-text steps (`image_understanding`, `prompt_generation`).
//!
//! The produced text is written to `<output_dir>/<step>.txt` and also
//! carried in [`StepResult::output_text`] for the next step.

use std::time::Instant;

use async_trait::async_trait;
use sf_core::StepType;

use super::{missing_input, resolve_media};
use crate::chain::ChainConfig;
use crate::context::StepContext;
use crate::executor::{resolve_params, write_text_output, PricedGenerator, StepExecutor};
use crate::generator::GenerationRequest;
use crate::input::StepInput;
use crate::result::StepResult;
use crate::step::{param_str, Step};

const DEFAULT_QUESTION: &str = "Describe this image in detail.";

/// Ask a provider for text about one image.
pub struct ImageTextExecutor {
    step_type: StepType,
    generator: PricedGenerator,
}

impl ImageTextExecutor {
    pub fn new(step_type: StepType, generator: PricedGenerator) -> Self {
        Self {
            step_type,
            generator,
        }
    }

    /// The param this step type treats as its instruction.
    fn instruction_key(&self) -> &'static str {
        match self.step_type {
            StepType::PromptGeneration => "background_context",
            _ => "question",
        }
    }
}

#[async_trait]
impl StepExecutor for ImageTextExecutor {
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
        let started = Instant::now();
        let key = self.instruction_key();
        let params = resolve_params(step, chain, &ctx.overrides, &[key, "prompt"]);
        let mut media = resolve_media(input, chain.input_image.as_deref());
        if media.is_empty() {
            return Err(missing_input(&step.name, "image", input));
        }
        if media.len() > 1 {
            tracing::warn!(
                step = %step.name,
                items = media.len(),
                "{} uses only the first image",
                self.step_type
            );
        }

        let instruction = param_str(&params, key).map(str::to_string).or_else(|| {
            (self.step_type == StepType::ImageUnderstanding).then(|| DEFAULT_QUESTION.to_string())
        });
        let request = GenerationRequest::for_step(step, ctx)
            .with_prompt(instruction)
            .with_params(params)
            .with_input(media.remove(0));

        let model = request.model.clone();
        let fallback = self.generator.unit_cost(&self.step_type, &model);
        let mut response = self.generator.generator.generate(request).await?;
        if response.success {
            match response.output_text.as_deref().filter(|t| !t.trim().is_empty()) {
                Some(text) => {
                    let path = write_text_output(&ctx.output_dir, &step.name, text).await?;
                    response.output_path = Some(path);
                }
                None => {
                    response.success = false;
                    response.error = Some("provider returned no text".into());
                }
            }
        }
        Ok(StepResult::from_response(
            response,
            &model,
            fallback,
            started.elapsed().as_secs_f64(),
        ))
    }
}
