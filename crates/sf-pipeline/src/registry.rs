//! Executor registry: step-type tag to executor, built once per process.

use std::collections::HashMap;
use std::sync::Arc;

use sf_core::{PricingTable, StepType};

use crate::chain::{Chain, ChainConfig};
use crate::context::StepContext;
use crate::executor::{execute_step, PricedGenerator, StepExecutor};
use crate::executors::{
    group_members, ImageTextExecutor, ImageTransformExecutor, ParallelGroupExecutor,
    SplitImageExecutor, TextToMediaExecutor, VideoUpscaleExecutor,
};
use crate::generator::Generator;
use crate::input::StepInput;
use crate::result::StepResult;
use crate::step::Step;

/// Generators keyed by the step type they serve.
pub type GeneratorSet = HashMap<StepType, Arc<dyn Generator>>;

/// Lookup table from step type to executor.
#[derive(Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<StepType, Arc<dyn StepExecutor>>,
    pricing: Arc<PricingTable>,
}

impl ExecutorRegistry {
    /// An empty registry.
    pub fn new(pricing: PricingTable) -> Self {
        Self {
            executors: HashMap::new(),
            pricing: Arc::new(pricing),
        }
    }

    /// Register (or replace) the executor for its step type.
    pub fn register(&mut self, executor: Arc<dyn StepExecutor>) {
        self.executors.insert(executor.step_type(), executor);
    }

    /// Build the standard registry.
    ///
    /// Every step type with a generator in `generators` gets its executor;
    /// `split_image` and `parallel_group` are always present.
    pub fn from_generators(generators: &GeneratorSet, pricing: PricingTable) -> Self {
        let mut registry = Self::new(pricing);
        let pricing = Arc::clone(&registry.pricing);

        for step_type in StepType::KNOWN.iter().filter(|t| t.uses_generator()) {
            let Some(generator) = generators.get(step_type) else {
                continue;
            };
            let priced = PricedGenerator::new(Arc::clone(generator), Arc::clone(&pricing));
            let executor: Arc<dyn StepExecutor> = match step_type {
                StepType::TextToImage | StepType::TextToVideo => {
                    Arc::new(TextToMediaExecutor::new(step_type.clone(), priced))
                }
                StepType::ImageToImage | StepType::ImageToVideo | StepType::UpscaleImage => {
                    Arc::new(ImageTransformExecutor::new(step_type.clone(), priced))
                }
                StepType::ImageUnderstanding | StepType::PromptGeneration => {
                    Arc::new(ImageTextExecutor::new(step_type.clone(), priced))
                }
                StepType::UpscaleVideo => Arc::new(VideoUpscaleExecutor::new(priced)),
                _ => continue,
            };
            tracing::debug!(step_type = %step_type, provider = generator.name(), "Registered executor");
            registry.register(executor);
        }
        registry.register(Arc::new(SplitImageExecutor::new()));

        // Groups resolve their members against a snapshot without themselves.
        let members = Arc::new(registry.clone());
        registry.register(Arc::new(ParallelGroupExecutor::new(members)));
        registry
    }

    pub fn get(&self, step_type: &StepType) -> Option<Arc<dyn StepExecutor>> {
        self.executors.get(step_type).cloned()
    }

    /// Registered step types in catalogue order.
    pub fn step_types(&self) -> Vec<StepType> {
        StepType::KNOWN
            .iter()
            .filter(|t| self.executors.contains_key(*t))
            .cloned()
            .collect()
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Enabled steps (including group members) that have no executor, as
    /// `"<step> (<type>)"` strings.
    pub fn missing_executors(&self, chain: &Chain) -> Vec<String> {
        let mut missing = Vec::new();
        for step in chain.enabled_steps() {
            self.collect_missing(step, &mut missing);
        }
        missing
    }

    fn collect_missing(&self, step: &Step, missing: &mut Vec<String>) {
        if !self.executors.contains_key(&step.step_type) {
            missing.push(format!("{} ({})", step.name, step.step_type));
            return;
        }
        if step.step_type == StepType::ParallelGroup {
            for member in group_members(step).unwrap_or_default() {
                if member.enabled {
                    self.collect_missing(&member, missing);
                }
            }
        }
    }

    /// Run `step` through its executor. A step type with no executor yields
    /// a failed result rather than an error.
    pub async fn execute(
        &self,
        step: &Step,
        input: &StepInput,
        chain: &ChainConfig,
        ctx: &StepContext,
    ) -> StepResult {
        match self.executors.get(&step.step_type) {
            Some(executor) => execute_step(executor.as_ref(), step, input, chain, ctx).await,
            None => StepResult::failure(
                &step.model,
                format!("no executor registered for step type '{}'", step.step_type),
                0.0,
            ),
        }
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("step_types", &self.step_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GenerationRequest, GenerationResponse};
    use async_trait::async_trait;

    struct Stub;

    #[async_trait]
    impl Generator for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, request: GenerationRequest) -> sf_core::Result<GenerationResponse> {
            Ok(GenerationResponse::with_path(format!("/out/{}.png", request.output_name)))
        }
    }

    fn registry_with(types: &[StepType]) -> ExecutorRegistry {
        let generators: GeneratorSet = types
            .iter()
            .map(|t| (t.clone(), Arc::new(Stub) as Arc<dyn Generator>))
            .collect();
        ExecutorRegistry::from_generators(&generators, PricingTable::builtin())
    }

    #[test]
    fn local_executors_always_registered() {
        let registry = registry_with(&[]);
        assert_eq!(
            registry.step_types(),
            vec![StepType::SplitImage, StepType::ParallelGroup]
        );
    }

    #[test]
    fn generator_types_are_registered() {
        let registry = registry_with(&[StepType::TextToImage, StepType::ImageToVideo]);
        assert!(registry.get(&StepType::TextToImage).is_some());
        assert!(registry.get(&StepType::ImageToVideo).is_some());
        assert!(registry.get(&StepType::UpscaleVideo).is_none());
        assert_eq!(
            registry.get(&StepType::ImageToVideo).unwrap().step_type(),
            StepType::ImageToVideo
        );
    }

    #[test]
    fn missing_executors_lists_group_members() {
        let registry = registry_with(&[StepType::TextToImage]);
        let chain = Chain::from_yaml(
            r#"
name: demo
prompt: a castle
steps:
  - type: text_to_image
  - type: parallel_group
    params:
      steps:
        - name: hd
          type: upscale_image
        - name: describe
          type: image_understanding
"#,
        )
        .unwrap();
        let missing = registry.missing_executors(&chain);
        assert_eq!(
            missing,
            vec![
                "hd (upscale_image)".to_string(),
                "describe (image_understanding)".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn unregistered_type_fails_the_step() {
        let registry = registry_with(&[]);
        let step = Step::new("hero", StepType::TextToImage, "auto");
        let ctx = StepContext::new("demo", "/tmp/out");
        let result = registry
            .execute(&step, &StepInput::Text("x".into()), &ChainConfig::default(), &ctx)
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no executor registered"));
    }
}
