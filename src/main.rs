mod cli;

use storyforge::{config, confirm, report, runner};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use sf_core::StepType;
use sf_pipeline::{estimate_chain_cost, JsonlEmitter, NullEmitter, StreamEmitter};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "storyforge=debug,sf_pipeline=debug,sf_core=debug".to_string()
        } else {
            "storyforge=info,sf_pipeline=info,sf_core=info".to_string()
        }
    });

    // Logs go to stderr; stdout carries results only.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    let outcome = match cli.command {
        Commands::Run {
            chain,
            input,
            yes,
            stream,
            json,
        } => run_chain(&chain, input.as_deref(), config_path, yes, stream, json),
        Commands::Estimate { chain, json } => estimate(&chain, config_path, json),
        Commands::Validate { chain } => validate_chain(&chain, config_path),
        Commands::ListSteps => list_steps(config_path),
        Commands::Version => {
            println!("storyforge {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

/// 2 for validation and config problems, 1 for everything else.
fn exit_status(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<sf_core::Error>())
        .map(|e| e.exit_code())
        .unwrap_or(1) as u8
}

fn invalid(message: String) -> anyhow::Error {
    sf_core::Error::Validation(message).into()
}

fn run_chain(
    chain_path: &Path,
    input: Option<&str>,
    config_path: Option<&Path>,
    assume_yes: bool,
    stream: bool,
    json: bool,
) -> Result<ExitCode> {
    let config = config::load_config_or_default(config_path)?;
    let chain = runner::load_chain(chain_path)?;

    let problems = chain.validate();
    if !problems.is_empty() {
        return Err(invalid(format!(
            "chain '{}' is invalid: {}",
            chain.name,
            problems.join("; ")
        )));
    }

    let executor = runner::build_executor(&config)?;
    let missing = executor.registry().missing_executors(&chain);
    if !missing.is_empty() {
        return Err(invalid(format!(
            "no provider configured for: {}",
            missing.join(", ")
        )));
    }

    let estimate = estimate_chain_cost(&chain, executor.registry().pricing());
    tracing::info!("Estimated cost for '{}': ${:.3}", chain.name, estimate.total_cost);

    let proceed = confirm::confirm_cost(
        &chain.name,
        &estimate,
        config.pipeline.confirm_threshold,
        assume_yes,
        !confirm::is_non_interactive(),
        &mut std::io::stdin().lock(),
        &mut std::io::stderr(),
    )?;
    if !proceed {
        eprintln!("Aborted.");
        return Ok(ExitCode::FAILURE);
    }

    let initial = input.map(runner::parse_input).transpose()?;
    let emitter: Box<dyn StreamEmitter> = if stream {
        Box::new(JsonlEmitter::stdio())
    } else {
        Box::new(NullEmitter)
    };

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(executor.execute_chain(&chain, initial, emitter.as_ref()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !stream {
        println!("{}", report::format_result(&result));
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn estimate(chain_path: &Path, config_path: Option<&Path>, json: bool) -> Result<ExitCode> {
    let config = config::load_config_or_default(config_path)?;
    let chain = runner::load_chain(chain_path)?;
    for problem in chain.validate() {
        tracing::warn!("{}: {}", chain.name, problem);
    }

    let estimate = estimate_chain_cost(&chain, &config.pricing_table());
    if json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
    } else {
        println!("{}", report::format_estimate(&chain.name, &estimate));
    }
    Ok(ExitCode::SUCCESS)
}

fn validate_chain(chain_path: &Path, config_path: Option<&Path>) -> Result<ExitCode> {
    let chain = runner::load_chain(chain_path)?;
    let problems = chain.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("  - {}", problem);
        }
        return Err(invalid(format!(
            "chain '{}' has {} problem(s)",
            chain.name,
            problems.len()
        )));
    }

    println!("✓ Chain '{}' is valid", chain.name);
    println!("  Steps: {}", chain.enabled_steps().len());

    // Provider coverage is advisory here; `run` enforces it.
    let config = config::load_config_or_default(config_path)?;
    let registry = runner::build_registry(&config)?;
    for missing in registry.missing_executors(&chain) {
        println!("  Warning: no provider configured for {}", missing);
    }
    Ok(ExitCode::SUCCESS)
}

fn list_steps(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = config::load_config_or_default(config_path)?;
    let registry = runner::build_registry(&config)?;

    let kind = |k: Option<sf_core::MediaKind>| {
        k.map(|k| k.to_string()).unwrap_or_else(|| "any".into())
    };
    for step_type in StepType::KNOWN.iter() {
        let status = if registry.get(step_type).is_some() {
            "ready"
        } else {
            "no provider"
        };
        println!(
            "{:<20} {:>5} -> {:<5}  {}",
            step_type.as_str(),
            kind(step_type.input_kind()),
            kind(step_type.output_kind()),
            status
        );
    }
    Ok(ExitCode::SUCCESS)
}
