// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::time::Instant;

use anyhow::{anyhow, bail, Context};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use validation_bridge::config::load_config;
use validation_bridge::{ModuleRuntime, SupportedModel};

const DEFAULT_INPUT_TYPE: &str = "text";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <config.yaml> <text> [model_selector] [input_type]", args[0]);
        eprintln!("Example: {} configs/bridge.yaml \"john@example.com\" GeminiFlash email", args[0]);
        std::process::exit(1);
    }

    let config_file = &args[1];
    let text = &args[2];
    let model_arg = args.get(3).map(String::as_str).unwrap_or(SupportedModel::GeminiFlash.name());
    let input_type = args.get(4).map(String::as_str).unwrap_or(DEFAULT_INPUT_TYPE);

    let config = load_config(config_file).with_context(|| format!("loading {}", config_file))?;
    let module_path = config
        .module
        .clone()
        .ok_or_else(|| anyhow!("{} does not name a module", config_file))?;
    let api_key = env::var(&config.api_key_env)
        .with_context(|| format!("reading API key from ${}", config.api_key_env))?;

    let start_time = Instant::now();
    let mut runtime = ModuleRuntime::from_file(&module_path, &config)?;
    runtime.init_panic_hook()?;
    runtime.configure(&api_key)?;

    let models = runtime.supported_models()?;
    println!("Supported models:");
    for (name, selector) in models.iter() {
        println!("  {:<20} {}", name, selector);
    }

    let Some(selector) = models.resolve(model_arg) else {
        bail!("unknown model '{}'", model_arg);
    };

    println!();
    println!("Validating {:?} as {} with model {}", text, input_type, model_arg);
    let result = runtime.validate_input(text, selector, input_type).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    let stats = runtime.stats();
    println!();
    println!(
        "Completed in {:.2?} ({} operations, {} live handles, {} closures destroyed)",
        start_time.elapsed(),
        stats.operations_dispatched,
        stats.live_handles,
        stats.closures_destroyed
    );
    Ok(())
}
