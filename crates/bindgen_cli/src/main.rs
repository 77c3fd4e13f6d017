//! forge-bindgen: generate bindings from a spec
//!
//! Usage:
//!   forge-bindgen generate --spec spec.toml --opt-in opt-in.toml -o generated
//!   forge-bindgen check --spec spec.toml
//!
//! Settings from `bindgen.toml` apply unless overridden by flags.

mod config;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use config::Config;
use forge_bindgen::{bind_model, BindingBuilder, BoundSpec, CommandFormatter, OptInSpec, RawSpec, Target};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// generate N-API, emscripten and TypeScript bindings from a C++ API spec
#[derive(Parser, Debug)]
#[command(name = "forge-bindgen", version)]
struct CommandLineInterface {
    /// project config (defaults to ./bindgen.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate and write the selected targets
    Generate(GenerateArgs),
    /// bind the spec and run every emitter without writing anything
    Check(InputArgs),
}

#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// spec files, merged in order
    #[arg(long, short)]
    spec: Vec<PathBuf>,

    /// opt-in list; without one every method and field is bound
    #[arg(long)]
    opt_in: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct GenerateArgs {
    #[command(flatten)]
    input: InputArgs,

    /// output directory
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// targets to generate (all when omitted)
    #[arg(long = "target", short)]
    targets: Vec<Target>,

    /// formatter command for C++ output
    #[arg(long)]
    cpp_formatter: Option<String>,

    /// formatter command for TypeScript output
    #[arg(long)]
    ts_formatter: Option<String>,

    /// skip all formatters
    #[arg(long)]
    no_format: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("BINDGEN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = CommandLineInterface::parse();
    let config = Config::discover(cli.config.as_deref())?;

    match cli.cmd {
        Command::Generate(args) => generate(args, config),
        Command::Check(args) => check(args, &config),
    }
}

fn load(input: &InputArgs, config: &Config) -> Result<BoundSpec> {
    let specs = if input.spec.is_empty() {
        &config.spec
    } else {
        &input.spec
    };
    if specs.is_empty() {
        bail!("no spec files given; pass --spec or set `spec` in bindgen.toml");
    }

    let raw = RawSpec::load(specs.as_slice()).context("loading spec")?;
    let opt_in = match input.opt_in.as_ref().or(config.opt_in.as_ref()) {
        Some(path) => Some(
            OptInSpec::from_path(path)
                .with_context(|| format!("loading opt-in list {}", path.display()))?,
        ),
        None => None,
    };
    let spec = bind_model(&raw, opt_in.as_ref()).context("binding spec")?;
    tracing::info!(
        classes = spec.classes.len(),
        records = spec.records.len(),
        enums = spec.enums.len(),
        "bound spec"
    );
    Ok(spec)
}

fn formatter(command: Option<&String>) -> Result<Option<CommandFormatter>> {
    match command {
        Some(command) => CommandFormatter::parse(command)
            .map(Some)
            .with_context(|| format!("empty formatter command '{}'", command)),
        None => Ok(None),
    }
}

fn generate(args: GenerateArgs, config: Config) -> Result<()> {
    let spec = load(&args.input, &config)?;
    let output = args
        .output
        .or(config.output)
        .unwrap_or_else(|| PathBuf::from("generated"));
    let targets = if args.targets.is_empty() {
        config.targets
    } else {
        args.targets
    };

    let mut builder = BindingBuilder::new(&spec, &output);
    if !targets.is_empty() {
        builder = builder.targets(&targets);
    }
    if !args.no_format {
        if let Some(cpp) = formatter(args.cpp_formatter.as_ref().or(config.formatters.cpp.as_ref()))? {
            builder = builder.cpp_formatter(cpp);
        }
        if let Some(ts) = formatter(
            args.ts_formatter
                .as_ref()
                .or(config.formatters.typescript.as_ref()),
        )? {
            builder = builder.typescript_formatter(ts);
        }
    }

    let built = builder
        .build()
        .with_context(|| format!("generating into {}", output.display()))?;
    tracing::info!(files = built.files.len(), output = %output.display(), "done");
    Ok(())
}

fn check(args: InputArgs, config: &Config) -> Result<()> {
    let spec = load(&args, config)?;
    for target in Target::ALL {
        let files = target
            .generate(&spec)
            .with_context(|| format!("generating target {}", target))?;
        for (file_name, text) in files {
            if file_name.ends_with(".ts") {
                forge_bindgen::check_typescript(&text, &format!("file:///{}", file_name))?;
            }
        }
    }
    tracing::info!("spec is valid for every target");
    Ok(())
}
