use anyhow::{Context, Result, bail};
use blockpaste_config::Config;
use blockpaste_engine::rich_text::create_from_html;
use blockpaste_engine::{PatternRecursionDetector, expand_patterns, parse_blocks};
use std::io::Read;
use std::{env, path::PathBuf, process};

const USAGE: &str = "[--config <file>] [--record] [--verbose] <file.html | ->";

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    record: bool,
    verbose: bool,
    /// `None` reads standard input.
    input: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();
    let mut input = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config needs a file")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--record" => parsed.record = true,
            "--verbose" | "-v" => parsed.verbose = true,
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            path => {
                if input.is_some() {
                    bail!("more than one input file given");
                }
                input = Some(path.to_string());
            }
        }
    }
    match input.as_deref() {
        None => bail!("no input file given"),
        Some("-") => {}
        Some(path) => parsed.input = Some(PathBuf::from(path)),
    }
    Ok(parsed)
}

fn load_config(args: &Args) -> Result<Config> {
    if let Some(path) = &args.config {
        return Config::load_from_path(path)?
            .with_context(|| format!("config file '{}' not found", path.display()));
    }
    let config = Config::load()?;
    if config.is_none() {
        log::info!(
            "No config file at {}, using defaults",
            Config::config_path().display()
        );
    }
    Ok(config.unwrap_or_default())
}

fn read_input(args: &Args) -> Result<String> {
    match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display())),
        None => {
            let mut html = String::new();
            std::io::stdin()
                .read_to_string(&mut html)
                .context("failed to read standard input")?;
            Ok(html)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let html = read_input(args)?;
    let format_types = config.format_type_registry()?;

    if args.record {
        let record = create_from_html(&html, &format_types);
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let blocks = config.block_type_registry()?;
    let ctx = config.raw_handler_context(&blocks, &format_types)?;
    let patterns = config.load_patterns(&ctx)?;

    let converted = parse_blocks(&html, &ctx);
    log::info!("Converted input into {} block(s)", converted.len());

    let mut detector = PatternRecursionDetector::new();
    let expanded: Vec<_> = expand_patterns(&converted, &patterns, &mut detector)
        .iter()
        .map(|block| block.to_json(&blocks))
        .collect();
    println!("{}", serde_json::to_string_pretty(&expanded)?);
    Ok(())
}

fn main() -> Result<()> {
    let argv: Vec<String> = env::args().collect();
    let program = argv.first().map(String::as_str).unwrap_or("blockpaste");

    let args = match parse_args(argv.get(1..).unwrap_or_default()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Usage: {program} {USAGE}");
            process::exit(1);
        }
    };

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    run(&args)
}
