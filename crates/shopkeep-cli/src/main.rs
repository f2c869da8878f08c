// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use runtime::HttpRuntime;
use shopkeep_api::Client;
use shopkeep_app::TableModel;
use shopkeep_testkit::{CollectionServer, ProductFaker};
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEMO_SEED: u64 = 2026;
const DEMO_PRODUCT_COUNT: usize = 12;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `shopkeep --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    init_logging(&config)?;

    // The demo server must outlive the UI loop; dropping it stops the thread.
    let (base_url, _demo_server) = if options.demo {
        let seed = ProductFaker::new(DEMO_SEED).collection(DEMO_PRODUCT_COUNT);
        let server = CollectionServer::start(seed).context("start demo collection server")?;
        (server.base_url().to_owned(), Some(server))
    } else {
        let url = config.base_url().ok_or_else(|| {
            anyhow!(
                "no remote endpoint configured; set [remote].base_url in {} or SHOPKEEP_BASE_URL, or run with --demo",
                options.config_path.display()
            )
        })?;
        (url, None)
    };

    let client = Client::new(&base_url, config.timeout()?).with_context(|| {
        format!(
            "invalid [remote] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    if options.check_only {
        return Ok(());
    }

    let mut model = TableModel::new();
    let mut runtime = HttpRuntime::new(client);
    shopkeep_tui::run_app(&mut model, &mut runtime, config.write_policy())
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level())
        .with_context(|| format!("invalid [log].level {:?}", config.log_level()))?;

    match config.log_file() {
        Some(path) => {
            let file = fs::File::options()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            // The TUI owns the terminal; stderr output stays readable after
            // the alternate screen is torn down.
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .with_ansi(false)
                .init();
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    demo: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        demo: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("shopkeep");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch against a seeded in-process collection server");
    println!("  --check                  Validate config + remote client setup");
    println!("  --help                   Show this help");
}
