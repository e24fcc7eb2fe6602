mod analysis;
mod color;
mod config;
mod data;
mod export;
mod pipeline;
mod plot;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use log::info;

use config::RunConfig;
use data::loader::preview_lines;

fn cli() -> Command {
    Command::new("scrna-explore")
        .about("Merge and summarize single-cell annotation files")
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Load the filtered annotation files and write summaries")
                .arg(
                    Arg::new("CONFIG")
                        .help("JSON run configuration; built-in defaults when omitted")
                        .index(1)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("OUT_DIR")
                        .help("Output directory, overrides the configured one")
                        .short('o')
                        .long("out_dir")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("summarize")
                .about("Recompute frequency outputs from an exported table (.csv or .parquet)")
                .arg(
                    Arg::new("TABLE")
                        .required(true)
                        .index(1)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("OUT_DIR")
                        .help("Output directory")
                        .short('o')
                        .long("out_dir")
                        .default_value(".")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("preview")
                .about("Print the first lines of a gzip-compressed text file")
                .arg(
                    Arg::new("FILE")
                        .required(true)
                        .index(1)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("LINES")
                        .short('n')
                        .long("lines")
                        .default_value("11")
                        .value_parser(value_parser!(usize)),
                ),
        )
}

fn run(matches: &ArgMatches) -> Result<()> {
    let mut config = match matches.get_one::<PathBuf>("CONFIG") {
        Some(path) => RunConfig::from_path(path)?,
        None => RunConfig::default(),
    };
    if let Some(out_dir) = matches.get_one::<PathBuf>("OUT_DIR") {
        config.output_dir = out_dir.clone();
    }
    info!("Annotation directory: {}", config.loader.directory.display());
    pipeline::run(&config)
}

fn summarize(matches: &ArgMatches) -> Result<()> {
    let (Some(table), Some(out_dir)) = (
        matches.get_one::<PathBuf>("TABLE"),
        matches.get_one::<PathBuf>("OUT_DIR"),
    ) else {
        anyhow::bail!("summarize needs a TABLE");
    };
    pipeline::summarize_table(table, out_dir)
}

fn preview(matches: &ArgMatches) -> Result<()> {
    let (Some(path), Some(&n)) = (
        matches.get_one::<PathBuf>("FILE"),
        matches.get_one::<usize>("LINES"),
    ) else {
        anyhow::bail!("preview needs a FILE");
    };
    for line in preview_lines(path, n).with_context(|| format!("previewing {}", path.display()))? {
        println!("{}", line.trim());
    }
    Ok(())
}

fn dispatch(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("run", sub)) => run(sub),
        Some(("summarize", sub)) => summarize(sub),
        Some(("preview", sub)) => preview(sub),
        _ => unreachable!("subcommand_required"),
    }
}

/// Log a failure once, with its context chain, and turn it into the exit
/// status.
fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    report(dispatch(&cli().get_matches()))
}
