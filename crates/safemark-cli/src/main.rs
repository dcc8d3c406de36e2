use std::borrow::Cow;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use safemark_core::{
    RenderOptions, complete_incomplete_tokens, emit_html, lex, markdown_sanitizer_config,
    parse_render_options, render_markdown, sanitize,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct CliOptions {
    input: Option<String>,
    config: Option<String>,
    raw: bool,
    html: bool,
    stream: bool,
    trusted: bool,
    allow_data_images: bool,
    plaintext: bool,
    tokens: bool,
    verbose: bool,
}

fn main() {
    let cli = parse_args();
    init_logging(cli.verbose);

    let options = load_options(&cli);
    let source = match &cli.input {
        Some(path) => fs::read_to_string(path).unwrap_or_else(|err| {
            eprintln!("failed to read {}: {}", path, err);
            process::exit(1);
        }),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .unwrap_or_else(|err| {
                    eprintln!("failed to read stdin: {}", err);
                    process::exit(1);
                });
            buffer
        }
    };
    debug!(bytes = source.len(), html = cli.html, raw = cli.raw, "read input");

    if cli.html {
        print!("{}", sanitize(&source, &markdown_sanitizer_config(&options)));
        return;
    }

    if cli.tokens || cli.raw {
        let tokens = lex(&source);
        let tokens = if options.streaming {
            complete_incomplete_tokens(&tokens)
        } else {
            Cow::Borrowed(tokens.as_slice())
        };
        if cli.tokens {
            println!("{:#?}", tokens);
        } else {
            print!("{}", emit_html(&tokens));
        }
        return;
    }

    print!("{}", render_markdown(&source, &options));
}

fn parse_args() -> CliOptions {
    let mut cli = CliOptions::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "--raw" => cli.raw = true,
            "--html" => cli.html = true,
            "--stream" => cli.stream = true,
            "--trusted" => cli.trusted = true,
            "--allow-data-images" => cli.allow_data_images = true,
            "--plaintext" => cli.plaintext = true,
            "--tokens" => cli.tokens = true,
            "-v" | "--verbose" => cli.verbose = true,
            "--config" => match args.next() {
                Some(path) => cli.config = Some(path),
                None => {
                    eprintln!("--config expects a file path");
                    print_usage();
                    process::exit(2);
                }
            },
            _ if arg.starts_with('-') && arg != "-" => {
                eprintln!("unknown option: {}", arg);
                print_usage();
                process::exit(2);
            }
            _ => {
                if cli.input.is_none() && arg != "-" {
                    cli.input = Some(arg);
                } else if arg != "-" {
                    eprintln!("unexpected argument: {}", arg);
                    print_usage();
                    process::exit(2);
                }
            }
        }
    }
    if cli.html && (cli.raw || cli.tokens) {
        eprintln!("--html cannot be combined with --raw or --tokens");
        print_usage();
        process::exit(2);
    }
    cli
}

/// Config file first, then command-line flags on top.
fn load_options(cli: &CliOptions) -> RenderOptions {
    let mut options = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path).unwrap_or_else(|err| {
                eprintln!("failed to read {}: {}", path, err);
                process::exit(1);
            });
            parse_render_options(&json).unwrap_or_else(|err| {
                eprintln!("{}: {}", path, err);
                process::exit(1);
            })
        }
        None => RenderOptions::default(),
    };
    options.streaming |= cli.stream;
    options.trusted |= cli.trusted;
    options.allow_data_images |= cli.allow_data_images;
    options.sanitizer.replace_with_plaintext |= cli.plaintext;
    options
}

/// SAFEMARK_LOG wins over RUST_LOG; logs go to stderr so stdout stays HTML.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = env::var("SAFEMARK_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn print_usage() {
    eprintln!(
        "Usage: safemark [--html | --raw | --tokens] [--stream] [--trusted] [--allow-data-images] \
         [--plaintext] [--config FILE] [-v|--verbose] [input]"
    );
}
