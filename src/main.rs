// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

fn main() {
    if let Err(e) = process() {
        eprintln!("Error: {}.", e);
        std::process::exit(1);
    }
}

const HELP: &str = "\
svgray is an SVG rendering application.

USAGE:
  svgray [OPTIONS] <in-svg> [<out-png>]

OPTIONS:
      --help      Prints this help
  -V, --version   Prints version
      --quiet     Disables warnings

ARGS:
  <in-svg>        Input file
  <out-png>       Output file [default: svgpp.png]
";

struct Args {
    quiet: bool,
    input: PathBuf,
    output: PathBuf,
}

fn collect_args() -> Result<Args, pico_args::Error> {
    let mut input = pico_args::Arguments::from_env();

    if input.contains("--help") {
        print!("{}", HELP);
        std::process::exit(0);
    }

    if input.contains(["-V", "--version"]) {
        println!("{}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    Ok(Args {
        quiet: input.contains("--quiet"),
        input: input.free_from_str()?,
        output: input
            .opt_free_from_str()?
            .unwrap_or_else(|| PathBuf::from("svgpp.png")),
    })
}

fn process() -> Result<(), String> {
    let args = match collect_args() {
        Ok(args) => args,
        Err(e) => {
            println!("{}", HELP);
            return Err(e.to_string());
        }
    };

    if !args.quiet {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Warn);
        }
    }

    let svg_data =
        std::fs::read(&args.input).map_err(|_| "failed to open the provided file".to_string())?;

    let svg_text = std::str::from_utf8(&svg_data)
        .map_err(|_| "provided data has not an UTF-8 encoding".to_string())?;

    let xml_opt = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let xml = roxmltree::Document::parse_with_options(svg_text, xml_opt)
        .map_err(|e| svgray::Error::from(e).to_string())?;

    let mut image = svgray::ImageBuffer::new();
    svgray::render(&xml, &mut image).map_err(|e| e.to_string())?;

    let pixmap = image
        .take()
        .ok_or_else(|| "nothing was rendered".to_string())?;
    pixmap
        .save_png(&args.output)
        .map_err(|_| "failed to write the output PNG file".to_string())?;

    Ok(())
}

/// A simple stderr logger.
static LOGGER: SimpleLogger = SimpleLogger;
struct SimpleLogger;
impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::LevelFilter::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let target = if !record.target().is_empty() {
                record.target()
            } else {
                record.module_path().unwrap_or_default()
            };

            let line = record.line().unwrap_or(0);
            let args = record.args();

            match record.level() {
                log::Level::Error => eprintln!("Error (in {}:{}): {}", target, line, args),
                log::Level::Warn => eprintln!("Warning (in {}:{}): {}", target, line, args),
                _ => eprintln!("{} (in {}:{}): {}", record.level(), target, line, args),
            }
        }
    }

    fn flush(&self) {}
}
