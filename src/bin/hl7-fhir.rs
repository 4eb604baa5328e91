//! hl7-fhir CLI - parse HL7 v2 messages and transform them to FHIR resources
//!
//! Exit codes: 0 on success, 1 on a handled error, 2 on a usage error.

use clap::{ArgAction, Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use hl7_fhir::config::load_config;
use hl7_fhir::fhir::{load_fhir_json, parse_fhir_json};
use hl7_fhir::hl7::to_pretty_segments;
use hl7_fhir::logging::configure_logging;
use hl7_fhir::orchestrator::Converter;
use hl7_fhir::serialization::{
    write_pretty, write_resources_to_dir, JsonArrayWriter, NdjsonWriter,
};

#[derive(Parser)]
#[command(name = "hl7-fhir")]
#[command(version, about = "Parse HL7 v2 messages and transform them to FHIR resources", long_about = None)]
struct Cli {
    /// Path to YAML config file (overrides defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an HL7 v2 message and print one segment per line
    ParseHl7 {
        /// Path to the message file, or "-" for stdin
        path: PathBuf,
    },

    /// Parse a FHIR JSON resource and print it
    ParseFhir {
        /// Path to the resource file (.json), or "-" for stdin
        path: PathBuf,
    },

    /// Transform an HL7 v2 message into FHIR resources
    Transform {
        /// Path to the message file, or "-" for stdin
        path: Option<PathBuf>,

        /// List supported HL7 v2 event codes and exit
        #[arg(long)]
        list: bool,

        /// Directory to write JSON resources (defaults to config default_output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Write resources to stdout (NDJSON unless --pretty)
        #[arg(long)]
        stdout: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Write resources to stdout as a single JSON array
        #[arg(long, conflicts_with_all = ["stdout", "output_dir"])]
        array: bool,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    configure_logging(cli.verbose);

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::ParseHl7 { path } => parse_hl7(config_path, &path),
        Commands::ParseFhir { path } => parse_fhir(&path),
        Commands::Transform {
            path,
            list,
            output_dir,
            stdout,
            pretty,
            array,
        } => {
            let output = if array {
                Output::Array
            } else if stdout {
                Output::Stdout
            } else {
                Output::Dir(output_dir)
            };
            transform(config_path, path.as_deref(), list, output, pretty)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Read a message from a file, or from stdin for "-".
fn read_input(path: &Path) -> Result<String, String> {
    let bytes = if path == Path::new("-") {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        buf
    } else {
        std::fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => format!("File not found: {}", path.display()),
            io::ErrorKind::PermissionDenied => format!("Permission denied: {}", path.display()),
            _ => format!("Failed to read {}: {}", path.display(), e),
        })?
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Where `transform` sends its records
enum Output {
    Dir(Option<PathBuf>),
    Stdout,
    Array,
}

fn converter() -> Result<Converter, String> {
    Converter::with_builtin().map_err(|e| e.to_string())
}

/// Parse and pretty-print segments
fn parse_hl7(config_path: Option<&Path>, path: &Path) -> Result<(), String> {
    let config = load_config(config_path).map_err(|e| e.to_string())?;
    let content = read_input(path)?;
    let message = converter()?
        .parse(&content, &config)
        .map_err(|e| e.to_string())?;

    for line in to_pretty_segments(&message) {
        println!("{}", line);
    }
    Ok(())
}

/// Load a FHIR JSON resource and pretty-print it
fn parse_fhir(path: &Path) -> Result<(), String> {
    let resource = if path == Path::new("-") {
        parse_fhir_json(&read_input(path)?, path)
    } else {
        load_fhir_json(path)
    }
    .map_err(|e| e.to_string())?;

    println!("{}", resource.to_json_pretty().map_err(|e| e.to_string())?);
    Ok(())
}

/// Convert a message and write the resources
fn transform(
    config_path: Option<&Path>,
    path: Option<&Path>,
    list: bool,
    output: Output,
    pretty: bool,
) -> Result<(), String> {
    let converter = converter()?;

    if list {
        println!("Registered HL7 v2 → FHIR events:");
        for event in converter.events() {
            println!("    {}", event);
        }
        return Ok(());
    }

    let path = path.ok_or_else(|| "A message path is required unless --list is given".to_string())?;
    let config = load_config(config_path).map_err(|e| e.to_string())?;
    let content = read_input(path)?;
    let resources = converter
        .convert_text(&content, &config)
        .map_err(|e| e.to_string())?;
    let pretty = pretty || config.pretty;

    match output {
        Output::Array => {
            let mut writer = JsonArrayWriter::new(io::stdout().lock()).map_err(|e| e.to_string())?;
            for resource in &resources {
                writer.write(resource).map_err(|e| e.to_string())?;
            }
            writer.finish().map_err(|e| e.to_string())?;
            println!();
        }
        Output::Stdout if pretty => {
            write_pretty(io::stdout().lock(), &resources).map_err(|e| e.to_string())?;
        }
        Output::Stdout => {
            let mut writer = NdjsonWriter::new(io::stdout().lock());
            writer.write_all(&resources).map_err(|e| e.to_string())?;
            writer.flush().map_err(|e| e.to_string())?;
        }
        Output::Dir(output_dir) => {
            let dir = output_dir.unwrap_or(config.default_output_dir);
            write_resources_to_dir(&resources, &dir, pretty).map_err(|e| e.to_string())?;
        }
    }

    Ok(())
}
