//! Schema Model CLI
//!
//! Command-line interface for inspecting, flattening, and comparing JSON
//! Schema documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use schema_model::{
    hash_value, is_url, load_document_auto, Schema, SchemaStore, StoreOptions,
};

#[derive(Parser)]
#[command(name = "schema-model")]
#[command(about = "Inspect, flatten, and compare JSON Schema documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a schema: allowed types, properties, constants, depth
    Inspect {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Output the report as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Discard "additionalProperties": true instead of tracking an
        /// abstract additional-property slot
        #[arg(long)]
        ignore_true_additional_properties: bool,
    },

    /// Fold a schema's allOf into a single conjunct document
    Flatten {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Compare two schemas structurally; exits 1 when they differ
    Canon {
        /// First schema source
        left: String,

        /// Second schema source
        right: String,

        /// Output the comparison as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect {
            schema,
            json,
            ignore_true_additional_properties,
        } => run_inspect(&schema, json, ignore_true_additional_properties),
        Commands::Flatten {
            schema,
            output,
            pretty,
        } => run_flatten(&schema, output, pretty),
        Commands::Canon { left, right, json } => run_canon(&left, &right, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Load a schema from a file path or URL into the given store.
fn load_schema(store: &SchemaStore, source: &str) -> Result<Rc<Schema>, u8> {
    let result = if is_url(source) {
        load_document_auto(source).and_then(|doc| store.load_document(doc))
    } else {
        store.load(Path::new(source))
    };
    result.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn run_inspect(source: &str, json_output: bool, ignore_true: bool) -> Result<(), u8> {
    let store = SchemaStore::with_options(StoreOptions {
        ignore_true_additional_properties: ignore_true,
    });
    let schema = load_schema(&store, source)?;

    let depth = schema.depth().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let types: Vec<&str> = schema
        .allowed_types()
        .iter()
        .map(|t| t.keyword())
        .collect();
    let properties = schema.property_names();
    let required = schema.required_property_keys().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let forbidden = schema.forbidden_values();

    if json_output {
        let report = serde_json::json!({
            "types": types,
            "properties": properties,
            "required": required,
            "const": schema.const_value(),
            "enum": schema.enum_values(),
            "forbidden": forbidden,
            "depth": depth,
            "needsFurtherUnfolding": schema.needs_further_unfolding(),
        });
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
        return Ok(());
    }

    println!("types: {}", types.join(", "));
    if schema.is_object() {
        println!("properties: {}", properties.join(", "));
        if !required.is_empty() {
            println!("required: {}", required.join(", "));
        }
    }
    if let Some(value) = schema.const_value() {
        println!("const: {}", value);
    }
    if let Some(members) = schema.enum_values() {
        let rendered: Vec<String> = members.iter().map(|m| m.to_string()).collect();
        println!("enum: {}", rendered.join(", "));
    }
    if !forbidden.is_empty() {
        let rendered: Vec<String> = forbidden.iter().map(|m| m.to_string()).collect();
        println!("forbidden: {}", rendered.join(", "));
    }
    println!("depth: {}", depth);
    println!(
        "needs further unfolding: {}",
        schema.needs_further_unfolding()
    );
    Ok(())
}

fn run_flatten(source: &str, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let store = SchemaStore::new();
    let schema = load_schema(&store, source)?;

    let flat = schema.flatten().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let json_output = if pretty {
        serde_json::to_string_pretty(flat.document())
    } else {
        serde_json::to_string(flat.document())
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }
    Ok(())
}

fn run_canon(left_source: &str, right_source: &str, json_output: bool) -> Result<(), u8> {
    let store = SchemaStore::new();
    let left = load_schema(&store, left_source)?;
    let right = load_schema(&store, right_source)?;

    let left_hash = hash_value(left.document());
    let right_hash = hash_value(right.document());
    let equal = left == right;

    if json_output {
        let report = serde_json::json!({
            "equal": equal,
            "leftHash": format!("{:016x}", left_hash),
            "rightHash": format!("{:016x}", right_hash),
        });
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else if equal {
        println!("structurally equal ({:016x})", left_hash);
    } else {
        println!(
            "structurally different ({:016x} vs {:016x})",
            left_hash, right_hash
        );
    }

    if equal {
        Ok(())
    } else {
        Err(1)
    }
}
