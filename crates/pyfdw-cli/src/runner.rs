use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use datafusion_common::arrow::datatypes::DataType;

use crate::scan::run_scan;

#[derive(Parser)]
#[command(version, name = "pyfdw")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Scan a foreign table backed by a Python wrapper class")]
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
pub(crate) struct ScanArgs {
    #[arg(long, help = "The wrapper class, for example samplepkg.CsvWrapper")]
    pub wrapper: Option<String>,
    #[arg(
        long = "option",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        help = "A foreign table option passed to the wrapper"
    )]
    pub options: Vec<(String, String)>,
    #[arg(
        long = "server-option",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        help = "A foreign server option, overriding table options with the same key"
    )]
    pub server_options: Vec<(String, String)>,
    #[arg(
        long = "column",
        value_name = "NAME:TYPE",
        value_parser = parse_column,
        required = true,
        help = "An output column, for example id:int or name:text"
    )]
    pub columns: Vec<(String, DataType)>,
    #[arg(long, help = "A directory to prepend to the Python module search path")]
    pub python_path: Vec<PathBuf>,
    #[arg(long, help = "Print the plan annotation before scanning")]
    pub explain: bool,
    #[arg(long, help = "Rescan once after the first pass and print the rows again")]
    pub rescan: bool,
}

pub fn main(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_from(args);

    match cli.command {
        Command::Scan(args) => run_scan(args)?,
    }
    Ok(())
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid option \"{s}\": expected KEY=VALUE")),
    }
}

fn parse_column(s: &str) -> Result<(String, DataType), String> {
    let Some((name, data_type)) = s.split_once(':') else {
        return Err(format!("invalid column \"{s}\": expected NAME:TYPE"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid column \"{s}\": empty name"));
    }
    let data_type = match data_type.trim().to_lowercase().as_str() {
        "bool" | "boolean" => DataType::Boolean,
        "smallint" | "int2" | "int16" => DataType::Int16,
        "int" | "integer" | "int4" | "int32" => DataType::Int32,
        "bigint" | "int8" | "int64" => DataType::Int64,
        "real" | "float4" | "float32" => DataType::Float32,
        "double" | "float8" | "float64" => DataType::Float64,
        "numeric" | "decimal" => DataType::Decimal128(38, 10),
        "text" | "varchar" | "string" | "utf8" => DataType::Utf8,
        "date" | "date32" => DataType::Date32,
        other => return Err(format!("unsupported column type: {other}")),
    };
    Ok((name.to_string(), data_type))
}
