use std::sync::Arc;

use datafusion_common::arrow::datatypes::{Field, Schema};
use log::info;
use pyfdw_common::config::{AppConfig, TelemetryConfig};
use pyfdw_python::PythonBridge;
use pyfdw_scan::{BridgeRegistry, ExplainOutput, ForeignTable, OutputTuple, ScanController};
use pyfdw_telemetry::{init_telemetry, shutdown_telemetry};
use pyo3::prelude::*;
use pyo3::intern;

use crate::runner::ScanArgs;

pub(crate) fn run_scan(args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    with_telemetry(&config.telemetry, || scan_table(&config, args))
}

/// Runs `f` with logging installed. Logging is shut down whether `f` succeeds or not.
fn with_telemetry<T>(
    config: &TelemetryConfig,
    f: impl FnOnce() -> Result<T, Box<dyn std::error::Error>>,
) -> Result<T, Box<dyn std::error::Error>> {
    init_telemetry(config)?;
    let result = f();
    shutdown_telemetry();
    result
}

fn scan_table(config: &AppConfig, args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.python_path.is_empty() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| -> PyResult<()> {
            let path = py.import(intern!(py, "sys"))?.getattr(intern!(py, "path"))?;
            for dir in args.python_path.iter().rev() {
                path.call_method1(intern!(py, "insert"), (0, dir.to_string_lossy()))?;
            }
            Ok(())
        })?;
    }

    let registry = Arc::new(BridgeRegistry::new());
    registry.register(Arc::new(PythonBridge::new(config.python.clone())));

    let mut table = ForeignTable::new("cli");
    if let Some(wrapper) = &args.wrapper {
        table = table.with_table_option(config.scan.wrapper_option.as_str(), wrapper.as_str());
    }
    for (key, value) in args.options {
        table = table.with_table_option(key, value);
    }
    for (key, value) in args.server_options {
        table = table.with_server_option(key, value);
    }
    let schema = Arc::new(Schema::new(
        args.columns
            .into_iter()
            .map(|(name, data_type)| Field::new(name, data_type, true))
            .collect::<Vec<_>>(),
    ));

    let mut scan = ScanController::from_config(&config.scan, registry);
    if args.explain {
        println!("{}", format_explain(&scan.explain(true)));
    }
    scan.begin(schema, &table)?;
    print_rows(&mut scan)?;
    if args.rescan {
        scan.rescan()?;
        print_rows(&mut scan)?;
    }
    info!("scanned {} rows from {}", scan.row_count(), table.name);
    scan.end();
    Ok(())
}

fn format_explain(explain: &ExplainOutput) -> String {
    let mut text = format!(
        "{}: {} (startup_cost={:.2} total_cost={:.2})",
        explain.label, explain.value, explain.startup_cost, explain.total_cost
    );
    if let Some(cost) = explain.cost {
        text.push_str(&format!("\n{} cost: {cost}", explain.label));
    }
    text
}

fn print_rows(scan: &mut ScanController) -> Result<(), Box<dyn std::error::Error>> {
    while let Some(tuple) = scan.next()? {
        println!("{}", format_tuple(&tuple));
    }
    Ok(())
}

fn format_tuple(tuple: &OutputTuple) -> String {
    tuple
        .iter()
        .map(|value| {
            if value.is_null() {
                String::new()
            } else {
                value.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\t")
}
