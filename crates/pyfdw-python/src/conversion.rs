use chrono::NaiveDate;
use pyfdw_scan::marshal::DATE_FORMAT;
use pyfdw_scan::{Record, Value};
use pyo3::exceptions::{PyIndexError, PyKeyError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDate, PyDateAccess, PyFloat, PyInt, PyString};
use pyo3::{intern, Bound, PyAny};

use crate::error::{PyBridgeError, PyBridgeResult};

/// Reads the given columns from one row produced by a wrapper.
///
/// The row may be any object supporting `row[name]`, such as a `dict` or a `sqlite3.Row`.
/// Only the given columns are looked up. A column the row does not have (`KeyError` or
/// `IndexError`) is left out of the record.
pub(crate) fn py_to_record(
    obj: &Bound<'_, PyAny>,
    columns: &[String],
) -> PyBridgeResult<Record> {
    let py = obj.py();
    if !obj.hasattr(intern!(py, "__getitem__"))? {
        return Err(PyBridgeError::invalid_row(format!(
            "expected a mapping, got {}",
            py_type_name(obj)
        )));
    }
    let mut record = Record::with_capacity(columns.len());
    for column in columns {
        match obj.get_item(column) {
            Ok(value) => {
                record.insert(column.as_str(), py_to_value(&value)?);
            }
            Err(e)
                if e.is_instance_of::<PyKeyError>(py) || e.is_instance_of::<PyIndexError>(py) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(record)
}

pub(crate) fn py_to_value(obj: &Bound<'_, PyAny>) -> PyBridgeResult<Value> {
    let py = obj.py();
    if obj.is_none() {
        return Ok(Value::Null);
    }
    // `bool` is a subclass of `int` so it must be checked first.
    if obj.is_instance_of::<PyBool>() {
        return Ok(Value::Boolean(obj.extract()?));
    }
    if obj.is_instance_of::<PyInt>() {
        return match obj.extract::<i64>() {
            Ok(value) => Ok(Value::Integer(value)),
            Err(_) => Ok(Value::Decimal(py_str(obj)?)),
        };
    }
    if obj.is_instance_of::<PyFloat>() {
        return Ok(Value::Float(obj.extract()?));
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(Value::Text(obj.extract()?));
    }
    // `datetime.datetime` is a subclass of `datetime.date` and keeps only the date part.
    if let Ok(date) = obj.downcast::<PyDate>() {
        let value = NaiveDate::from_ymd_opt(
            date.get_year(),
            u32::from(date.get_month()),
            u32::from(date.get_day()),
        )
        .ok_or_else(|| PyBridgeError::invalid_row(format!("invalid date: {}", obj)))?;
        return Ok(Value::Date(value));
    }
    let number = py
        .import(intern!(py, "numbers"))?
        .getattr(intern!(py, "Number"))?;
    if obj.is_instance(&number)? {
        return Ok(Value::Decimal(py_str(obj)?));
    }
    if obj.hasattr(intern!(py, "strftime"))? {
        let text = obj
            .call_method1(intern!(py, "strftime"), (DATE_FORMAT,))?
            .extract::<String>()?;
        return Ok(Value::Text(text));
    }
    Ok(Value::Text(py_str(obj)?))
}

fn py_str(obj: &Bound<'_, PyAny>) -> PyResult<String> {
    obj.str()?.extract()
}

pub(crate) fn py_type_name(obj: &Bound<'_, PyAny>) -> String {
    obj.get_type()
        .name()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use pyo3::types::PyDict;

    use super::*;

    fn eval<'py>(py: Python<'py>, code: &str) -> PyResult<Bound<'py, PyAny>> {
        let globals = PyDict::new(py);
        globals.set_item("datetime", py.import("datetime")?)?;
        globals.set_item("decimal", py.import("decimal")?)?;
        py.eval(CString::new(code)?.as_c_str(), Some(&globals), None)
    }

    fn convert(code: &str) -> PyBridgeResult<Value> {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| py_to_value(&eval(py, code)?))
    }

    #[test]
    fn test_scalar_values() -> PyBridgeResult<()> {
        assert_eq!(convert("None")?, Value::Null);
        assert_eq!(convert("True")?, Value::Boolean(true));
        assert_eq!(convert("42")?, Value::Integer(42));
        assert_eq!(convert("-3.5")?, Value::Float(-3.5));
        assert_eq!(convert("'abc'")?, Value::Text("abc".to_string()));
        Ok(())
    }

    #[test]
    fn test_large_numbers() -> PyBridgeResult<()> {
        assert_eq!(
            convert("2 ** 70")?,
            Value::Decimal("1180591620717411303424".to_string())
        );
        assert_eq!(
            convert("decimal.Decimal('12.50')")?,
            Value::Decimal("12.50".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_dates() -> PyBridgeResult<()> {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7).map(Value::Date);
        assert_eq!(Some(convert("datetime.date(2024, 3, 7)")?), expected);
        assert_eq!(
            Some(convert("datetime.datetime(2024, 3, 7, 13, 45)")?),
            expected
        );
        Ok(())
    }

    #[test]
    fn test_date_like_and_other_objects() -> PyBridgeResult<()> {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| -> PyBridgeResult<()> {
            let code = CString::new(
                r#"
class Day:
    def strftime(self, fmt):
        return "2024-03-07" if fmt == "%Y-%m-%d" else fmt

class Point:
    def __str__(self):
        return "(1, 2)"
"#,
            )
            .map_err(|e| PyBridgeError::internal(e.to_string()))?;
            let globals = PyDict::new(py);
            py.run(code.as_c_str(), Some(&globals), None)?;
            let day = py.eval(pyo3::ffi::c_str!("Day()"), Some(&globals), None)?;
            assert_eq!(py_to_value(&day)?, Value::Text("2024-03-07".to_string()));
            let point = py.eval(pyo3::ffi::c_str!("Point()"), Some(&globals), None)?;
            assert_eq!(py_to_value(&point)?, Value::Text("(1, 2)".to_string()));
            Ok(())
        })
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_record_reads_selected_columns() -> PyBridgeResult<()> {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| -> PyBridgeResult<()> {
            let row = eval(py, "{'id': 1, 'name': 'a', 'extra': object(), 2: None}")?;
            let record = py_to_record(&row, &columns(&["id", "name", "missing"]))?;
            assert_eq!(record.len(), 2);
            assert_eq!(record.get("id"), Some(&Value::Integer(1)));
            assert_eq!(record.get("name"), Some(&Value::Text("a".to_string())));
            assert_eq!(record.get("missing"), None);
            Ok(())
        })
    }

    #[test]
    fn test_record_from_sqlite_row() -> PyBridgeResult<()> {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| -> PyBridgeResult<()> {
            let code = CString::new(
                r#"
import sqlite3
conn = sqlite3.connect(":memory:")
conn.row_factory = sqlite3.Row
row = conn.execute("select 1 as id, 'a' as name").fetchone()
"#,
            )
            .map_err(|e| PyBridgeError::internal(e.to_string()))?;
            let globals = PyDict::new(py);
            py.run(code.as_c_str(), Some(&globals), None)?;
            let row = py.eval(pyo3::ffi::c_str!("row"), Some(&globals), None)?;
            let record = py_to_record(&row, &columns(&["id", "name", "missing"]))?;
            assert_eq!(record.len(), 2);
            assert_eq!(record.get("id"), Some(&Value::Integer(1)));
            assert_eq!(record.get("name"), Some(&Value::Text("a".to_string())));
            Ok(())
        })
    }

    #[test]
    fn test_record_from_non_mapping() -> PyBridgeResult<()> {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| -> PyBridgeResult<()> {
            let result = py_to_record(&eval(py, "42")?, &columns(&["id"]));
            assert!(matches!(result, Err(PyBridgeError::InvalidRow(ref m)) if m.contains("int")));
            Ok(())
        })
    }
}
