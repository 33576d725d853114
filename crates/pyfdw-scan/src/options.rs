use std::collections::BTreeMap;
use std::fmt;

use pyfdw_common::config::ScanConfig;

use crate::error::{ScanError, ScanResult};

/// The wrapper a foreign table reads from, plus the configuration handed to its constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperIdentity {
    runtime: String,
    module: String,
    class: String,
    config: BTreeMap<String, String>,
}

impl WrapperIdentity {
    /// Splits a dotted wrapper path such as `samplepkg.CsvWrapper` at the last `.`
    /// into the module and the class name.
    pub fn try_new(
        runtime: impl Into<String>,
        wrapper: &str,
        config: BTreeMap<String, String>,
    ) -> ScanResult<Self> {
        let wrapper = wrapper.trim();
        let Some((module, class)) = wrapper.rsplit_once('.') else {
            return Err(ScanError::configuration_with_hint(
                format!("invalid wrapper \"{wrapper}\": expected a class inside a module"),
                WRAPPER_HINT,
            ));
        };
        if module.is_empty() || class.is_empty() {
            return Err(ScanError::configuration_with_hint(
                format!("invalid wrapper \"{wrapper}\": empty module or class name"),
                WRAPPER_HINT,
            ));
        }
        Ok(Self {
            runtime: runtime.into(),
            module: module.to_string(),
            class: class.to_string(),
            config,
        })
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// The full dotted path of the wrapper class.
    pub fn path(&self) -> String {
        format!("{}.{}", self.module, self.class)
    }

    pub fn config(&self) -> &BTreeMap<String, String> {
        &self.config
    }
}

impl fmt::Display for WrapperIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.runtime, self.module, self.class)
    }
}

const WRAPPER_HINT: &str =
    "You must set wrapper option to a Python wrapper class, for example samplepkg.CsvWrapper";

/// The catalog view of a foreign table: its name and the options
/// declared on the table and on its server.
#[derive(Debug, Clone, Default)]
pub struct ForeignTable {
    pub name: String,
    pub table_options: Vec<(String, String)>,
    pub server_options: Vec<(String, String)>,
}

impl ForeignTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_table_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.table_options.push((key.into(), value.into()));
        self
    }

    pub fn with_server_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.server_options.push((key.into(), value.into()));
        self
    }
}

/// Finds the wrapper identity and configuration of a foreign table.
pub trait OptionResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, table: &ForeignTable) -> ScanResult<WrapperIdentity>;
}

/// Resolves wrapper identities from catalog options.
///
/// Table options are read before server options, so a server option overrides
/// a table option with the same key.
#[derive(Debug, Clone)]
pub struct CatalogOptionResolver {
    wrapper_option: String,
    runtime_option: String,
    default_runtime: String,
}

impl CatalogOptionResolver {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            wrapper_option: config.wrapper_option.clone(),
            runtime_option: config.runtime_option.clone(),
            default_runtime: config.default_runtime.clone(),
        }
    }
}

impl OptionResolver for CatalogOptionResolver {
    fn resolve(&self, table: &ForeignTable) -> ScanResult<WrapperIdentity> {
        let mut wrapper = None;
        let mut runtime = None;
        let mut config = BTreeMap::new();
        for (key, value) in table.table_options.iter().chain(&table.server_options) {
            if *key == self.wrapper_option {
                wrapper = Some(value.as_str());
            } else if *key == self.runtime_option {
                runtime = Some(value.as_str());
            } else {
                config.insert(key.clone(), value.clone());
            }
        }
        let Some(wrapper) = wrapper else {
            return Err(ScanError::configuration_with_hint(
                format!("{} option not found", self.wrapper_option),
                WRAPPER_HINT,
            ));
        };
        let runtime = runtime.unwrap_or(&self.default_runtime);
        WrapperIdentity::try_new(runtime, wrapper, config)
    }
}

#[cfg(test)]
mod tests {
    use pyfdw_common::config::AppConfig;

    use super::*;

    fn resolver() -> ScanResult<CatalogOptionResolver> {
        Ok(CatalogOptionResolver::new(&AppConfig::load_default()?.scan))
    }

    #[test]
    fn test_resolve_wrapper_identity() -> ScanResult<()> {
        let table = ForeignTable::new("items")
            .with_table_option("wrapper", "samplepkg.CsvWrapper")
            .with_table_option("path", "/tmp/x.csv");
        let identity = resolver()?.resolve(&table)?;
        assert_eq!(identity.runtime(), "python");
        assert_eq!(identity.module(), "samplepkg");
        assert_eq!(identity.class(), "CsvWrapper");
        assert_eq!(identity.path(), "samplepkg.CsvWrapper");
        assert_eq!(identity.config().len(), 1);
        assert_eq!(
            identity.config().get("path").map(String::as_str),
            Some("/tmp/x.csv")
        );
        Ok(())
    }

    #[test]
    fn test_resolve_nested_module() -> ScanResult<()> {
        let table = ForeignTable::new("items")
            .with_server_option("wrapper", "fdw.csv.CsvFdw")
            .with_server_option("runtime", "memory");
        let identity = resolver()?.resolve(&table)?;
        assert_eq!(identity.runtime(), "memory");
        assert_eq!(identity.module(), "fdw.csv");
        assert_eq!(identity.class(), "CsvFdw");
        assert!(identity.config().is_empty());
        Ok(())
    }

    #[test]
    fn test_server_option_overrides_table_option() -> ScanResult<()> {
        let table = ForeignTable::new("items")
            .with_table_option("wrapper", "samplepkg.CsvWrapper")
            .with_table_option("delimiter", ",")
            .with_server_option("delimiter", ";");
        let identity = resolver()?.resolve(&table)?;
        assert_eq!(
            identity.config().get("delimiter").map(String::as_str),
            Some(";")
        );
        Ok(())
    }

    #[test]
    fn test_missing_wrapper_option() -> ScanResult<()> {
        let table = ForeignTable::new("items").with_table_option("path", "/tmp/x.csv");
        let err = match resolver()?.resolve(&table) {
            Ok(identity) => panic!("expected a configuration error, got {identity}"),
            Err(e) => e,
        };
        assert!(matches!(err, ScanError::Configuration(_)));
        let message = err.to_string();
        assert!(message.contains("wrapper option not found"));
        assert!(message.contains("samplepkg.CsvWrapper"));
        Ok(())
    }

    #[test]
    fn test_invalid_wrapper_path() {
        for wrapper in ["CsvWrapper", ".CsvWrapper", "samplepkg.", ""] {
            let result = WrapperIdentity::try_new("python", wrapper, BTreeMap::new());
            assert!(
                matches!(result, Err(ScanError::Configuration(_))),
                "wrapper {wrapper:?} should be rejected"
            );
        }
    }
}
