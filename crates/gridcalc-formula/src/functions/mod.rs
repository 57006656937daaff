//! Built-in functions and the function registry

pub mod database;
pub mod date;
pub mod financial;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod operators;
pub mod statistical;
pub mod text;

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use lazy_regex::regex_is_match;
use once_cell::sync::Lazy;

use crate::args::{validate_arg_defs, Arg, ArgDef, FunctionOutput, ReturnFormat};
use crate::error::{FormulaResult, RegistrationError};
use crate::evaluator::CallContext;

/// Built-in registry shared by engines that add no functions
static BUILTIN: Lazy<Arc<FunctionRegistry>> = Lazy::new(|| Arc::new(FunctionRegistry::builtin()));

/// Function implementation signature
///
/// Functions receive their arguments already shaped by their declaration
/// and consult the call context for coercions and the grid.
pub type ComputeFn =
    Arc<dyn Fn(&[Arg], &CallContext) -> FormulaResult<FunctionOutput> + Send + Sync>;

/// Function definition
#[derive(Clone)]
pub struct FunctionDef {
    pub description: String,
    /// Parameter declarations
    pub args: Vec<ArgDef>,
    /// Implementation
    pub compute: ComputeFn,
    /// May return a deferred result
    pub is_async: bool,
    /// Listed to users; operators are not
    pub is_exported: bool,
    /// Is volatile (recalculates every time)
    pub volatile: bool,
    /// May return a matrix
    pub returns_matrix: bool,
    pub return_format: ReturnFormat,
}

impl FunctionDef {
    pub fn new<F>(description: &str, args: Vec<ArgDef>, compute: F) -> Self
    where
        F: Fn(&[Arg], &CallContext) -> FormulaResult<FunctionOutput> + Send + Sync + 'static,
    {
        Self {
            description: description.to_string(),
            args,
            compute: Arc::new(compute),
            is_async: false,
            is_exported: true,
            volatile: false,
            returns_matrix: false,
            return_format: ReturnFormat::Unformatted,
        }
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.is_exported = false;
        self
    }

    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    pub fn matrix_result(mut self) -> Self {
        self.returns_matrix = true;
        self
    }

    pub fn format(mut self, format: ReturnFormat) -> Self {
        self.return_format = format;
        self
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("description", &self.description)
            .field("args", &self.args)
            .field("is_async", &self.is_async)
            .field("is_exported", &self.is_exported)
            .field("volatile", &self.volatile)
            .field("returns_matrix", &self.returns_matrix)
            .field("return_format", &self.return_format)
            .finish_non_exhaustive()
    }
}

/// Public form of a function name: upper case, `_` read as `.`
pub fn normalize_function_name(name: &str) -> Result<String, RegistrationError> {
    let upper = name.trim().to_uppercase();
    if !regex_is_match!(r"^[A-Z0-9_.]+$", &upper) {
        return Err(RegistrationError::InvalidFunctionName(name.to_string()));
    }
    Ok(upper.replace('_', "."))
}

/// Function registry
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: AHashMap<String, Arc<FunctionDef>>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in functions
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register_operator_functions();
        registry.register_math_functions();
        registry.register_statistical_functions();
        registry.register_financial_functions();
        registry.register_database_functions();
        registry.register_lookup_functions();
        registry.register_date_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_info_functions();

        registry
    }

    /// The built-in registry, created on first use
    pub fn shared() -> Arc<FunctionRegistry> {
        BUILTIN.clone()
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        let key = name.to_uppercase().replace('_', ".");
        self.functions.get(&key).map(Arc::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Register a function
    ///
    /// Fails on invalid names or declarations, and when the name is taken.
    pub fn register(&mut self, name: &str, def: FunctionDef) -> Result<(), RegistrationError> {
        let key = normalize_function_name(name)?;
        if self.functions.contains_key(&key) {
            return Err(RegistrationError::Duplicate(key));
        }
        validate_arg_defs(&key, &def.args)?;
        self.functions.insert(key, Arc::new(def));
        Ok(())
    }

    /// Register a function, replacing any previous one of the same name
    pub fn register_overwrite(&mut self, name: &str, def: FunctionDef) -> Result<(), RegistrationError> {
        let key = normalize_function_name(name)?;
        validate_arg_defs(&key, &def.args)?;
        if self.functions.insert(key.clone(), Arc::new(def)).is_some() {
            log::debug!("Function {} was overwritten", key);
        }
        Ok(())
    }

    /// Sorted names of the exported functions
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .functions
            .iter()
            .filter(|(_, def)| def.is_exported)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Register a built-in; a malformed built-in is a programming error
    pub(crate) fn add(&mut self, name: &str, def: FunctionDef) {
        if let Err(e) = self.register(name, def) {
            panic!("Invalid built-in function {}: {}", name, e);
        }
    }

    fn register_operator_functions(&mut self) {
        operators::register(self);
    }

    fn register_math_functions(&mut self) {
        math::register(self);
    }

    fn register_statistical_functions(&mut self) {
        statistical::register(self);
    }

    fn register_financial_functions(&mut self) {
        financial::register(self);
    }

    fn register_database_functions(&mut self) {
        database::register(self);
    }

    fn register_lookup_functions(&mut self) {
        lookup::register(self);
    }

    fn register_date_functions(&mut self) {
        date::register(self);
    }

    fn register_logical_functions(&mut self) {
        logical::register(self);
    }

    fn register_text_functions(&mut self) {
        text::register(self);
    }

    fn register_info_functions(&mut self) {
        info::register(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ArgType;
    use pretty_assertions::assert_eq;

    fn noop() -> FunctionDef {
        FunctionDef::new("", vec![], |_, _| Ok(0.0.into()))
    }

    #[test]
    fn test_builtin_registry_loads() {
        let registry = FunctionRegistry::shared();
        for name in ["SUM", "sumif", "PERCENTILE.EXC", "percentile_exc", "XLOOKUP", "ADD"] {
            assert!(registry.contains(name), "{} missing", name);
        }
        assert!(!registry.names().contains(&"ADD"));
        assert!(registry.names().contains(&"SUM"));
        assert!(registry.get("RAND").unwrap().volatile);
    }

    #[test]
    fn test_name_normalization() {
        assert_eq!(normalize_function_name("my_func"), Ok("MY.FUNC".to_string()));
        assert_eq!(normalize_function_name("Stats.Mean2"), Ok("STATS.MEAN2".to_string()));
        assert!(matches!(
            normalize_function_name("bad name"),
            Err(RegistrationError::InvalidFunctionName(_))
        ));
        assert!(normalize_function_name("").is_err());
    }

    #[test]
    fn test_duplicates_and_overwrite() {
        let mut registry = FunctionRegistry::new();
        registry.register("custom_fn", noop()).unwrap();
        assert_eq!(
            registry.register("CUSTOM.FN", noop()),
            Err(RegistrationError::Duplicate("CUSTOM.FN".to_string()))
        );
        registry.register_overwrite("custom.fn", noop()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_declarations_are_rejected() {
        let mut registry = FunctionRegistry::new();
        let def = FunctionDef::new(
            "",
            vec![
                ArgDef::new("a", &[ArgType::Number]).optional(),
                ArgDef::new("b", &[ArgType::Number]),
            ],
            |_, _| Ok(0.0.into()),
        );
        assert!(matches!(
            registry.register("BROKEN", def),
            Err(RegistrationError::InvalidArgument { .. })
        ));
        assert!(registry.is_empty());
    }
}
