//! Wiring descriptors: what an operator reads, what it writes, and with which
//! hyperparameters.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::NeuroGradError;
use crate::types::DType;

/// Output width of a fully-connected layer.
pub const PARAM_UNITS: &str = "Units";
/// Class count of a one-hot encoder.
pub const PARAM_DIM: &str = "Dim";

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "\"{}\"", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Conversion out of a [`ParamValue`] for typed lookups.
pub trait FromParam: Sized {
    fn from_param(value: &ParamValue) -> Option<Self>;
}

impl FromParam for i64 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromParam for usize {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromParam for f64 {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl FromParam for bool {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromParam for String {
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// String-keyed parameter bag attached to a wiring descriptor.
///
/// Keys an operator does not recognise are carried along and ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamDef {
    params: BTreeMap<String, ParamValue>,
}

impl ParamDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bag with `key` set to `value`.
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn has(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn get_raw(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    /// Typed lookup.
    ///
    /// # Errors
    /// `NeuroGradError::ParamError` if the key is missing or holds a value of
    /// another type.
    pub fn get<T: FromParam>(&self, key: &str) -> Result<T, NeuroGradError> {
        let value = self.params.get(key).ok_or_else(|| NeuroGradError::ParamError {
            key: key.to_string(),
            reason: "missing".to_string(),
        })?;
        T::from_param(value).ok_or_else(|| NeuroGradError::ParamError {
            key: key.to_string(),
            reason: format!("unexpected value {} for requested type", value),
        })
    }

    /// Typed lookup that treats a missing key as `None`.
    pub fn get_opt<T: FromParam>(&self, key: &str) -> Result<Option<T>, NeuroGradError> {
        if self.has(key) {
            self.get(key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Checks the recognised keys: `Units` and `Dim` must be positive integers.
    pub fn validate(&self) -> Result<(), NeuroGradError> {
        for key in [PARAM_UNITS, PARAM_DIM] {
            if let Some(value) = self.params.get(key) {
                match value {
                    ParamValue::Int(v) if *v > 0 => {}
                    other => {
                        return Err(NeuroGradError::ParamError {
                            key: key.to_string(),
                            reason: format!("expected a positive integer, got {}", other),
                        })
                    }
                }
            }
        }
        Ok(())
    }
}

/// Wiring descriptor for one operator instance.
///
/// Tensors are named, not held; the constructor resolves the names through a
/// tensor table. The position of a name in `inputs`/`outputs` encodes its role
/// for the operator kind (for `FC`: `x`, `w`, `b` in, `y` out).
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorIo {
    pub op_type: String,
    pub dtype: DType,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub param: ParamDef,
}

impl OperatorIo {
    pub fn builder(op_type: &str, dtype: DType) -> OperatorIoBuilder {
        OperatorIoBuilder {
            io: OperatorIo {
                op_type: op_type.to_string(),
                dtype,
                inputs: Vec::new(),
                outputs: Vec::new(),
                param: ParamDef::new(),
            },
        }
    }
}

/// Builder that validates the parameter bag once, when the descriptor is made.
#[derive(Debug, Clone)]
pub struct OperatorIoBuilder {
    io: OperatorIo,
}

impl OperatorIoBuilder {
    pub fn input(mut self, name: &str) -> Self {
        self.io.inputs.push(name.to_string());
        self
    }

    pub fn output(mut self, name: &str) -> Self {
        self.io.outputs.push(name.to_string());
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.io.param = self.io.param.with(key, value);
        self
    }

    /// Finishes the descriptor.
    ///
    /// # Errors
    /// `NeuroGradError::ParamError` if a recognised parameter is malformed.
    pub fn build(self) -> Result<OperatorIo, NeuroGradError> {
        self.io.param.validate()?;
        Ok(self.io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_wiring() {
        let io = OperatorIo::builder("FC", DType::F32)
            .input("x")
            .input("w")
            .input("b")
            .output("y")
            .param(PARAM_UNITS, 4)
            .param("Comment", "hidden layer")
            .build()
            .unwrap();
        assert_eq!(io.op_type, "FC");
        assert_eq!(io.inputs, vec!["x", "w", "b"]);
        assert_eq!(io.outputs, vec!["y"]);
        assert_eq!(io.param.get::<usize>(PARAM_UNITS).unwrap(), 4);
        assert_eq!(io.param.get::<String>("Comment").unwrap(), "hidden layer");
        assert_eq!(io.param.len(), 2);
    }

    #[test]
    fn test_build_rejects_non_positive_units() {
        let err = OperatorIo::builder("FC", DType::F32)
            .param(PARAM_UNITS, 0)
            .build()
            .unwrap_err();
        assert!(matches!(err, NeuroGradError::ParamError { ref key, .. } if key == PARAM_UNITS));

        assert!(OperatorIo::builder("OneHot", DType::F32)
            .param(PARAM_DIM, 2.5)
            .build()
            .is_err());
    }

    #[test]
    fn test_typed_get_errors() {
        let params = ParamDef::new().with("Dim", 3).with("Flag", true);
        assert!(params.has("Dim"));
        assert!(!params.has("Units"));
        assert!(matches!(
            params.get::<usize>("Units"),
            Err(NeuroGradError::ParamError { .. })
        ));
        assert!(params.get::<bool>("Dim").is_err());
        assert!(params.get::<bool>("Flag").unwrap());
        assert_eq!(params.get_opt::<usize>("Units").unwrap(), None);
        assert_eq!(params.get_opt::<usize>("Dim").unwrap(), Some(3));
    }

    #[test]
    fn test_negative_int_is_not_usize() {
        let params = ParamDef::new().with("Offset", -2);
        assert_eq!(params.get::<i64>("Offset").unwrap(), -2);
        assert!(params.get::<usize>("Offset").is_err());
    }
}
