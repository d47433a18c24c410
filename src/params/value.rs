//! Typed parameter values
//!
//! Every value carries its own type tag when serialized, so list, tuple and set
//! stay distinguishable after a save/load round trip.

use crate::error::ApiError;
use crate::units::{self, parse_unit, TemperatureUnit, Unit, UnitSystem};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// JSON has no NaN or infinity; those are written as the strings `"NaN"`,
/// `"inf"` and `"-inf"`.
mod float_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid float: {:?}", other))),
            },
        }
    }
}

/// A parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "float_repr")] f64),
    Str(String),
    List(Vec<ParamValue>),
    Tuple(Vec<ParamValue>),
    Set(ValueSet),
    Map(IndexMap<String, ParamValue>),
    Quantity(Quantity),
}

impl ParamValue {
    pub fn tuple<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        ParamValue::Tuple(items.into_iter().map(Into::into).collect())
    }

    pub fn set<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        ParamValue::Set(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        ParamValue::Map(
            items
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Name of the serialized type tag
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "str",
            ParamValue::List(_) => "list",
            ParamValue::Tuple(_) => "tuple",
            ParamValue::Set(_) => "set",
            ParamValue::Map(_) => "map",
            ParamValue::Quantity(_) => "quantity",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self {
            ParamValue::Quantity(q) => Some(q),
            _ => None,
        }
    }

    /// Replace every quantity (recursively) by its magnitude in the target units
    pub fn convert_units(
        &self,
        system: UnitSystem,
        temperature: TemperatureUnit,
    ) -> Result<ParamValue, ApiError> {
        let convert_all = |items: &[ParamValue]| {
            items
                .iter()
                .map(|v| v.convert_units(system, temperature))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(match self {
            ParamValue::Quantity(q) => ParamValue::Float(q.convert(system, temperature)?),
            ParamValue::List(items) => ParamValue::List(convert_all(items)?),
            ParamValue::Tuple(items) => ParamValue::Tuple(convert_all(items)?),
            ParamValue::Set(set) => ParamValue::Set(convert_all(set.as_slice())?.into()),
            ParamValue::Map(map) => ParamValue::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.convert_units(system, temperature)?)))
                    .collect::<Result<IndexMap<_, _>, ApiError>>()?,
            ),
            other => other.clone(),
        })
    }

    /// Whether this value (or anything nested in it) carries a unit
    pub fn has_units(&self) -> bool {
        match self {
            ParamValue::Quantity(_) => true,
            ParamValue::List(items) | ParamValue::Tuple(items) => {
                items.iter().any(ParamValue::has_units)
            }
            ParamValue::Set(set) => set.iter().any(ParamValue::has_units),
            ParamValue::Map(map) => map.values().any(ParamValue::has_units),
            _ => false,
        }
    }

    /// Untagged JSON view used as template rendering context
    pub fn to_plain_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Int(i) => Value::from(*i),
            ParamValue::Float(f) => Value::from(*f),
            ParamValue::Str(s) => Value::String(s.clone()),
            ParamValue::List(items) | ParamValue::Tuple(items) => {
                Value::Array(items.iter().map(ParamValue::to_plain_json).collect())
            }
            ParamValue::Set(set) => {
                Value::Array(set.iter().map(ParamValue::to_plain_json).collect())
            }
            ParamValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_plain_json()))
                    .collect(),
            ),
            ParamValue::Quantity(q) => Value::String(q.to_string()),
        }
    }
}

fn rank(value: &ParamValue) -> u8 {
    match value {
        ParamValue::Bool(_) => 0,
        ParamValue::Int(_) => 1,
        ParamValue::Float(_) => 2,
        ParamValue::Str(_) => 3,
        ParamValue::List(_) => 4,
        ParamValue::Tuple(_) => 5,
        ParamValue::Set(_) => 6,
        ParamValue::Map(_) => 7,
        ParamValue::Quantity(_) => 8,
    }
}

fn cmp_seq(a: &[ParamValue], b: &[ParamValue]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match total_cmp(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Total order over values, used to canonicalize sets
pub(crate) fn total_cmp(a: &ParamValue, b: &ParamValue) -> Ordering {
    match (a, b) {
        (ParamValue::Bool(x), ParamValue::Bool(y)) => x.cmp(y),
        (ParamValue::Int(x), ParamValue::Int(y)) => x.cmp(y),
        (ParamValue::Float(x), ParamValue::Float(y)) => x.total_cmp(y),
        (ParamValue::Str(x), ParamValue::Str(y)) => x.cmp(y),
        (ParamValue::List(x), ParamValue::List(y)) | (ParamValue::Tuple(x), ParamValue::Tuple(y)) => {
            cmp_seq(x, y)
        }
        (ParamValue::Set(x), ParamValue::Set(y)) => cmp_seq(x.as_slice(), y.as_slice()),
        (ParamValue::Map(x), ParamValue::Map(y)) => {
            for ((kx, vx), (ky, vy)) in x.iter().zip(y.iter()) {
                let ord = kx.cmp(ky).then_with(|| total_cmp(vx, vy));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (ParamValue::Quantity(x), ParamValue::Quantity(y)) => x
            .unit
            .cmp(&y.unit)
            .then_with(|| x.value.total_cmp(&y.value)),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// An unordered collection of distinct values, kept sorted so equality ignores insertion order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ParamValue>")]
pub struct ValueSet(Vec<ParamValue>);

impl ValueSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, value: &ParamValue) -> bool {
        self.0
            .binary_search_by(|item| total_cmp(item, value))
            .is_ok()
    }

    pub fn insert(&mut self, value: ParamValue) -> bool {
        match self.0.binary_search_by(|item| total_cmp(item, &value)) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, value);
                true
            }
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParamValue> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ParamValue] {
        &self.0
    }
}

impl From<Vec<ParamValue>> for ValueSet {
    fn from(mut items: Vec<ParamValue>) -> Self {
        items.sort_by(total_cmp);
        items.dedup_by(|a, b| total_cmp(a, b) == Ordering::Equal);
        ValueSet(items)
    }
}

impl FromIterator<ParamValue> for ValueSet {
    fn from_iter<I: IntoIterator<Item = ParamValue>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = &'a ParamValue;
    type IntoIter = std::slice::Iter<'a, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A magnitude tagged with a physical unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQuantity")]
pub struct Quantity {
    #[serde(with = "float_repr")]
    value: f64,
    unit: String,
}

#[derive(Deserialize)]
struct RawQuantity {
    #[serde(with = "float_repr")]
    value: f64,
    unit: String,
}

impl TryFrom<RawQuantity> for Quantity {
    type Error = String;

    fn try_from(raw: RawQuantity) -> Result<Self, Self::Error> {
        Quantity::new(raw.value, raw.unit).map_err(|e| e.to_string())
    }
}

impl Quantity {
    /// Create a quantity; the unit string must parse
    pub fn new(value: f64, unit: impl Into<String>) -> Result<Self, ApiError> {
        let unit = unit.into();
        parse_unit(&unit)?;
        Ok(Self { value, unit })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn parsed_unit(&self) -> Result<Unit, ApiError> {
        parse_unit(&self.unit)
    }

    pub fn is_temperature(&self) -> bool {
        self.parsed_unit().map(|u| u.is_temperature()).unwrap_or(false)
    }

    /// Magnitude in the target unit system (temperatures in `temperature`)
    pub fn convert(
        &self,
        system: UnitSystem,
        temperature: TemperatureUnit,
    ) -> Result<f64, ApiError> {
        Ok(units::convert(
            self.value,
            &self.parsed_unit()?,
            system,
            temperature,
        ))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.value, self.unit)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[ParamValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match item {
            ParamValue::Str(s) => write!(f, "'{}'", s)?,
            other => write!(f, "{}", other)?,
        }
    }
    Ok(())
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{:?}", x),
            ParamValue::Str(s) => write!(f, "{}", s),
            ParamValue::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            ParamValue::Tuple(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                write!(f, ")")
            }
            ParamValue::Set(set) => {
                write!(f, "{{")?;
                write_joined(f, set.as_slice())?;
                write!(f, "}}")
            }
            ParamValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}': {}", k, v)?;
                }
                write!(f, "}}")
            }
            ParamValue::Quantity(q) => write!(f, "{}", q),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
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

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<Quantity> for ParamValue {
    fn from(v: Quantity) -> Self {
        ParamValue::Quantity(v)
    }
}

impl From<ValueSet> for ParamValue {
    fn from(v: ValueSet) -> Self {
        ParamValue::Set(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}
