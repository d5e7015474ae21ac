//! Argument values understood by the key encoder
//!
//! Arguments of a memoized call are converted into [`ArgValue`], a closed set of
//! shapes the encoder knows how to turn into a stable token. Types from other
//! crates join the set by implementing `From<T> for ArgValue`, usually mapping
//! onto [`ArgValue::Map`] or [`ArgValue::Tuple`] so that their content, not their
//! address, drives the key.

use crate::{Error, Result};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Hashing hook for numeric array arguments.
///
/// The array library stays outside this crate; it only has to describe the
/// array's shape, element type and raw bytes.
pub trait ArrayLike: Send + Sync {
    /// Array dimensions
    fn shape(&self) -> Vec<usize>;

    /// Element type descriptor, e.g. `float64`
    fn dtype(&self) -> Cow<'_, str>;

    /// Element bytes in row-major order. Non-contiguous arrays return an owned,
    /// compacted copy.
    fn contiguous_bytes(&self) -> Cow<'_, [u8]>;

    /// Total number of elements
    fn element_count(&self) -> usize {
        self.shape().iter().product()
    }
}

macro_rules! impl_array_like_for_vec {
    ($($ty:ty => $dtype:literal),* $(,)?) => {
        $(
            impl ArrayLike for Vec<$ty> {
                fn shape(&self) -> Vec<usize> {
                    vec![self.len()]
                }

                fn dtype(&self) -> Cow<'_, str> {
                    Cow::Borrowed($dtype)
                }

                fn contiguous_bytes(&self) -> Cow<'_, [u8]> {
                    Cow::Owned(self.iter().flat_map(|v| v.to_le_bytes()).collect())
                }
            }
        )*
    };
}

impl_array_like_for_vec!(
    f64 => "float64",
    f32 => "float32",
    i64 => "int64",
    i32 => "int32",
    u64 => "uint64",
    u32 => "uint32",
    u8 => "uint8",
);

/// One argument of a memoized call
#[derive(Clone)]
pub enum ArgValue {
    /// Absent value
    None,
    /// Boolean
    Bool(bool),
    /// Integer of any width
    Int(i128),
    /// Floating point number
    Float(f64),
    /// String
    Str(String),
    /// Fixed-size group of values, rendered as one primitive
    Tuple(Vec<ArgValue>),
    /// Ordered sequence, encoded item by item
    List(Vec<ArgValue>),
    /// Keyed mapping, encoded in ascending key order
    Map(Vec<(String, ArgValue)>),
    /// A function passed as an argument, identified by its name only
    Callable(String),
    /// Numeric array, encoded by content hash
    Array(Arc<dyn ArrayLike>),
    /// Any other value, identified by its textual form
    Opaque {
        /// Rust type name of the original value
        type_name: String,
        /// Textual form of the value
        repr: String,
    },
}

impl ArgValue {
    /// A callable argument. Distinct callables sharing a name encode identically.
    #[must_use]
    pub fn callable(name: impl Into<String>) -> Self {
        Self::Callable(name.into())
    }

    /// An array argument hashed through the [`ArrayLike`] hook
    #[must_use]
    pub fn array(array: impl ArrayLike + 'static) -> Self {
        Self::Array(Arc::new(array))
    }

    /// An argument known only by its `Display` form. Instances of the same type
    /// with the same text are indistinguishable to the cache.
    #[must_use]
    pub fn opaque<T: fmt::Display + ?Sized>(value: &T) -> Self {
        Self::Opaque {
            type_name: std::any::type_name::<T>().to_string(),
            repr: value.to_string(),
        }
    }

    /// A mapping built from key/value pairs in any order
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Short name of the variant, used in error messages
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Callable(_) => "callable",
            Self::Array(_) => "array",
            Self::Opaque { .. } => "opaque",
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Self::Callable(name) => f.debug_tuple("Callable").field(name).finish(),
            Self::Array(array) => f
                .debug_struct("Array")
                .field("shape", &array.shape())
                .field("dtype", &array.dtype())
                .finish_non_exhaustive(),
            Self::Opaque { type_name, repr } => f
                .debug_struct("Opaque")
                .field("type_name", type_name)
                .field("repr", repr)
                .finish(),
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(v: $ty) -> Self {
                    Self::Int(i128::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl From<usize> for ArgValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i128)
    }
}

impl From<isize> for ArgValue {
    fn from(v: isize) -> Self {
        Self::Int(v as i128)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for ArgValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&String> for ArgValue {
    fn from(v: &String) -> Self {
        Self::Str(v.clone())
    }
}

impl<T: Into<Self>> From<Option<T>> for ArgValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::None, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for ArgValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<Self>> From<&[T]> for ArgValue {
    fn from(v: &[T]) -> Self {
        Self::List(v.iter().cloned().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Self>> From<BTreeMap<K, V>> for ArgValue {
    fn from(v: BTreeMap<K, V>) -> Self {
        Self::map(v)
    }
}

impl<K: Into<String>, V: Into<Self>> From<HashMap<K, V>> for ArgValue {
    fn from(v: HashMap<K, V>) -> Self {
        Self::map(v)
    }
}

impl<A: Into<Self>, B: Into<Self>> From<(A, B)> for ArgValue {
    fn from((a, b): (A, B)) -> Self {
        Self::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Self>, B: Into<Self>, C: Into<Self>> From<(A, B, C)> for ArgValue {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

/// Extraction of typed parameters from a bound call
pub trait FromArg: Sized {
    /// Type name reported when conversion fails
    const EXPECTED: &'static str;

    /// Convert a stored argument, or `None` if the shape does not match
    fn from_arg(value: &ArgValue) -> Option<Self>;

    /// Convert with an error naming the parameter
    fn extract(name: &str, value: &ArgValue) -> Result<Self> {
        Self::from_arg(value).ok_or_else(|| Error::ArgumentType {
            name: name.to_string(),
            expected: Self::EXPECTED,
            found: value.kind(),
        })
    }
}

macro_rules! impl_from_arg_int {
    ($($ty:ty),*) => {
        $(
            impl FromArg for $ty {
                const EXPECTED: &'static str = stringify!($ty);

                fn from_arg(value: &ArgValue) -> Option<Self> {
                    match value {
                        ArgValue::Int(i) => <$ty>::try_from(*i).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_arg_int!(i32, i64, i128, u32, u64, usize);

impl FromArg for f64 {
    const EXPECTED: &'static str = "f64";

    #[allow(clippy::cast_precision_loss)]
    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Float(x) => Some(*x),
            ArgValue::Int(i) => Some(*i as Self),
            _ => None,
        }
    }
}

impl FromArg for bool {
    const EXPECTED: &'static str = "bool";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromArg for String {
    const EXPECTED: &'static str = "String";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromArg for ArgValue {
    const EXPECTED: &'static str = "ArgValue";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromArg> FromArg for Vec<T> {
    const EXPECTED: &'static str = "Vec";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::List(items) | ArgValue::Tuple(items) => {
                items.iter().map(T::from_arg).collect()
            }
            _ => None,
        }
    }
}

impl<T: FromArg> FromArg for Option<T> {
    const EXPECTED: &'static str = "Option";

    fn from_arg(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::None => Some(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_of_every_width_share_a_variant() {
        assert!(matches!(ArgValue::from(3u8), ArgValue::Int(3)));
        assert!(matches!(ArgValue::from(-3i64), ArgValue::Int(-3)));
        assert!(matches!(ArgValue::from(7usize), ArgValue::Int(7)));
    }

    #[test]
    fn option_maps_to_none() {
        assert!(matches!(ArgValue::from(None::<i32>), ArgValue::None));
        assert!(matches!(ArgValue::from(Some(2)), ArgValue::Int(2)));
    }

    #[test]
    fn vec_array_reports_shape_and_bytes() {
        let arr = vec![1.0f64, 2.0];
        assert_eq!(arr.shape(), vec![2]);
        assert_eq!(arr.dtype(), "float64");
        assert_eq!(arr.contiguous_bytes().len(), 16);
        assert_eq!(arr.element_count(), 2);
    }

    #[test]
    fn extract_reports_type_mismatch() {
        let err = i64::extract("a", &ArgValue::from("x")).unwrap_err();
        assert!(matches!(
            err,
            Error::ArgumentType {
                expected: "i64",
                found: "str",
                ..
            }
        ));
    }

    #[test]
    fn float_accepts_integers() {
        assert_eq!(f64::from_arg(&ArgValue::Int(4)), Some(4.0));
    }

    #[test]
    fn nested_vec_extraction() {
        let value = ArgValue::from(vec![vec![1, 2], vec![3]]);
        let out: Vec<Vec<i64>> = FromArg::from_arg(&value).unwrap();
        assert_eq!(out, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn opaque_records_type_name() {
        let v = ArgValue::opaque(&std::net::Ipv4Addr::LOCALHOST);
        match v {
            ArgValue::Opaque { type_name, repr } => {
                assert!(type_name.ends_with("Ipv4Addr"));
                assert_eq!(repr, "127.0.0.1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
