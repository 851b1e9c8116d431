//! Owned dynamic values passed through reflective calls.
//!
//! Arguments to queued and blocking invocations are deep-copied into
//! [`Variant`]s at emission time, so a slot running later on another context
//! never observes the emitter's storage.

use std::collections::BTreeMap;
use std::fmt;

/// A dynamically typed, owned value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// No value.
    #[default]
    Invalid,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Char(char),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Variant>),
    Map(BTreeMap<String, Variant>),
}

impl Variant {
    /// Name of the contained type, as used in normalized signatures.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Double(_) => "double",
            Self::Char(_) => "char",
            Self::String(_) => "QString",
            Self::Bytes(_) => "QByteArray",
            Self::List(_) => "QVariantList",
            Self::Map(_) => "QVariantMap",
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            Self::UInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Integer view; unsigned values that do not fit yield `None`.
    pub fn to_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Char(c) => Some(i64::from(u32::from(*c))),
            _ => None,
        }
    }

    pub fn to_uint(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            Self::Bool(v) => Some(u64::from(*v)),
            _ => None,
        }
    }

    pub fn to_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Variant]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "<invalid>"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v:?}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident via $conv:expr),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Self::$variant($conv(value))
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool via std::convert::identity,
    i32 => Int via i64::from,
    i64 => Int via std::convert::identity,
    u32 => UInt via u64::from,
    u64 => UInt via std::convert::identity,
    f32 => Double via f64::from,
    f64 => Double via std::convert::identity,
    char => Char via std::convert::identity,
    String => String via std::convert::identity,
    &str => String via str::to_string,
    Vec<u8> => Bytes via std::convert::identity,
    Vec<Variant> => List via std::convert::identity,
    BTreeMap<String, Variant> => Map via std::convert::identity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Variant::from(42).to_int(), Some(42));
        assert_eq!(Variant::from(7u32).to_int(), Some(7));
        assert_eq!(Variant::from(-1).to_uint(), None);
        assert_eq!(Variant::from(u64::MAX).to_int(), None);
        assert_eq!(Variant::from("hi").as_str(), Some("hi"));
        assert_eq!(Variant::from(true).to_int(), Some(1));
        assert_eq!(Variant::from(2.5).to_double(), Some(2.5));
        assert!(!Variant::default().is_valid());
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Variant::List(vec![Variant::from("a"), Variant::from(1)]);
        let mut copy = original.clone();
        if let Variant::List(items) = &mut copy {
            items.push(Variant::from(2));
        }
        assert_eq!(original.as_list().map(<[Variant]>::len), Some(2));
        assert_eq!(copy.as_list().map(<[Variant]>::len), Some(3));
    }

    #[test]
    fn test_display() {
        let mut map = BTreeMap::new();
        map.insert("k".to_string(), Variant::from(1));
        assert_eq!(Variant::Map(map).to_string(), "{\"k\": 1}");
        assert_eq!(
            Variant::List(vec![Variant::from(1), Variant::from("x")]).to_string(),
            "[1, \"x\"]"
        );
    }
}
