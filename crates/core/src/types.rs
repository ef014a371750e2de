//! Data type definitions for the planner.
//!
//! A `DataType` is a scalar kind, an array flag and optional decimal
//! metadata. Types are small and `Copy`; the planner passes them by value.

use crate::error::{Error, Result};
use std::fmt;

/// Maximum precision accepted for a decimal type.
pub const MAX_DECIMAL_PRECISION: u16 = 1000;

/// The scalar kind of a data type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// 64-bit signed integer
    Int8,
    /// UTF-8 string
    Text,
    /// Boolean
    Bool,
    /// Binary data
    Bytea,
    /// 128-bit UUID
    Uuid,
    /// Fixed precision decimal
    Decimal,
    /// 256-bit unsigned integer
    Uint256,
    /// The type of a bare NULL literal
    Null,
    /// A type that is not known until execution (matches anything)
    Unknown,
}

impl TypeKind {
    /// Returns the canonical name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Int8 => "int8",
            TypeKind::Text => "text",
            TypeKind::Bool => "bool",
            TypeKind::Bytea => "bytea",
            TypeKind::Uuid => "uuid",
            TypeKind::Decimal => "decimal",
            TypeKind::Uint256 => "uint256",
            TypeKind::Null => "null",
            TypeKind::Unknown => "unknown",
        }
    }

    /// Resolves a kind from its name or one of its aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "int8" | "int" | "integer" | "bigint" => TypeKind::Int8,
            "text" | "string" | "varchar" => TypeKind::Text,
            "bool" | "boolean" => TypeKind::Bool,
            "bytea" | "blob" | "bytes" => TypeKind::Bytea,
            "uuid" => TypeKind::Uuid,
            "decimal" | "numeric" => TypeKind::Decimal,
            "uint256" => TypeKind::Uint256,
            "null" => TypeKind::Null,
            "unknown" => TypeKind::Unknown,
            _ => return None,
        };
        Some(kind)
    }
}

/// A scalar or array type descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DataType {
    kind: TypeKind,
    is_array: bool,
    /// Decimal precision and scale.
    metadata: Option<(u16, u16)>,
}

impl DataType {
    pub const INT8: DataType = DataType::scalar(TypeKind::Int8);
    pub const TEXT: DataType = DataType::scalar(TypeKind::Text);
    pub const BOOL: DataType = DataType::scalar(TypeKind::Bool);
    pub const BYTEA: DataType = DataType::scalar(TypeKind::Bytea);
    pub const UUID: DataType = DataType::scalar(TypeKind::Uuid);
    pub const UINT256: DataType = DataType::scalar(TypeKind::Uint256);
    pub const NULL: DataType = DataType::scalar(TypeKind::Null);
    pub const UNKNOWN: DataType = DataType::scalar(TypeKind::Unknown);

    /// The widest decimal, `decimal(1000,0)`. Integer sums widen to it.
    pub const MAX_DECIMAL: DataType = DataType {
        kind: TypeKind::Decimal,
        is_array: false,
        metadata: Some((MAX_DECIMAL_PRECISION, 0)),
    };

    const fn scalar(kind: TypeKind) -> Self {
        Self {
            kind,
            is_array: false,
            metadata: None,
        }
    }

    /// Creates a decimal type, validating precision and scale.
    pub fn decimal(precision: u16, scale: u16) -> Result<Self> {
        if precision == 0 || precision > MAX_DECIMAL_PRECISION {
            return Err(Error::invalid_type(format!(
                "decimal precision must be between 1 and {}, got {}",
                MAX_DECIMAL_PRECISION, precision
            )));
        }
        if scale > precision {
            return Err(Error::invalid_type(format!(
                "decimal scale {} exceeds precision {}",
                scale, precision
            )));
        }
        Ok(Self {
            kind: TypeKind::Decimal,
            is_array: false,
            metadata: Some((precision, scale)),
        })
    }

    /// Returns the array type with this element type.
    pub fn array_of(self) -> Self {
        Self {
            is_array: true,
            ..self
        }
    }

    /// Returns the element type of an array type (or the type itself).
    pub fn element(self) -> Self {
        Self {
            is_array: false,
            ..self
        }
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    #[inline]
    pub fn metadata(&self) -> Option<(u16, u16)> {
        self.metadata
    }

    /// Returns the type's name without array or metadata suffixes.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Strict type equality. `unknown` matches any type.
    pub fn equals_strict(&self, other: &DataType) -> bool {
        if self.kind == TypeKind::Unknown || other.kind == TypeKind::Unknown {
            return true;
        }
        self.is_array == other.is_array
            && self.metadata == other.metadata
            && self.kind == other.kind
    }

    /// Type compatibility: `null` matches any type, otherwise strict equality.
    pub fn equals(&self, other: &DataType) -> bool {
        if self.kind == TypeKind::Null || other.kind == TypeKind::Null {
            return true;
        }
        self.equals_strict(other)
    }

    /// Returns whether arithmetic is defined on this type.
    pub fn is_numeric(&self) -> bool {
        if self.is_array {
            return false;
        }
        matches!(
            self.kind,
            TypeKind::Int8 | TypeKind::Decimal | TypeKind::Uint256 | TypeKind::Unknown
        )
    }

    /// Parses a type name such as `int8`, `text[]` or `decimal(10,2)`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (base, is_array) = match trimmed.strip_suffix("[]") {
            Some(base) => (base.trim_end(), true),
            None => (trimmed, false),
        };

        let (name, metadata) = match base.find('(') {
            Some(open) => {
                let args = base[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| Error::invalid_type(format!("malformed type: {}", input)))?;
                let mut parts = args.split(',').map(|p| p.trim().parse::<u16>());
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(Ok(p)), Some(Ok(s)), None) => (&base[..open], Some((p, s))),
                    _ => {
                        return Err(Error::invalid_type(format!(
                            "malformed type metadata: {}",
                            input
                        )))
                    }
                }
            }
            None => (base, None),
        };

        let kind = TypeKind::from_name(name.trim())
            .ok_or_else(|| Error::invalid_type(format!("unknown type: {}", name)))?;

        let dt = match (kind, metadata) {
            (TypeKind::Decimal, Some((p, s))) => DataType::decimal(p, s)?,
            (TypeKind::Decimal, None) => DataType::MAX_DECIMAL,
            (_, Some(_)) => {
                return Err(Error::invalid_type(format!(
                    "type {} does not accept metadata",
                    kind.name()
                )))
            }
            (kind, None) => DataType::scalar(kind),
        };

        Ok(if is_array { dt.array_of() } else { dt })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.name())?;
        if let Some((precision, scale)) = self.metadata {
            write!(f, "({},{})", precision, scale)?;
        }
        if self.is_array {
            f.write_str("[]")?;
        }
        Ok(())
    }
}
