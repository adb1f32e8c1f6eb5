//! SQL column types
//!
//! Type codes follow the JDBC `java.sql.Types` numbering so archive headers
//! stay readable by existing tooling.

/// Declared SQL type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    LongVarBinary,
    Null,
    Other,
    Blob,
    Clob,
    Boolean,
    NChar,
    NVarChar,
    NClob,
    /// A code outside the known set, kept verbatim
    Unknown(i32),
}

impl SqlType {
    /// Type code written to the archive header
    pub fn code(self) -> i32 {
        match self {
            SqlType::Bit => -7,
            SqlType::TinyInt => -6,
            SqlType::SmallInt => 5,
            SqlType::Integer => 4,
            SqlType::BigInt => -5,
            SqlType::Float => 6,
            SqlType::Real => 7,
            SqlType::Double => 8,
            SqlType::Numeric => 2,
            SqlType::Decimal => 3,
            SqlType::Char => 1,
            SqlType::VarChar => 12,
            SqlType::LongVarChar => -1,
            SqlType::Date => 91,
            SqlType::Time => 92,
            SqlType::Timestamp => 93,
            SqlType::Binary => -2,
            SqlType::VarBinary => -3,
            SqlType::LongVarBinary => -4,
            SqlType::Null => 0,
            SqlType::Other => 1111,
            SqlType::Blob => 2004,
            SqlType::Clob => 2005,
            SqlType::Boolean => 16,
            SqlType::NChar => -15,
            SqlType::NVarChar => -9,
            SqlType::NClob => 2011,
            SqlType::Unknown(code) => code,
        }
    }

    /// Inverse of `code()`
    pub fn from_code(code: i32) -> Self {
        match code {
            -7 => SqlType::Bit,
            -6 => SqlType::TinyInt,
            5 => SqlType::SmallInt,
            4 => SqlType::Integer,
            -5 => SqlType::BigInt,
            6 => SqlType::Float,
            7 => SqlType::Real,
            8 => SqlType::Double,
            2 => SqlType::Numeric,
            3 => SqlType::Decimal,
            1 => SqlType::Char,
            12 => SqlType::VarChar,
            -1 => SqlType::LongVarChar,
            91 => SqlType::Date,
            92 => SqlType::Time,
            93 => SqlType::Timestamp,
            -2 => SqlType::Binary,
            -3 => SqlType::VarBinary,
            -4 => SqlType::LongVarBinary,
            0 => SqlType::Null,
            1111 => SqlType::Other,
            2004 => SqlType::Blob,
            2005 => SqlType::Clob,
            16 => SqlType::Boolean,
            -15 => SqlType::NChar,
            -9 => SqlType::NVarChar,
            2011 => SqlType::NClob,
            other => SqlType::Unknown(other),
        }
    }

    /// Map a declared type name ("VARCHAR(64)", "blob", "DOUBLE PRECISION")
    ///
    /// Returns None for names outside the standard vocabulary; callers decide
    /// how their vendor treats those.
    pub fn from_type_name(name: &str) -> Option<Self> {
        // Drop size/precision parameters: "DECIMAL(10, 2)" -> "DECIMAL"
        let base = match name.find('(') {
            Some(pos) => &name[..pos],
            None => name,
        };
        let normalized = base
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();

        let sql_type = match normalized.as_str() {
            "BIT" => SqlType::Bit,
            "TINYINT" => SqlType::TinyInt,
            "SMALLINT" | "INT2" => SqlType::SmallInt,
            "INTEGER" | "INT" | "INT4" | "MEDIUMINT" => SqlType::Integer,
            "BIGINT" | "INT8" => SqlType::BigInt,
            "FLOAT" => SqlType::Float,
            "REAL" => SqlType::Real,
            "DOUBLE" | "DOUBLE PRECISION" => SqlType::Double,
            "NUMERIC" => SqlType::Numeric,
            "DECIMAL" | "DEC" => SqlType::Decimal,
            "CHAR" | "CHARACTER" => SqlType::Char,
            "VARCHAR" | "VARCHAR2" | "CHARACTER VARYING" | "TEXT" => SqlType::VarChar,
            "LONGVARCHAR" | "LONG VARCHAR" | "MEDIUMTEXT" | "LONGTEXT" => SqlType::LongVarChar,
            "DATE" => SqlType::Date,
            "TIME" => SqlType::Time,
            "TIMESTAMP" | "DATETIME" => SqlType::Timestamp,
            "BINARY" => SqlType::Binary,
            "VARBINARY" | "BINARY VARYING" => SqlType::VarBinary,
            "LONGVARBINARY" | "LONG VARBINARY" => SqlType::LongVarBinary,
            "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BYTEA" => SqlType::Blob,
            "CLOB" => SqlType::Clob,
            "BOOLEAN" | "BOOL" => SqlType::Boolean,
            "NCHAR" | "NATIONAL CHAR" => SqlType::NChar,
            "NVARCHAR" | "NVARCHAR2" | "NATIONAL VARCHAR" => SqlType::NVarChar,
            "NCLOB" => SqlType::NClob,
            _ => return None,
        };
        Some(sql_type)
    }

    /// Binary types are read as raw byte streams, everything else as text
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            SqlType::Binary
                | SqlType::VarBinary
                | SqlType::LongVarBinary
                | SqlType::Blob
                | SqlType::Other
        )
    }
}
