//! Fundamental numeric leaf types and their names.

use crate::schema::DataTypeDef;

/// Scalar primitive types a tree leaf can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl PrimitiveType {
    /// Look up a primitive by any of its accepted type names.
    ///
    /// Both the classic tree names (`Int_t`, `Float_t`, ...) and the fixed
    /// width C++ names (`std::int32_t`, `float`, ...) are understood.
    pub fn from_type_name(name: &str) -> Option<Self> {
        Some(match name.trim() {
            "Bool_t" | "bool" => PrimitiveType::Bool,
            "Char_t" | "char" | "std::int8_t" | "int8_t" => PrimitiveType::I8,
            "Short_t" | "short" | "std::int16_t" | "int16_t" => PrimitiveType::I16,
            "Int_t" | "int" | "std::int32_t" | "int32_t" => PrimitiveType::I32,
            "Long64_t" | "Long_t" | "long" | "long long" | "std::int64_t" | "int64_t" => {
                PrimitiveType::I64
            }
            "UChar_t" | "unsigned char" | "std::uint8_t" | "uint8_t" => PrimitiveType::U8,
            "UShort_t" | "unsigned short" | "std::uint16_t" | "uint16_t" => PrimitiveType::U16,
            "UInt_t" | "unsigned int" | "std::uint32_t" | "uint32_t" => PrimitiveType::U32,
            "ULong64_t" | "ULong_t" | "unsigned long" | "unsigned long long" | "std::uint64_t"
            | "uint64_t" => PrimitiveType::U64,
            "Float_t" | "float" => PrimitiveType::F32,
            "Double_t" | "double" => PrimitiveType::F64,
            _ => return None,
        })
    }

    /// Look up a primitive by its single-letter leaf-list type code.
    ///
    /// `C` (C string) is not a primitive and is handled by the leaf-list parser.
    pub fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'O' => PrimitiveType::Bool,
            'B' => PrimitiveType::I8,
            'b' => PrimitiveType::U8,
            'S' => PrimitiveType::I16,
            's' => PrimitiveType::U16,
            'I' => PrimitiveType::I32,
            'i' => PrimitiveType::U32,
            'L' | 'G' => PrimitiveType::I64,
            'l' | 'g' => PrimitiveType::U64,
            'F' => PrimitiveType::F32,
            'D' => PrimitiveType::F64,
            _ => return None,
        })
    }

    pub fn code(&self) -> char {
        match self {
            PrimitiveType::Bool => 'O',
            PrimitiveType::I8 => 'B',
            PrimitiveType::U8 => 'b',
            PrimitiveType::I16 => 'S',
            PrimitiveType::U16 => 's',
            PrimitiveType::I32 => 'I',
            PrimitiveType::U32 => 'i',
            PrimitiveType::I64 => 'L',
            PrimitiveType::U64 => 'l',
            PrimitiveType::F32 => 'F',
            PrimitiveType::F64 => 'D',
        }
    }

    /// Name reported for leaves of this type.
    pub fn leaf_type_name(&self) -> &'static str {
        match self {
            PrimitiveType::Bool => "Bool_t",
            PrimitiveType::I8 => "Char_t",
            PrimitiveType::U8 => "UChar_t",
            PrimitiveType::I16 => "Short_t",
            PrimitiveType::U16 => "UShort_t",
            PrimitiveType::I32 => "Int_t",
            PrimitiveType::U32 => "UInt_t",
            PrimitiveType::I64 => "Long64_t",
            PrimitiveType::U64 => "ULong64_t",
            PrimitiveType::F32 => "Float_t",
            PrimitiveType::F64 => "Double_t",
        }
    }

    /// In-memory size of one value in bytes.
    pub fn size(&self) -> usize {
        match self {
            PrimitiveType::Bool | PrimitiveType::I8 | PrimitiveType::U8 => 1,
            PrimitiveType::I16 | PrimitiveType::U16 => 2,
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => 4,
            PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => 8,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            PrimitiveType::Bool | PrimitiveType::F32 | PrimitiveType::F64
        )
    }

    pub fn to_data_type(self) -> DataTypeDef {
        match self {
            PrimitiveType::Bool => DataTypeDef::Bool,
            PrimitiveType::I8 => DataTypeDef::I8,
            PrimitiveType::I16 => DataTypeDef::I16,
            PrimitiveType::I32 => DataTypeDef::I32,
            PrimitiveType::I64 => DataTypeDef::I64,
            PrimitiveType::U8 => DataTypeDef::U8,
            PrimitiveType::U16 => DataTypeDef::U16,
            PrimitiveType::U32 => DataTypeDef::U32,
            PrimitiveType::U64 => DataTypeDef::U64,
            PrimitiveType::F32 => DataTypeDef::F32,
            PrimitiveType::F64 => DataTypeDef::F64,
        }
    }

    /// Decode one native-endian integer of this type as a signed count.
    ///
    /// Returns `None` for non-integer types or when `bytes` is too short.
    pub fn read_count(&self, bytes: &[u8]) -> Option<i64> {
        let n = self.size();
        let raw = bytes.get(..n)?;
        Some(match self {
            PrimitiveType::I8 => i8::from_ne_bytes([raw[0]]) as i64,
            PrimitiveType::U8 => raw[0] as i64,
            PrimitiveType::I16 => i16::from_ne_bytes(raw.try_into().ok()?) as i64,
            PrimitiveType::U16 => u16::from_ne_bytes(raw.try_into().ok()?) as i64,
            PrimitiveType::I32 => i32::from_ne_bytes(raw.try_into().ok()?) as i64,
            PrimitiveType::U32 => u32::from_ne_bytes(raw.try_into().ok()?) as i64,
            PrimitiveType::I64 => i64::from_ne_bytes(raw.try_into().ok()?),
            PrimitiveType::U64 => i64::try_from(u64::from_ne_bytes(raw.try_into().ok()?)).ok()?,
            PrimitiveType::Bool | PrimitiveType::F32 | PrimitiveType::F64 => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_and_std_names_agree() {
        assert_eq!(
            PrimitiveType::from_type_name("Int_t"),
            PrimitiveType::from_type_name("std::int32_t")
        );
        assert_eq!(
            PrimitiveType::from_type_name("Double_t"),
            Some(PrimitiveType::F64)
        );
        assert_eq!(PrimitiveType::from_type_name("MyClass"), None);
    }

    #[test]
    fn codes_round_trip() {
        for code in ['O', 'B', 'b', 'S', 's', 'I', 'i', 'L', 'l', 'F', 'D'] {
            let p = PrimitiveType::from_code(code).unwrap();
            assert_eq!(p.code(), code);
        }
        assert_eq!(PrimitiveType::from_code('C'), None);
    }

    #[test]
    fn read_count_decodes_native_integers() {
        assert_eq!(
            PrimitiveType::I32.read_count(&7_i32.to_ne_bytes()),
            Some(7)
        );
        assert_eq!(
            PrimitiveType::U16.read_count(&3_u16.to_ne_bytes()),
            Some(3)
        );
        assert_eq!(PrimitiveType::F32.read_count(&[0; 4]), None);
        assert_eq!(PrimitiveType::I64.read_count(&[0; 4]), None);
    }
}
