use std::fmt;

/// Number of attribute identifiers the format can declare.
pub const ATTRIBUTE_COUNT: usize = 62;

/// Spherical-harmonic bands per point: one DC triplet plus 15 rest triplets.
pub const SH_BANDS: usize = 16;

/// Floats per preprocessed point when tightly packed:
/// mean(3) + normal(3) + sh(16*3) + scale(3) + opacity(1) + rotation(4).
pub const POINT_FLOATS: usize = 62;

/// Tightly packed per-point byte size, the smallest stride the packer accepts.
pub const TIGHT_POINT_STRIDE: usize = POINT_FLOATS * 4;

/// One of the 62 attribute names a property line may declare.
///
/// The set is closed: anything outside it is a malformed header, not a new
/// attribute. Each variant maps onto a dense slot in `0..ATTRIBUTE_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    X,
    Y,
    Z,
    Nx,
    Ny,
    Nz,
    /// `f_dc_0..f_dc_2`
    FDc(u8),
    /// `f_rest_0..f_rest_44`
    FRest(u8),
    Opacity,
    /// `scale_0..scale_2`
    Scale(u8),
    /// `rot_0..rot_3`
    Rot(u8),
}

impl Attribute {
    pub fn parse(name: &str) -> Option<Attribute> {
        match name {
            "x" => return Some(Attribute::X),
            "y" => return Some(Attribute::Y),
            "z" => return Some(Attribute::Z),
            "nx" => return Some(Attribute::Nx),
            "ny" => return Some(Attribute::Ny),
            "nz" => return Some(Attribute::Nz),
            "opacity" => return Some(Attribute::Opacity),
            _ => {}
        }
        if let Some(idx) = Self::indexed(name, "f_dc_") {
            return (idx < 3).then_some(Attribute::FDc(idx));
        }
        if let Some(idx) = Self::indexed(name, "f_rest_") {
            return (idx < 45).then_some(Attribute::FRest(idx));
        }
        if let Some(idx) = Self::indexed(name, "scale_") {
            return (idx < 3).then_some(Attribute::Scale(idx));
        }
        if let Some(idx) = Self::indexed(name, "rot_") {
            return (idx < 4).then_some(Attribute::Rot(idx));
        }
        None
    }

    fn indexed(name: &str, prefix: &str) -> Option<u8> {
        let suffix = name.strip_prefix(prefix)?;
        // "rot_007" is not a valid spelling of "rot_7"
        if suffix.len() > 1 && suffix.starts_with('0') {
            return None;
        }
        suffix.parse().ok()
    }

    /// Dense index in `0..ATTRIBUTE_COUNT`, used to key per-point value slots.
    pub const fn slot(self) -> usize {
        match self {
            Attribute::X => 0,
            Attribute::Y => 1,
            Attribute::Z => 2,
            Attribute::Nx => 3,
            Attribute::Ny => 4,
            Attribute::Nz => 5,
            Attribute::FDc(i) => 6 + i as usize,
            Attribute::FRest(i) => 9 + i as usize,
            Attribute::Opacity => 54,
            Attribute::Scale(i) => 55 + i as usize,
            Attribute::Rot(i) => 58 + i as usize,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::X => write!(f, "x"),
            Attribute::Y => write!(f, "y"),
            Attribute::Z => write!(f, "z"),
            Attribute::Nx => write!(f, "nx"),
            Attribute::Ny => write!(f, "ny"),
            Attribute::Nz => write!(f, "nz"),
            Attribute::FDc(i) => write!(f, "f_dc_{}", i),
            Attribute::FRest(i) => write!(f, "f_rest_{}", i),
            Attribute::Opacity => write!(f, "opacity"),
            Attribute::Scale(i) => write!(f, "scale_{}", i),
            Attribute::Rot(i) => write!(f, "rot_{}", i),
        }
    }
}

/// The 8 scalar kinds a property line may declare. Two keyword spellings are
/// accepted per kind (`int` / `int32`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl ScalarType {
    pub fn parse(keyword: &str) -> Option<ScalarType> {
        match keyword {
            "char" | "int8" => Some(ScalarType::Char),
            "uchar" | "uint8" => Some(ScalarType::UChar),
            "short" | "int16" => Some(ScalarType::Short),
            "ushort" | "uint16" => Some(ScalarType::UShort),
            "int" | "int32" => Some(ScalarType::Int),
            "uint" | "uint32" => Some(ScalarType::UInt),
            "float" | "float32" => Some(ScalarType::Float),
            "double" | "float64" => Some(ScalarType::Double),
            _ => None,
        }
    }

    pub const fn width(self) -> usize {
        match self {
            ScalarType::Char | ScalarType::UChar => 1,
            ScalarType::Short | ScalarType::UShort => 2,
            ScalarType::Int | ScalarType::UInt | ScalarType::Float => 4,
            ScalarType::Double => 8,
        }
    }

    /// Decodes one scalar from `bytes`, which must hold at least `width()`
    /// bytes; the caller bounds-checks the record before calling.
    pub(crate) fn read(self, bytes: &[u8], little_endian: bool) -> f64 {
        match self {
            ScalarType::Char => bytes[0] as i8 as f64,
            ScalarType::UChar => bytes[0] as f64,
            ScalarType::Short => {
                let raw = [bytes[0], bytes[1]];
                let v = if little_endian {
                    i16::from_le_bytes(raw)
                } else {
                    i16::from_be_bytes(raw)
                };
                v as f64
            }
            ScalarType::UShort => {
                let raw = [bytes[0], bytes[1]];
                let v = if little_endian {
                    u16::from_le_bytes(raw)
                } else {
                    u16::from_be_bytes(raw)
                };
                v as f64
            }
            ScalarType::Int => {
                let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
                let v = if little_endian {
                    i32::from_le_bytes(raw)
                } else {
                    i32::from_be_bytes(raw)
                };
                v as f64
            }
            ScalarType::UInt => {
                let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
                let v = if little_endian {
                    u32::from_le_bytes(raw)
                } else {
                    u32::from_be_bytes(raw)
                };
                v as f64
            }
            ScalarType::Float => {
                let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
                let v = if little_endian {
                    f32::from_le_bytes(raw)
                } else {
                    f32::from_be_bytes(raw)
                };
                v as f64
            }
            ScalarType::Double => {
                let raw = [
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ];
                if little_endian {
                    f64::from_le_bytes(raw)
                } else {
                    f64::from_be_bytes(raw)
                }
            }
        }
    }
}

/// One header property declaration. The declaration order across the header
/// defines the record byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: Attribute,
    pub ty: ScalarType,
}

/// Everything the header declares about the binary payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSchema {
    pub little_endian: bool,
    pub point_count: usize,
    pub properties: Vec<PropertyDescriptor>,
}

impl FileSchema {
    /// Byte width of one tightly packed record.
    pub fn record_stride(&self) -> usize {
        self.properties.iter().map(|p| p.ty.width()).sum()
    }
}

/// One decoded record: a value per attribute the schema declared, nothing for
/// the rest. Absent attributes stay absent; they are never defaulted to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    values: [f64; ATTRIBUTE_COUNT],
    present: u64,
}

impl Default for RawPoint {
    fn default() -> Self {
        RawPoint {
            values: [0.0; ATTRIBUTE_COUNT],
            present: 0,
        }
    }
}

impl RawPoint {
    pub fn set(&mut self, attr: Attribute, value: f64) {
        let slot = attr.slot();
        self.values[slot] = value;
        self.present |= 1 << slot;
    }

    pub fn get(&self, attr: Attribute) -> Option<f64> {
        let slot = attr.slot();
        (self.present >> slot & 1 == 1).then(|| self.values[slot])
    }
}

/// One point in the numeric representation the renderer consumes: scales are
/// exponentiated, opacity sigmoid-mapped, the quaternion unit-normalized, and
/// the 45 rest coefficients regrouped behind the DC term as 15 RGB triplets.
#[derive(Debug, Clone, PartialEq)]
pub struct SplatPoint {
    pub mean: [f32; 3],
    pub normal: [f32; 3],
    pub sh: [[f32; 3]; SH_BANDS],
    pub scale: [f32; 3],
    pub opacity: f32,
    pub rotation: [f32; 4],
}

impl SplatPoint {
    /// False when the stored quaternion was all zeros and normalization
    /// produced NaN.
    pub fn rotation_is_finite(&self) -> bool {
        self.rotation.iter().all(|c| c.is_finite())
    }

    /// Writes the fields in renderer order into `out`, which must hold at
    /// least `POINT_FLOATS` values.
    pub fn write_floats(&self, out: &mut [f32]) {
        out[0..3].copy_from_slice(&self.mean);
        out[3..6].copy_from_slice(&self.normal);
        for (band, coeffs) in self.sh.iter().enumerate() {
            let base = 6 + band * 3;
            out[base..base + 3].copy_from_slice(coeffs);
        }
        out[54..57].copy_from_slice(&self.scale);
        out[57] = self.opacity;
        out[58..62].copy_from_slice(&self.rotation);
    }
}
