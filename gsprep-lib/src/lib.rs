pub mod camera;
mod common;
pub mod error;
pub mod structures;

use camera::{CameraParams, CAMERA_PARAM_LEN};
use common::{normalize_quat, sigmoid};
use error::GsprepError;
use foldhash::{HashSet, HashSetExt};
use std::fs;
use std::path::Path;
use structures::{
    Attribute, FileSchema, PropertyDescriptor, RawPoint, ScalarType, SplatPoint, POINT_FLOATS,
    SH_BANDS,
};
use tracing::{info, warn};
use zerocopy::IntoBytes;

const HEADER_TERMINATOR: &str = "end_header";

/// Collects newline-delimited header lines up to and including the terminator
/// line. Returns the lines and the offset of the first payload byte (the byte
/// after the terminator's line feed).
fn tokenize_header(raw_data: &[u8]) -> Result<(Vec<&str>, usize), GsprepError> {
    let mut lines = Vec::new();
    let mut start = 0;
    while let Some(pos) = memchr::memchr(b'\n', &raw_data[start..]) {
        let line = std::str::from_utf8(&raw_data[start..start + pos])
            .map_err(|e| GsprepError::MalformedHeader(format!("non-text header line: {}", e)))?;
        lines.push(line);
        start += pos + 1;
        if line == HEADER_TERMINATOR {
            return Ok((lines, start));
        }
    }
    Err(GsprepError::MalformedHeader(format!(
        "no '{}' line before end of buffer",
        HEADER_TERMINATOR
    )))
}

/// The byte-order line's second underscore-delimited token picks the order,
/// e.g. "format binary_little_endian 1.0".
fn parse_byte_order(line: &str) -> Result<bool, GsprepError> {
    match line.split('_').nth(1) {
        Some("little") => Ok(true),
        Some("big") => Ok(false),
        _ => Err(GsprepError::MalformedHeader(format!(
            "bad byte-order line: {:?}",
            line
        ))),
    }
}

/// The count line's third space-delimited token is the declared point count,
/// e.g. "element vertex 141722".
fn parse_point_count(line: &str) -> Result<usize, GsprepError> {
    let token = line.split(' ').nth(2).ok_or_else(|| {
        GsprepError::MalformedHeader(format!("bad point-count line: {:?}", line))
    })?;
    token.parse().map_err(|_| {
        GsprepError::MalformedHeader(format!("bad point count {:?} in line {:?}", token, line))
    })
}

/// A property line's second space-delimited token is the type keyword, the
/// third is the attribute name, e.g. "property float f_dc_0".
fn parse_property(line: &str) -> Result<PropertyDescriptor, GsprepError> {
    let mut tokens = line.split(' ');
    let _keyword = tokens.next();
    let type_token = tokens
        .next()
        .ok_or_else(|| GsprepError::MalformedHeader(format!("bad property line: {:?}", line)))?;
    let name_token = tokens
        .next()
        .ok_or_else(|| GsprepError::MalformedHeader(format!("bad property line: {:?}", line)))?;

    let ty = ScalarType::parse(type_token)
        .ok_or_else(|| GsprepError::UnknownScalarType(type_token.to_string()))?;
    let name = Attribute::parse(name_token).ok_or_else(|| {
        GsprepError::MalformedHeader(format!("unknown attribute name: {:?}", name_token))
    })?;
    Ok(PropertyDescriptor { name, ty })
}

/// Interprets the tokenized header lines. The first line (format magic) and
/// the terminator line carry no schema content and are discarded; the next
/// two lines declare byte order and point count; every remaining line
/// declares one property.
fn extract_schema(lines: &[&str]) -> Result<FileSchema, GsprepError> {
    if lines.len() < 4 {
        return Err(GsprepError::MalformedHeader(format!(
            "header has only {} lines",
            lines.len()
        )));
    }
    let body = &lines[1..lines.len() - 1];
    let little_endian = parse_byte_order(body[0])?;
    let point_count = parse_point_count(body[1])?;

    let mut properties = Vec::with_capacity(body.len() - 2);
    let mut seen: HashSet<Attribute> = HashSet::with_capacity(body.len() - 2);
    for line in &body[2..] {
        let property = parse_property(line)?;
        if !seen.insert(property.name) {
            return Err(GsprepError::MalformedHeader(format!(
                "duplicate attribute: {}",
                property.name
            )));
        }
        properties.push(property);
    }

    Ok(FileSchema {
        little_endian,
        point_count,
        properties,
    })
}

/// Tokenizes the header and extracts the file schema. Returns the schema and
/// the offset of the first payload byte.
pub fn parse_schema(raw_data: &[u8]) -> Result<(FileSchema, usize), GsprepError> {
    let (lines, payload_offset) = tokenize_header(raw_data)?;
    let schema = extract_schema(&lines)?;
    Ok((schema, payload_offset))
}

/// Walks the binary payload record by record. Records are tightly packed with
/// no padding between fields or records. A trailing partial record is never
/// emitted: the decoded count is min(declared count, fully decodable records).
pub fn decode_points(payload: &[u8], schema: &FileSchema) -> Vec<RawPoint> {
    let stride = schema.record_stride();
    let available = if stride == 0 {
        0
    } else {
        (payload.len() / stride).min(schema.point_count)
    };

    let mut points = Vec::with_capacity(available);
    let mut cursor = 0;
    for _ in 0..available {
        let mut point = RawPoint::default();
        for property in &schema.properties {
            let width = property.ty.width();
            let value = property
                .ty
                .read(&payload[cursor..cursor + width], schema.little_endian);
            point.set(property.name, value);
            cursor += width;
        }
        points.push(point);
    }
    points
}

/// Parses the header and decodes every available record in one step.
pub fn decode_cloud(raw_data: &[u8]) -> Result<(FileSchema, Vec<RawPoint>), GsprepError> {
    let (schema, payload_offset) = parse_schema(raw_data)?;
    let points = decode_points(&raw_data[payload_offset..], &schema);
    Ok((schema, points))
}

/// Maps one raw point to the renderer's numeric representation. Pure and
/// order-independent; a schema that never declared an attribute this mapping
/// needs surfaces as `MissingAttribute`, never as a silent zero.
///
/// An all-zero stored quaternion normalizes to NaN; that point is passed
/// through, not rejected (`SplatPoint::rotation_is_finite` flags it).
pub fn preprocess_point(point: &RawPoint) -> Result<SplatPoint, GsprepError> {
    let fetch =
        |attr: Attribute| point.get(attr).ok_or(GsprepError::MissingAttribute(attr));

    let mean = [
        fetch(Attribute::X)? as f32,
        fetch(Attribute::Y)? as f32,
        fetch(Attribute::Z)? as f32,
    ];
    let normal = [
        fetch(Attribute::Nx)? as f32,
        fetch(Attribute::Ny)? as f32,
        fetch(Attribute::Nz)? as f32,
    ];

    let mut sh = [[0.0f32; 3]; SH_BANDS];
    sh[0] = [
        fetch(Attribute::FDc(0))? as f32,
        fetch(Attribute::FDc(1))? as f32,
        fetch(Attribute::FDc(2))? as f32,
    ];
    for band in 1..SH_BANDS {
        let base = (3 * (band - 1)) as u8;
        sh[band] = [
            fetch(Attribute::FRest(base))? as f32,
            fetch(Attribute::FRest(base + 1))? as f32,
            fetch(Attribute::FRest(base + 2))? as f32,
        ];
    }

    let scale = [
        fetch(Attribute::Scale(0))?.exp() as f32,
        fetch(Attribute::Scale(1))?.exp() as f32,
        fetch(Attribute::Scale(2))?.exp() as f32,
    ];
    let opacity = sigmoid(fetch(Attribute::Opacity)?) as f32;

    let quat = normalize_quat([
        fetch(Attribute::Rot(0))?,
        fetch(Attribute::Rot(1))?,
        fetch(Attribute::Rot(2))?,
        fetch(Attribute::Rot(3))?,
    ]);
    let rotation = [
        quat[0] as f32,
        quat[1] as f32,
        quat[2] as f32,
        quat[3] as f32,
    ];

    Ok(SplatPoint {
        mean,
        normal,
        sh,
        scale,
        opacity,
        rotation,
    })
}

/// 1:1, order-preserving preprocessing over a decoded cloud.
pub fn preprocess_points(points: &[RawPoint]) -> Result<Vec<SplatPoint>, GsprepError> {
    points.iter().map(preprocess_point).collect()
}

/// Full pipeline over in-memory file bytes: header, schema, records,
/// per-point preprocessing.
pub fn load_splats(raw_data: &[u8]) -> Result<Vec<SplatPoint>, GsprepError> {
    let (schema, payload_offset) = parse_schema(raw_data)?;
    info!(point_count = schema.point_count, "parsed splat header");

    let raw_points = decode_points(&raw_data[payload_offset..], &schema);
    if raw_points.len() < schema.point_count {
        warn!(
            declared = schema.point_count,
            decoded = raw_points.len(),
            "payload truncated, decoded fewer records than declared"
        );
    }

    let points = preprocess_points(&raw_points)?;
    let degenerate = points.iter().filter(|p| !p.rotation_is_finite()).count();
    if degenerate > 0 {
        warn!(degenerate, "points with non-finite rotation after normalization");
    }
    Ok(points)
}

/// Reads a splat file from disk and runs the full pipeline.
pub fn load_splat_file(path: impl AsRef<Path>) -> Result<Vec<SplatPoint>, GsprepError> {
    let raw_data = fs::read(path).map_err(GsprepError::IoError)?;
    load_splats(&raw_data)
}

/// Lays the preprocessed points out into one flat float buffer.
///
/// `point_stride` is the per-point byte size the external shader-reflection
/// step reports. Each point's fields go in renderer order at the start of its
/// slot; the slot tail is zero. The stride must be 4-byte aligned and at
/// least `TIGHT_POINT_STRIDE`.
pub fn pack_points(points: &[SplatPoint], point_stride: usize) -> Result<Vec<f32>, GsprepError> {
    if point_stride % 4 != 0 {
        return Err(GsprepError::PackLayout(format!(
            "point stride {} is not 4-byte aligned",
            point_stride
        )));
    }
    let floats_per_point = point_stride / 4;
    if floats_per_point < POINT_FLOATS {
        return Err(GsprepError::PackLayout(format!(
            "point stride {} cannot hold {} floats",
            point_stride, POINT_FLOATS
        )));
    }

    let mut buffer = vec![0.0f32; points.len() * floats_per_point];
    for (point, slot) in points.iter().zip(buffer.chunks_exact_mut(floats_per_point)) {
        point.write_floats(&mut slot[..POINT_FLOATS]);
    }
    Ok(buffer)
}

/// `pack_points`, then the buffer's raw native-endian bytes for direct GPU
/// upload or on-disk staging.
pub fn pack_points_bytes(
    points: &[SplatPoint],
    point_stride: usize,
) -> Result<Vec<u8>, GsprepError> {
    let buffer = pack_points(points, point_stride)?;
    Ok(buffer.as_bytes().to_vec())
}

/// The render call this pipeline feeds. The GPU engine lives behind this
/// seam; the library ships no implementation.
pub trait SplatRenderer {
    fn render(
        &mut self,
        points: &[f32],
        num_points: u64,
        camera_param: &[f32; CAMERA_PARAM_LEN],
        size_param: &[u32; 2],
    ) -> Result<(), GsprepError>;
}

/// Packs the points at the given stride and forwards everything to the
/// renderer in one step.
pub fn dispatch<R: SplatRenderer>(
    renderer: &mut R,
    points: &[SplatPoint],
    point_stride: usize,
    camera: &CameraParams,
) -> Result<(), GsprepError> {
    let buffer = pack_points(points, point_stride)?;
    renderer.render(&buffer, points.len() as u64, &camera.params, &camera.size)
}

cfg_if::cfg_if! {
if #[cfg(feature = "async")] {
    /// Reads a splat file through tokio and runs the full pipeline. The read
    /// is the pipeline's only suspension point; everything after it is the
    /// same pure CPU-bound code as the sync path.
    pub async fn load_splat_file_async(
        path: impl AsRef<Path>,
    ) -> Result<Vec<SplatPoint>, GsprepError> {
        let raw_data = tokio::fs::read(path).await.map_err(GsprepError::IoError)?;
        load_splats(&raw_data)
    }
}
}
