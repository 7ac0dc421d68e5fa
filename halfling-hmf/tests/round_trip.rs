use std::io::Cursor;

use glam::Vec3;
use halfling_hmf::{
    verify_file_integrity, verify_model, FileFlags, HalflingModelFile, MaterialEntry, ModelFile, ParseError, Subset,
    TextureEntry, FILE_TAG,
};
use halfling_types::{TextureSampler, Vertex};

fn quad_vertices() -> Vec<Vertex> {
    [
        (Vec3::new(-1.0, 0.0, -1.0), [0.0, 0.0]),
        (Vec3::new(1.0, 0.0, -1.0), [1.0, 0.0]),
        (Vec3::new(1.0, 0.0, 1.0), [1.0, 1.0]),
        (Vec3::new(-1.0, 0.0, 1.0), [0.0, 1.0]),
    ]
    .into_iter()
    .map(|(p, uv)| Vertex::new(p, Vec3::Y, uv, Vec3::X))
    .collect()
}

fn sample_model() -> ModelFile {
    let mut model = ModelFile::from_geometry(&quad_vertices(), &[0, 1, 2, 0, 2, 3]);

    let shader = model.intern_string("shaders/gbuffer.hmat");
    let diffuse = model.intern_string("textures/brick_diffuse.dds");
    let normal = model.intern_string("textures/brick_normal.dds");
    assert_eq!(model.intern_string("textures/brick_diffuse.dds"), diffuse);

    model.materials.push(MaterialEntry {
        shader_path_index: shader,
        textures: vec![
            TextureEntry::new(diffuse, TextureSampler::AnisotropicWrap),
            TextureEntry::new(normal, TextureSampler::LinearClamp),
        ],
    });
    model.subsets.push(Subset {
        vertex_start: 0,
        vertex_count: 4,
        index_start: 0,
        index_count: 6,
        aabb_min: Vec3::new(-1.0, 0.0, -1.0),
        aabb_max: Vec3::new(1.0, 0.0, 1.0),
        material_index: 0,
    });
    model
}

fn encode(model: &ModelFile) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    HalflingModelFile::write(&mut cursor, model).unwrap();
    cursor.into_inner()
}

#[test]
fn round_trip_preserves_everything() -> anyhow::Result<()> {
    let model = sample_model();
    let bytes = encode(&model);

    let read = HalflingModelFile::read(&bytes)?;
    assert_eq!(read, model);
    assert_eq!(read.vertices(), Some(quad_vertices()));
    assert_eq!(read.indices()?, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!(read.string(1), Some("textures/brick_diffuse.dds"));
    assert_eq!(
        read.material(0).map(|m| m.textures[0].sampler()),
        Some(Ok(TextureSampler::AnisotropicWrap))
    );

    let aabb = read.model_aabb();
    assert_eq!(aabb.min, Vec3::new(-1.0, 0.0, -1.0));
    assert_eq!(aabb.max, Vec3::new(1.0, 0.0, 1.0));

    verify_file_integrity(&bytes)?;
    Ok(())
}

#[test]
fn header_layout() {
    let bytes = encode(&sample_model());

    assert_eq!(&bytes[0..4], b"HMF\0");
    assert_eq!(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), FILE_TAG);
    assert_eq!(bytes[4], 3);

    let mut flags = [0; 8];
    flags.copy_from_slice(&bytes[5..13]);
    assert_eq!(
        u64::from_le_bytes(flags),
        (FileFlags::HAS_STRING_TABLE | FileFlags::HAS_MATERIAL_TABLE).bits()
    );
}

#[test]
fn optional_tables_are_omitted() -> anyhow::Result<()> {
    let model = ModelFile::from_geometry(&quad_vertices(), &[0, 1, 2]);
    let bytes = encode(&model);

    let mut flags = [0; 8];
    flags.copy_from_slice(&bytes[5..13]);
    assert_eq!(u64::from_le_bytes(flags), 0);

    // tag + version + flags + counts + descriptions + data + subset count
    assert_eq!(bytes.len(), 4 + 1 + 8 + 8 + 48 + 4 * 44 + 3 * 4 + 4);

    let read = HalflingModelFile::read(&bytes)?;
    assert!(read.strings.is_empty());
    assert!(read.materials.is_empty());
    assert!(read.subsets.is_empty());
    Ok(())
}

#[test]
fn rejects_bad_tag() {
    let mut bytes = encode(&sample_model());
    bytes[0] = b'X';
    assert!(matches!(
        HalflingModelFile::read(&bytes),
        Err(ParseError::BadTag { .. })
    ));
}

#[test]
fn rejects_bad_version() {
    let mut bytes = encode(&sample_model());
    bytes[4] = 2;
    assert!(matches!(
        HalflingModelFile::read(&bytes),
        Err(ParseError::BadVersion { found: 2, expected: 3 })
    ));
}

#[test]
fn rejects_truncation() {
    let bytes = encode(&sample_model());
    for len in [0, 3, 12, bytes.len() / 2, bytes.len() - 1] {
        assert!(
            matches!(HalflingModelFile::read(&bytes[..len]), Err(ParseError::Truncated { .. })),
            "length {len} should be truncated"
        );
    }
}

#[test]
fn integrity_rejects_out_of_range_material() {
    let mut model = sample_model();
    model.subsets[0].material_index = 1;

    let bytes = encode(&model);
    assert!(HalflingModelFile::read(&bytes).is_ok());
    assert!(matches!(
        verify_file_integrity(&bytes),
        Err(ParseError::MaterialIndexOutOfRange { subset: 0, index: 1, len: 1 })
    ));
}

#[test]
fn integrity_rejects_out_of_range_string() {
    let mut model = sample_model();
    model.materials[0].textures[1].path_index = 17;

    assert!(matches!(
        verify_file_integrity(&encode(&model)),
        Err(ParseError::StringIndexOutOfRange { index: 17, len: 3, .. })
    ));
}

#[test]
fn integrity_rejects_bad_subset_ranges() {
    let mut model = sample_model();
    model.subsets[0].index_start = 4;
    assert!(matches!(
        verify_model(&model),
        Err(ParseError::SubsetOutOfRange { what: "indices", .. })
    ));

    let mut model = sample_model();
    model.subsets[0].vertex_count = 0;
    assert!(matches!(verify_model(&model), Err(ParseError::EmptySubset { subset: 0 })));
}

#[test]
fn integrity_rejects_invalid_sampler() {
    let mut model = sample_model();
    model.materials[0].textures[0].sampler = 9;
    assert!(matches!(
        verify_file_integrity(&encode(&model)),
        Err(ParseError::InvalidSampler { material: 0, texture: 0, value: 9 })
    ));
}

#[test]
fn write_rejects_mismatched_byte_width() {
    let mut model = sample_model();
    model.vertex_buffer_desc.byte_width += 1;

    let mut cursor = Cursor::new(Vec::new());
    assert!(HalflingModelFile::write(&mut cursor, &model).is_err());
}

#[test]
fn partial_trailing_index_is_rejected() {
    let mut model = sample_model();
    model.index_data.push(7);

    assert!(matches!(
        model.indices(),
        Err(ParseError::DataSizeMismatch { what: "Index", expected: 24, actual: 25 })
    ));
}
