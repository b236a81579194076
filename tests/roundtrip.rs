//! Write archives and read them back through the lazy reader tree.

use std::path::Path;

use alembic_git::{
    ArchiveOptions, ArchiveReader, ArchiveWriter, DataType, Error, MetaData, PropertyType,
    SampleSelector, TimeSampling,
};
use tempfile::TempDir;

/// `/xform` with an animated `tx`, `/xform/mesh` with `.geom/P` and a
/// face-set name list.
fn write_scene(path: &Path, frames: usize) -> alembic_git::ObjectId {
    let options = ArchiveOptions {
        application: Some("roundtrip test".to_string()),
        ..ArchiveOptions::default()
    };
    let archive = ArchiveWriter::create_with_options(path, options).unwrap();
    let ts = archive.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0)).unwrap();

    let xform = archive
        .top()
        .create_child("xform", MetaData::new().with("schema", "Xform_v3"))
        .unwrap();
    let tx = xform
        .properties()
        .create_scalar_property("tx", MetaData::new(), DataType::FLOAT64, ts)
        .unwrap();
    for frame in 0..frames {
        tx.set_values(&[frame as f64 * 0.5]).unwrap();
    }

    let mesh = xform
        .create_child("mesh", MetaData::new().with("schema", "PolyMesh_v1"))
        .unwrap();
    let geom = mesh
        .properties()
        .create_compound_property(".geom", MetaData::new())
        .unwrap();
    let p = geom
        .create_array_property("P", MetaData::new().with("interpretation", "point"), DataType::VEC3F, 0)
        .unwrap();
    p.set_values(&[0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.5, 1.0, 0.0]).unwrap();
    let names = geom
        .create_array_property("faceSets", MetaData::new(), DataType::STRING, 0)
        .unwrap();
    names.set_strings(&["left", "right", ""]).unwrap();

    archive.close().unwrap()
}

#[test]
fn test_hierarchy_and_properties_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scene.abcg");
    let commit = write_scene(&path, 10);

    let archive = ArchiveReader::open(&path).unwrap();
    assert_eq!(archive.commit_id(), commit);
    assert_eq!(archive.format_version(), 2);
    assert_eq!(archive.application(), Some("roundtrip test"));
    assert!(archive.archive_meta_data().contains("_ai_AlembicVersion"));
    assert!(archive.archive_meta_data().contains("_ai_DateWritten"));

    let top = archive.top().unwrap();
    assert_eq!(top.full_name(), "/");
    assert_eq!(top.num_children(), 1);

    let xform = top.child(0).unwrap();
    assert_eq!(xform.name(), "xform");
    assert_eq!(xform.full_name(), "/xform");
    assert_eq!(xform.meta_data().get("schema"), Some("Xform_v3"));

    let props = xform.properties().unwrap();
    assert_eq!(props.num_properties(), 1);
    let tx = props.scalar_property("tx").unwrap();
    assert_eq!(tx.full_name(), "/xform:tx");
    assert_eq!(tx.num_samples(), 10);
    assert_eq!(tx.values::<f64>(4).unwrap(), vec![2.0]);
    assert_eq!(tx.header().time_sampling_index, 1);
    assert!(!tx.is_constant());

    let mesh = xform.child_by_name("mesh").unwrap().unwrap();
    assert_eq!(mesh.full_name(), "/xform/mesh");
    let geom = mesh.properties().unwrap().compound_property(".geom").unwrap();
    assert_eq!(geom.full_name(), "/xform/mesh:.geom");
    assert_eq!(geom.property_header(0).unwrap().name, "P");
    assert_eq!(geom.property_header(1).unwrap().name, "faceSets");

    let p = geom.array_property("P").unwrap();
    assert_eq!(p.full_name(), "/xform/mesh:.geom/P");
    assert_eq!(p.header().meta_data.get("interpretation"), Some("point"));
    let sample = p.sample(0).unwrap();
    assert_eq!(sample.data_type(), DataType::VEC3F);
    assert_eq!(sample.num_points(), 3);
    assert_eq!(sample.values::<f32>().unwrap()[6..], [0.5, 1.0, 0.0]);
    assert_eq!(p.sample_dimensions(0).unwrap().sizes(), &[3]);

    let names = geom.array_property("faceSets").unwrap();
    assert_eq!(names.strings(0).unwrap(), vec!["left", "right", ""]);
}

#[test]
fn test_empty_archive_has_identity_sampling_only() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty");
    ArchiveWriter::create(&path).unwrap().close().unwrap();

    let archive = ArchiveReader::open(&path).unwrap();
    assert_eq!(archive.num_time_samplings(), 1);
    assert!(archive.time_sampling(0).unwrap().is_equivalent(&TimeSampling::identity()));
    assert!(matches!(
        archive.time_sampling(1),
        Err(Error::InvalidTimeSampling { index: 1, count: 1 })
    ));
    let top = archive.top().unwrap();
    assert_eq!(top.num_children(), 0);
    assert_eq!(top.properties().unwrap().num_properties(), 0);
}

#[test]
fn test_time_lookup_and_max_samples() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scene");
    write_scene(&path, 24);

    let archive = ArchiveReader::open(&path).unwrap();
    assert_eq!(archive.max_num_samples_for_time_sampling(1), Some(24));
    assert_eq!(archive.max_num_samples_for_time_sampling(0), Some(1));
    assert_eq!(archive.max_num_samples_for_time_sampling(7), None);

    let xform = archive.find_object("/xform").unwrap().unwrap();
    let tx = xform.properties().unwrap().scalar_property("tx").unwrap();
    let frame = 1.0 / 24.0;

    assert_eq!(tx.floor_index(2.5 * frame).0, 2);
    assert_eq!(tx.ceil_index(2.5 * frame).0, 3);
    assert_eq!(tx.near_index(2.4 * frame).0, 2);
    assert_eq!(tx.near_index(2.6 * frame).0, 3);
    assert_eq!(tx.floor_index(-1.0).0, 0);
    assert_eq!(tx.ceil_index(100.0).0, 23);

    let at = tx.sample_at(SampleSelector::TimeFloor(5.2 * frame)).unwrap();
    assert_eq!(at.values::<f64>().unwrap(), vec![2.5]);
    let at = tx.sample_at(3usize).unwrap();
    assert_eq!(at.values::<f64>().unwrap(), vec![1.5]);
}

#[test]
fn test_identical_content_has_identical_hashes() {
    let dir = TempDir::new().unwrap();
    write_scene(&dir.path().join("a"), 5);
    write_scene(&dir.path().join("b"), 5);
    write_scene(&dir.path().join("c"), 6);

    let hashes = |name: &str| {
        let archive = ArchiveReader::open(dir.path().join(name)).unwrap();
        let top = archive.top().unwrap();
        let xform = top.child(0).unwrap();
        (
            top.children_hash().unwrap(),
            xform.properties_hash().unwrap(),
            xform.children_hash().unwrap(),
        )
    };
    let (a, b, c) = (hashes("a"), hashes("b"), hashes("c"));
    assert_eq!(a, b);
    assert_ne!(a.0, c.0);
    assert_ne!(a.1, c.1);
    // The mesh below is unchanged.
    assert_eq!(a.2, c.2);
}

#[test]
fn test_reader_validation_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scene");
    write_scene(&path, 3);

    let archive = ArchiveReader::open(&path).unwrap();
    let top = archive.top().unwrap();
    assert!(matches!(top.child(5), Err(Error::ChildOutOfBounds { index: 5, count: 1 })));
    assert!(top.child_by_name("nope").unwrap().is_none());
    assert!(archive.find_object("/xform/missing").unwrap().is_none());
    assert!(matches!(
        archive.object("/xform/missing"),
        Err(Error::ObjectNotFound(p)) if p == "/xform/missing"
    ));
    assert_eq!(archive.object("/xform/mesh").unwrap().full_name(), "/xform/mesh");

    let props = top.child(0).unwrap().properties().unwrap();
    assert!(matches!(props.array_property("tx"), Err(Error::TypeMismatch { .. })));
    assert!(matches!(props.scalar_property("ty"), Err(Error::PropertyNotFound(name)) if name == "/xform:ty"));
    assert_eq!(props.property(0).unwrap().property_type(), PropertyType::Scalar);

    let tx = props.scalar_property("tx").unwrap();
    assert!(matches!(tx.sample(3), Err(Error::SampleOutOfBounds { index: 3, count: 3 })));
    assert!(matches!(tx.values::<f32>(0), Err(Error::TypeMismatch { .. })));
}

#[test]
fn test_writer_validation_errors() {
    let dir = TempDir::new().unwrap();
    let archive = ArchiveWriter::create(dir.path().join("a")).unwrap();
    let top = archive.top();

    top.create_child("a", MetaData::new()).unwrap();
    assert!(matches!(
        top.create_child("a", MetaData::new()),
        Err(Error::DuplicateName { name, .. }) if name == "a"
    ));
    assert!(matches!(top.create_child("", MetaData::new()), Err(Error::InvalidName(_))));
    assert!(matches!(top.create_child("x/y", MetaData::new()), Err(Error::InvalidName(_))));

    let props = top.properties();
    let s = props
        .create_scalar_property("s", MetaData::new(), DataType::INT32, 0)
        .unwrap();
    assert!(matches!(
        props.create_compound_property("s", MetaData::new()),
        Err(Error::DuplicateName { .. })
    ));
    assert!(matches!(
        props.create_array_property("bad_ts", MetaData::new(), DataType::INT32, 4),
        Err(Error::InvalidTimeSampling { index: 4, .. })
    ));

    assert!(matches!(s.set_from_previous_sample(), Err(Error::NoPreviousSample(_))));
    assert!(matches!(s.set_values(&[1.0f32]), Err(Error::TypeMismatch { .. })));
    assert!(matches!(s.set_values(&[1i32, 2]), Err(Error::TypeMismatch { .. })));
    s.set_values(&[7i32]).unwrap();

    let ts = archive.add_time_sampling(TimeSampling::uniform(0.5, 0.0)).unwrap();
    assert!(matches!(s.set_time_sampling_index(ts), Err(Error::TimeSamplingLocked(_))));
    s.set_time_sampling_index(0).unwrap();

    // Creation order is preserved by index and lookups by name agree.
    props.create_compound_property("c", MetaData::new()).unwrap();
    assert_eq!(props.num_properties(), 2);
    assert_eq!(props.property(1).unwrap().header().name, "c");
    assert_eq!(
        props.property_by_name("s").unwrap().property_type(),
        PropertyType::Scalar
    );
    archive.close().unwrap();
}

#[test]
fn test_unreadable_time_samplings_are_rejected_at_registration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ts");
    let archive = ArchiveWriter::create(&path).unwrap();
    for ts in [TimeSampling::acyclic(vec![]), TimeSampling::acyclic(vec![2.0, 1.0])] {
        assert!(matches!(
            archive.add_time_sampling(ts),
            Err(Error::MalformedTimeSampling(_))
        ));
    }
    assert_eq!(archive.num_time_samplings(), 1);

    let ts = archive.add_time_sampling(TimeSampling::acyclic(vec![1.0, 2.0])).unwrap();
    let s = archive
        .top()
        .properties()
        .create_scalar_property("s", MetaData::new(), DataType::INT32, ts)
        .unwrap();
    s.set_values(&[1i32]).unwrap();
    archive.close().unwrap();

    let archive = ArchiveReader::open(&path).unwrap();
    assert_eq!(archive.num_time_samplings(), 2);
    assert_eq!(archive.time_sampling(1).unwrap().stored_times(), &[1.0, 2.0]);
}
