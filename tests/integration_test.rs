use stemstore::append::{append, AppendItem, AppendOptions, AppendOutcome, Overwrite};
use stemstore::file::{Mode, StemFile, WriteOptions};
use stemstore::index::{AddressIndex, Key, Selection, Selector};
use stemstore::metadata::Metadata;
use stemstore::objects::{
    CountedDataCube, DataCube, DataObject, Field, MemMode, PointList, PointListArray, Slice,
};
use stemstore::read::{read, ReadOptions, ReadOutcome, ReadRequest};
use stemstore::topgroup::{create_container, DEFAULT_TOPGROUP};
use stemstore::tree::{AttrValue, DType, Dataset};
use stemstore::version::Version;
use stemstore::{ObjectType, StemError};
use tempfile::NamedTempFile;

// ── helpers ──────────────────────────────────────────────────────────────────

fn container(topgroups: &[&str]) -> NamedTempFile {
    let tmp = NamedTempFile::new().unwrap();
    create_container(tmp.path(), topgroups, WriteOptions::default()).unwrap();
    tmp
}

fn cube(name: &str, fill: f64) -> DataObject {
    let values = vec![fill; 2 * 2 * 4 * 4];
    let data = Dataset::from_f64(DType::Uint16, vec![2, 2, 4, 4], &values).unwrap();
    DataCube::new(name, data).unwrap().into()
}

fn points(name: &str, qx: &[f64]) -> DataObject {
    let mut pl = PointList::new(name, &[Field::new("qx", DType::Float32), Field::new("qy", DType::Float32)]);
    for &x in qx {
        pl.push(&[x, -x]).unwrap();
    }
    pl.into()
}

fn microscope(key: &str, value: &str) -> Metadata {
    let mut md = Metadata::default();
    md.microscope.insert(key.into(), value.into());
    md
}

fn items(objs: Vec<DataObject>) -> Vec<AppendItem> {
    objs.into_iter().map(AppendItem::from).collect()
}

fn read_one(path: &std::path::Path, sel: impl Into<Selector>) -> DataObject {
    match read(path, &ReadRequest::Data(sel.into()), &ReadOptions::default()).unwrap() {
        ReadOutcome::Data(Selection::One(obj)) => obj,
        other => panic!("expected one object, got {other:?}"),
    }
}

fn index_names(path: &std::path::Path) -> Vec<String> {
    let f = StemFile::open(path, Mode::Read).unwrap();
    let tg = f.root().group(DEFAULT_TOPGROUP).unwrap();
    AddressIndex::build(tg).entries().iter().map(|a| a.name.clone()).collect()
}

// ── scenarios ────────────────────────────────────────────────────────────────

#[test]
fn test_append_unnamed_cube_then_read_back() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    let out = append(tmp.path(), items(vec![cube("", 3.0)]), &AppendOptions::default()).unwrap();
    assert_eq!(
        out,
        AppendOutcome::Saved { written: vec![(ObjectType::DataCube, "datacube_0".into())], metadata: false }
    );
    assert_eq!(index_names(tmp.path()), vec!["datacube_0"]);

    let by_index = read_one(tmp.path(), 0i64);
    let by_name = read_one(tmp.path(), "datacube_0");
    assert_eq!(by_index, by_name);
    match by_index {
        DataObject::DataCube(c) => {
            assert_eq!(c.shape(), &[2, 2, 4, 4]);
            assert_eq!(c.data.value(0), 3.0);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_metadata_and_named_pointlists() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    append(tmp.path(), items(vec![points("pl_z", &[1.0])]), &AppendOptions::default()).unwrap();

    let mut batch = vec![AppendItem::Metadata(microscope("beam_energy", "300kV"))];
    batch.extend(items(vec![points("pl_b", &[2.0]), points("pl_a", &[3.0, 4.0])]));
    let out = append(tmp.path(), batch, &AppendOptions::default()).unwrap();
    assert!(matches!(out, AppendOutcome::Saved { metadata: true, .. }));

    assert_eq!(index_names(tmp.path()), vec!["pl_a", "pl_b", "pl_z"]);
    match read(tmp.path(), &ReadRequest::Metadata, &ReadOptions::default()).unwrap() {
        ReadOutcome::Metadata(md) => assert_eq!(md.microscope["beam_energy"], AttrValue::from("300kV")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_two_unnamed_cubes_get_distinct_names() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    append(tmp.path(), items(vec![cube("", 0.0), cube("", 1.0)]), &AppendOptions::default()).unwrap();
    assert_eq!(index_names(tmp.path()), vec!["datacube_0", "datacube_1"]);

    append(tmp.path(), items(vec![cube("", 2.0)]), &AppendOptions::default()).unwrap();
    assert_eq!(index_names(tmp.path()), vec!["datacube_0", "datacube_1", "datacube_2"]);
}

#[test]
fn test_conflicting_batch_writes_nothing() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    append(tmp.path(), items(vec![points("a", &[1.0])]), &AppendOptions::default()).unwrap();
    let before = std::fs::read(tmp.path()).unwrap();
    let digest = StemFile::open(tmp.path(), Mode::Read).unwrap().root().digest();

    let mut batch = vec![AppendItem::Metadata(microscope("beam_energy", "80kV"))];
    batch.extend(items(vec![points("a", &[9.0]), points("b", &[2.0])]));
    let out = append(tmp.path(), batch, &AppendOptions::default()).unwrap();
    assert_eq!(out, AppendOutcome::Rejected { conflicts: vec![(ObjectType::PointList, "a".into())] });

    assert_eq!(std::fs::read(tmp.path()).unwrap(), before);
    assert_eq!(StemFile::open(tmp.path(), Mode::Read).unwrap().root().digest(), digest);
    assert_eq!(index_names(tmp.path()), vec!["a"]);
}

#[test]
fn test_overwrite_modes() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    append(tmp.path(), items(vec![points("p", &[1.0])]), &AppendOptions::default()).unwrap();

    append(tmp.path(), items(vec![points("p", &[5.0, 6.0])]), &AppendOptions::default()).unwrap();
    match read_one(tmp.path(), "p") {
        DataObject::PointList(pl) => assert_eq!(pl.len(), 1),
        other => panic!("unexpected {other:?}"),
    }

    let soft = AppendOptions { overwrite: Overwrite::Soft, ..Default::default() };
    append(tmp.path(), items(vec![points("p", &[5.0, 6.0])]), &soft).unwrap();
    match read_one(tmp.path(), "p") {
        DataObject::PointList(pl) => assert_eq!(pl.column("qx").unwrap().values, vec![5.0, 6.0]),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(index_names(tmp.path()), vec!["p"]);
}

#[test]
fn test_hard_overwrite_refused_with_several_topgroups() {
    let tmp = container(&["a", "b"]);
    let before = std::fs::read(tmp.path()).unwrap();
    let hard = AppendOptions { overwrite: Overwrite::Hard, topgroup: Some("a".into()) };
    assert!(matches!(
        append(tmp.path(), items(vec![points("p", &[1.0])]), &hard),
        Err(StemError::UnsupportedAcrossMultiTopgroup)
    ));
    assert_eq!(std::fs::read(tmp.path()).unwrap(), before);

    let single = container(&[DEFAULT_TOPGROUP]);
    let hard = AppendOptions { overwrite: Overwrite::Hard, topgroup: None };
    append(single.path(), items(vec![points("p", &[1.0])]), &hard).unwrap();
    let out = append(single.path(), items(vec![points("p", &[2.0])]), &hard).unwrap();
    assert_eq!(out, AppendOutcome::Saved { written: vec![(ObjectType::PointList, "p".into())], metadata: false });
    match read_one(single.path(), "p") {
        DataObject::PointList(pl) => assert_eq!(pl.column("qx").unwrap().values, vec![2.0]),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(index_names(single.path()), vec!["p"]);
}

#[test]
fn test_auto_name_collides_with_explicit_name() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    append(tmp.path(), items(vec![cube("datacube_1", 1.0)]), &AppendOptions::default()).unwrap();
    let before = std::fs::read(tmp.path()).unwrap();

    // One cube stored, so the next auto-name is datacube_1.
    let out = append(tmp.path(), items(vec![cube("", 7.0)]), &AppendOptions::default()).unwrap();
    assert_eq!(out, AppendOutcome::Rejected { conflicts: vec![(ObjectType::DataCube, "datacube_1".into())] });
    assert_eq!(std::fs::read(tmp.path()).unwrap(), before);

    let soft = AppendOptions { overwrite: Overwrite::Soft, ..Default::default() };
    let out = append(tmp.path(), items(vec![cube("", 7.0)]), &soft).unwrap();
    assert_eq!(
        out,
        AppendOutcome::Saved { written: vec![(ObjectType::DataCube, "datacube_1".into())], metadata: false }
    );
    assert_eq!(index_names(tmp.path()), vec!["datacube_1"]);
    match read_one(tmp.path(), "datacube_1") {
        DataObject::DataCube(c) => assert_eq!(c.data.value(0), 7.0),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_nested_object_names_are_rejected() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    append(tmp.path(), items(vec![points("pl", &[1.0])]), &AppendOptions::default()).unwrap();
    let before = std::fs::read(tmp.path()).unwrap();

    for opts in [AppendOptions::default(), AppendOptions { overwrite: Overwrite::Soft, ..Default::default() }] {
        for name in ["pl/x", "a/b"] {
            assert!(matches!(
                append(tmp.path(), items(vec![points(name, &[2.0])]), &opts),
                Err(StemError::InvalidOption(_))
            ));
            assert_eq!(std::fs::read(tmp.path()).unwrap(), before);
        }
    }

    match read_one(tmp.path(), "pl") {
        DataObject::PointList(pl) => assert_eq!(pl.column("qx").unwrap().values, vec![1.0]),
        other => panic!("unexpected {other:?}"),
    }
    let out = read(tmp.path(), &ReadRequest::Summary, &ReadOptions::default()).unwrap();
    assert!(matches!(out, ReadOutcome::Summary(s) if s.objects.len() == 1));
}

#[test]
fn test_disambiguation_gate() {
    let tmp = container(&["b", "a"]);
    let before = std::fs::read(tmp.path()).unwrap();
    let expected = vec!["a".to_string(), "b".to_string()];

    let out = append(tmp.path(), items(vec![points("p", &[1.0])]), &AppendOptions::default()).unwrap();
    assert_eq!(out, AppendOutcome::NeedsDisambiguation(expected.clone()));

    // A name that is not a topgroup is treated the same way on append...
    let wrong = AppendOptions { topgroup: Some("c".into()), ..Default::default() };
    let out = append(tmp.path(), items(vec![points("p", &[1.0])]), &wrong).unwrap();
    assert_eq!(out, AppendOutcome::NeedsDisambiguation(expected.clone()));
    assert_eq!(std::fs::read(tmp.path()).unwrap(), before);

    let out = read(tmp.path(), &ReadRequest::Summary, &ReadOptions::default()).unwrap();
    assert_eq!(out, ReadOutcome::NeedsDisambiguation(expected));

    // ...but is an error on read.
    let opts = ReadOptions { topgroup: Some("c".into()), ..Default::default() };
    assert!(matches!(
        read(tmp.path(), &ReadRequest::Summary, &opts),
        Err(StemError::TopgroupNotFound { .. })
    ));

    let named = AppendOptions { topgroup: Some("b".into()), ..Default::default() };
    assert!(matches!(
        append(tmp.path(), items(vec![points("p", &[1.0])]), &named).unwrap(),
        AppendOutcome::Saved { .. }
    ));
}

#[test]
fn test_summary_lists_every_kind_in_index_order() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    let mut pla = PointListArray::new("", [2, 2], vec![Field::new("qx", DType::Float32)]).unwrap();
    pla.get_mut(1, 0).unwrap().push(&[0.5]).unwrap();
    let counted = CountedDataCube {
        name:      String::new(),
        shape:     [2, 2, 8, 8],
        electrons: PointListArray::new("", [2, 2], vec![Field::new("ind", DType::Uint32)]).unwrap(),
    };
    let image = Slice::new("bf", Dataset::zeros(DType::Float32, vec![2, 2]).unwrap());
    let objs = vec![
        DataObject::from(pla),
        points("", &[1.0, 2.0, 3.0]),
        DataObject::RealSlice(image),
        DataObject::from(counted),
        cube("", 0.0),
    ];
    append(tmp.path(), items(objs), &AppendOptions::default()).unwrap();

    let summary = match read(tmp.path(), &ReadRequest::Summary, &ReadOptions::default()).unwrap() {
        ReadOutcome::Summary(s) => s,
        other => panic!("unexpected {other:?}"),
    };
    let rows: Vec<_> = summary
        .objects
        .iter()
        .map(|o| (o.index, o.ty, o.shape.clone(), o.name.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (0, ObjectType::DataCube, vec![2, 2, 4, 4], "datacube_0"),
            (1, ObjectType::CountedDataCube, vec![2, 2, 8, 8], "counted_data_cube_0"),
            (2, ObjectType::RealSlice, vec![2, 2], "bf"),
            (3, ObjectType::PointList, vec![3], "pointlist_0"),
            (4, ObjectType::PointListArray, vec![2, 2], "pointlistarray_0"),
        ]
    );
    assert!(summary.to_string().starts_with("Index"));
}

#[test]
fn test_list_selector_keeps_order() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    append(tmp.path(), items(vec![points("pl_a", &[1.0]), points("pl_b", &[2.0]), cube("", 0.0)]), &AppendOptions::default())
        .unwrap();

    let sel = Selector::List(vec![Key::Name("pl_b".into()), Key::Index(0), Key::Index(1)]);
    let objs = match read(tmp.path(), &ReadRequest::Data(sel), &ReadOptions::default()).unwrap() {
        ReadOutcome::Data(Selection::Many(objs)) => objs,
        other => panic!("unexpected {other:?}"),
    };
    let names: Vec<_> = objs.iter().map(DataObject::name).collect();
    assert_eq!(names, vec!["pl_b", "datacube_0", "pl_a"]);

    let bad = read(tmp.path(), &ReadRequest::Data(Selector::from(3i64)), &ReadOptions::default());
    assert!(matches!(bad, Err(StemError::IndexOutOfRange { index: 3, len: 3 })));
    let missing = read(tmp.path(), &ReadRequest::Data(Selector::from("nope")), &ReadOptions::default());
    assert!(matches!(missing, Err(StemError::NotFound(_))));
}

#[test]
fn test_binned_read() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    append(tmp.path(), items(vec![cube("dc", 1.0)]), &AppendOptions::default()).unwrap();

    let opts = ReadOptions { binfactor: 2, mem: MemMode::Memmap, dtype: Some(DType::Uint32), ..Default::default() };
    match read(tmp.path(), &ReadRequest::Data("dc".into()), &opts).unwrap() {
        ReadOutcome::Data(Selection::One(DataObject::DataCube(c))) => {
            assert_eq!(c.shape(), &[2, 2, 2, 2]);
            assert_eq!(c.data.dtype(), DType::Uint32);
            assert_eq!(c.data.value(0), 4.0);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_old_version_is_rejected() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    {
        let mut f = StemFile::open(tmp.path(), Mode::ReadWrite).unwrap();
        let tg = f.root_mut().unwrap().group_mut(DEFAULT_TOPGROUP).unwrap();
        Version::new(0, 11, 5).stamp(tg);
        f.close().unwrap();
    }
    assert!(matches!(
        read(tmp.path(), &ReadRequest::Summary, &ReadOptions::default()),
        Err(StemError::UnsupportedVersion { .. })
    ));
}

#[test]
fn test_metadata_attached_to_cube_is_written() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    let data = Dataset::zeros(DType::Uint8, vec![1, 1, 2, 2]).unwrap();
    let dc = DataCube::new("", data).unwrap().with_metadata(microscope("mag", "10Mx"));
    append(tmp.path(), vec![DataObject::from(dc).into()], &AppendOptions::default()).unwrap();

    match read(tmp.path(), &ReadRequest::Metadata, &ReadOptions::default()).unwrap() {
        ReadOutcome::Metadata(md) => assert_eq!(md.microscope["mag"], AttrValue::from("10Mx")),
        other => panic!("unexpected {other:?}"),
    }

    let two = vec![
        AppendItem::Metadata(Metadata::default()),
        DataObject::from(DataCube::new("x", Dataset::zeros(DType::Uint8, vec![1, 1, 1, 1]).unwrap()).unwrap().with_metadata(Metadata::default())).into(),
    ];
    assert!(matches!(
        append(tmp.path(), two, &AppendOptions::default()),
        Err(StemError::MultipleMetadata(2))
    ));
}

#[test]
fn test_coordinates_are_read_only() {
    let tmp = container(&[DEFAULT_TOPGROUP]);
    {
        let mut f = StemFile::open(tmp.path(), Mode::ReadWrite).unwrap();
        let coords = f
            .root_mut()
            .unwrap()
            .require_group(&format!("{DEFAULT_TOPGROUP}/data/coordinates/legacy"))
            .unwrap();
        coords.set_attr("R_pixel_size", AttrValue::Float(0.5));
        f.close().unwrap();
    }
    match read_one(tmp.path(), 0i64) {
        DataObject::Coordinates(c) => {
            assert_eq!(c.name, "legacy");
            assert_eq!(c.get("R_pixel_size"), Some(&AttrValue::Float(0.5)));
        }
        other => panic!("unexpected {other:?}"),
    }

    let out = append(tmp.path(), vec![DataObject::Coordinates(Default::default()).into()], &AppendOptions::default());
    assert!(matches!(out, Err(StemError::UnknownType(_))));
}

#[test]
fn test_foreign_file_is_rejected() {
    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), vec![0u8; 128]).unwrap();
    assert!(matches!(
        read(tmp.path(), &ReadRequest::Summary, &ReadOptions::default()),
        Err(StemError::NotAStemFile { .. })
    ));
}
