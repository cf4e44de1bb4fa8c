use std::fs::File;

use arrow::{
    array::AsArray,
    datatypes::{Float32Type, Int32Type, UInt64Type},
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tree2arrow::{
    ImportError, ImportState, Importer,
    arrow::{ParquetStore, project_record_batch},
    core::{ClassDef, ClassMember, MemoryTree, Value, write_tree},
};

fn sample_tree() -> MemoryTree {
    let point = ClassDef::new(
        "Point",
        vec![ClassMember::new("x", "float"), ClassMember::new("y", "float")],
    );
    let mut tree = MemoryTree::builder("events")
        .branch("run", "run/I")
        .unwrap()
        .branch("n", "n/I")
        .unwrap()
        .branch("vals", "vals[n]/F")
        .unwrap()
        .branch("label", "label/C")
        .unwrap()
        .class_branch("pos", &point)
        .build()
        .unwrap();
    let rows: [(i32, &[f32], &str); 3] = [
        (1, &[1.0, 2.0, 3.0], "first"),
        (2, &[], ""),
        (3, &[4.0], "third"),
    ];
    for (run, vals, label) in rows {
        tree.fill(vec![
            Value::I32(run),
            Value::I32(vals.len() as i32),
            Value::array(vals.iter().copied()),
            Value::string(label),
            Value::Record(vec![Value::F32(run as f32), Value::F32(-(run as f32))]),
        ])
        .unwrap();
    }
    tree
}

#[test]
fn imports_tree_file_into_parquet() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("events.tree");
    write_tree(&source, &sample_tree()).unwrap();

    let dest = dir.path().join("out");
    let mut importer = Importer::create(&source, "events", &dest).unwrap();
    importer.set_quiet(true);
    let summary = importer.import().unwrap();
    assert_eq!(summary.rows, 3);
    assert_eq!(importer.state(), ImportState::Finished);

    let path = ParquetStore::new(&dest).dataset_path("events");
    assert_eq!(std::fs::metadata(&path).unwrap().len(), summary.bytes_written);

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
        .unwrap()
        .build()
        .unwrap();
    let batches = reader.collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(batches.len(), 1);
    let batch = project_record_batch(&batches[0]).unwrap();

    let run = batch.column_by_name("run").unwrap().as_primitive::<Int32Type>();
    assert_eq!(&run.values()[..], &[1, 2, 3]);
    let label = batch.column_by_name("label").unwrap().as_string::<i32>();
    assert_eq!(label.value(0), "first");
    assert_eq!(label.value(1), "");
    let n = batch.column_by_name("n").unwrap().as_primitive::<UInt64Type>();
    assert_eq!(&n.values()[..], &[3, 0, 1]);
    let vals = batch.column_by_name("vals").unwrap().as_list::<i32>();
    let first = vals.value(0);
    assert_eq!(&first.as_primitive::<Float32Type>().values()[..], &[1.0, 2.0, 3.0]);
    let pos = batch.column_by_name("pos").unwrap().as_struct();
    let y = pos.column_by_name("y").unwrap().as_primitive::<Float32Type>();
    assert_eq!(&y.values()[..], &[-1.0, -2.0, -3.0]);
}

#[test]
fn existing_parquet_dataset_is_rejected_at_open_and_import() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("events.tree");
    write_tree(&source, &sample_tree()).unwrap();

    let dest = dir.path().join("out");
    std::fs::create_dir_all(&dest).unwrap();
    let path = ParquetStore::new(&dest).dataset_path("events");
    std::fs::write(&path, b"occupied").unwrap();

    let err = Importer::create(&source, "events", &dest).err().unwrap();
    assert!(matches!(err, ImportError::DatasetExists { ref name, .. } if name == "events"));
    assert_eq!(std::fs::read(&path).unwrap(), b"occupied");

    let mut importer = Importer::create(&source, "events", dir.path().join("other")).unwrap();
    importer.set_quiet(true);
    importer.set_dataset_name("events");
    std::fs::create_dir_all(dir.path().join("other")).unwrap();
    std::fs::write(dir.path().join("other/events.parquet"), b"late").unwrap();
    let err = importer.import().unwrap_err();
    assert!(matches!(err, ImportError::DatasetExists { .. }));
    assert_eq!(importer.state(), ImportState::Failed);
    assert_eq!(std::fs::read(dir.path().join("other/events.parquet")).unwrap(), b"late");
}

#[test]
fn missing_tree_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("events.tree");
    write_tree(&source, &sample_tree()).unwrap();

    let err = Importer::create(&source, "other", dir.path()).err().unwrap();
    assert!(matches!(err, ImportError::Source(_)));
}
