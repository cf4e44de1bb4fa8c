use std::collections::HashMap;

use arrow::array::{
    Array, AsArray, FixedSizeListArray, Float32Array, Int32Array, ListArray, StringArray,
    StructArray, UInt64Array,
};
use arrow::datatypes::{Float32Type, Int16Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tree2arrow_arrow::{
    BufferId, CollectionId, DestinationStore, Entry, MemoryStore, Model, ParquetStore, RowWriter,
    ValueRef, ValueSource, WriteError, WriteOptions, project_record_batch,
};
use tree2arrow_core::{DataTypeDef, FieldDef};

#[derive(Default)]
struct Buffers {
    raw: HashMap<BufferId, Vec<u8>>,
    text: HashMap<BufferId, String>,
}

impl Buffers {
    fn set_raw(&mut self, id: BufferId, bytes: Vec<u8>) {
        self.raw.insert(id, bytes);
    }

    fn set_text(&mut self, id: BufferId, text: &str) {
        self.text.insert(id, text.to_string());
    }
}

impl ValueSource for Buffers {
    fn resolve(&self, id: BufferId) -> Option<ValueRef<'_>> {
        if let Some(text) = self.text.get(&id) {
            return Some(ValueRef::Text(text));
        }
        self.raw.get(&id).map(|b| ValueRef::Raw(b))
    }
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

struct Fixture {
    model: Model,
    entry: Entry,
    nested: Entry,
    collection: CollectionId,
}

/// run: i32, label: string, pos: {x, y}, arr: [i16; 3], _collection0: [{vals}],
/// plus projections `vals` and `n`.
fn fixture() -> Fixture {
    let mut sub = Model::create_bare();
    sub.add_field(FieldDef::new("vals", DataTypeDef::F32)).unwrap();
    sub.freeze();
    let mut nested = sub.create_bare_entry().unwrap();
    nested.capture_value("vals", BufferId::Field(10)).unwrap();

    let mut model = Model::create_bare();
    model.add_field(FieldDef::new("run", DataTypeDef::I32)).unwrap();
    model.add_field(FieldDef::new("label", DataTypeDef::String)).unwrap();
    model
        .add_field(FieldDef::new(
            "pos",
            DataTypeDef::Record(
                vec![
                    FieldDef::new("x", DataTypeDef::F32),
                    FieldDef::new("y", DataTypeDef::F32),
                ]
                .into(),
            ),
        ))
        .unwrap();
    model
        .add_field(FieldDef::new(
            "arr",
            DataTypeDef::Array(Box::new(DataTypeDef::I16), 3),
        ))
        .unwrap();
    let collection = model.make_collection("_collection0", sub).unwrap();
    model
        .add_projected_field(
            FieldDef::new("vals", DataTypeDef::Vec(Box::new(DataTypeDef::F32))),
            |name| {
                if name == "vals" {
                    "_collection0".to_string()
                } else {
                    "_collection0.vals".to_string()
                }
            },
        )
        .unwrap();
    model
        .add_projected_field(FieldDef::new("n", DataTypeDef::Cardinality), |_| {
            "_collection0".to_string()
        })
        .unwrap();
    model.freeze();

    let mut entry = model.create_bare_entry().unwrap();
    entry.capture_value("run", BufferId::Branch(0)).unwrap();
    entry.capture_value("label", BufferId::Field(1)).unwrap();
    entry.capture_value("pos", BufferId::Branch(2)).unwrap();
    entry.capture_value("arr", BufferId::Branch(3)).unwrap();
    entry
        .capture_value("_collection0", BufferId::CollectionOffset(collection))
        .unwrap();

    Fixture {
        model,
        entry,
        nested,
        collection,
    }
}

fn write_row(
    writer: &mut RowWriter,
    fx: &Fixture,
    buffers: &mut Buffers,
    run: i32,
    label: &str,
    vals: &[f32],
) -> Result<(), WriteError> {
    buffers.set_raw(BufferId::Branch(0), run.to_ne_bytes().to_vec());
    buffers.set_text(BufferId::Field(1), label);
    buffers.set_raw(BufferId::Branch(2), f32_bytes(&[run as f32, -(run as f32)]));
    let arr: Vec<u8> = [run as i16, 2 * run as i16, 3 * run as i16]
        .iter()
        .flat_map(|v| v.to_ne_bytes())
        .collect();
    buffers.set_raw(BufferId::Branch(3), arr);
    for v in vals {
        buffers.set_raw(BufferId::Field(10), v.to_ne_bytes().to_vec());
        writer.fill_collection(fx.collection, &fx.nested, buffers)?;
    }
    writer.fill(&fx.entry, buffers)
}

#[test]
fn writes_rows_and_collections_to_memory_store() {
    let fx = fixture();
    let mut store = MemoryStore::new();
    let options = WriteOptions::default().with_cluster_size(2);
    let mut writer = store.create_writer("events", &fx.model, &options).unwrap();
    let mut buffers = Buffers::default();

    write_row(&mut writer, &fx, &mut buffers, 1, "abc", &[1.0, 2.0, 3.0]).unwrap();
    write_row(&mut writer, &fx, &mut buffers, 2, "", &[]).unwrap();
    write_row(&mut writer, &fx, &mut buffers, 3, "xyz", &[4.0]).unwrap();
    assert_eq!(writer.collection_offset(fx.collection), Some(4));
    assert_eq!(writer.rows_written(), 3);

    let summary = writer.finish().unwrap();
    assert_eq!(summary.rows, 3);
    assert!(summary.bytes_written > 0);

    let batches = store.batches("events").unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].num_rows(), 2);
    assert_eq!(batches[1].num_rows(), 1);

    let first = project_record_batch(&batches[0]).unwrap();
    let run = first.column_by_name("run").unwrap();
    let run = run.as_any().downcast_ref::<Int32Array>().unwrap();
    assert_eq!(&run.values()[..], &[1, 2]);

    let label = first.column_by_name("label").unwrap();
    let label = label.as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(label.value(0), "abc");
    assert_eq!(label.value(1), "");

    let pos = first.column_by_name("pos").unwrap();
    let pos = pos.as_any().downcast_ref::<StructArray>().unwrap();
    let y = pos.column_by_name("y").unwrap().as_primitive::<Float32Type>();
    assert_eq!(&y.values()[..], &[-1.0, -2.0]);

    let arr = first.column_by_name("arr").unwrap();
    let arr = arr.as_any().downcast_ref::<FixedSizeListArray>().unwrap();
    assert_eq!(&arr.value(1).as_primitive::<Int16Type>().values()[..], &[2, 4, 6]);

    let n = first.column_by_name("n").unwrap();
    let n = n.as_any().downcast_ref::<UInt64Array>().unwrap();
    assert_eq!(&n.values()[..], &[3, 0]);

    let vals = first.column_by_name("vals").unwrap();
    let vals = vals.as_any().downcast_ref::<ListArray>().unwrap();
    let row0 = vals.value(0);
    let row0 = row0.as_any().downcast_ref::<Float32Array>().unwrap();
    assert_eq!(&row0.values()[..], &[1.0, 2.0, 3.0]);
    assert!(vals.value(1).is_empty());

    let second = project_record_batch(&batches[1]).unwrap();
    let n = second.column_by_name("n").unwrap();
    assert_eq!(&n.as_primitive::<arrow::datatypes::UInt64Type>().values()[..], &[1]);
}

#[test]
fn duplicate_dataset_is_rejected_without_touching_store() {
    let fx = fixture();
    let mut store = MemoryStore::new();
    store.insert("events", Vec::new());

    let err = store
        .create_writer("events", &fx.model, &WriteOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, WriteError::DatasetExists { .. }));
    assert_eq!(err.to_string(), "Key 'events' already exists in memory store");
    assert_eq!(store.batches("events").map(|b| b.len()), Some(0));
    assert_eq!(store.dataset_names(), ["events"]);
}

#[test]
fn invalid_rows_are_rejected_before_appending() {
    let fx = fixture();
    let mut store = MemoryStore::new();
    let mut writer = store
        .create_writer("events", &fx.model, &WriteOptions::default())
        .unwrap();
    let mut buffers = Buffers::default();

    // run buffer too small
    buffers.set_raw(BufferId::Branch(0), vec![0; 2]);
    buffers.set_text(BufferId::Field(1), "a");
    buffers.set_raw(BufferId::Branch(2), f32_bytes(&[0.0, 0.0]));
    buffers.set_raw(BufferId::Branch(3), vec![0; 6]);
    assert!(matches!(
        writer.fill(&fx.entry, &buffers),
        Err(WriteError::ValueSizeMismatch { expected: 4, actual: 2, .. })
    ));

    // label given as raw bytes
    buffers.set_raw(BufferId::Branch(0), 7_i32.to_ne_bytes().to_vec());
    buffers.text.clear();
    buffers.set_raw(BufferId::Field(1), vec![b'a']);
    assert!(matches!(
        writer.fill(&fx.entry, &buffers),
        Err(WriteError::TypeMismatch { .. })
    ));

    let unbound = fx.model.create_bare_entry().unwrap();
    assert!(matches!(
        writer.fill(&unbound, &buffers),
        Err(WriteError::MissingBinding { .. })
    ));

    buffers.set_text(BufferId::Field(1), "ok");
    writer.fill(&fx.entry, &buffers).unwrap();
    let summary = writer.finish().unwrap();
    assert_eq!(summary.rows, 1);
    let batches = store.batches("events").unwrap();
    assert_eq!(batches[0].num_rows(), 1);
}

#[test]
fn parquet_store_writes_readable_file() {
    let dir = tempfile::tempdir().unwrap();
    let fx = fixture();
    let mut store = ParquetStore::new(dir.path().join("out"));
    assert!(!store.contains("events").unwrap());

    let mut writer = store
        .create_writer("events", &fx.model, &WriteOptions::default())
        .unwrap();
    let mut buffers = Buffers::default();
    write_row(&mut writer, &fx, &mut buffers, 1, "abc", &[1.0, 2.0]).unwrap();
    write_row(&mut writer, &fx, &mut buffers, 2, "de", &[]).unwrap();
    let summary = writer.finish().unwrap();
    assert_eq!(summary.rows, 2);

    let path = store.dataset_path("events");
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        summary.bytes_written
    );
    assert!(store.contains("events").unwrap());
    assert!(matches!(
        store.create_writer("events", &fx.model, &WriteOptions::default()),
        Err(WriteError::DatasetExists { .. })
    ));

    let file = std::fs::File::open(&path).unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let batches: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
    assert_eq!(batches.len(), 1);

    let batch = project_record_batch(&batches[0]).unwrap();
    let n = batch.column_by_name("n").unwrap();
    assert_eq!(
        &n.as_primitive::<arrow::datatypes::UInt64Type>().values()[..],
        &[2, 0]
    );
    let label = batch.column_by_name("label").unwrap();
    assert_eq!(label.as_string::<i32>().value(1), "de");
}

#[test]
fn uncommitted_collection_elements_are_not_written() {
    let fx = fixture();
    let mut store = MemoryStore::new();
    let mut writer = store
        .create_writer("events", &fx.model, &WriteOptions::default())
        .unwrap();
    let mut buffers = Buffers::default();

    write_row(&mut writer, &fx, &mut buffers, 1, "abc", &[1.0, 2.0]).unwrap();
    for v in [7.0_f32, 8.0, 9.0] {
        buffers.set_raw(BufferId::Field(10), v.to_ne_bytes().to_vec());
        writer.fill_collection(fx.collection, &fx.nested, &buffers).unwrap();
    }
    assert_eq!(writer.collection_offset(fx.collection), Some(5));
    writer.discard_row();
    assert_eq!(writer.collection_offset(fx.collection), Some(2));

    for v in [5.0_f32, 6.0] {
        buffers.set_raw(BufferId::Field(10), v.to_ne_bytes().to_vec());
        writer.fill_collection(fx.collection, &fx.nested, &buffers).unwrap();
    }
    let summary = writer.finish().unwrap();
    assert_eq!(summary.rows, 1);

    let batches = store.batches("events").unwrap();
    let list = batches[0].column_by_name("_collection0").unwrap().as_list::<i32>();
    assert_eq!(list.offsets().last().copied(), Some(2));
    assert_eq!(list.values().len(), 2);
    let vals = list.values().as_struct().column(0).clone();
    assert_eq!(&vals.as_primitive::<Float32Type>().values()[..], &[1.0, 2.0]);
}

#[test]
fn rejected_row_keeps_staged_elements_until_discarded() {
    let fx = fixture();
    let mut store = MemoryStore::new();
    let mut writer = store
        .create_writer("events", &fx.model, &WriteOptions::default())
        .unwrap();
    let mut buffers = Buffers::default();

    buffers.set_raw(BufferId::Field(10), 4.0_f32.to_ne_bytes().to_vec());
    writer.fill_collection(fx.collection, &fx.nested, &buffers).unwrap();
    buffers.set_raw(BufferId::Branch(0), vec![0; 1]);
    buffers.set_text(BufferId::Field(1), "x");
    buffers.set_raw(BufferId::Branch(2), f32_bytes(&[0.0, 0.0]));
    buffers.set_raw(BufferId::Branch(3), vec![0; 6]);
    assert!(writer.fill(&fx.entry, &buffers).is_err());
    assert_eq!(writer.collection_offset(fx.collection), Some(1));

    writer.discard_row();
    write_row(&mut writer, &fx, &mut buffers, 2, "ok", &[]).unwrap();
    writer.finish().unwrap();

    let batches = store.batches("events").unwrap();
    let batch = project_record_batch(&batches[0]).unwrap();
    let n = batch.column_by_name("n").unwrap();
    assert_eq!(
        &n.as_primitive::<arrow::datatypes::UInt64Type>().values()[..],
        &[0]
    );
    let list = batch.column_by_name("_collection0").unwrap().as_list::<i32>();
    assert_eq!(list.values().len(), 0);
}
