use anyhow::Result;

use imgpack_core::types::Record;
use imgpack_store::{RecordSink, RecordSource, StoreError, StoreReader, StoreWriter, WriterOptions};

fn temp_dir(test_name: &str) -> Result<std::path::PathBuf> {
    let mut root = std::env::temp_dir();
    root.push(format!("imgpack-store-{test_name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(&root)?;
    Ok(root)
}

fn sample_records() -> Vec<Record> {
    vec![
        Record::single(0.0, vec![0xff, 0xd8, 0xff]),
        Record::pair(0.0, b"png-bytes".to_vec(), b"{\"shapes\":[]}".to_vec()),
        Record::single(3.0, Vec::new()).with_id(17).with_label2(2.0),
        Record::single(1.0, vec![7u8; 1500]),
    ]
}

fn write_store(path: &std::path::Path, compact: bool) -> Result<()> {
    let mut w = StoreWriter::create(path, WriterOptions { compact })?;
    for r in sample_records() {
        w.append(&r)?;
    }
    assert_eq!(w.finish()?, 4);
    Ok(())
}

#[test]
fn padded_store_reads_back_in_order() -> Result<()> {
    let root = temp_dir("padded")?;
    let path = root.join("out.imgpack");
    write_store(&path, false)?;

    assert_eq!(std::fs::metadata(&path)?.len() % 512, 0);

    let mut r = StoreReader::open(&path)?;
    assert!(!r.is_compact());
    assert_eq!(r.len(), 4);
    for (i, expected) in sample_records().iter().enumerate() {
        assert_eq!(&r.read(i)?, expected);
    }
    Ok(())
}

#[test]
fn compact_store_is_smaller_and_reads_back() -> Result<()> {
    let root = temp_dir("compact")?;
    let padded = root.join("padded.imgpack");
    let compact = root.join("compact.imgpack");
    write_store(&padded, false)?;
    write_store(&compact, true)?;

    assert!(std::fs::metadata(&compact)?.len() < std::fs::metadata(&padded)?.len());

    let mut r = StoreReader::open(&compact)?;
    assert!(r.is_compact());
    assert_eq!(r.len(), 4);
    // Random access, not just sequential.
    assert_eq!(r.read(3)?, sample_records()[3]);
    assert_eq!(r.read(1)?, sample_records()[1]);
    Ok(())
}

#[test]
fn writer_refuses_to_overwrite() -> Result<()> {
    let root = temp_dir("overwrite")?;
    let path = root.join("out.imgpack");
    std::fs::write(&path, b"precious")?;
    match StoreWriter::create(&path, WriterOptions::default()) {
        Err(StoreError::AlreadyExists(_)) => {}
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
    assert_eq!(std::fs::read(&path)?, b"precious");
    Ok(())
}

#[test]
fn empty_store_has_no_records() -> Result<()> {
    let root = temp_dir("empty")?;
    let path = root.join("out.imgpack");
    StoreWriter::create(&path, WriterOptions::default())?.finish()?;
    let mut r = StoreReader::open(&path)?;
    assert!(r.is_empty());
    assert!(matches!(r.read(0), Err(StoreError::OutOfRange { .. })));
    Ok(())
}

#[test]
fn truncated_store_is_reported_corrupt() -> Result<()> {
    let root = temp_dir("truncated")?;
    let path = root.join("out.imgpack");
    write_store(&path, true)?;
    let bytes = std::fs::read(&path)?;
    std::fs::write(&path, &bytes[..bytes.len() - 10])?;
    match StoreReader::open(&path) {
        Err(StoreError::Corrupt { .. }) => {}
        other => panic!("expected Corrupt, got {other:?}"),
    }
    Ok(())
}

#[test]
fn foreign_file_is_rejected() -> Result<()> {
    let root = temp_dir("foreign")?;
    let path = root.join("not-a-store.bin");
    std::fs::write(&path, vec![b'x'; 64])?;
    assert!(matches!(StoreReader::open(&path), Err(StoreError::BadMagic(_))));
    Ok(())
}

#[test]
fn vec_sink_validates_records() {
    let mut sink: Vec<Record> = Vec::new();
    let bad = Record {
        meta: Default::default(),
        fields: Vec::new(),
    };
    assert!(matches!(
        RecordSink::append(&mut sink, &bad),
        Err(StoreError::Record(_))
    ));
    assert!(sink.is_empty());
}
