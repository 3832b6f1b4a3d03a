mod common;

use anyhow::Result;

use imgpack_import::download::CachedDownloader;
use imgpack_import::transcode::{ImageTranscoder, TranscodeConfig};
use imgpack_import::{Format, ImportError, ImportPlan, Importer};
use imgpack_store::{RecordSource, StoreError, StoreReader, StoreWriter, WriterOptions};

use common::{png, temp_dir};

#[test]
fn unknown_selectors_are_rejected_not_defaulted() {
    for bad in ["7", "42", "imagenet", ""] {
        assert!(matches!(
            bad.parse::<Format>(),
            Err(ImportError::UnknownFormat(_))
        ));
    }
}

#[test]
fn plans_match_their_format() -> Result<()> {
    let root = temp_dir("dispatch-plans")?;
    let manifest = root.join("list.txt");
    std::fs::write(&manifest, "")?;
    let store = root.join("in.imgpack");
    StoreWriter::create(&store, WriterOptions::default())?.finish()?;
    common::write_files(&root.join("dirs").join("0"), 1, "a")?;
    common::write_files(&root.join("dirs").join("1"), 1, "b")?;

    let cases = [
        (Format::Dir, root.join("dirs"), "directories"),
        (Format::SubDir, root.join("dirs"), "directories"),
        (Format::List, manifest.clone(), "list"),
        (Format::AnnoJson, manifest.clone(), "list"),
        (Format::AnnoImage, manifest.clone(), "list"),
        (Format::Store, store, "reencode"),
        (Format::Tars, manifest, "archives"),
    ];
    for (format, input, kind) in cases {
        assert_eq!(ImportPlan::prepare(format, &input, 0)?.kind(), kind, "{format}");
    }
    Ok(())
}

#[test]
fn missing_inputs_fail_before_output_exists() -> Result<()> {
    let root = temp_dir("dispatch-missing")?;
    let missing = root.join("missing.txt");
    for format in [Format::List, Format::AnnoJson, Format::AnnoImage, Format::Tars] {
        assert!(matches!(
            ImportPlan::prepare(format, &missing, 0),
            Err(ImportError::Input { .. })
        ));
    }
    assert!(matches!(
        ImportPlan::prepare(Format::Store, &missing, 0),
        Err(ImportError::Store(StoreError::Io(_)))
    ));
    Ok(())
}

#[test]
fn list_import_end_to_end_into_a_store_file() -> Result<()> {
    let root = temp_dir("dispatch-e2e")?;
    let a = root.join("a.png");
    let b = root.join("b.png");
    std::fs::write(&a, png(6, 6, 1)?)?;
    std::fs::write(&b, png(7, 3, 2)?)?;
    let manifest = root.join("list.txt");
    std::fs::write(
        &manifest,
        format!("{}\t0\n{}\t1\nbroken line\n", a.display(), b.display()),
    )?;

    let transcoder = ImageTranscoder::new(TranscodeConfig::default())?;
    let plan = ImportPlan::prepare(Format::List, &manifest, 0)?;
    let output = root.join("out.imgpack");
    let mut writer = StoreWriter::create(&output, WriterOptions::default())?;
    let mut fetcher = CachedDownloader::new(root.join("cache"));
    let summary = Importer::new(&transcoder, &mut fetcher, &mut writer).run(plan)?;
    assert_eq!(writer.finish()?, 2);
    assert_eq!((summary.appended, summary.skipped), (2, 1));

    let mut reader = StoreReader::open(&output)?;
    assert_eq!(reader.len(), 2);
    let second = reader.read(1)?;
    assert_eq!(second.meta.label, 1.0);
    assert_eq!(second.fields[0], std::fs::read(&b)?);
    Ok(())
}
