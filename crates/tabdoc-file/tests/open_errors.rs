mod support;

use tabdoc_file::{FileError, FileKind, TabFile};

#[test]
fn unsupported_extension_is_rejected_up_front() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("report.pdf");
    std::fs::write(&path, b"%PDF-").expect("write file");

    let err = tabdoc_file::open(&path).expect_err("must reject");
    assert!(matches!(err, FileError::UnsupportedFormat { .. }), "{err:?}");
}

#[test]
fn corrupt_package_is_rejected() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("broken.tdsx");
    std::fs::write(&path, b"this is not a zip archive").expect("write file");

    let err = tabdoc_file::open(&path).expect_err("must reject");
    assert!(matches!(err, FileError::CorruptArchive(_)), "{err:?}");
}

#[test]
fn package_without_a_root_document_fails() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("empty.tdsx");
    support::build_package(&path, &[("Data/assets/logo.png", b"png".as_slice())]);

    let err = tabdoc_file::open(&path).expect_err("must reject");
    match err {
        FileError::MissingRootMember { suffix, .. } => assert_eq!(suffix, ".tds"),
        other => panic!("expected MissingRootMember, got {other:?}"),
    }
}

#[test]
fn package_with_multiple_root_candidates_fails_loudly() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("twins.tdsx");
    support::build_package(
        &path,
        &[
            ("first.tds", b"<datasource/>".as_slice()),
            ("second.tds", b"<datasource/>".as_slice()),
        ],
    );

    let err = tabdoc_file::open(&path).expect_err("must reject");
    match err {
        FileError::AmbiguousRootMember { candidates, .. } => {
            assert_eq!(candidates, vec!["first.tds", "second.tds"]);
        }
        other => panic!("expected AmbiguousRootMember, got {other:?}"),
    }
}

#[test]
fn nested_documents_are_siblings_not_roots() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("nested.tdsx");
    // The only `.tds` entries sit below the archive root; none qualifies.
    support::build_package(
        &path,
        &[("backup/sales.tds", b"<datasource/>".as_slice())],
    );

    let err = tabdoc_file::open(&path).expect_err("must reject");
    assert!(matches!(err, FileError::MissingRootMember { .. }), "{err:?}");
}

#[test]
fn malformed_document_xml_is_a_distinct_error() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("mangled.tds");
    std::fs::write(&path, "<datasource name='x'>\n  <unclosed\n").expect("write file");

    let err = tabdoc_file::open(&path).expect_err("must reject");
    assert!(matches!(err, FileError::Document(_)), "{err:?}");
}

#[test]
fn workbook_family_cannot_be_created_from_scratch() {
    for kind in [FileKind::Twb, FileKind::Twbx, FileKind::Tfl, FileKind::Tflx] {
        let err = TabFile::create_new(kind, "10.0").expect_err("must reject");
        assert!(
            matches!(err, FileError::UnsupportedConstruction { .. }),
            "{kind}: {err:?}"
        );
    }
}

#[test]
fn missing_file_surfaces_an_io_error() {
    let err = tabdoc_file::open("/no/such/dir/sales.tds").expect_err("must fail");
    assert!(matches!(err, FileError::Io(_)), "{err:?}");
}
