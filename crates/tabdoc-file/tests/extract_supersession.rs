mod support;

use pretty_assertions::assert_eq;
use tabdoc_file::{ReplacementPlan, EXTRACT_MEMBER_DIR};

#[test]
fn pending_extract_supersedes_the_existing_extract_member() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let original = support::build_sales_tdsx(tmp.path());
    let fresh = tmp.path().join("fresh.hyper");
    std::fs::write(&fresh, b"fresh-extract-bytes").expect("write fresh extract");

    let mut file = tabdoc_file::open(&original).expect("open tdsx");
    let ds = &file.datasources()[0];
    assert_eq!(
        ds.existing_extract_name(),
        Some("Data/Datasources/sales.hyper")
    );

    file.datasources_mut()[0].set_pending_extract(&fresh);
    let outcome = file
        .save_new_file(tmp.path().join("swapped"), ReplacementPlan::new())
        .expect("save tdsx");

    let members = support::read_members(&outcome.path);

    // The superseded extract's original member is gone.
    assert!(
        !members.contains_key("Data/Datasources/sales.hyper"),
        "{members:?}"
    );
    // The new extract sits under the resource directory convention.
    assert_eq!(
        members
            .get(&format!("{EXTRACT_MEMBER_DIR}/fresh.hyper"))
            .map(Vec::as_slice),
        Some(b"fresh-extract-bytes".as_slice())
    );
    // Unrelated siblings still pass through.
    assert_eq!(
        members.get("Data/assets/logo.png").map(Vec::as_slice),
        Some(b"png-bytes".as_slice())
    );
}

#[test]
fn existing_extract_without_a_pending_one_is_not_skipped() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let original = support::build_sales_tdsx(tmp.path());

    let mut file = tabdoc_file::open(&original).expect("open tdsx");
    let outcome = file
        .save_new_file(tmp.path().join("copy"), ReplacementPlan::new())
        .expect("save tdsx");

    let members = support::read_members(&outcome.path);
    assert_eq!(
        members.get("Data/Datasources/sales.hyper").map(Vec::as_slice),
        Some(b"hyper-bytes".as_slice())
    );
}
