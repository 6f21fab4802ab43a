use proptest::prelude::*;

use tabdoc_file::strip_metadata_records;

fn xml_line() -> impl Strategy<Value = String> {
    // Plausible document lines that never contain the block markers.
    prop_oneof![
        Just("  <column name='x' datatype='integer'/>".to_string()),
        Just("  <aliases enabled='yes'/>".to_string()),
        Just("  <connection class='hyper' dbname='Data/Datasources/d.hyper'/>".to_string()),
        "[a-z <>/='0-9]{0,40}".prop_filter("no markers", |s| !s.contains("metadata-records")),
    ]
}

fn document_with_block() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(xml_line(), 0..8),
        prop::collection::vec(xml_line(), 1..8),
        prop::collection::vec(xml_line(), 0..8),
    )
        .prop_map(|(before, inside, after)| {
            let mut lines = vec!["<datasource name='p'>".to_string()];
            lines.extend(before);
            lines.push("  <metadata-records count='n'>".to_string());
            lines.extend(inside);
            lines.push("  </metadata-records>".to_string());
            lines.extend(after);
            lines.push("</datasource>".to_string());
            let mut doc = lines.join("\n");
            doc.push('\n');
            doc
        })
}

proptest! {
    /// For any document with a bookkeeping block, the filtered text has no
    /// trace of the block and re-running the filter is a no-op.
    #[test]
    fn filter_removes_the_block_and_is_idempotent(doc in document_with_block()) {
        let once = strip_metadata_records(doc.as_bytes()).expect("first pass");
        prop_assert!(!once.contains("<metadata-records"));
        prop_assert!(!once.contains("</metadata-records"));

        let twice = strip_metadata_records(once.as_bytes()).expect("second pass");
        prop_assert_eq!(&once, &twice);
    }

    /// Lines outside the block pass through unchanged, in order.
    #[test]
    fn filter_preserves_everything_outside_the_block(doc in document_with_block()) {
        let filtered = strip_metadata_records(doc.as_bytes()).expect("filter");

        let mut kept = filtered.lines();
        let mut dropping = false;
        for line in doc.lines() {
            if !dropping && line.contains("<metadata-records") {
                dropping = true;
                continue;
            }
            if dropping {
                if line.contains("</metadata-records") {
                    dropping = false;
                }
                continue;
            }
            prop_assert_eq!(kept.next(), Some(line));
        }
        prop_assert_eq!(kept.next(), None);
    }
}
