//! Metadata-filtered XML loading.
//!
//! The bookkeeping block stripped here can dwarf the rest of the document
//! and is rebuilt by the desktop product from the surviving content, so it
//! is discarded by literal marker scan before the real parser ever sees the
//! text. This is deliberately a line-oriented pre-filter, not an XML parser:
//! its only job is block deletion by marker text, in a single pass with no
//! backtracking.

use std::io::{self, BufRead};

use tabdoc_model::{
    DATASOURCES_CLOSE_MARKER, DATASOURCES_OPEN_MARKER, METADATA_CLOSE_MARKER, METADATA_OPEN_MARKER,
    SYNTHETIC_DATASOURCES_OPEN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Unseen,
    Inside,
    Closed,
}

/// Copy `reader` to a string, dropping every line from the first line
/// containing the bookkeeping open marker through the next line containing
/// the close marker, inclusive. Only the first block matters; once closed it
/// cannot reopen. All other lines pass through unchanged, in order.
pub fn strip_metadata_records<R: BufRead>(reader: R) -> io::Result<String> {
    let mut out = String::new();
    let mut metadata = BlockState::Unseen;

    for line in reader.lines() {
        let line = line?;

        if metadata == BlockState::Unseen && line.contains(METADATA_OPEN_MARKER) {
            metadata = BlockState::Inside;
        }

        if metadata != BlockState::Inside {
            out.push_str(&line);
            out.push('\n');
        } else if line.contains(METADATA_CLOSE_MARKER) {
            metadata = BlockState::Closed;
        }
    }

    Ok(out)
}

/// Pull a workbook's datasources section out of `reader` as a
/// standalone-parseable document, with the bookkeeping block stripped.
///
/// Output begins at the section-opening marker line, which is replaced by a
/// synthetic opening tag carrying the namespace declaration the section
/// relies on from the workbook root; output ends with (and includes) the
/// closing-marker line, at which point the scan stops. Returns `None` when
/// the input has no datasources section.
pub fn workbook_datasources_section<R: BufRead>(reader: R) -> io::Result<Option<String>> {
    let mut out = String::new();
    let mut metadata = BlockState::Unseen;
    let mut in_section = false;
    let mut opened = false;

    for line in reader.lines() {
        let line = line?;

        if metadata == BlockState::Unseen && line.contains(METADATA_OPEN_MARKER) {
            metadata = BlockState::Inside;
        }

        if in_section && metadata != BlockState::Inside {
            out.push_str(&line);
            out.push('\n');
        }

        if !opened && metadata != BlockState::Inside && line.contains(DATASOURCES_OPEN_MARKER) {
            opened = true;
            in_section = true;
            out.push_str(SYNTHETIC_DATASOURCES_OPEN);
            out.push('\n');
        }

        if metadata == BlockState::Inside && line.contains(METADATA_CLOSE_MARKER) {
            metadata = BlockState::Closed;
        }

        if in_section && line.contains(DATASOURCES_CLOSE_MARKER) {
            break;
        }
    }

    Ok(if opened { Some(out) } else { None })
}
