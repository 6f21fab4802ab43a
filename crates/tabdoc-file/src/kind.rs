use tabdoc_model::DocumentKind;

/// File format tag for the Tableau document family.
///
/// A file's *original* kind is fixed at open time; the kind a save produces
/// may differ through promotion (bare to packaged, never the reverse).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Bare datasource XML (`.tds`).
    Tds,
    /// Packaged datasource (`.tdsx`).
    Tdsx,
    /// Bare workbook XML (`.twb`).
    Twb,
    /// Packaged workbook (`.twbx`).
    Twbx,
    /// Flow file; recognized but opaque.
    Tfl,
    /// Packaged flow file; recognized but opaque.
    Tflx,
}

impl FileKind {
    /// Classify a filename by case-insensitive substring match.
    ///
    /// Packaged (`x`-suffixed) variants are checked first because they are
    /// textual supersets of the bare names (`.tdsx` contains `.tds`).
    pub fn from_filename(filename: &str) -> Option<FileKind> {
        const ORDER: [(&str, FileKind); 6] = [
            (".tdsx", FileKind::Tdsx),
            (".twbx", FileKind::Twbx),
            (".tflx", FileKind::Tflx),
            (".twb", FileKind::Twb),
            (".tds", FileKind::Tds),
            (".tfl", FileKind::Tfl),
        ];

        let lower = filename.to_ascii_lowercase();
        ORDER
            .iter()
            .find(|(pattern, _)| lower.contains(pattern))
            .map(|(_, kind)| *kind)
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Tds => "tds",
            FileKind::Tdsx => "tdsx",
            FileKind::Twb => "twb",
            FileKind::Twbx => "twbx",
            FileKind::Tfl => "tfl",
            FileKind::Tflx => "tflx",
        }
    }

    pub fn is_packaged(self) -> bool {
        matches!(self, FileKind::Tdsx | FileKind::Twbx | FileKind::Tflx)
    }

    /// The packaged kind this kind promotes to; identity when already
    /// packaged.
    pub fn promoted(self) -> FileKind {
        match self {
            FileKind::Tds => FileKind::Tdsx,
            FileKind::Twb => FileKind::Twbx,
            FileKind::Tfl => FileKind::Tflx,
            packaged => packaged,
        }
    }

    /// Suffix of the root document member a package of this kind is
    /// expected to hold at its top level. `None` for bare kinds and for the
    /// opaque packaged kind, which has no document member to locate.
    pub fn root_member_suffix(self) -> Option<&'static str> {
        match self {
            FileKind::Tdsx => Some(".tds"),
            FileKind::Twbx => Some(".twb"),
            _ => None,
        }
    }

    /// What document model this kind carries; `None` for the opaque pair.
    pub fn document_kind(self) -> Option<DocumentKind> {
        match self {
            FileKind::Tds | FileKind::Tdsx => Some(DocumentKind::Datasource),
            FileKind::Twb | FileKind::Twbx => Some(DocumentKind::Workbook),
            FileKind::Tfl | FileKind::Tflx => None,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}
