#![allow(dead_code)]

//! Shared fixture builders for the integration tests.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const TDS_XML: &str = "<?xml version='1.0' encoding='utf-8' ?>\n\
<datasource name='federated.sales' caption='Sales' version='10.0'>\n\
  <connection class='hyper' dbname='Data/Datasources/sales.hyper'/>\n\
  <metadata-records count='2'>\n\
    <metadata-record class='column'/>\n\
    <metadata-record class='column'/>\n\
  </metadata-records>\n\
  <aliases enabled='yes'/>\n\
</datasource>\n";

pub const TDS_XML_NO_EXTRACT: &str = "<?xml version='1.0' encoding='utf-8' ?>\n\
<datasource name='federated.sales' caption='Sales' version='10.0'>\n\
  <connection class='postgres' dbname='analytics' server='db.internal'/>\n\
</datasource>\n";

pub const TWB_XML: &str = "<?xml version='1.0' encoding='utf-8' ?>\n\
<workbook version='18.1' xmlns:user='http://www.tableausoftware.com/xml/user'>\n\
  <preferences/>\n\
  <datasources>\n\
    <datasource name='federated.sales' caption='Sales' version='10.0'>\n\
      <connection class='hyper' dbname='Data/Datasources/sales.hyper'/>\n\
      <metadata-records count='1'>\n\
        <metadata-record class='column'/>\n\
      </metadata-records>\n\
    </datasource>\n\
  </datasources>\n\
  <worksheets>\n\
    <worksheet name='Sheet 1'/>\n\
  </worksheets>\n\
</workbook>\n";

/// Build a ZIP archive at `path` with the given `(member, bytes)` entries,
/// in order.
pub fn build_package(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).expect("create package"));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in entries {
        writer.start_file(*name, options).expect("start member");
        writer.write_all(bytes).expect("write member");
    }
    writer.finish().expect("finish package");
}

/// A packaged datasource with one binary extract and one nested asset.
pub fn build_sales_tdsx(dir: &Path) -> PathBuf {
    let path = dir.join("sales.tdsx");
    build_package(
        &path,
        &[
            ("sales.tds", TDS_XML.as_bytes()),
            ("Data/Datasources/sales.hyper", b"hyper-bytes"),
            ("Data/assets/logo.png", b"png-bytes"),
        ],
    );
    path
}

/// A packaged workbook mirroring [`build_sales_tdsx`].
pub fn build_sales_twbx(dir: &Path) -> PathBuf {
    let path = dir.join("sales.twbx");
    build_package(
        &path,
        &[
            ("sales.twb", TWB_XML.as_bytes()),
            ("Data/Datasources/sales.hyper", b"hyper-bytes"),
            ("Data/assets/logo.png", b"png-bytes"),
        ],
    );
    path
}

/// Read every member of a ZIP archive into a name -> bytes map.
pub fn read_members(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut archive = ZipArchive::new(File::open(path).expect("open archive")).expect("read zip");
    let mut members = BTreeMap::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).expect("open member");
        if entry.is_dir() {
            continue;
        }
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).expect("read member");
        members.insert(entry.name().to_string(), bytes);
    }
    members
}
