//! CSV table writer.

use std::borrow::Cow;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use lds_core::{AggregateTable, LdsError, MappingRow, TableMeta, TableSink};

/// Writes each emitted table to `<dir>/<name>.csv`.
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    fn create(&self, name: &str) -> lds_core::Result<(PathBuf, BufWriter<fs::File>)> {
        let path = self.dir.join(format!("{name}.csv"));
        let file = fs::File::create(&path).map_err(|e| emit_error(name, &path, e))?;
        Ok((path, BufWriter::new(file)))
    }
}

fn emit_error(table: &str, path: &Path, e: std::io::Error) -> LdsError {
    LdsError::Emit { table: table.to_string(), reason: format!("{}: {e}", path.display()) }
}

/// Quotes a field holding a delimiter, quote or line break.
fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

impl TableSink for CsvSink {
    fn emit_aggregate(&mut self, meta: &TableMeta, table: &AggregateTable) -> lds_core::Result<()> {
        let (path, mut w) = self.create(&meta.name)?;
        let write = |w: &mut BufWriter<fs::File>| -> std::io::Result<()> {
            write!(w, "{},land_unit", csv_field(&meta.owner_label))?;
            for c in &meta.columns {
                write!(w, ",{}", csv_field(c))?;
            }
            writeln!(w)?;
            for (owner, unit, values) in table.rows() {
                write!(w, "{owner},{unit}")?;
                for v in values {
                    write!(w, ",{v:.2}")?;
                }
                writeln!(w)?;
            }
            w.flush()
        };
        write(&mut w).map_err(|e| emit_error(&meta.name, &path, e))?;
        tracing::debug!(table = %meta.name, rows = table.row_count(), "wrote table");
        Ok(())
    }

    fn emit_mapping(&mut self, name: &str, rows: &[MappingRow]) -> lds_core::Result<()> {
        let (path, mut w) = self.create(name)?;
        let write = |w: &mut BufWriter<fs::File>| -> std::io::Result<()> {
            writeln!(w, "country,iso,land_unit,land_unit_name")?;
            for r in rows {
                writeln!(
                    w,
                    "{},{},{},{}",
                    r.country,
                    csv_field(&r.iso),
                    r.land_unit,
                    csv_field(&r.land_unit_name)
                )?;
            }
            w.flush()
        };
        write(&mut w).map_err(|e| emit_error(name, &path, e))
    }
}

#[cfg(test)]
mod tests {
    use lds_core::table::Membership;

    use super::*;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = Membership::with_owners([10]);
        m.insert(10, 3);
        let mut t = AggregateTable::zeros(&m, 2);
        t.add(10, 3, 1, 1.234);
        let meta = TableMeta {
            name: "production_t".into(),
            owner_label: "fao_code".into(),
            columns: vec!["wheat".into(), "maize".into()],
        };
        let mut sink = CsvSink::new(dir.path()).unwrap();
        sink.emit_aggregate(&meta, &t).unwrap();
        let text = fs::read_to_string(dir.path().join("production_t.csv")).unwrap();
        assert_eq!(text, "fao_code,land_unit,wheat,maize\n10,3,0.00,1.23\n");
    }

    #[test]
    fn mapping_is_written_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            MappingRow { country: 1, iso: "afg".into(), land_unit: 2, land_unit_name: "Indus".into() },
            MappingRow { country: 1, iso: "afg".into(), land_unit: 7, land_unit_name: "Amu Darya".into() },
        ];
        CsvSink::new(dir.path()).unwrap().emit_mapping("country_land_unit", &rows).unwrap();
        let text = fs::read_to_string(dir.path().join("country_land_unit.csv")).unwrap();
        assert_eq!(text.lines().nth(2), Some("1,afg,7,Amu Darya"));
    }

    #[test]
    fn names_with_delimiters_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            MappingRow { country: 1, iso: "afg".into(), land_unit: 2, land_unit_name: "Indus, upper".into() },
            MappingRow { country: 1, iso: "afg".into(), land_unit: 3, land_unit_name: "the \"Oxus\"".into() },
        ];
        CsvSink::new(dir.path()).unwrap().emit_mapping("country_land_unit", &rows).unwrap();
        let text = fs::read_to_string(dir.path().join("country_land_unit.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "1,afg,2,\"Indus, upper\"");
        assert_eq!(lines[2], "1,afg,3,\"the \"\"Oxus\"\"\"");
    }

    #[test]
    fn column_labels_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let m = Membership::with_owners([10]);
        let meta = TableMeta {
            name: "land_type_area_ha".into(),
            owner_label: "fao_code".into(),
            columns: vec!["forest, protected".into(), "ice".into()],
        };
        CsvSink::new(dir.path()).unwrap().emit_aggregate(&meta, &AggregateTable::zeros(&m, 2)).unwrap();
        let text = fs::read_to_string(dir.path().join("land_type_area_ha.csv")).unwrap();
        assert_eq!(text, "fao_code,land_unit,\"forest, protected\",ice\n");
    }
}
