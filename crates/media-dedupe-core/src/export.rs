use crate::error::Error;
use crate::model::OutputRow;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

#[derive(Serialize)]
struct CsvRow<'a> {
    record_id: &'a str,
    group_id: String,
    is_representative: bool,
    method: &'a str,
}

/// Write output rows as CSV with a header line. Returns the number of rows written.
pub fn write_csv<'a, P, I>(path: P, rows: I) -> Result<usize, Error>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a OutputRow>,
{
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    let mut count = 0;
    for row in rows {
        writer.serialize(CsvRow {
            record_id: &row.record_id,
            group_id: row.group_id.to_string(),
            is_representative: row.is_representative,
            method: &row.method,
        })?;
        count += 1;
    }
    writer.flush()?;
    debug!("Wrote {} rows to {}", count, path.as_ref().display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupId;

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let rows = vec![
            OutputRow {
                record_id: "/photos/a.jpg".to_string(),
                group_id: GroupId::new(0, 0),
                is_representative: true,
                method: "phash:3+exact".to_string(),
            },
            OutputRow {
                record_id: "/photos/b.jpg".to_string(),
                group_id: GroupId::new(0, 0),
                is_representative: false,
                method: "phash:3+exact".to_string(),
            },
        ];
        assert_eq!(write_csv(&path, &rows).unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "record_id,group_id,is_representative,method");
        assert_eq!(lines[1], "/photos/a.jpg,0-0,true,phash:3+exact");
        assert_eq!(lines.len(), 3);
    }
}
