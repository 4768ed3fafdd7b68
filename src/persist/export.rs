// Result sinks: CSV artefact with BOM, and a plain console table.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::engine::types::CandidateRow;
use crate::persist::types::{PersistError, PersistResult, EXPORT_HEADER, UTF8_BOM};
use crate::persist::ResultSink;

pub struct CsvExport {
    path: PathBuf,
}

impl CsvExport {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for CsvExport {
    fn write(&self, rows: &[CandidateRow]) -> PersistResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
        }

        let mut file = fs::File::create(&self.path).map_err(|e| PersistError::io(&self.path, e))?;
        file.write_all(UTF8_BOM).map_err(|e| PersistError::io(&self.path, e))?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(EXPORT_HEADER).map_err(|e| PersistError::csv(&self.path, e))?;
        for row in rows {
            writer.write_record(export_fields(row)).map_err(|e| PersistError::csv(&self.path, e))?;
        }
        writer.flush().map_err(|e| PersistError::io(&self.path, e))
    }
}

fn export_fields(row: &CandidateRow) -> [String; 6] {
    let q = &row.quote;
    [
        q.name.clone(),
        q.code.clone(),
        q.price.to_string(),
        q.pb_ratio.to_string(),
        optional(q.pe_ratio),
        optional(row.market_cap_yi),
    ]
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Prints rows to stdout as an aligned table.
pub struct ConsoleTable {
    pub limit: Option<usize>,
}

impl ConsoleTable {
    pub fn render(&self, rows: &[CandidateRow]) -> String {
        let shown = self.limit.unwrap_or(rows.len()).min(rows.len());
        let mut out = format!(
            "{:<10} {:<8} {:>9} {:>7} {:>8} {:>10}\n",
            EXPORT_HEADER[0], EXPORT_HEADER[1], EXPORT_HEADER[2], EXPORT_HEADER[3], EXPORT_HEADER[4], EXPORT_HEADER[5]
        );
        for row in &rows[..shown] {
            let q = &row.quote;
            out.push_str(&format!(
                "{:<10} {:<8} {:>9.2} {:>7.3} {:>8} {:>10}\n",
                q.name,
                q.code,
                q.price,
                q.pb_ratio,
                q.pe_ratio.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into()),
                row.market_cap_yi.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into()),
            ));
        }
        if shown < rows.len() {
            out.push_str(&format!("... {} more\n", rows.len() - shown));
        }
        out
    }
}

impl ResultSink for ConsoleTable {
    fn write(&self, rows: &[CandidateRow]) -> PersistResult<()> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(self.render(rows).as_bytes())
            .map_err(|e| PersistError::io("<stdout>", e))
    }
}
