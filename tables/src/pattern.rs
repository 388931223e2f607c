use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::TableType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    Csv,
    Compiled,
}

/// Metadata extracted from a table filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub kind: TableType,
    pub format: TableFormat,
    pub version: u8,
    /// Originating center (local tables only)
    pub center: Option<u16>,
    /// Subcenter (local tables only)
    pub subcenter: Option<u16>,
    pub filename: String,
}

impl TableMetadata {
    pub fn is_local(&self) -> bool {
        self.center.is_some()
    }

    /// Name of the compiled file this table converts to, without extension.
    ///
    /// - master tables: `BUFR_TableB_{version}`
    /// - local tables: `BUFR_TableB_{center}_{subcenter}_{version}`
    pub fn compiled_name(&self) -> String {
        let kind = match self.kind {
            TableType::B => "TableB",
            TableType::D => "TableD",
        };

        match (self.center, self.subcenter) {
            (Some(center), subcenter) => format!(
                "BUFR_{}_{}_{}_{}",
                kind,
                center,
                subcenter.unwrap_or(0),
                self.version
            ),
            (None, _) => format!("BUFR_{}_{}", kind, self.version),
        }
    }
}

/// A pattern for matching table filenames
pub trait TableFilePattern: Send + Sync {
    fn matches(&self, filename: &str) -> Option<TableMetadata>;

    fn glob_pattern(&self) -> &str;

    fn description(&self) -> &str;
}

fn kind_of(s: &str) -> Option<TableType> {
    match s {
        "B" | "b" => Some(TableType::B),
        "D" | "d" => Some(TableType::D),
        _ => None,
    }
}

/// WMO master tables, e.g. `BUFRCREX_TableB_en_42.csv`, `BUFR_TableD_en_40.csv`
#[derive(Debug)]
pub struct MasterCsvPattern {
    regex: Regex,
}

impl Default for MasterCsvPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterCsvPattern {
    pub fn new() -> Self {
        let regex = Regex::new(r"^(?:BUFR(?:CREX)?)_Table([BD])_([a-z]{2})_(\d+)\.csv$")
            .expect("Invalid regex");
        Self { regex }
    }
}

impl TableFilePattern for MasterCsvPattern {
    fn matches(&self, filename: &str) -> Option<TableMetadata> {
        let caps = self.regex.captures(filename)?;
        Some(TableMetadata {
            kind: kind_of(&caps[1])?,
            format: TableFormat::Csv,
            version: caps[3].parse().ok()?,
            center: None,
            subcenter: None,
            filename: filename.to_string(),
        })
    }

    fn glob_pattern(&self) -> &str {
        "BUFR*_Table*.csv"
    }

    fn description(&self) -> &str {
        "WMO master tables (BUFRCREX_TableB_en_42.csv)"
    }
}

/// Local tables, e.g. `localtabb_85_0_20.csv` (center 85, subcenter 0, version 20)
#[derive(Debug)]
pub struct LocalCsvPattern {
    regex: Regex,
}

impl Default for LocalCsvPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCsvPattern {
    pub fn new() -> Self {
        let regex = Regex::new(r"^localtab([bd])_(\d+)_(\d+)_(\d+)\.csv$").expect("Invalid regex");
        Self { regex }
    }
}

impl TableFilePattern for LocalCsvPattern {
    fn matches(&self, filename: &str) -> Option<TableMetadata> {
        let caps = self.regex.captures(filename)?;
        Some(TableMetadata {
            kind: kind_of(&caps[1])?,
            format: TableFormat::Csv,
            version: caps[4].parse().ok()?,
            center: Some(caps[2].parse().ok()?),
            subcenter: Some(caps[3].parse().ok()?),
            filename: filename.to_string(),
        })
    }

    fn glob_pattern(&self) -> &str {
        "localtab*.csv"
    }

    fn description(&self) -> &str {
        "Local tables (localtabb_<center>_<subcenter>_<version>.csv)"
    }
}

/// Compiled tables written by [`crate::CompiledTable::build`]
#[derive(Debug)]
pub struct CompiledPattern {
    regex: Regex,
}

impl Default for CompiledPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl CompiledPattern {
    pub fn new() -> Self {
        let regex = Regex::new(r"^BUFR_Table([BD])_(?:(\d+)_(\d+)_)?(\d+)\.bufrtbl$")
            .expect("Invalid regex");
        Self { regex }
    }
}

impl TableFilePattern for CompiledPattern {
    fn matches(&self, filename: &str) -> Option<TableMetadata> {
        let caps = self.regex.captures(filename)?;
        let center = match caps.get(2) {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };
        let subcenter = match caps.get(3) {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };

        Some(TableMetadata {
            kind: kind_of(&caps[1])?,
            format: TableFormat::Compiled,
            version: caps[4].parse().ok()?,
            center,
            subcenter,
            filename: filename.to_string(),
        })
    }

    fn glob_pattern(&self) -> &str {
        "BUFR_Table*.bufrtbl"
    }

    fn description(&self) -> &str {
        "Compiled tables (BUFR_TableB_<version>.bufrtbl)"
    }
}

/// Scanner that tries multiple patterns
pub struct TableScanner {
    patterns: Vec<Box<dyn TableFilePattern>>,
}

impl Default for TableScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TableScanner {
    pub fn new() -> Self {
        Self {
            patterns: vec![
                Box::new(CompiledPattern::new()),
                Box::new(MasterCsvPattern::new()),
                Box::new(LocalCsvPattern::new()),
            ],
        }
    }

    pub fn add_pattern(&mut self, pattern: Box<dyn TableFilePattern>) {
        self.patterns.push(pattern);
    }

    pub fn match_filename(&self, filename: &str) -> Option<TableMetadata> {
        self.patterns.iter().find_map(|p| p.matches(filename))
    }

    /// Scan `dir` and its subdirectories for table files.
    pub fn scan_directory<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<(PathBuf, TableMetadata)>> {
        let dir = dir.as_ref();
        let mut results = Vec::new();

        for pattern in &self.patterns {
            let glob_pattern = dir.join("**").join(pattern.glob_pattern());
            let glob_str = glob_pattern
                .to_str()
                .with_context(|| format!("Non UTF-8 table path: {}", dir.display()))?;

            for entry in glob::glob(glob_str).context("Failed to read glob pattern")? {
                match entry {
                    Ok(path) => {
                        let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
                            continue;
                        };
                        if let Some(metadata) = pattern.matches(filename) {
                            results.push((path, metadata));
                        }
                    }
                    Err(e) => {
                        eprintln!("Warning: Error reading file entry: {}", e);
                    }
                }
            }
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        results.dedup_by(|a, b| a.0 == b.0);

        Ok(results)
    }

    pub fn patterns(&self) -> &[Box<dyn TableFilePattern>] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_pattern() {
        let pattern = MasterCsvPattern::new();

        let meta = pattern.matches("BUFRCREX_TableB_en_35.csv").unwrap();
        assert_eq!(meta.kind, TableType::B);
        assert_eq!(meta.version, 35);
        assert!(!meta.is_local());

        let meta = pattern.matches("BUFR_TableD_en_40.csv").unwrap();
        assert_eq!(meta.kind, TableType::D);
        assert_eq!(meta.version, 40);

        assert!(pattern.matches("BUFRCREX_TableB_35.csv").is_none());
        assert!(pattern.matches("TableB_en_35.csv").is_none());
    }

    #[test]
    fn test_local_pattern() {
        let pattern = LocalCsvPattern::new();

        let meta = pattern.matches("localtabb_85_1_20.csv").unwrap();
        assert_eq!(meta.kind, TableType::B);
        assert_eq!(meta.center, Some(85));
        assert_eq!(meta.subcenter, Some(1));
        assert_eq!(meta.version, 20);
        assert!(meta.is_local());

        assert!(pattern.matches("localtabb_85_20.csv").is_none());
    }

    #[test]
    fn test_compiled_pattern() {
        let pattern = CompiledPattern::new();

        let meta = pattern.matches("BUFR_TableB_14.bufrtbl").unwrap();
        assert_eq!(meta.format, TableFormat::Compiled);
        assert_eq!(meta.version, 14);
        assert!(!meta.is_local());

        let meta = pattern.matches("BUFR_TableD_98_0_7.bufrtbl").unwrap();
        assert_eq!(meta.kind, TableType::D);
        assert_eq!(meta.center, Some(98));
        assert_eq!(meta.subcenter, Some(0));
        assert_eq!(meta.version, 7);
    }

    #[test]
    fn test_compiled_name_round_trips_through_scanner() {
        let scanner = TableScanner::new();
        for name in ["BUFRCREX_TableB_en_35.csv", "localtabd_85_1_20.csv"] {
            let meta = scanner.match_filename(name).unwrap();
            let compiled = format!("{}.bufrtbl", meta.compiled_name());
            let back = scanner.match_filename(&compiled).unwrap();
            assert_eq!(back.kind, meta.kind);
            assert_eq!(back.version, meta.version);
            assert_eq!(back.center, meta.center);
            assert_eq!(back.subcenter, meta.subcenter);
        }
    }
}
