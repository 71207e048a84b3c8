use crate::error::Result;
use crate::models::{StationConfig, StationTable};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads a station table from CSV with a `name,region_code,station_code`
/// header. Blank lines and `#` comments are ignored.
pub struct StationReader {
    has_headers: bool,
}

impl StationReader {
    pub fn new() -> Self {
        Self { has_headers: true }
    }

    pub fn with_headers(has_headers: bool) -> Self {
        Self { has_headers }
    }

    pub fn read_stations(&self, path: &Path) -> Result<StationTable> {
        let file = File::open(path)?;
        self.read_from(file)
    }

    pub fn read_from<R: Read>(&self, reader: R) -> Result<StationTable> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let stations = csv_reader
            .deserialize::<StationConfig>()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        StationTable::new(stations)
    }
}

impl Default for StationReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackfillError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_stations_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "name, region_code, station_code")?;
        writeln!(temp_file, "# Kanto")?;
        writeln!(temp_file, "Tokyo, 44, 47662")?;
        writeln!(temp_file, "Yokohama, 46, 47670")?;

        let table = StationReader::new().read_stations(temp_file.path())?;

        assert_eq!(table.len(), 2);
        let names: Vec<&str> = table.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Tokyo", "Yokohama"]);
        assert_eq!(table.get("Yokohama").map(|s| s.station_code), Some(47670));

        Ok(())
    }

    #[test]
    fn test_headerless_input() -> Result<()> {
        let input = "Osaka,62,47772\nFukuoka,82,47807\n";
        let table = StationReader::with_headers(false).read_from(input.as_bytes())?;

        assert_eq!(table.len(), 2);
        Ok(())
    }

    #[test]
    fn test_invalid_codes_rejected() {
        let input = "name,region_code,station_code\nTokyo,0,47662\n";
        let result = StationReader::new().read_from(input.as_bytes());

        assert!(matches!(result, Err(BackfillError::Validation(_))));
    }

    #[test]
    fn test_non_numeric_code_rejected() {
        let input = "name,region_code,station_code\nTokyo,kanto,47662\n";
        let result = StationReader::new().read_from(input.as_bytes());

        assert!(matches!(result, Err(BackfillError::Csv(_))));
    }

    #[test]
    fn test_duplicate_rejected() {
        let input = "name,region_code,station_code\nTokyo,44,47662\nTokyo,44,47662\n";
        let result = StationReader::new().read_from(input.as_bytes());

        assert!(matches!(result, Err(BackfillError::DuplicateStation { .. })));
    }
}
