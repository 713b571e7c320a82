//! CSV-backed sources.
//!
//! Indicators come from a wide file: a `date` column plus one column per
//! indicator. Columns may have different frequencies (monthly payrolls next
//! to weekly claims); a blank cell means "no observation on that date".
//! Prices come from `date,<risky>,<defensive>` and are forward-filled onto the
//! union of both assets' dates.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::align::forward_fill_union;
use super::provider::{DataError, DataSource, DateRange, IndicatorSource, PriceSource};
use crate::domain::{IndicatorSeries, PriceSeries};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parsed wide table: dates plus one optional value column per header.
struct WideTable {
    headers: Vec<String>,
    rows: Vec<(NaiveDate, Vec<Option<f64>>)>,
}

impl WideTable {
    fn read(path: &Path) -> Result<Self, DataError> {
        let display = path.display().to_string();
        let mut reader = ::csv::ReaderBuilder::new()
            .trim(::csv::Trim::All)
            .from_path(path)
            .map_err(|source| DataError::Csv {
                path: display.clone(),
                source,
            })?;

        let header_record = reader.headers().map_err(|source| DataError::Csv {
            path: display.clone(),
            source,
        })?;
        let headers: Vec<String> = header_record.iter().map(str::to_string).collect();
        let date_col = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case("date"))
            .ok_or_else(|| DataError::MissingColumn {
                path: display.clone(),
                column: "date".into(),
            })?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| DataError::Csv {
                path: display.clone(),
                source,
            })?;
            let line = record.position().map_or(0, |p| p.line());
            let parse_err = |message: String| DataError::Parse {
                path: display.clone(),
                line,
                message,
            };

            let raw_date = record.get(date_col).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
                .map_err(|e| parse_err(format!("bad date '{raw_date}': {e}")))?;

            let mut values = Vec::with_capacity(headers.len());
            for (col, header) in headers.iter().enumerate() {
                let cell = record.get(col).unwrap_or_default();
                if col == date_col || cell.is_empty() {
                    values.push(None);
                    continue;
                }
                let value: f64 = cell
                    .parse()
                    .map_err(|e| parse_err(format!("bad value '{cell}' in {header}: {e}")))?;
                values.push(Some(value));
            }
            rows.push((date, values));
        }
        rows.sort_by_key(|(date, _)| *date);

        Ok(Self { headers, rows })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn series(&self, col: usize, range: DateRange) -> Vec<(NaiveDate, f64)> {
        self.rows
            .iter()
            .filter(|(date, _)| range.contains(*date))
            .filter_map(|(date, values)| values[col].map(|v| (*date, v)))
            .collect()
    }
}

// ─── Indicators ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CsvIndicatorSource {
    path: PathBuf,
}

impl CsvIndicatorSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IndicatorSource for CsvIndicatorSource {
    fn source(&self) -> DataSource {
        DataSource::CsvImport
    }

    fn fetch_indicators(
        &self,
        names: &[String],
        range: DateRange,
    ) -> Result<Vec<IndicatorSeries>, DataError> {
        let table = WideTable::read(&self.path)?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let col = table.column(name).ok_or_else(|| DataError::MissingColumn {
                path: self.path.display().to_string(),
                column: name.clone(),
            })?;
            let pairs = table.series(col, range);
            if pairs.is_empty() {
                return Err(DataError::Empty { name: name.clone() });
            }
            out.push(IndicatorSeries::from_pairs(name.clone(), pairs)?);
        }
        tracing::debug!(path = %self.path.display(), series = out.len(), "loaded indicators");
        Ok(out)
    }
}

// ─── Prices ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PriceSource for CsvPriceSource {
    fn source(&self) -> DataSource {
        DataSource::CsvImport
    }

    fn fetch_prices(
        &self,
        risky: &str,
        defensive: &str,
        range: DateRange,
    ) -> Result<(PriceSeries, PriceSeries), DataError> {
        let table = WideTable::read(&self.path)?;
        let load = |symbol: &str| -> Result<PriceSeries, DataError> {
            let col = table.column(symbol).ok_or_else(|| DataError::MissingColumn {
                path: self.path.display().to_string(),
                column: symbol.to_string(),
            })?;
            let pairs = table.series(col, range);
            if pairs.is_empty() {
                return Err(DataError::Empty {
                    name: symbol.to_string(),
                });
            }
            Ok(PriceSeries::from_pairs(symbol, pairs)?)
        };
        let (a, b) = forward_fill_union(&load(risky)?, &load(defensive)?);
        tracing::debug!(path = %self.path.display(), days = a.len(), "loaded prices");
        Ok((a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_mixed_frequency_indicators() {
        let file = write_temp(
            "date,UNRATE,ICSA\n\
             2024-01-01,3.7,\n\
             2024-01-06,,210000\n\
             2024-01-13,,205000\n\
             2024-02-01,3.9,\n",
        );
        let source = CsvIndicatorSource::new(file.path());
        let series = source
            .fetch_indicators(&["UNRATE".into(), "ICSA".into()], DateRange::default())
            .unwrap();
        assert_eq!(series[0].name, "UNRATE");
        assert_eq!(series[0].values(), vec![3.7, 3.9]);
        assert_eq!(series[1].len(), 2);
    }

    #[test]
    fn missing_indicator_column_is_reported() {
        let file = write_temp("date,UNRATE\n2024-01-01,3.7\n");
        let err = CsvIndicatorSource::new(file.path())
            .fetch_indicators(&["PAYEMS".into()], DateRange::default())
            .unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { column, .. } if column == "PAYEMS"));
    }

    #[test]
    fn bad_value_reports_line() {
        let file = write_temp("date,UNRATE\n2024-01-01,3.7\n2024-02-01,abc\n");
        let err = CsvIndicatorSource::new(file.path())
            .fetch_indicators(&["UNRATE".into()], DateRange::default())
            .unwrap_err();
        assert!(matches!(err, DataError::Parse { line: 3, .. }));
    }

    #[test]
    fn prices_are_forward_filled_and_ranged() {
        let file = write_temp(
            "date,SPY,TLT\n\
             2024-01-02,470.0,98.0\n\
             2024-01-03,468.0,\n\
             2024-01-04,467.5,97.5\n\
             2024-01-05,469.0,97.0\n",
        );
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let (spy, tlt) = CsvPriceSource::new(file.path())
            .fetch_prices("SPY", "TLT", DateRange::new(None, Some(d(4))))
            .unwrap();
        assert_eq!(spy.len(), 3);
        assert_eq!(tlt.len(), 3);
        assert_eq!(tlt.points()[1].price, 98.0);
    }
}
