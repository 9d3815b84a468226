//! Reading the files the commands work on.

use std::{
    borrow::Cow,
    fs::File,
    io::{stdin, Read},
    path::Path,
};

use chrono_tz::Tz;
use electricity_tariffs::prices::PriceDataset;
use serde::de::DeserializeOwned;

use crate::{error::Error, Result};

const DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

/// A file given on the command line, or standard in when no path was given.
pub struct Input<'a> {
    path: Option<&'a Path>,
}

impl<'a> Input<'a> {
    pub fn new(path: Option<&'a Path>) -> Self {
        Self { path }
    }

    pub fn name(&self) -> Cow<'_, str> {
        self.path
            .map_or("<stdin>".into(), |path| path.to_string_lossy())
    }

    /// Read the whole input. Exports are not always UTF-8, invalid sequences are replaced.
    fn read(&self) -> Result<String> {
        let mut bytes = Vec::new();

        if let Some(path) = self.path {
            File::open(path)
                .and_then(|mut file| file.read_to_end(&mut bytes))
                .map_err(|e| Error::file(path.to_owned(), e))?;
        } else {
            stdin()
                .lock()
                .read_to_end(&mut bytes)
                .map_err(|e| Error::file("<stdin>".into(), e))?;
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the input as delimited rows. The delimiter is the one that occurs most in the
    /// first non-blank line.
    pub fn rows(&self) -> Result<Vec<Vec<String>>> {
        let content = self.read()?;
        let delimiter = detect_delimiter(&content);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::csv(self.name(), e))?;
            rows.push(record.iter().map(str::to_owned).collect());
        }

        Ok(rows)
    }

    pub fn json<T: DeserializeOwned>(&self, kind: &'static str) -> Result<T> {
        let content = self.read()?;
        serde_json::from_str(&content).map_err(|e| Error::deserialize(self.name(), kind, e))
    }
}

fn detect_delimiter(content: &str) -> u8 {
    let Some(header) = content.lines().find(|line| !line.trim().is_empty()) else {
        return b';';
    };

    DELIMITERS
        .into_iter()
        .rev()
        .max_by_key(|&delimiter| header.bytes().filter(|&b| b == delimiter).count())
        .unwrap_or(b';')
}

/// The time zone a price dataset declares, if any.
pub fn dataset_time_zone(dataset: &PriceDataset) -> Result<Option<Tz>> {
    dataset
        .timezone
        .as_deref()
        .map(|name| {
            name.parse::<Tz>()
                .map_err(|_| Error::Timezone(name.to_owned()))
        })
        .transpose()
}

#[cfg(test)]
mod delimiter_tests {
    use super::detect_delimiter;

    #[test]
    fn semicolon_export_with_decimal_commas() {
        assert_eq!(detect_delimiter("CUPS;Fecha;Hora;AE_kWh\nES00;01/06/2025;1;0,250"), b';');
    }

    #[test]
    fn comma_export() {
        assert_eq!(detect_delimiter("\n\ndate,hour,kwh\n2025-06-01,1,0.25"), b',');
    }

    #[test]
    fn ties_prefer_semicolon() {
        assert_eq!(detect_delimiter("fecha"), b';');
        assert_eq!(detect_delimiter(""), b';');
    }
}
