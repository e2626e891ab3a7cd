//! Header schema
//!
//! Header names are matched case-insensitively after trimming against a fixed
//! alias table. Columns the file does not carry decode as `None`.

use spx_common::{Error, Result};
use std::collections::HashMap;

/// Known input columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Salesperson,
    Reference,
    Product,
    OperationType,
    Reason,
    Quantity,
    UnitValue,
    TotalValue,
    Tax,
    Date,
}

const ALIASES: &[(Column, &[&str])] = &[
    (Column::Salesperson, &["salesperson", "vendedor"]),
    (Column::Reference, &["reference", "referencia"]),
    (Column::Product, &["product", "producto"]),
    (Column::OperationType, &["operation_type", "tipooperacion", "type"]),
    (Column::Reason, &["reason", "motivo"]),
    (Column::Quantity, &["quantity", "cantidad"]),
    (Column::UnitValue, &["unit_value", "valorunitario"]),
    (Column::TotalValue, &["total_value", "valorvendido"]),
    (Column::Tax, &["tax", "impuesto"]),
    (Column::Date, &["date", "fechaventa"]),
];

impl Column {
    /// Column named by a header cell, if it is a known alias
    pub fn from_header(header: &str) -> Option<Column> {
        let key = header.trim_start_matches('\u{feff}').trim().to_lowercase();
        ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&key.as_str()))
            .map(|(column, _)| *column)
    }
}

/// One data row with every known column as an optional trimmed value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub salesperson: Option<String>,
    pub reference: Option<String>,
    pub product: Option<String>,
    pub operation_type: Option<String>,
    pub reason: Option<String>,
    pub quantity: Option<String>,
    pub unit_value: Option<String>,
    pub total_value: Option<String>,
    pub tax: Option<String>,
    pub date: Option<String>,
}

/// Column positions resolved from the header row
#[derive(Debug, Clone)]
pub struct HeaderSchema {
    width: usize,
    positions: HashMap<Column, usize>,
    unknown: Vec<String>,
}

impl HeaderSchema {
    /// Build from the header cells. The first occurrence of a column wins.
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut positions = HashMap::new();
        let mut unknown = Vec::new();
        for (index, header) in headers.iter().enumerate() {
            match Column::from_header(header.as_ref()) {
                Some(column) => {
                    positions.entry(column).or_insert(index);
                }
                None => unknown.push(header.as_ref().trim().to_string()),
            }
        }
        Self {
            width: headers.len(),
            positions,
            unknown,
        }
    }

    /// Number of header cells
    pub fn width(&self) -> usize {
        self.width
    }

    /// Header cells that matched no known column
    pub fn unknown_headers(&self) -> &[String] {
        &self.unknown
    }

    /// Zip a data row against the header.
    ///
    /// A row whose field count differs from the header is rejected.
    pub fn decode<S: AsRef<str>>(&self, fields: &[S]) -> Result<RawRow> {
        if fields.len() != self.width {
            return Err(Error::InvalidInput(format!(
                "Expected {} columns, found {}",
                self.width,
                fields.len()
            )));
        }
        let get = |column: Column| -> Option<String> {
            let index = *self.positions.get(&column)?;
            let value = fields[index].as_ref().trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        Ok(RawRow {
            salesperson: get(Column::Salesperson),
            reference: get(Column::Reference),
            product: get(Column::Product),
            operation_type: get(Column::OperationType),
            reason: get(Column::Reason),
            quantity: get(Column::Quantity),
            unit_value: get(Column::UnitValue),
            total_value: get(Column::TotalValue),
            tax: get(Column::Tax),
            date: get(Column::Date),
        })
    }
}
