use std::path::Path;
use thiserror::Error;

/// Columns every contact sheet must carry, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 5] = ["Name", "Phone", "Alias", "Nominal", "Saving"];

#[derive(Error, Debug)]
pub enum ContactsError {
    #[error("Unsupported spreadsheet format '{path}': expected an .xlsx file")]
    UnsupportedFormat { path: String },

    #[error("Failed to read spreadsheet '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Spreadsheet '{path}' has no worksheet")]
    NoWorksheet { path: String },

    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

impl ContactsError {
    /// Schema problems are reported apart from unreadable files.
    pub fn is_schema(&self) -> bool {
        matches!(self, ContactsError::MissingColumns(_))
    }
}

/// One spreadsheet record, every cell kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactRow {
    pub name: String,
    pub phone: String,
    pub alias: String,
    pub nominal: String,
    pub saving: String,
}

impl ContactRow {
    /// Looks a field up by its column name.
    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            "Name" => Some(&self.name),
            "Phone" => Some(&self.phone),
            "Alias" => Some(&self.alias),
            "Nominal" => Some(&self.nominal),
            "Saving" => Some(&self.saving),
            _ => None,
        }
    }
}

/// Header plus text rows of the first worksheet.
#[derive(Debug, Clone, Default)]
pub struct ContactTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ContactTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let rows = rows
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();
        Self { headers, rows }
    }

    /// Reads the first worksheet of an `.xlsx` workbook. Row 1 is the header.
    pub fn read_xlsx(path: &Path) -> Result<Self, ContactsError> {
        let display = path.display().to_string();
        let is_xlsx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
        if !is_xlsx {
            return Err(ContactsError::UnsupportedFormat { path: display });
        }

        let book =
            umya_spreadsheet::reader::xlsx::read(path).map_err(|e| ContactsError::Unreadable {
                path: display.clone(),
                reason: e.to_string(),
            })?;
        let sheet = book
            .get_sheet(&0)
            .ok_or_else(|| ContactsError::NoWorksheet { path: display })?;

        let (max_col, max_row) = sheet.get_highest_column_and_row();
        let cell_text = |col: u32, row: u32| -> String {
            sheet
                .get_cell((col, row))
                .map(|cell| cell.get_value().to_string())
                .unwrap_or_default()
        };

        let headers = (1..=max_col).map(|col| cell_text(col, 1)).collect();
        let rows = (2..=max_row)
            .map(|row| (1..=max_col).map(|col| cell_text(col, row)).collect())
            .collect();

        Ok(Self::new(headers, rows))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fails with every required column the header lacks.
    pub fn check_required_columns(&self) -> Result<(), ContactsError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|required| !self.headers.iter().any(|h| h.as_str() == **required))
            .map(|required| required.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ContactsError::MissingColumns(missing))
        }
    }

    /// Maps rows onto contacts by column name. Extra columns are ignored.
    pub fn contacts(&self) -> Result<Vec<ContactRow>, ContactsError> {
        self.check_required_columns()?;

        let index = |name: &str| self.headers.iter().position(|h| h == name);
        let (Some(name), Some(phone), Some(alias), Some(nominal), Some(saving)) = (
            index("Name"),
            index("Phone"),
            index("Alias"),
            index("Nominal"),
            index("Saving"),
        ) else {
            return Err(ContactsError::MissingColumns(REQUIRED_COLUMNS.map(String::from).to_vec()));
        };

        let cell = |row: &Vec<String>, i: usize| row.get(i).cloned().unwrap_or_default();
        Ok(self
            .rows
            .iter()
            .map(|row| ContactRow {
                name: cell(row, name),
                phone: cell(row, phone),
                alias: cell(row, alias),
                nominal: cell(row, nominal),
                saving: cell(row, saving),
            })
            .collect())
    }
}

/// Source of contact tables, keyed by file path.
pub trait ContactLoader {
    fn load(&self, path: &Path) -> Result<ContactTable, ContactsError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxLoader;

impl ContactLoader for XlsxLoader {
    fn load(&self, path: &Path) -> Result<ContactTable, ContactsError> {
        ContactTable::read_xlsx(path)
    }
}
