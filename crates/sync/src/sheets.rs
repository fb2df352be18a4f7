use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("spreadsheet service rejected the request: {0}")]
    Api(String),
}

/// Read/write access to one spreadsheet. Rows are addressed by their 0-based
/// position in the full sheet, header included, so row 0 is the header and
/// data starts at row 1.
#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    async fn header_row(&self, spreadsheet_id: &str) -> Result<Vec<String>, SheetsError>;

    /// Data rows in sheet order, header excluded.
    async fn rows(&self, spreadsheet_id: &str) -> Result<Vec<Vec<String>>, SheetsError>;

    async fn set_cell(
        &self,
        spreadsheet_id: &str,
        row: usize,
        column: usize,
        value: &str,
    ) -> Result<(), SheetsError>;
}

/// Client for the spreadsheet bridge service, which exposes sheet values as
/// `{"values": [[...], ...]}` and accepts single-cell writes.
pub struct HttpSpreadsheetClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpSpreadsheetClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), api_key }
    }

    fn key_param(&self) -> Vec<(&'static str, String)> {
        self.api_key
            .as_ref()
            .map(|key| vec![("key", key.expose_secret().to_string())])
            .unwrap_or_default()
    }

    async fn fetch_values(&self, spreadsheet_id: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = format!("{}/{}/values", self.base_url.trim_end_matches('/'), spreadsheet_id);
        let response = self.client.get(&url).query(&self.key_param()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api(format!("{status}: {detail}")));
        }

        let payload: serde_json::Value = response.json().await?;
        let values = payload
            .get("values")
            .and_then(|values| values.as_array())
            .ok_or_else(|| SheetsError::Api("response had no `values` array".to_string()))?;

        Ok(values
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| {
                        cells
                            .iter()
                            .map(|cell| cell.as_str().unwrap_or_default().to_string())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect())
    }
}

#[async_trait]
impl SpreadsheetClient for HttpSpreadsheetClient {
    async fn header_row(&self, spreadsheet_id: &str) -> Result<Vec<String>, SheetsError> {
        let mut values = self.fetch_values(spreadsheet_id).await?;
        if values.is_empty() {
            return Ok(Vec::new());
        }
        Ok(values.swap_remove(0))
    }

    async fn rows(&self, spreadsheet_id: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let mut values = self.fetch_values(spreadsheet_id).await?;
        if values.is_empty() {
            return Ok(Vec::new());
        }
        values.remove(0);
        Ok(values)
    }

    async fn set_cell(
        &self,
        spreadsheet_id: &str,
        row: usize,
        column: usize,
        value: &str,
    ) -> Result<(), SheetsError> {
        let url = format!("{}/{}/cells", self.base_url.trim_end_matches('/'), spreadsheet_id);
        let response = self
            .client
            .put(&url)
            .query(&self.key_param())
            .json(&serde_json::json!({ "row": row, "column": column, "value": value }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api(format!("{status}: {detail}")));
        }
        Ok(())
    }
}

/// In-memory sheet whose rows can be swapped between reconciliation runs.
/// Cell writes are recorded for assertions.
pub struct StaticSheet {
    headers: Vec<String>,
    rows: Mutex<Vec<Vec<String>>>,
    pub written: Mutex<Vec<(usize, usize, String)>>,
}

impl StaticSheet {
    pub fn new<H, R>(headers: H, rows: R) -> Self
    where
        H: IntoIterator<Item = &'static str>,
        R: IntoIterator<Item = Vec<&'static str>>,
    {
        Self {
            headers: headers.into_iter().map(str::to_string).collect(),
            rows: Mutex::new(
                rows.into_iter()
                    .map(|row| row.into_iter().map(str::to_string).collect())
                    .collect(),
            ),
            written: Mutex::new(Vec::new()),
        }
    }

    pub async fn set_rows<R>(&self, rows: R)
    where
        R: IntoIterator<Item = Vec<&'static str>>,
    {
        *self.rows.lock().await =
            rows.into_iter().map(|row| row.into_iter().map(str::to_string).collect()).collect();
    }

    pub async fn written_cells(&self) -> Vec<(usize, usize, String)> {
        self.written.lock().await.clone()
    }
}

#[async_trait]
impl SpreadsheetClient for StaticSheet {
    async fn header_row(&self, _spreadsheet_id: &str) -> Result<Vec<String>, SheetsError> {
        Ok(self.headers.clone())
    }

    async fn rows(&self, _spreadsheet_id: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        Ok(self.rows.lock().await.clone())
    }

    async fn set_cell(
        &self,
        _spreadsheet_id: &str,
        row: usize,
        column: usize,
        value: &str,
    ) -> Result<(), SheetsError> {
        self.written.lock().await.push((row, column, value.to_string()));
        Ok(())
    }
}
