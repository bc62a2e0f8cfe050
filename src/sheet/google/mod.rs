// Google Sheets backend
//
// Reads with `values.get` (formatted values, like the sheet shows them) and
// writes single cells with a `batchUpdate` `updateCells` request addressed by
// numeric row/column indexes, so A1 notation never takes part in addressing.

pub mod auth;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info};

use super::{CellValue, Grid, Spreadsheet};
use crate::config::SpreadsheetConfig;
use crate::error::RatesError;
use auth::ServiceAccountKey;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    // Omitted by the API when the range holds no values
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// An opened, authenticated spreadsheet
pub struct GoogleSheets {
    client: Client,
    token: String,
    spreadsheet_id: String,
    sheet_ids: HashMap<String, i64>,
}

impl GoogleSheets {
    /// Authenticate and open the configured spreadsheet.
    ///
    /// Any failure here is fatal for a run: nothing has been written yet.
    pub async fn open(config: &SpreadsheetConfig) -> Result<Self> {
        let key = ServiceAccountKey::load(config)?;

        let client = Client::builder()
            .user_agent("p2p-rates/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        let token = auth::fetch_access_token(&client, &key).await?;

        let spreadsheet_id = match &config.id {
            Some(id) => id.clone(),
            None => find_spreadsheet_id(&client, &token, &config.title).await?,
        };

        let sheet_ids = load_sheet_ids(&client, &token, &spreadsheet_id).await?;
        info!(
            "Opened spreadsheet {} with tabs {:?}",
            spreadsheet_id,
            sheet_ids.keys().collect::<Vec<_>>()
        );

        Ok(Self {
            client,
            token,
            spreadsheet_id,
            sheet_ids,
        })
    }

    fn sheet_id(&self, tab: &str) -> Result<i64, RatesError> {
        self.sheet_ids
            .get(tab)
            .copied()
            .ok_or_else(|| RatesError::SpreadsheetAccess(format!("no tab named {:?}", tab)))
    }
}

async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(RatesError::SpreadsheetAccess(format!("{} returned {}: {}", what, status, detail)).into())
}

/// Drive query matching a spreadsheet by exact title
fn title_query(title: &str) -> String {
    format!(
        "name = '{}' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
        title.replace('\\', "\\\\").replace('\'', "\\'")
    )
}

async fn find_spreadsheet_id(client: &Client, token: &str, title: &str) -> Result<String> {
    debug!("Looking up spreadsheet {:?}", title);
    let url = Url::parse_with_params(
        DRIVE_FILES_API,
        &[
            ("q", title_query(title).as_str()),
            ("fields", "files(id,name)"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ],
    )?;

    let response = client
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .context("Failed to search Drive for the spreadsheet")?;
    let list: DriveFileList = ensure_success(response, "Drive files search")
        .await?
        .json()
        .await
        .context("Failed to parse Drive response")?;

    let file = list.files.into_iter().next().ok_or_else(|| {
        RatesError::SpreadsheetAccess(format!(
            "spreadsheet {:?} not found or not shared with the service account",
            title
        ))
    })?;
    debug!("Spreadsheet {:?} has id {}", file.name, file.id);
    Ok(file.id)
}

async fn load_sheet_ids(
    client: &Client,
    token: &str,
    spreadsheet_id: &str,
) -> Result<HashMap<String, i64>> {
    let url = Url::parse_with_params(
        &format!("{}/{}", SHEETS_API, spreadsheet_id),
        &[("fields", "sheets.properties(sheetId,title)")],
    )?;

    let response = client
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .context("Failed to fetch spreadsheet metadata")?;
    let meta: SpreadsheetMeta = ensure_success(response, "Spreadsheet metadata")
        .await?
        .json()
        .await
        .context("Failed to parse spreadsheet metadata")?;

    Ok(meta
        .sheets
        .into_iter()
        .map(|s| (s.properties.title, s.properties.sheet_id))
        .collect())
}

/// `updateCells` request writing one value at 1-based (row, column)
fn update_cell_request(
    sheet_id: i64,
    row: usize,
    column: usize,
    value: &CellValue,
) -> Result<Value> {
    let entered = match value {
        CellValue::Text(text) => json!({ "stringValue": text }),
        CellValue::Number(number) => {
            let number = number
                .to_f64()
                .ok_or_else(|| anyhow!("price {} does not fit a sheet number", number))?;
            json!({ "numberValue": number })
        }
    };

    Ok(json!({
        "requests": [{
            "updateCells": {
                "start": {
                    "sheetId": sheet_id,
                    "rowIndex": row - 1,
                    "columnIndex": column - 1,
                },
                "rows": [{ "values": [{ "userEnteredValue": entered }] }],
                "fields": "userEnteredValue",
            }
        }]
    }))
}

/// Range covering a whole tab, quoted for titles with spaces or quotes
fn tab_range(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

#[async_trait]
impl Spreadsheet for GoogleSheets {
    async fn get_all_values(&self, tab: &str) -> Result<Grid> {
        self.sheet_id(tab)?;

        let mut url = Url::parse(&format!("{}/{}/values", SHEETS_API, self.spreadsheet_id))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets API URL cannot be a base"))?
            .push(&tab_range(tab));
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Failed to read tab {}", tab))?;
        let range: ValueRange = ensure_success(response, "values.get")
            .await?
            .json()
            .await
            .context("Failed to parse values response")?;

        debug!("Read {} rows from {}", range.values.len(), tab);
        Ok(range.values)
    }

    async fn update_cell(
        &self,
        tab: &str,
        row: usize,
        column: usize,
        value: CellValue,
    ) -> Result<()> {
        super::memory::check_position(row, column)?;
        let sheet_id = self.sheet_id(tab)?;
        let body = update_cell_request(sheet_id, row, column, &value)?;

        let response = self
            .client
            .post(format!("{}/{}:batchUpdate", SHEETS_API, self.spreadsheet_id))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to write {}!R{}C{}", tab, row, column))?;
        ensure_success(response, "batchUpdate").await?;

        debug!("Wrote {} to {} row {} column {}", value, tab, row, column);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_update_request_is_index_addressed() {
        let body = update_cell_request(42, 1, 3, &CellValue::Text("2024-01-02".into())).unwrap();
        let update = &body["requests"][0]["updateCells"];
        assert_eq!(update["start"]["sheetId"], 42);
        assert_eq!(update["start"]["rowIndex"], 0);
        assert_eq!(update["start"]["columnIndex"], 2);
        assert_eq!(
            update["rows"][0]["values"][0]["userEnteredValue"]["stringValue"],
            "2024-01-02"
        );
        assert_eq!(update["fields"], "userEnteredValue");
    }

    #[test]
    fn test_update_request_writes_numbers() {
        let body = update_cell_request(0, 12, 3, &CellValue::Number(dec!(4.2))).unwrap();
        let entered =
            &body["requests"][0]["updateCells"]["rows"][0]["values"][0]["userEnteredValue"];
        assert_eq!(entered["numberValue"].as_f64(), Some(4.2));
    }

    #[test]
    fn test_title_query_escapes_quotes() {
        assert_eq!(
            title_query("Bob's rates"),
            "name = 'Bob\\'s rates' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false"
        );
    }

    #[test]
    fn test_tab_range_quoting() {
        assert_eq!(tab_range("BUY"), "'BUY'");
        assert_eq!(tab_range("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_values_response_without_values() {
        let range: ValueRange =
            serde_json::from_str(r#"{"range": "'BUY'!A1:Z1000", "majorDimension": "ROWS"}"#)
                .unwrap();
        assert!(range.values.is_empty());
    }

    #[test]
    fn test_metadata_response() {
        let meta: SpreadsheetMeta = serde_json::from_str(
            r#"{"sheets": [
                {"properties": {"sheetId": 0, "title": "BUY"}},
                {"properties": {"sheetId": 917, "title": "SELL"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(meta.sheets[1].properties.sheet_id, 917);
        assert_eq!(meta.sheets[1].properties.title, "SELL");
    }
}
