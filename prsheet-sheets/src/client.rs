//! Google Sheets v4 REST client

use async_trait::async_trait;
use chrono::Utc;
use prsheet_core::{Row, ServiceAccountSource};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{AccessToken, ServiceAccountKey};
use crate::worksheet::{quote_title, row_range, Worksheet};
use crate::{Error, Result};

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/";

/// Grid size given to worksheets created on demand
pub const NEW_SHEET_ROWS: u32 = 100;
pub const NEW_SHEET_COLS: u32 = 12;

#[derive(Debug, Deserialize)]
struct Spreadsheet {
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
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Authenticated Sheets API client
pub struct SheetsClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    token: Mutex<Option<AccessToken>>,
    base_url: Url,
}

impl SheetsClient {
    /// Create a client for a service account
    pub fn new(key: ServiceAccountKey) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("prsheet")
            .build()?;

        Ok(Self {
            http,
            key,
            token: Mutex::new(None),
            base_url: Url::parse(SHEETS_API_URL)?,
        })
    }

    /// Create a client from the configured credential source
    pub fn from_source(source: &ServiceAccountSource) -> Result<Self> {
        let key = ServiceAccountKey::load(source)?;
        info!(
            client_email = %key.client_email,
            source = %source.describe(),
            "Loaded service account"
        );
        Self::new(key)
    }

    /// Current bearer token, refreshed when close to expiry
    async fn bearer(&self) -> Result<String> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if !token.is_stale(Utc::now()) {
                return Ok(token.token.clone());
            }
            debug!("Google access token expiring, refreshing");
        }

        let fresh = AccessToken::fetch(&self.http, &self.key).await?;
        let bearer = fresh.token.clone();
        *guard = Some(fresh);
        Ok(bearer)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Parse(format!("Invalid API base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let request = self.http.get(url.clone()).bearer_auth(self.bearer().await?);
        self.execute(url, request).await
    }

    async fn post<T: DeserializeOwned>(&self, url: Url, body: &Value) -> Result<T> {
        let request = self
            .http
            .post(url.clone())
            .bearer_auth(self.bearer().await?)
            .json(body);
        self.execute(url, request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        url: Url,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("Unexpected response from {}: {}", url, e)))
    }

    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>> {
        let mut url = self.url(&["spreadsheets", spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");

        let spreadsheet: Spreadsheet = self.get(url).await?;
        Ok(spreadsheet.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn add_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<()> {
        let batch = format!("{}:batchUpdate", spreadsheet_id);
        let url = self.url(&["spreadsheets", batch.as_str()])?;
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": {
                            "rowCount": NEW_SHEET_ROWS,
                            "columnCount": NEW_SHEET_COLS,
                        }
                    }
                }
            }]
        });

        let _: Value = self.post(url, &body).await?;
        Ok(())
    }

    /// Whether the spreadsheet has a worksheet with this title
    pub async fn has_worksheet(&self, spreadsheet_id: &str, title: &str) -> Result<bool> {
        let sheets = self.sheet_titles(spreadsheet_id).await?;
        Ok(sheets.iter().any(|s| s.title == title))
    }

    /// Open a worksheet by title, creating it when the spreadsheet lacks one
    pub async fn open_worksheet(&self, spreadsheet_id: &str, title: &str) -> Result<SheetHandle<'_>> {
        let sheets = self.sheet_titles(spreadsheet_id).await?;

        match sheets.iter().find(|s| s.title == title) {
            Some(sheet) => {
                debug!(title, sheet_id = sheet.sheet_id, "Found worksheet");
            }
            None => {
                warn!(title, "Worksheet not found, creating it");
                self.add_sheet(spreadsheet_id, title).await?;
            }
        }

        Ok(SheetHandle {
            client: self,
            spreadsheet_id: spreadsheet_id.to_string(),
            title: title.to_string(),
        })
    }
}

impl std::fmt::Debug for SheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsClient")
            .field("client_email", &self.key.client_email)
            .finish_non_exhaustive()
    }
}

/// A worksheet inside a spreadsheet
#[derive(Debug)]
pub struct SheetHandle<'a> {
    client: &'a SheetsClient,
    spreadsheet_id: String,
    title: String,
}

impl SheetHandle<'_> {
    fn values_url(&self, range: &str) -> Result<Url> {
        self.client
            .url(&["spreadsheets", self.spreadsheet_id.as_str(), "values", range])
    }
}

#[async_trait]
impl Worksheet for SheetHandle<'_> {
    fn title(&self) -> &str {
        &self.title
    }

    async fn row_values(&self, row: u32) -> Result<Vec<String>> {
        let mut url = self.values_url(&row_range(&self.title, row))?;
        url.query_pairs_mut().append_pair("majorDimension", "ROWS");

        let range: ValueRange = self.client.get(url).await?;
        Ok(range
            .values
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect())
    }

    async fn append_rows(&self, rows: &[Row]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let append = format!("{}:append", quote_title(&self.title));
        let mut url = self.values_url(&append)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let body = json!({
            "majorDimension": "ROWS",
            "values": rows,
        });
        let _: Value = self.client.post(url, &body).await?;

        debug!(title = %self.title, count = rows.len(), "Appended rows");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let clear = format!("{}:clear", quote_title(&self.title));
        let url = self.values_url(&clear)?;

        let _: Value = self.client.post(url, &json!({})).await?;

        debug!(title = %self.title, "Cleared worksheet");
        Ok(())
    }
}
