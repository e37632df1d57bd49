//! Spreadsheet store client: exact-key row lookup, row read, row append.

use mktpulse_core::{parse_sheet_date_key, ReportWindow};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::auth::AccessToken;
use crate::error::{check_status, decode_json, SourceError};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    values: [&'a [String]; 1],
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_range: Option<String>,
}

/// Client bound to one worksheet of one spreadsheet.
pub struct SheetsClient {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
}

impl SheetsClient {
    #[must_use]
    pub fn new(client: Client, spreadsheet_id: &str, sheet_name: &str) -> Self {
        Self::with_base_url(client, spreadsheet_id, sheet_name, DEFAULT_BASE_URL)
    }

    /// Points the client at a custom host (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(
        client: Client,
        spreadsheet_id: &str,
        sheet_name: &str,
        base_url: &str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: sheet_name.to_string(),
        }
    }

    /// `'Sheet'!A1`-style range, quoted so names with spaces or digits work.
    fn a1_range(&self, cells: &str) -> String {
        format!("'{}'!{cells}", self.sheet_name.replace('\'', "''"))
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            self.spreadsheet_id,
            utf8_percent_encode(range, NON_ALPHANUMERIC)
        )
    }

    async fn get_values(
        &self,
        token: &AccessToken,
        range: &str,
    ) -> Result<ValueRange, SourceError> {
        let context = format!("values.get({range})");
        let response = self
            .client
            .get(self.values_url(range))
            .bearer_auth(token.bearer())
            .send()
            .await?;
        let response = check_status(response, &context)?;
        decode_json(response, &context).await
    }

    /// Finds the 1-based row whose cell in `column` equals `key` exactly.
    ///
    /// # Errors
    ///
    /// - [`SourceError::NotFound`] if no cell in the column matches.
    /// - [`SourceError::Auth`] / [`SourceError::UnexpectedStatus`] /
    ///   [`SourceError::Http`] / [`SourceError::Deserialize`] on API failure.
    pub async fn find_row(
        &self,
        token: &AccessToken,
        column: &str,
        key: &str,
    ) -> Result<usize, SourceError> {
        let range = self.a1_range(&format!("{column}:{column}"));
        let column_values = self.get_values(token, &range).await?;
        column_values
            .values
            .iter()
            .position(|row| row.first().is_some_and(|cell| cell.trim() == key))
            .map(|idx| idx + 1)
            .ok_or_else(|| {
                SourceError::NotFound(format!(
                    "key '{key}' in column {column} of sheet '{}'",
                    self.sheet_name
                ))
            })
    }

    /// Finds the 1-based row whose date key in `column` is the latest one
    /// falling inside `window`, together with the key as written.
    ///
    /// # Errors
    ///
    /// - [`SourceError::NotFound`] if no key in the column falls inside `window`.
    /// - Same API failures as [`SheetsClient::find_row`].
    pub async fn find_latest_row_within(
        &self,
        token: &AccessToken,
        column: &str,
        window: &ReportWindow,
    ) -> Result<(usize, String), SourceError> {
        let range = self.a1_range(&format!("{column}:{column}"));
        let column_values = self.get_values(token, &range).await?;
        column_values
            .values
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                let cell = row.first()?.trim();
                let date = parse_sheet_date_key(cell).filter(|d| window.contains(*d))?;
                Some((date, idx + 1, cell.to_string()))
            })
            .max_by_key(|(date, row, _)| (*date, *row))
            .map(|(_, row, key)| (row, key))
            .ok_or_else(|| {
                SourceError::NotFound(format!(
                    "no key between {} and {} in column {column} of sheet '{}'",
                    window.start_iso(),
                    window.end_iso(),
                    self.sheet_name
                ))
            })
    }

    /// Reads the cells of one 1-based row. Trailing empty cells are omitted by
    /// the service, so the returned row may be shorter than the sheet.
    ///
    /// # Errors
    ///
    /// Same API failures as [`SheetsClient::find_row`].
    pub async fn read_row(
        &self,
        token: &AccessToken,
        row: usize,
    ) -> Result<Vec<String>, SourceError> {
        let range = self.a1_range(&format!("{row}:{row}"));
        let values = self.get_values(token, &range).await?;
        Ok(values.values.into_iter().next().unwrap_or_default())
    }

    /// Appends one row after the last row of the table. Values are interpreted
    /// as if typed by a user, so numbers and dates become typed cells.
    ///
    /// Returns the range the service reports as written, when present.
    ///
    /// # Errors
    ///
    /// Same API failures as [`SheetsClient::find_row`].
    pub async fn append_row(
        &self,
        token: &AccessToken,
        values: &[String],
    ) -> Result<Option<String>, SourceError> {
        let range = self.a1_range("A1");
        let context = format!("values.append({range})");
        let url = format!("{}:append", self.values_url(&range));
        let response = self
            .client
            .post(url)
            .bearer_auth(token.bearer())
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&AppendBody { values: [values] })
            .send()
            .await?;
        let response = check_status(response, &context)?;
        let body: AppendResponse = decode_json(response, &context).await?;
        Ok(body.updates.and_then(|u| u.updated_range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mktpulse_core::UnavailableReason;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COLUMN_PATH: &str = "/v4/spreadsheets/sheet-1/values/%272026%27%21A%3AA";

    fn client_for(server: &MockServer) -> SheetsClient {
        SheetsClient::with_base_url(Client::new(), "sheet-1", "2026", &server.uri())
    }

    #[tokio::test]
    async fn find_row_matches_exact_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLUMN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "range": "'2026'!A1:A4",
                "values": [["Date"], ["29/12/2025"], ["15/1/2026"], ["5/1/2026"]]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let token = AccessToken::new("tok");
        assert_eq!(client.find_row(&token, "A", "5/1/2026").await.unwrap(), 4);

        // "5/1/2026" must not match "15/1/2026" or a zero-padded key.
        let err = client.find_row(&token, "A", "05/01/2026").await.unwrap_err();
        assert_eq!(err.reason(), UnavailableReason::NotFound);
    }

    #[tokio::test]
    async fn latest_row_within_window_picks_last_date_in_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLUMN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [
                    ["Date"], ["29/12/2025"], ["5/1/2026"], ["26/1/2026"],
                    ["12/1/2026"], ["2/2/2026"]
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let token = AccessToken::new("tok");
        let january = mktpulse_core::PeriodWindows::monthly(
            chrono::NaiveDate::from_ymd_opt(2026, 2, 3).unwrap(),
        )
        .report;
        let (row, key) = client
            .find_latest_row_within(&token, "A", &january)
            .await
            .unwrap();
        assert_eq!((row, key.as_str()), (4, "26/1/2026"));

        let march = mktpulse_core::PeriodWindows::monthly(
            chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
        )
        .report;
        let err = client
            .find_latest_row_within(&token, "A", &march)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), UnavailableReason::NotFound);
    }

    #[tokio::test]
    async fn find_row_on_empty_column_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLUMN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "range": "'2026'!A1:A1000"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .find_row(&AccessToken::new("tok"), "A", "5/1/2026")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn read_row_returns_cells() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-1/values/%272026%27%214%3A4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [["5/1/2026", "1520", "", "", "", "", "", "2,310"]]
            })))
            .mount(&server)
            .await;

        let row = client_for(&server)
            .read_row(&AccessToken::new("tok"), 4)
            .await
            .unwrap();
        assert_eq!(row.len(), 8);
        assert_eq!(row[7], "2,310");
    }

    #[tokio::test]
    async fn append_row_uses_user_entered_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/%272026%27%21A1:append"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(query_param("insertDataOption", "INSERT_ROWS"))
            .and(body_json(serde_json::json!({
                "values": [["5/1/2026", "1520", ""]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "updates": { "updatedRange": "'2026'!A42:C42", "updatedRows": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let written = client_for(&server)
            .append_row(
                &AccessToken::new("tok"),
                &["5/1/2026".to_string(), "1520".to_string(), String::new()],
            )
            .await
            .unwrap();
        assert_eq!(written.as_deref(), Some("'2026'!A42:C42"));
    }

    #[tokio::test]
    async fn unauthorized_read_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .read_row(&AccessToken::new("tok"), 2)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), UnavailableReason::AuthError);
    }
}
