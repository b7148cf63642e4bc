use std::time::Duration;

use common::column::ColumnContainer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CatalogClient, CatalogError, CatalogResult, TabularResult};
use crate::statement::Statement;

const STATEMENTS_PATH: &str = "/api/v2/statements";
const TOKEN_TYPE_HEADER: &str = "X-Snowflake-Authorization-Token-Type";
const USER_AGENT: &str = concat!("privreset/", env!("CARGO_PKG_VERSION"));

/// How the bearer token was issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    #[default]
    Oauth,
    KeypairJwt,
    ProgrammaticAccessToken,
}

impl TokenType {
    fn header_value(self) -> &'static str {
        match self {
            TokenType::Oauth => "OAUTH",
            TokenType::KeypairJwt => "KEYPAIR_JWT",
            TokenType::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
        }
    }
}

/// Session parameters for the SQL REST API.
#[derive(Debug, Clone)]
pub struct SnowflakeSettings {
    pub account_url: String,
    pub token: String,
    pub token_type: TokenType,
    /// Administrative role every statement runs under.
    pub role: String,
    pub warehouse: Option<String>,
    pub statement_timeout: Duration,
    pub poll_interval: Duration,
}

impl SnowflakeSettings {
    pub fn new(account_url: impl Into<String>, token: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            account_url: account_url.into(),
            token: token.into(),
            token_type: TokenType::default(),
            role: role.into(),
            warehouse: None,
            statement_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }

    fn statements_url(&self) -> String {
        format!("{}{}", self.account_url.trim_end_matches('/'), STATEMENTS_PATH)
    }
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<PartitionInfo>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartitionInfo {
    #[serde(default)]
    row_count: u64,
}

#[derive(Debug, Deserialize)]
struct PartitionResponse {
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug)]
enum Progress {
    Complete(StatementResponse),
    Running(String),
}

/// Catalog client over the warehouse SQL REST API.
///
/// One HTTP client and one role are shared by every worker for the whole
/// run; statements are submitted independently, so concurrent use is safe.
#[derive(Debug, Clone)]
pub struct SnowflakeCatalog {
    http: reqwest::Client,
    settings: SnowflakeSettings,
}

impl SnowflakeCatalog {
    pub fn new(settings: SnowflakeSettings) -> CatalogResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.statement_timeout + Duration::from_secs(30))
            .build()?;
        Ok(Self { http, settings })
    }

    /// Opens the session and checks that it runs under the configured role.
    pub async fn connect(settings: SnowflakeSettings) -> CatalogResult<Self> {
        let catalog = Self::new(settings)?;
        let probe = Statement::SelectCurrentRole.to_string();
        let result = catalog
            .run(&probe)
            .await
            .map_err(|err| CatalogError::Connect(format!("session check failed: {err}")))?;

        let active = result
            .rows()
            .first()
            .and_then(|row| row.text("CURRENT_ROLE()"))
            .unwrap_or_default();

        if !active.eq_ignore_ascii_case(&catalog.settings.role) {
            return Err(CatalogError::Connect(format!(
                "session role is '{active}', expected '{}'",
                catalog.settings.role
            )));
        }

        log::info!("connected to {} as role {}", catalog.settings.account_url, active);
        Ok(catalog)
    }

    pub fn settings(&self) -> &SnowflakeSettings {
        &self.settings
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.settings.token)
            .header(TOKEN_TYPE_HEADER, self.settings.token_type.header_value())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn submit(&self, statement: &str) -> CatalogResult<Progress> {
        let body = StatementRequest {
            statement,
            timeout: self.settings.statement_timeout.as_secs(),
            role: &self.settings.role,
            warehouse: self.settings.warehouse.as_deref(),
        };
        let request_id = Uuid::new_v4().to_string();
        let response = self
            .authorized(self.http.post(self.settings.statements_url()))
            .query(&[("requestId", request_id.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        interpret(statement, status, &text)
    }

    async fn poll(&self, statement: &str, handle: &str) -> CatalogResult<Progress> {
        let url = format!("{}/{handle}", self.settings.statements_url());
        let response = self.authorized(self.http.get(url)).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        interpret(statement, status, &text)
    }

    async fn fetch_partition(&self, handle: &str, partition: usize) -> CatalogResult<Vec<Vec<Option<String>>>> {
        let url = format!("{}/{handle}", self.settings.statements_url());
        let response = self
            .authorized(self.http.get(url))
            .query(&[("partition", partition)])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: text,
            });
        }
        let page: PartitionResponse = serde_json::from_str(&text)?;
        Ok(page.data)
    }

    async fn collect(&self, complete: StatementResponse) -> CatalogResult<TabularResult> {
        let meta = complete.result_set_meta_data.unwrap_or_default();
        let columns: Vec<String> = meta.row_type.into_iter().map(|column| column.name).collect();
        let mut data = complete.data;

        if meta.partition_info.len() > 1 {
            let handle = complete.statement_handle.unwrap_or_default();
            for (partition, info) in meta.partition_info.iter().enumerate().skip(1) {
                log::debug!(
                    "fetching partition {partition} of statement {handle} ({} rows)",
                    info.row_count
                );
                let rows = self.fetch_partition(&handle, partition).await?;
                if rows.len() as u64 != info.row_count {
                    log::warn!(
                        "partition {partition} of statement {handle} returned {} rows, expected {}",
                        rows.len(),
                        info.row_count
                    );
                }
                data.extend(rows);
            }
        }

        Ok(TabularResult::from_cells(columns, data))
    }
}

impl CatalogClient for SnowflakeCatalog {
    async fn run(&self, statement: &str) -> CatalogResult<TabularResult> {
        log::debug!("submitting '{statement}'");
        let mut progress = self.submit(statement).await?;
        loop {
            match progress {
                Progress::Complete(complete) => return self.collect(complete).await,
                Progress::Running(handle) => {
                    tokio::time::sleep(self.settings.poll_interval).await;
                    progress = self.poll(statement, &handle).await?;
                }
            }
        }
    }
}

/// Maps one API response onto a result, a pending handle, or an error.
fn interpret(statement: &str, status: u16, body: &str) -> CatalogResult<Progress> {
    match status {
        200 => Ok(Progress::Complete(serde_json::from_str(body)?)),
        202 => {
            let pending: StatementResponse = serde_json::from_str(body)?;
            match pending.statement_handle {
                Some(handle) => Ok(Progress::Running(handle)),
                None => Err(CatalogError::Api {
                    status,
                    message: "accepted statement has no handle".into(),
                }),
            }
        }
        _ => match serde_json::from_str::<StatementResponse>(body) {
            Ok(StatementResponse {
                code: Some(code),
                message,
                ..
            }) => Err(CatalogError::Statement {
                statement: statement.to_string(),
                code,
                message: message.unwrap_or_default(),
            }),
            _ => Err(CatalogError::Api {
                status,
                message: body.to_string(),
            }),
        },
    }
}
