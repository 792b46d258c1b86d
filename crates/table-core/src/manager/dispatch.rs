use super::TableManager;
use crate::alert::AlertContext;
use crate::config::RequestCodes;
use crate::error::{Result, TableError};
use crate::game::PokerAction;
use crate::intake::{Job, JobHandler};
use crate::models::MatchId;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Requests the table manager understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCode {
    StartMatch,
    StartProxy,
    PlayAction,
    DeleteIrrelevantMatches,
}

impl RequestCode {
    /// Map a request string to a code using the configured names.
    pub fn resolve(request: &str, codes: &RequestCodes) -> Option<Self> {
        [
            (&codes.start_match, RequestCode::StartMatch),
            (&codes.start_proxy, RequestCode::StartProxy),
            (&codes.play_action, RequestCode::PlayAction),
            (
                &codes.delete_irrelevant_matches,
                RequestCode::DeleteIrrelevantMatches,
            ),
        ]
        .into_iter()
        .find(|(name, _)| name.as_str() == request)
        .map(|(_, code)| code)
    }
}

fn required_str<'a>(params: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    match params.get(field) {
        Some(Value::String(value)) => Ok(value),
        Some(other) => Err(TableError::InvalidParams {
            field: field.to_string(),
            message: format!("expected a string, got {}", other),
        }),
        None => Err(TableError::InvalidParams {
            field: field.to_string(),
            message: "missing".to_string(),
        }),
    }
}

/// Dealer options from the `options` parameter. Non-string values are passed
/// in their JSON form.
fn dealer_options(params: &Map<String, Value>) -> Result<BTreeMap<String, String>> {
    match params.get("options") {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(options)) => Ok(options
            .iter()
            .map(|(flag, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (flag.clone(), value)
            })
            .collect()),
        Some(other) => Err(TableError::InvalidParams {
            field: "options".to_string(),
            message: format!("expected an object, got {}", other),
        }),
    }
}

impl TableManager {
    /// Handle one job. Failures are logged and alerted here and go no
    /// further.
    pub async fn handle(&self, request: &str, match_id: &MatchId, params: Map<String, Value>) {
        debug!(request, match_id = %match_id, "Handling request");
        if let Err(err) = self.dispatch(request, match_id, &params).await {
            error!(
                request,
                match_id = %match_id,
                category = %err.category(),
                params = %serde_json::Value::Object(params.clone()),
                "Request failed: {}",
                err
            );
            let context = AlertContext {
                request: request.to_string(),
                match_id: match_id.clone(),
                params,
            };
            self.alerts.notify(&err, &context).await;
        }
    }

    async fn dispatch(
        &self,
        request: &str,
        match_id: &MatchId,
        params: &Map<String, Value>,
    ) -> Result<()> {
        let Some(code) = RequestCode::resolve(request, &self.settings.request_codes) else {
            warn!(request, match_id = %match_id, "Unrecognized request; ignoring");
            return Ok(());
        };

        if code == RequestCode::DeleteIrrelevantMatches {
            self.store.delete_irrelevant_matches().await?;
            return Ok(());
        }

        let mut record = self.store.load_match(match_id).await?;

        match code {
            RequestCode::StartMatch => {
                self.roster.reload()?;
                self.ensure_dealer_started(&mut record, dealer_options(params)?)
                    .await?;
                let commands = self.opponent_commands(&record)?;
                self.start_opponents(&commands).await?;
                self.ensure_proxy_started(&mut record).await?;
                info!(match_id = %match_id, "Match started");
            }
            RequestCode::StartProxy => {
                self.ensure_proxy_started(&mut record).await?;
            }
            RequestCode::PlayAction => {
                let action: PokerAction = required_str(params, "action")?.parse()?;
                self.play(match_id, &action).await?;
            }
            RequestCode::DeleteIrrelevantMatches => {}
        }
        Ok(())
    }
}

#[async_trait]
impl JobHandler for TableManager {
    async fn handle_job(&self, job: Job) {
        self.handle(&job.request, &job.match_id, job.params).await;
    }
}
