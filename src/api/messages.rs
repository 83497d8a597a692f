use mainflux_senml::Format;
use serde_json::Value;
use time::OffsetDateTime;

use super::AppState;
use crate::error::{Error, Result};
use crate::router::{ApiRequest, ApiResponse};
use crate::store::{Collection, Query, Store, StoreExt};
use crate::transport::Bus;

/// `POST /channels/:channel_id/msg`
///
/// The publisher is the `Client-ID` header. The message is accepted once
/// it is on the bus; persistence happens when it comes back relayed.
pub async fn send<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("channel_id")?;
    let publisher = req.header("client-id").unwrap_or_default();
    let format = req
        .header("content-type")
        .map(Format::from_content_type)
        .unwrap_or_default();

    state
        .ingest
        .accept_http(id, publisher, format, &req.body)
        .await?;
    Ok(ApiResponse::accepted("message sent"))
}

/// `GET /channels/:channel_id/msg?start_time=&end_time=`
///
/// Inclusive range in UNIX seconds, defaulting to everything up to now.
pub async fn query<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("channel_id")?;
    let start = req.query_param::<f64>("start_time")?.unwrap_or(0.0);
    let end = req
        .query_param::<f64>("end_time")?
        .unwrap_or_else(|| OffsetDateTime::now_utc().unix_timestamp() as f64);

    let exists = state
        .store
        .get_with::<Value>(Collection::Channels, &Query::by_id(id).slice("entries", 0))
        .await?
        .is_some();
    if !exists {
        return Err(Error::channel_not_found(id));
    }

    let messages = state.ingest.messages(id, start, end).await?;
    ApiResponse::json(&messages)
}
