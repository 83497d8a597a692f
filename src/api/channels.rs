use tracing::info;

use super::{AppState, require_body};
use crate::error::{Error, Result};
use crate::models::{Channel, ChannelFields, new_id, now_rfc3339, parse_ids};
use crate::router::{ApiRequest, ApiResponse};
use crate::store::{Collection, Query, Store, StoreExt};
use crate::transport::Bus;

/// Entries returned per channel unless `vlimit` says otherwise
pub const DEFAULT_VLIMIT: i64 = -100;

/// Channels returned by a list unless `climit` says otherwise
pub const DEFAULT_CLIMIT: usize = 100;

fn vlimit(req: &ApiRequest) -> Result<i64> {
    Ok(req.query_param("vlimit")?.unwrap_or(DEFAULT_VLIMIT))
}

pub async fn create<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    require_body(&req)?;
    let fields = ChannelFields::parse(&req.body)?;

    let id = new_id();
    let channel = fields.into_channel(id.clone(), now_rfc3339());
    state.store.put(Collection::Channels, &id, &channel).await?;

    info!(channel = %id, "created channel");
    Ok(ApiResponse::created(&id, format!("/channels/{}", id)))
}

/// Newest first. `climit` caps the channel count, `vlimit` slices entries.
pub async fn list<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let climit = req.query_param("climit")?.unwrap_or(DEFAULT_CLIMIT);
    let query = Query::all()
        .slice("entries", vlimit(&req)?)
        .sort_by("created", true)
        .limit(climit);

    let channels: Vec<Channel> = state.store.list(Collection::Channels, &query).await?;
    ApiResponse::json(&channels)
}

pub async fn get<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("channel_id")?;
    let query = Query::by_id(id).slice("entries", vlimit(&req)?);

    let channel: Channel = state
        .store
        .get_with(Collection::Channels, &query)
        .await?
        .ok_or_else(|| Error::channel_not_found(id))?;
    ApiResponse::json(&channel)
}

pub async fn update<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("channel_id")?;
    require_body(&req)?;
    let ops = ChannelFields::parse(&req.body)?.into_ops(now_rfc3339());

    if !state.store.modify(Collection::Channels, id, &ops).await? {
        return Err(Error::channel_not_found(id));
    }
    Ok(ApiResponse::ok("updated"))
}

pub async fn remove<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("channel_id")?;
    state.relations.delete_channel(id).await?;
    Ok(ApiResponse::ok("deleted"))
}

pub async fn plug<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("channel_id")?;
    let devices = parse_ids(&req.body)?;
    state.relations.plug(id, &devices).await?;
    Ok(ApiResponse::ok("plugged"))
}

pub async fn unplug<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("channel_id")?;
    let devices = parse_ids(&req.body)?;
    state.relations.unplug(id, &devices).await?;
    Ok(ApiResponse::ok("unplugged"))
}
