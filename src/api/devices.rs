use tracing::info;

use super::{AppState, require_body};
use crate::error::{Error, Result};
use crate::models::{Device, DeviceFields, new_id, now_rfc3339, parse_ids};
use crate::router::{ApiRequest, ApiResponse};
use crate::store::{Collection, Query, Store, StoreExt};
use crate::transport::Bus;

pub async fn create<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    require_body(&req)?;
    let fields = DeviceFields::parse(&req.body)?;

    let id = new_id();
    let device = fields.into_device(id.clone(), now_rfc3339());
    state.store.put(Collection::Devices, &id, &device).await?;

    info!(device = %id, "created device");
    Ok(ApiResponse::created(&id, format!("/devices/{}", id)))
}

pub async fn list<S: Store, B: Bus>(_: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let devices: Vec<Device> = state.store.list(Collection::Devices, &Query::all()).await?;
    ApiResponse::json(&devices)
}

pub async fn get<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("device_id")?;
    let device: Device = state
        .store
        .get(Collection::Devices, id)
        .await?
        .ok_or_else(|| Error::device_not_found(id))?;
    ApiResponse::json(&device)
}

pub async fn update<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("device_id")?;
    require_body(&req)?;
    let ops = DeviceFields::parse(&req.body)?.into_ops(now_rfc3339());

    if !state.store.modify(Collection::Devices, id, &ops).await? {
        return Err(Error::device_not_found(id));
    }
    Ok(ApiResponse::ok("updated"))
}

pub async fn remove<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("device_id")?;
    state.relations.delete_device(id).await?;
    Ok(ApiResponse::ok("deleted"))
}

pub async fn plug<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("device_id")?;
    let channels = parse_ids(&req.body)?;
    state.relations.plug_device(id, &channels).await?;
    Ok(ApiResponse::ok("plugged"))
}

pub async fn unplug<S: Store, B: Bus>(req: ApiRequest, state: AppState<S, B>) -> Result<ApiResponse> {
    let id = req.param("device_id")?;
    let channels = parse_ids(&req.body)?;
    state.relations.unplug_device(id, &channels).await?;
    Ok(ApiResponse::ok("unplugged"))
}
