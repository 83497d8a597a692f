//! REST handlers and the route table.

use crate::error::Result;
use crate::ingest::IngestRouter;
use crate::relations::RelationshipManager;
use crate::router::{ApiRequest, ApiResponse, ApiRouter};
use crate::routing::RouterBuilder;
use crate::store::Store;
use crate::transport::Bus;

pub mod channels;
pub mod devices;
pub mod messages;

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState<S, B> {
    pub store: S,
    pub relations: RelationshipManager<S>,
    pub ingest: IngestRouter<S, B>,
}

impl<S: Store, B: Bus> AppState<S, B> {
    pub fn new(store: S, ingest: IngestRouter<S, B>) -> Self {
        Self {
            relations: RelationshipManager::new(store.clone()),
            store,
            ingest,
        }
    }
}

async fn status<S, B>(_: ApiRequest, _: AppState<S, B>) -> Result<ApiResponse> {
    Ok(ApiResponse::ok("running"))
}

pub fn router<S: Store, B: Bus>(state: AppState<S, B>) -> ApiRouter<AppState<S, B>> {
    RouterBuilder::new(state)
        .get("/status", status::<S, B>)
        .post("/devices", devices::create::<S, B>)
        .get("/devices", devices::list::<S, B>)
        .get("/devices/:device_id", devices::get::<S, B>)
        .put("/devices/:device_id", devices::update::<S, B>)
        .delete("/devices/:device_id", devices::remove::<S, B>)
        .post("/devices/:device_id/plug", devices::plug::<S, B>)
        .post("/devices/:device_id/unplug", devices::unplug::<S, B>)
        .post("/channels", channels::create::<S, B>)
        .get("/channels", channels::list::<S, B>)
        .get("/channels/:channel_id", channels::get::<S, B>)
        .put("/channels/:channel_id", channels::update::<S, B>)
        .delete("/channels/:channel_id", channels::remove::<S, B>)
        .post("/channels/:channel_id/plug", channels::plug::<S, B>)
        .post("/channels/:channel_id/unplug", channels::unplug::<S, B>)
        .post("/channels/:channel_id/msg", messages::send::<S, B>)
        .get("/channels/:channel_id/msg", messages::query::<S, B>)
        .build()
}

/// Creation bodies may not be empty
fn require_body(req: &ApiRequest) -> Result<()> {
    if req.body.iter().all(u8::is_ascii_whitespace) {
        return Err(crate::Error::Decode("no data provided".to_string()));
    }
    Ok(())
}
