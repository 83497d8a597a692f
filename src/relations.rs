//! Device/channel membership graph.
//!
//! `c ∈ Device(d).channels ⇔ d ∈ Channel(c).devices` has to hold across two
//! collections that are updated one document at a time. Every edge change
//! uses add-to-set / pull operators, so replaying a plug or unplug after a
//! partial failure is a no-op for the half that already landed. Nothing is
//! rolled back.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Channel, Device, now_rfc3339};
use crate::store::{Collection, Query, Store, StoreExt, UpdateOp};

#[derive(Debug, Clone)]
pub struct RelationshipManager<S> {
    store: S,
}

impl<S: Store> RelationshipManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Add every device to `channel_id`.
    ///
    /// Fails with `NotFound` on the first missing device; devices before it
    /// stay plugged on their side.
    pub async fn plug(&self, channel_id: &str, device_ids: &[String]) -> Result<()> {
        self.ensure_exists(Collection::Channels, channel_id).await?;

        for device_id in device_ids {
            self.link(Collection::Devices, device_id, "channels", channel_id, true)
                .await?;
        }
        self.link_many(Collection::Channels, channel_id, "devices", device_ids, true)
            .await?;

        info!(channel = %channel_id, devices = device_ids.len(), "plugged devices");
        Ok(())
    }

    /// Remove every device from `channel_id`. Same partial-failure rules as [`plug`](Self::plug).
    pub async fn unplug(&self, channel_id: &str, device_ids: &[String]) -> Result<()> {
        self.ensure_exists(Collection::Channels, channel_id).await?;

        for device_id in device_ids {
            self.link(Collection::Devices, device_id, "channels", channel_id, false)
                .await?;
        }
        self.link_many(Collection::Channels, channel_id, "devices", device_ids, false)
            .await?;

        info!(channel = %channel_id, devices = device_ids.len(), "unplugged devices");
        Ok(())
    }

    /// Device-side counterpart of [`plug`](Self::plug)
    pub async fn plug_device(&self, device_id: &str, channel_ids: &[String]) -> Result<()> {
        self.ensure_exists(Collection::Devices, device_id).await?;

        for channel_id in channel_ids {
            self.link(Collection::Channels, channel_id, "devices", device_id, true)
                .await?;
        }
        self.link_many(Collection::Devices, device_id, "channels", channel_ids, true)
            .await?;

        info!(device = %device_id, channels = channel_ids.len(), "plugged channels");
        Ok(())
    }

    /// Device-side counterpart of [`unplug`](Self::unplug)
    pub async fn unplug_device(&self, device_id: &str, channel_ids: &[String]) -> Result<()> {
        self.ensure_exists(Collection::Devices, device_id).await?;

        for channel_id in channel_ids {
            self.link(Collection::Channels, channel_id, "devices", device_id, false)
                .await?;
        }
        self.link_many(Collection::Devices, device_id, "channels", channel_ids, false)
            .await?;

        info!(device = %device_id, channels = channel_ids.len(), "unplugged channels");
        Ok(())
    }

    /// Unplug the device from all its channels, then remove it.
    pub async fn delete_device(&self, device_id: &str) -> Result<()> {
        let device: Device = self
            .store
            .get(Collection::Devices, device_id)
            .await?
            .ok_or_else(|| Error::device_not_found(device_id))?;

        for channel_id in &device.channels {
            self.cascade(Collection::Channels, channel_id, "devices", device_id)
                .await
                .map_err(|e| {
                    Error::drift(format!("unplug device {} from channel {}", device_id, channel_id), e)
                })?;
        }

        self.remove_primary(Collection::Devices, device_id, !device.channels.is_empty())
            .await?;

        info!(device = %device_id, channels = device.channels.len(), "deleted device");
        Ok(())
    }

    /// Unplug the channel from all its devices, then remove it.
    pub async fn delete_channel(&self, channel_id: &str) -> Result<()> {
        let channel: Channel = self
            .store
            .get_with(Collection::Channels, &Query::by_id(channel_id).slice("entries", 0))
            .await?
            .ok_or_else(|| Error::channel_not_found(channel_id))?;

        for device_id in &channel.devices {
            self.cascade(Collection::Devices, device_id, "channels", channel_id)
                .await
                .map_err(|e| {
                    Error::drift(format!("unplug channel {} from device {}", channel_id, device_id), e)
                })?;
        }

        self.remove_primary(Collection::Channels, channel_id, !channel.devices.is_empty())
            .await?;

        info!(channel = %channel_id, devices = channel.devices.len(), "deleted channel");
        Ok(())
    }

    async fn ensure_exists(&self, collection: Collection, id: &str) -> Result<()> {
        let mut query = Query::by_id(id);
        if collection == Collection::Channels {
            query = query.slice("entries", 0);
        }
        match self.store.get_with::<Value>(collection, &query).await? {
            Some(_) => Ok(()),
            None => Err(not_found(collection, id)),
        }
    }

    async fn link(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        member: &str,
        add: bool,
    ) -> Result<()> {
        let members = [member.to_string()];
        self.link_many(collection, id, field, &members, add).await
    }

    async fn link_many(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        members: &[String],
        add: bool,
    ) -> Result<()> {
        let edge = if add {
            UpdateOp::add_to_set(field, members.iter().cloned())
        } else {
            UpdateOp::pull(field, members.iter().cloned())
        };
        let ops = [edge, UpdateOp::set("updated", now_rfc3339())];

        if self.store.modify(collection, id, &ops).await? {
            debug!(collection = collection.name(), id, field, add, "updated membership");
            Ok(())
        } else {
            Err(not_found(collection, id))
        }
    }

    /// Pull `member` from the other side of an edge being deleted. A missing
    /// document there already satisfies the invariant.
    async fn cascade(&self, collection: Collection, id: &str, field: &str, member: &str) -> Result<()> {
        match self.link(collection, id, field, member, false).await {
            Err(Error::NotFound { .. }) => {
                warn!(collection = collection.name(), id, member, "dangling reference during cascade");
                Ok(())
            }
            other => other,
        }
    }

    async fn remove_primary(&self, collection: Collection, id: &str, cascaded: bool) -> Result<()> {
        match self.store.delete(collection, id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(not_found(collection, id)),
            Err(e) if cascaded => Err(Error::drift(format!("remove {} {}", collection.name(), id), e)),
            Err(e) => Err(e),
        }
    }
}

fn not_found(collection: Collection, id: &str) -> Error {
    match collection {
        Collection::Devices => Error::device_not_found(id),
        Collection::Channels => Error::channel_not_found(id),
        Collection::Messages => Error::NotFound {
            kind: "message",
            id: id.to_string(),
        },
    }
}
