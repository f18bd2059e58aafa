//! Dashboard view model.
//!
//! Combines discovered channels, subscription state and buffered events
//! into one snapshot for the display surface. The view is recomputed from
//! scratch on every call; nothing here holds live state beyond the channel
//! list, filter and selection.

use crate::buffer::LiveEvent;
use crate::error::{self, DiscoveryError};
use crate::subscriptions::{SubscriptionRegistry, SubscriptionState};
use crate::tree::{TreeNode, TreeOptions};
use crate::types::{Channel, ChannelCategory, Timestamp};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Lists the channels available on the platform.
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<Channel>, DiscoveryError>;
}

/// Which channels the dashboard lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    /// Case-insensitive match against path and name. Empty matches all.
    pub search: String,
    pub category: Option<ChannelCategory>,
    pub subscribed_only: bool,
}

impl ChannelFilter {
    pub fn matches(&self, channel: &Channel, state: SubscriptionState) -> bool {
        if self.subscribed_only && !state.is_active() {
            return false;
        }
        if let Some(category) = self.category {
            if channel.category != category {
                return false;
            }
        }
        let needle = self.search.trim().to_lowercase();
        needle.is_empty()
            || channel.path.to_lowercase().contains(&needle)
            || channel.name.to_lowercase().contains(&needle)
    }
}

/// One listed channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelRow {
    pub channel: Channel,
    pub state: SubscriptionState,
    pub buffered: usize,
    pub newest_received_at: Option<Timestamp>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: ChannelCategory,
    pub total: usize,
    pub subscribed: usize,
}

/// A buffered event with its payload tree.
#[derive(Clone, Debug)]
pub struct EventRow {
    pub event: Arc<LiveEvent>,
    pub tree: TreeNode,
}

/// The selected channel's detail pane.
#[derive(Clone, Debug)]
pub struct SelectedChannel {
    pub channel: Channel,
    pub state: SubscriptionState,
    /// Newest first.
    pub events: Vec<EventRow>,
}

#[derive(Clone, Debug)]
pub struct DashboardView {
    pub rows: Vec<ChannelRow>,
    pub categories: Vec<CategoryCount>,
    pub subscribed_count: usize,
    pub selected: Option<SelectedChannel>,
    pub discovery_error: Option<String>,
}

/// Holds the channel list, filter and selection behind the view.
#[derive(Debug, Default)]
pub struct Dashboard {
    channels: Vec<Channel>,
    filter: ChannelFilter,
    selected: Option<String>,
    last_error: Option<DiscoveryError>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(channels: Vec<Channel>) -> Self {
        let mut dashboard = Self::new();
        dashboard.set_channels(channels);
        dashboard
    }

    fn set_channels(&mut self, channels: Vec<Channel>) {
        let mut seen = HashSet::new();
        self.channels = channels
            .into_iter()
            .filter(|c| seen.insert(c.path.clone()))
            .collect();
    }

    /// Reload channels from discovery. On failure the previous list is
    /// kept and the error is shown in the view.
    pub async fn refresh_channels(
        &mut self,
        discovery: &dyn DiscoveryService,
    ) -> error::Result<usize> {
        match discovery.list_channels().await {
            Ok(channels) => {
                self.set_channels(channels);
                self.last_error = None;
                tracing::info!(count = self.channels.len(), "channels discovered");
                Ok(self.channels.len())
            }
            Err(e) => {
                tracing::warn!(error = %e, "channel discovery failed");
                self.last_error = Some(e.clone());
                Err(e.into())
            }
        }
    }

    /// Add a channel the operator typed in. Returns false if it's listed.
    pub fn add_channel(&mut self, channel: Channel) -> bool {
        if self.channels.iter().any(|c| c.path == channel.path) {
            return false;
        }
        self.channels.push(channel);
        true
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn filter(&self) -> &ChannelFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: ChannelFilter) {
        self.filter = filter;
    }

    pub fn select(&mut self, channel: Option<&str>) {
        self.selected = channel.map(str::to_string);
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Build the view from the current registry state.
    pub fn view(&self, registry: &SubscriptionRegistry) -> DashboardView {
        let subscriptions = registry.snapshot();
        let buffers = registry.buffers();

        // Tracked or still-buffered channels missing from discovery get a row.
        let mut channels = self.channels.clone();
        let buffered_channels = buffers.channels();
        let extra = subscriptions
            .iter()
            .map(|s| s.channel.clone())
            .chain(
                buffered_channels
                    .iter()
                    .filter_map(|path| buffers.newest(path))
                    .map(|event| event.channel.clone()),
            );
        for channel in extra {
            if !channels.iter().any(|c| c.path == channel.path) {
                channels.push(channel);
            }
        }

        let state_of = |path: &str| {
            subscriptions
                .iter()
                .find(|s| s.channel.path == path)
                .map(|s| s.state)
                .unwrap_or_default()
        };

        let categories = ChannelCategory::ALL
            .iter()
            .map(|&category| {
                let in_category: Vec<&Channel> =
                    channels.iter().filter(|c| c.category == category).collect();
                CategoryCount {
                    category,
                    total: in_category.len(),
                    subscribed: in_category
                        .iter()
                        .filter(|c| state_of(&c.path) == SubscriptionState::Subscribed)
                        .count(),
                }
            })
            .collect();

        let rows = channels
            .iter()
            .filter_map(|channel| {
                let state = state_of(&channel.path);
                if !self.filter.matches(channel, state) {
                    return None;
                }
                Some(ChannelRow {
                    channel: channel.clone(),
                    state,
                    buffered: buffers.len(&channel.path),
                    newest_received_at: buffers.newest(&channel.path).map(|e| e.received_at),
                })
            })
            .collect();

        let options = TreeOptions {
            expand_depth: registry.config().tree_expand_depth,
            preview_key_limit: registry.config().preview_key_limit,
        };
        let selected = self.selected.as_deref().and_then(|path| {
            let channel = channels.iter().find(|c| c.path == path)?.clone();
            let events = registry
                .events(path)
                .into_iter()
                .map(|event| EventRow {
                    tree: event.payload_tree(options),
                    event,
                })
                .collect();
            Some(SelectedChannel {
                state: state_of(path),
                channel,
                events,
            })
        });

        DashboardView {
            rows,
            categories,
            subscribed_count: subscriptions
                .iter()
                .filter(|s| s.state == SubscriptionState::Subscribed)
                .count(),
            selected,
            discovery_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }
}
