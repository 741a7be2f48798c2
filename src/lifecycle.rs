/*
 *  lifecycle.rs
 *
 *  bigclock - synchronized clock faces
 *  (c) 2020-26 Stuart Hunter
 *
 *  Host lifecycle events to registry and scheduler transitions
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::glyph::resolve_for;
use crate::host::{CellHandle, SharedHandle};
use crate::registry::CellRegistry;
use crate::render::Renderer;
use crate::scheduler::{Clock, Scheduler};
use crate::settings::{CellSettings, RawSettings};

/// Entry points the host event delivery calls into.
#[derive(Clone)]
pub struct LifecycleManager {
    registry: Arc<CellRegistry>,
    scheduler: Scheduler,
    renderer: Arc<Renderer>,
    clock: Arc<dyn Clock>,
    settle_redraw: Option<Duration>,
}

impl LifecycleManager {
    pub fn new(
        registry: Arc<CellRegistry>,
        scheduler: Scheduler,
        renderer: Arc<Renderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { registry, scheduler, renderer, clock, settle_redraw: None }
    }

    /// Repeat the forced redraw this long after a settings change.
    pub fn with_settle_redraw(mut self, delay: Option<Duration>) -> Self {
        self.settle_redraw = delay;
        self
    }

    pub fn registry(&self) -> &Arc<CellRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Cell became visible: default its settings once, register it, persist
    /// the defaults, draw it and make sure the timer runs.
    ///
    /// Registration happens before the first await so a hide delivered while
    /// this call is suspended always finds the cell and removes it for good.
    pub async fn on_shown(&self, id: &str, handle: SharedHandle, raw: RawSettings) -> CellSettings {
        let settings = raw.materialize();
        self.registry.upsert(id, handle.clone(), settings.clone());
        info!("cell {} added ({}), {} total cells", id, settings.kind, self.registry.size());

        if let Err(e) = handle.save_settings(&settings.to_raw()).await {
            warn!("could not persist defaulted settings for {}: {}", id, e);
        }
        self.redraw(id, handle.as_ref(), &settings).await;

        // refused if the cell was hidden in the meantime
        self.scheduler.ensure_started();
        if !self.registry.is_empty() {
            self.scheduler.supervise();
        }
        settings
    }

    /// Cell went away. Stops the timer when it was the last one.
    pub fn on_hidden(&self, id: &str) -> bool {
        let removed = self.registry.remove(id);
        info!("cell {} removed, {} cells remaining", id, self.registry.size());
        if self.registry.is_empty() {
            self.scheduler.request_stop();
        }
        removed
    }

    pub async fn on_settings_changed(&self, id: &str, handle: SharedHandle, update: RawSettings) -> CellSettings {
        debug!("settings changed for {}: {:?}", id, update);
        let settings = match self.registry.get(id) {
            Some(entry) => {
                let settings = entry.settings.overlay(update);
                self.registry.upsert(id, handle.clone(), settings.clone());
                settings
            }
            None => {
                // only on_shown registers; doing it here could revive a cell
                // the host already hid, so just draw what was asked for
                debug!("settings for unregistered cell {}, drawing without registering", id);
                update.materialize()
            }
        };

        self.redraw(id, handle.as_ref(), &settings).await;
        self.schedule_settle_redraw(id, handle);
        settings
    }

    /// Live update from the property inspector. An empty payload is ignored.
    pub async fn on_inspector_message(&self, id: &str, handle: SharedHandle, payload: RawSettings) -> Option<CellSettings> {
        if payload.is_empty() {
            debug!("empty inspector message for {}, ignored", id);
            return None;
        }
        Some(self.on_settings_changed(id, handle, payload).await)
    }

    /// Manual refresh. Leaves the registry untouched.
    pub async fn on_key_pressed(&self, id: &str, handle: SharedHandle, current: RawSettings) {
        let settings = match self.registry.get(id) {
            Some(entry) => entry.settings.overlay(current),
            None => current.materialize(),
        };
        self.redraw(id, handle.as_ref(), &settings).await;
    }

    async fn redraw(&self, id: &str, handle: &dyn CellHandle, settings: &CellSettings) {
        let glyph = resolve_for(&self.clock.now(), settings, self.scheduler.options().blink_policy);
        if let Err(e) = self.renderer.render(handle, &glyph, settings).await {
            warn!("forced redraw of {} failed: {}", id, e);
        }
    }

    fn schedule_settle_redraw(&self, id: &str, handle: SharedHandle) {
        let Some(delay) = self.settle_redraw else { return };
        let this = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(entry) = this.registry.get(&id) {
                this.redraw(&id, handle.as_ref(), &entry.settings).await;
            }
        });
    }
}
